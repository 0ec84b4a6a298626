use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::models::{
    circuit_breaker::CircuitBreakerConfig,
    retry::RetryConfig,
    routing::{DigestSettings, RoutingTable},
};

fn default_events_queue_name() -> String {
    "notification_events".to_string()
}

fn default_prefetch_count() -> u16 {
    10
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_telegram_timeout_ms() -> u64 {
    10_000
}

fn default_min_items_for_digest() -> usize {
    3
}

fn default_collection_window_ms() -> u64 {
    300_000
}

fn default_sweep_interval_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_retry_delay_ms() -> u64 {
    1_000
}

fn default_max_retry_delay_ms() -> u64 {
    30_000
}

fn default_retry_backoff_multiplier() -> u64 {
    2
}

fn default_retry_jitter_ratio() -> f64 {
    0.1
}

fn default_attempt_timeout_ms() -> u64 {
    10_000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_success_threshold() -> u32 {
    2
}

fn default_server_port() -> u16 {
    8080
}

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub rabbitmq_url: String,
    #[serde(default = "default_events_queue_name")]
    pub events_queue_name: String,
    #[serde(default = "default_prefetch_count")]
    pub prefetch_count: u16,

    pub redis_url: String,

    pub database_url: String,

    pub telegram_bot_token: String,
    #[serde(default = "default_telegram_api_url")]
    pub telegram_api_url: String,
    #[serde(default = "default_telegram_timeout_ms")]
    pub telegram_timeout_ms: u64,
    #[serde(default)]
    pub mini_app_url: Option<String>,

    #[serde(default)]
    pub routing_table_path: Option<String>,
    #[serde(default = "default_min_items_for_digest")]
    pub min_items_for_digest: usize,
    #[serde(default = "default_collection_window_ms")]
    pub collection_window_ms: u64,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "default_retry_backoff_multiplier")]
    pub retry_backoff_multiplier: u64,
    #[serde(default = "default_retry_jitter_ratio")]
    pub retry_jitter_ratio: f64,
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    #[serde(default = "default_failure_threshold")]
    pub circuit_breaker_failure_threshold: u32,
    #[serde(default = "default_timeout_seconds")]
    pub circuit_breaker_timeout_seconds: u64,
    #[serde(default = "default_success_threshold")]
    pub circuit_breaker_success_threshold: u32,

    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.telegram_bot_token.trim().is_empty() {
            return Err(anyhow!("TELEGRAM_BOT_TOKEN cannot be empty"));
        }
        if self.sweep_interval_ms == 0 {
            return Err(anyhow!("SWEEP_INTERVAL_MS must be positive"));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(anyhow!("ATTEMPT_TIMEOUT_MS must be positive"));
        }
        if self.telegram_timeout_ms == 0 {
            return Err(anyhow!("TELEGRAM_TIMEOUT_MS must be positive"));
        }
        if self.retry_backoff_multiplier == 0 {
            return Err(anyhow!("RETRY_BACKOFF_MULTIPLIER must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.retry_jitter_ratio) {
            return Err(anyhow!("RETRY_JITTER_RATIO must be in [0, 1)"));
        }
        if self.initial_retry_delay_ms > self.max_retry_delay_ms {
            return Err(anyhow!(
                "INITIAL_RETRY_DELAY_MS cannot exceed MAX_RETRY_DELAY_MS"
            ));
        }
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_delay_ms: self.initial_retry_delay_ms,
            max_delay_ms: self.max_retry_delay_ms,
            backoff_multiplier: self.retry_backoff_multiplier,
            attempt_timeout_ms: self.attempt_timeout_ms,
            jitter_ratio: self.retry_jitter_ratio,
        }
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker_failure_threshold,
            timeout_seconds: self.circuit_breaker_timeout_seconds,
            success_threshold: self.circuit_breaker_success_threshold,
        }
    }

    pub fn digest_settings(&self) -> DigestSettings {
        DigestSettings::new(self.min_items_for_digest, self.collection_window_ms)
    }

    pub fn routing_table(&self) -> Result<RoutingTable, Error> {
        let table = RoutingTable::with_digest(self.digest_settings());

        match &self.routing_table_path {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .map_err(|e| anyhow!("Failed to read routing table {}: {}", path, e))?;
                table.merge_json(&json)
            }
            None => {
                table.validate()?;
                Ok(table)
            }
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn telegram_timeout(&self) -> Duration {
        Duration::from_millis(self.telegram_timeout_ms)
    }
}
