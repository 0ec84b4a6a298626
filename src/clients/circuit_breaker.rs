use anyhow::{Error, Result};
use chrono::Utc;
use redis::{AsyncCommands, aio::MultiplexedConnection};
use tracing::{debug, info, warn};

use crate::models::circuit_breaker::{CircuitBreakerConfig, CircuitState};

/// Redis-backed breaker shared by every instance that talks to the same
/// downstream service.
#[derive(Clone)]
pub struct CircuitBreaker {
    service_name: String,
    connection: MultiplexedConnection,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(
        service_name: String,
        connection: MultiplexedConnection,
        config: CircuitBreakerConfig,
    ) -> Self {
        info!(service = %service_name, "Circuit breaker initialized");

        Self {
            service_name,
            connection,
            config,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn key(&self, suffix: &str) -> String {
        format!("circuit:{}:{}", self.service_name, suffix)
    }

    pub async fn allow_request(&self) -> Result<bool, Error> {
        match self.state().await? {
            CircuitState::Closed => Ok(true),
            CircuitState::HalfOpen => {
                debug!(service = %self.service_name, "Circuit breaker in half-open state");
                Ok(true)
            }
            CircuitState::Open => {
                if self.should_attempt_reset().await? {
                    info!(service = %self.service_name, "Circuit breaker attempting reset");
                    self.set_state(CircuitState::HalfOpen).await?;
                    return Ok(true);
                }
                warn!(service = %self.service_name, "Circuit breaker is open, rejecting request");
                Ok(false)
            }
        }
    }

    pub async fn record_success(&self) -> Result<(), Error> {
        match self.state().await? {
            CircuitState::HalfOpen => {
                let successes = self.increment(&self.key("successes"), None).await?;
                debug!(
                    service = %self.service_name,
                    successes,
                    threshold = self.config.success_threshold,
                    "Circuit breaker success recorded"
                );

                if successes >= self.config.success_threshold {
                    self.set_state(CircuitState::Closed).await?;
                    self.reset_counters().await?;
                    info!(service = %self.service_name, "Circuit breaker closed after successful recovery");
                }
            }
            CircuitState::Closed => {
                let mut conn = self.connection.clone();
                conn.del::<_, ()>(self.key("failures")).await?;
            }
            CircuitState::Open => {}
        }

        Ok(())
    }

    pub async fn record_failure(&self) -> Result<(), Error> {
        if self.state().await? == CircuitState::HalfOpen {
            self.open().await?;
            warn!(service = %self.service_name, "Circuit breaker reopened after failed recovery attempt");
            return Ok(());
        }

        let failures = self
            .increment(&self.key("failures"), Some(self.config.timeout_seconds))
            .await?;
        debug!(
            service = %self.service_name,
            failures,
            threshold = self.config.failure_threshold,
            "Circuit breaker failure recorded"
        );

        if failures >= self.config.failure_threshold {
            self.open().await?;
            warn!(
                service = %self.service_name,
                failures,
                "Circuit breaker opened due to consecutive failures"
            );
        }

        Ok(())
    }

    pub async fn state(&self) -> Result<CircuitState, Error> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(self.key("state")).await?;

        Ok(value
            .map(|s| CircuitState::from_stored(&s))
            .unwrap_or(CircuitState::Closed))
    }

    async fn set_state(&self, state: CircuitState) -> Result<(), Error> {
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(self.key("state"), state.as_str()).await?;
        Ok(())
    }

    async fn open(&self) -> Result<(), Error> {
        self.set_state(CircuitState::Open).await?;

        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(self.key("opened_at"), Utc::now().timestamp())
            .await?;
        conn.del::<_, ()>(self.key("successes")).await?;
        Ok(())
    }

    async fn increment(&self, key: &str, ttl_seconds: Option<u64>) -> Result<u32, Error> {
        let mut conn = self.connection.clone();
        let count: u32 = conn.incr(key, 1).await?;
        if let Some(ttl) = ttl_seconds {
            conn.expire::<_, ()>(key, ttl as i64).await?;
        }
        Ok(count)
    }

    async fn reset_counters(&self) -> Result<(), Error> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(&[
            self.key("failures"),
            self.key("successes"),
            self.key("opened_at"),
        ])
        .await?;
        Ok(())
    }

    async fn should_attempt_reset(&self) -> Result<bool, Error> {
        let mut conn = self.connection.clone();
        let opened_at: Option<i64> = conn.get(self.key("opened_at")).await?;

        Ok(match opened_at {
            Some(opened_at) => {
                let elapsed = Utc::now().timestamp().saturating_sub(opened_at);
                elapsed >= self.config.timeout_seconds as i64
            }
            None => true,
        })
    }
}
