use std::{collections::HashMap, sync::Arc, time::Instant};

use chrono::Utc;
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::{
    clients::{circuit_breaker::CircuitBreaker, database::PostgresFailureStore, rbmq::RabbitMqClient},
    config::Config,
    models::{
        circuit_breaker::CircuitState,
        health::{HealthCheckResponse, HealthStatus, ServiceHealth},
    },
};

const CRITICAL: [&str; 2] = ["database", "message_broker"];

pub struct HealthChecker {
    config: Config,
    database: Option<Arc<PostgresFailureStore>>,
    channel_breaker: Option<CircuitBreaker>,
}

impl HealthChecker {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            database: None,
            channel_breaker: None,
        }
    }

    pub fn with_database(mut self, database: Arc<PostgresFailureStore>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_channel_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.channel_breaker = Some(breaker);
        self
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        checks.insert("database".to_string(), self.check_database().await);
        checks.insert("cache_service".to_string(), self.check_redis().await);
        checks.insert("message_broker".to_string(), self.check_rabbitmq().await);

        if let Some(breaker) = &self.channel_breaker {
            checks.insert(
                breaker.service_name().to_string(),
                self.check_circuit_breaker(breaker).await,
            );
        }

        HealthCheckResponse {
            status: determine_overall_status(&checks),
            timestamp: Utc::now(),
            checks,
        }
    }

    async fn check_database(&self) -> ServiceHealth {
        let start = Instant::now();

        let result = match &self.database {
            Some(store) => store.health_check().await,
            None => match PostgresFailureStore::connect(&self.config.database_url).await {
                Ok(store) => store.health_check().await,
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(()) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "Database health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                ServiceHealth::unhealthy(e.to_string())
            }
        }
    }

    async fn check_redis(&self) -> ServiceHealth {
        let start = Instant::now();

        let client = match redis::Client::open(self.config.redis_url.as_str()) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Redis client creation failed");
                return ServiceHealth::unhealthy(format!("Client creation failed: {}", e));
            }
        };

        match client.get_multiplexed_async_connection().await {
            Ok(mut conn) => match conn.ping::<String>().await {
                Ok(_) => {
                    let elapsed = start.elapsed().as_millis() as u64;
                    debug!(response_time_ms = elapsed, "Redis health check passed");
                    ServiceHealth::healthy(elapsed)
                }
                Err(e) => {
                    warn!(error = %e, "Redis ping failed");
                    ServiceHealth::unhealthy(format!("Ping failed: {}", e))
                }
            },
            Err(e) => {
                warn!(error = %e, "Redis connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    async fn check_rabbitmq(&self) -> ServiceHealth {
        let start = Instant::now();

        match RabbitMqClient::connect(&self.config).await {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "RabbitMQ health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "RabbitMQ connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    async fn check_circuit_breaker(&self, breaker: &CircuitBreaker) -> ServiceHealth {
        match breaker.state().await {
            Ok(state) => {
                debug!(
                    service = breaker.service_name(),
                    circuit_state = %state,
                    "Circuit breaker state checked"
                );

                match state {
                    CircuitState::Closed => {
                        ServiceHealth::healthy(0).with_circuit_breaker(state.to_string())
                    }
                    CircuitState::HalfOpen => ServiceHealth::degraded(
                        state.to_string(),
                        Some("Circuit breaker in recovery mode".to_string()),
                    ),
                    CircuitState::Open => ServiceHealth::degraded(
                        state.to_string(),
                        Some("Circuit breaker is open".to_string()),
                    ),
                }
            }
            Err(e) => {
                warn!(
                    service = breaker.service_name(),
                    error = %e,
                    "Failed to check circuit breaker state"
                );
                ServiceHealth::unhealthy(format!("Cannot check circuit breaker: {}", e))
            }
        }
    }
}

pub fn determine_overall_status(checks: &HashMap<String, ServiceHealth>) -> HealthStatus {
    let critical_unhealthy = checks
        .iter()
        .filter(|(name, _)| CRITICAL.contains(&name.as_str()))
        .any(|(_, health)| health.status == HealthStatus::Unhealthy);

    if critical_unhealthy {
        HealthStatus::Unhealthy
    } else if checks
        .values()
        .any(|health| health.status != HealthStatus::Healthy)
    {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}
