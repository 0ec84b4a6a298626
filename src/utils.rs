use std::sync::Arc;

use anyhow::{Error, Result};
use futures_util::StreamExt;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    clients::rbmq::RabbitMqClient,
    errors::ValidationError,
    models::{message::Envelope, retry::RetryConfig},
    notifications::dispatcher::{IntakeDecision, NotificationDispatcher},
};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_current_span(false))
        .try_init();
}

pub fn process_message(
    payload: &[u8],
    dispatcher: &NotificationDispatcher,
) -> Result<IntakeDecision, ValidationError> {
    let envelope = serde_json::from_slice::<Envelope>(payload)
        .map_err(|e| ValidationError::Malformed(e.to_string()))?;

    debug!(
        user_id = %envelope.data.user_id,
        notification_type = %envelope.data.notification_type,
        "Processing notification event"
    );

    dispatcher.accept(envelope.data)
}

/// Consumes the events queue until cancelled. Invalid events are rejected
/// without requeue; everything else is acked once intake has taken it.
pub async fn consume_events(
    rabbitmq: RabbitMqClient,
    dispatcher: Arc<NotificationDispatcher>,
    cancellation_token: CancellationToken,
) -> Result<(), Error> {
    let mut consumer = rabbitmq.create_consumer().await?;

    loop {
        let delivery = tokio::select! {
            biased;

            _ = cancellation_token.cancelled() => break,

            next = consumer.next() => match next {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => {
                    error!(error = %e, "Failed to receive message");
                    continue;
                }
                None => {
                    warn!("Event consumer stream ended");
                    break;
                }
            },
        };

        match process_message(&delivery.data, &dispatcher) {
            Ok(decision) => {
                debug!(?decision, "Event accepted");
                if let Err(e) = rabbitmq.acknowledge(delivery.delivery_tag).await {
                    error!(error = %e, "Failed to acknowledge message");
                }
            }
            Err(e) => {
                warn!(error = %e, "Rejecting invalid event");
                if let Err(e) = rabbitmq.reject(delivery.delivery_tag, false).await {
                    error!(error = %e, "Failed to reject message");
                }
            }
        }
    }

    info!("Event consumer stopped");
    Ok(())
}

pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        attempt,
                        max_attempts = config.max_attempts(),
                        "Retry succeeded"
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt >= config.max_attempts() {
                    warn!(
                        max_attempts = config.max_attempts(),
                        error = %e,
                        "Retry failed after exhausting all attempts"
                    );
                    return Err(e);
                }

                let delay = config.jittered(config.delay_for_retry(attempt - 1));

                debug!(
                    attempt,
                    max_attempts = config.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retry attempt failed, backing off"
                );

                sleep(delay).await;
            }
        }
    }
}
