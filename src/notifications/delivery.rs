use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, error, info, warn};

use crate::{
    errors::{ChannelError, DeliveryError},
    models::{
        delivery::{
            DeliveryOutcome, DeliveryTarget, OutboundNotification, PendingDelivery,
            RenderedMessage,
        },
        failure::FailedNotification,
        retry::RetryConfig,
        status::DeliveryState,
    },
    notifications::store::FailureStore,
    utils::retry_with_backoff,
};

#[async_trait]
pub trait ChannelClient: Send + Sync {
    async fn deliver(
        &self,
        target: &DeliveryTarget,
        message: &RenderedMessage,
    ) -> Result<(), ChannelError>;
}

pub struct DeliveryClient {
    channel: Arc<dyn ChannelClient>,
    failure_store: Arc<dyn FailureStore>,
    retry_config: RetryConfig,
}

impl DeliveryClient {
    pub fn new(
        channel: Arc<dyn ChannelClient>,
        failure_store: Arc<dyn FailureStore>,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            channel,
            failure_store,
            retry_config,
        }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    pub async fn send(&self, notification: OutboundNotification) -> DeliveryOutcome {
        let mut pending =
            PendingDelivery::new(notification.target.clone(), notification.message.clone());

        debug!(
            delivery_id = %pending.id,
            user_id = %notification.target.user_id,
            notification_type = %notification.notification_type,
            "Sending notification"
        );

        match self.drive(&mut pending).await {
            Ok(()) => {
                info!(
                    delivery_id = %pending.id,
                    user_id = %notification.target.user_id,
                    attempts = pending.attempt,
                    "Notification delivered"
                );
                DeliveryOutcome::Delivered {
                    delivery_id: pending.id,
                    attempts: pending.attempt,
                }
            }
            Err(defect) => {
                if let Some(defect) = defect {
                    error!(delivery_id = %pending.id, error = %defect, "Delivery state machine defect");
                    pending.last_error.get_or_insert_with(|| defect.to_string());
                }

                self.dead_letter(&pending, &notification).await;

                DeliveryOutcome::Failed {
                    delivery_id: pending.id,
                    attempts: pending.attempt,
                    error: pending.last_error.clone().unwrap_or_default(),
                }
            }
        }
    }

    /// `Ok` once delivered. `Err(None)` is an ordinary terminal failure,
    /// `Err(Some(_))` an illegal state transition.
    async fn drive(&self, pending: &mut PendingDelivery) -> Result<(), Option<DeliveryError>> {
        let attempt_timeout = self.retry_config.attempt_timeout();

        loop {
            let result = match timeout(
                attempt_timeout,
                self.channel.deliver(&pending.target, &pending.message),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ChannelError::Timeout(attempt_timeout)),
            };

            let error = match result {
                Ok(()) => return pending.mark_delivered().map_err(Some),
                Err(error) => error,
            };

            let now = Instant::now();
            match pending.record_failure(&error, &self.retry_config, now).map_err(Some)? {
                DeliveryState::RetryScheduled => {
                    let retry_at = pending.next_retry_at.unwrap_or(now);
                    warn!(
                        delivery_id = %pending.id,
                        attempt = pending.attempt,
                        max_attempts = self.retry_config.max_attempts(),
                        delay_ms = retry_at.saturating_duration_since(now).as_millis() as u64,
                        error = %error,
                        "Delivery attempt failed, backing off"
                    );

                    sleep_until(retry_at).await;
                    pending.resume().map_err(Some)?;
                }
                _ => {
                    warn!(
                        delivery_id = %pending.id,
                        attempts = pending.attempt,
                        error_class = error.class().as_str(),
                        error = %error,
                        "Delivery failed"
                    );
                    return Err(None);
                }
            }
        }
    }

    async fn dead_letter(&self, pending: &PendingDelivery, notification: &OutboundNotification) {
        let failure = FailedNotification::from_delivery(pending, notification);
        let store = &self.failure_store;

        // Inserts are idempotent on delivery_id, so a retry after an
        // ambiguous error cannot write a second record.
        let result = retry_with_backoff(&self.retry_config, move || store.persist(failure.clone())).await;

        match result {
            Ok(true) => debug!(delivery_id = %pending.id, "Failed notification recorded"),
            Ok(false) => debug!(delivery_id = %pending.id, "Failed notification already recorded"),
            Err(e) => error!(
                delivery_id = %pending.id,
                error = %e,
                "Failed to record failed notification, record dropped"
            ),
        }
    }
}
