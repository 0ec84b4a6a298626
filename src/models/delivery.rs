use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    errors::{ChannelError, DeliveryError, ErrorClass},
    models::{event::NotificationType, retry::RetryConfig, status::DeliveryState},
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryTarget {
    pub user_id: String,
    pub chat_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<JsonValue>,
}

impl RenderedMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: None,
            reply_markup: None,
        }
    }

    pub fn with_reply_markup(mut self, reply_markup: JsonValue) -> Self {
        self.reply_markup = Some(reply_markup);
        self
    }
}

#[derive(Debug, Clone)]
pub struct OutboundNotification {
    pub target: DeliveryTarget,
    pub notification_type: NotificationType,
    pub message: RenderedMessage,
    pub original_payload: JsonValue,
}

/// Retry state machine for one outgoing message.
///
/// `Sending → Delivered`, or `Sending → RetryScheduled → Sending → …` until the
/// retry budget runs out, then `→ Failed`. Anything else is rejected.
#[derive(Debug, Clone)]
pub struct PendingDelivery {
    pub id: Uuid,
    pub target: DeliveryTarget,
    pub message: RenderedMessage,
    pub attempt: u32,
    pub next_retry_at: Option<Instant>,
    pub state: DeliveryState,
    pub last_error: Option<String>,
    pub last_error_class: Option<ErrorClass>,
    pub first_failed_at: Option<DateTime<Utc>>,
}

impl PendingDelivery {
    pub fn new(target: DeliveryTarget, message: RenderedMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            message,
            attempt: 1,
            next_retry_at: None,
            state: DeliveryState::Sending,
            last_error: None,
            last_error_class: None,
            first_failed_at: None,
        }
    }

    pub fn retries_used(&self) -> u32 {
        self.attempt.saturating_sub(1)
    }

    fn transition(&mut self, next: DeliveryState) -> Result<(), DeliveryError> {
        if !self.state.can_transition_to(next) {
            return Err(DeliveryError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn mark_delivered(&mut self) -> Result<(), DeliveryError> {
        self.transition(DeliveryState::Delivered)?;
        self.next_retry_at = None;
        Ok(())
    }

    pub fn record_failure(
        &mut self,
        error: &ChannelError,
        retry: &RetryConfig,
        now: Instant,
    ) -> Result<DeliveryState, DeliveryError> {
        if self.state != DeliveryState::Sending {
            return Err(DeliveryError::InvalidTransition {
                from: self.state,
                to: DeliveryState::Failed,
            });
        }

        self.last_error = Some(error.to_string());
        self.last_error_class = Some(error.class());
        self.first_failed_at.get_or_insert_with(Utc::now);

        if error.is_transient() && self.retries_used() < retry.max_retries {
            let mut delay = retry.jittered(retry.delay_for_retry(self.retries_used()));
            if let Some(hint) = error.retry_after() {
                delay = delay.max(hint);
            }
            delay = delay.min(retry.max_delay());

            self.transition(DeliveryState::RetryScheduled)?;
            self.next_retry_at = Some(now + delay);
        } else {
            self.transition(DeliveryState::Failed)?;
            self.next_retry_at = None;
        }

        Ok(self.state)
    }

    pub fn resume(&mut self) -> Result<(), DeliveryError> {
        self.transition(DeliveryState::Sending)?;
        self.attempt += 1;
        self.next_retry_at = None;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered {
        delivery_id: Uuid,
        attempts: u32,
    },
    Failed {
        delivery_id: Uuid,
        attempts: u32,
        error: String,
    },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts, .. } | DeliveryOutcome::Failed { attempts, .. } => {
                *attempts
            }
        }
    }
}
