use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    errors::ErrorClass,
    models::{
        delivery::{OutboundNotification, PendingDelivery, RenderedMessage},
        event::NotificationType,
        status::FailureStatus,
    },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedNotification {
    pub delivery_id: Uuid,
    pub user_id: String,
    pub chat_id: i64,
    pub notification_type: NotificationType,
    pub original_payload: JsonValue,
    pub rendered_message: RenderedMessage,
    pub error_message: String,
    pub error_class: String,
    pub status: FailureStatus,
    pub first_failed_at: DateTime<Utc>,
    pub retry_count: u32,
}

impl FailedNotification {
    pub fn new(
        delivery_id: Uuid,
        notification: &OutboundNotification,
        error_message: String,
        error_class: ErrorClass,
    ) -> Self {
        let status = match error_class {
            ErrorClass::Permanent => FailureStatus::FailedPermanently,
            ErrorClass::Transient => FailureStatus::Pending,
        };

        Self {
            delivery_id,
            user_id: notification.target.user_id.clone(),
            chat_id: notification.target.chat_id,
            notification_type: notification.notification_type,
            original_payload: notification.original_payload.clone(),
            rendered_message: notification.message.clone(),
            error_message,
            error_class: error_class.as_str().to_string(),
            status,
            first_failed_at: Utc::now(),
            retry_count: 0,
        }
    }

    pub fn from_delivery(pending: &PendingDelivery, notification: &OutboundNotification) -> Self {
        let error_message = pending
            .last_error
            .clone()
            .unwrap_or_else(|| "delivery failed without an error".to_string());
        let error_class = pending.last_error_class.unwrap_or(ErrorClass::Transient);

        Self::new(pending.id, notification, error_message, error_class)
            .with_retry_count(pending.retries_used())
            .with_first_failed_at(pending.first_failed_at)
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_first_failed_at(mut self, first_failed_at: Option<DateTime<Utc>>) -> Self {
        if let Some(at) = first_failed_at {
            self.first_failed_at = at;
        }
        self
    }
}
