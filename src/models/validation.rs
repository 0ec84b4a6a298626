use chrono::Utc;

use crate::{
    errors::ValidationError,
    models::event::{NotificationEvent, NotificationPayload, NotificationType, RawNotificationEvent},
};

const MAX_USER_ID_LEN: usize = 128;

pub fn validate_user_id(user_id: &str) -> Result<(), ValidationError> {
    if user_id.trim().is_empty() {
        return Err(ValidationError::MissingUserId);
    }

    if user_id.len() > MAX_USER_ID_LEN {
        return Err(ValidationError::InvalidUserId(format!(
            "longer than {} characters",
            MAX_USER_ID_LEN
        )));
    }

    let valid_chars = user_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == ':' || c == '.');

    if !valid_chars {
        return Err(ValidationError::InvalidUserId(
            "contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_event(raw: RawNotificationEvent) -> Result<NotificationEvent, ValidationError> {
    validate_user_id(&raw.user_id)?;

    if raw.chat_id == 0 {
        return Err(ValidationError::InvalidChatId);
    }

    let notification_type = NotificationType::from_wire(&raw.notification_type)
        .ok_or_else(|| ValidationError::UnknownType(raw.notification_type.clone()))?;

    let payload = NotificationPayload::parse(notification_type, raw.payload).map_err(|e| {
        ValidationError::InvalidPayload {
            notification_type,
            reason: e.to_string(),
        }
    })?;

    Ok(NotificationEvent {
        user_id: raw.user_id,
        chat_id: raw.chat_id,
        payload,
        occurred_at: raw.occurred_at.unwrap_or_else(Utc::now),
    })
}
