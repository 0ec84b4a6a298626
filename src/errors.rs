use std::time::Duration;

use thiserror::Error;

use crate::models::{event::NotificationType, status::DeliveryState};

/// Telegram descriptions that mean the recipient can never be reached.
const UNREACHABLE_MARKERS: [&str; 4] = [
    "chat not found",
    "bot was blocked",
    "user is deactivated",
    "chat was deleted",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("malformed event: {0}")]
    Malformed(String),

    #[error("user_id cannot be empty")]
    MissingUserId,

    #[error("user_id is invalid: {0}")]
    InvalidUserId(String),

    #[error("chat_id must be non-zero")]
    InvalidChatId,

    #[error("unknown notification type '{0}'")]
    UnknownType(String),

    #[error("invalid payload for '{notification_type}': {reason}")]
    InvalidPayload {
        notification_type: NotificationType,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::Permanent => "permanent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("network failure: {0}")]
    Network(String),

    #[error("rate limited by channel")]
    RateLimited { retry_after: Option<Duration> },

    #[error("channel returned {status}: {description}")]
    Server { status: u16, description: String },

    #[error("channel rejected message with {status}: {description}")]
    Rejected { status: u16, description: String },

    #[error("recipient unreachable: {0}")]
    RecipientUnreachable(String),

    #[error("circuit breaker is open for {0}")]
    CircuitOpen(String),
}

impl ChannelError {
    pub fn from_status(status: u16, description: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let description = description.into();
        let lowered = description.to_lowercase();

        if UNREACHABLE_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            return ChannelError::RecipientUnreachable(description);
        }

        match status {
            429 => ChannelError::RateLimited { retry_after },
            400..=499 => ChannelError::Rejected {
                status,
                description,
            },
            _ => ChannelError::Server {
                status,
                description,
            },
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ChannelError::Rejected { .. } | ChannelError::RecipientUnreachable(_) => {
                ErrorClass::Permanent
            }
            _ => ErrorClass::Transient,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ChannelError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("illegal delivery transition from {from} to {to}")]
    InvalidTransition {
        from: DeliveryState,
        to: DeliveryState,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt failure record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Error)]
#[error("digest generation {generation} for {user_id}/{notification_type} was claimed empty")]
pub struct AggregationInvariantViolation {
    pub user_id: String,
    pub notification_type: NotificationType,
    pub generation: u64,
}
