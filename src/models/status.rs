use std::{
    fmt::{Display, Formatter, Result},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Sending,
    RetryScheduled,
    Delivered,
    Failed,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryState::Delivered | DeliveryState::Failed)
    }

    pub fn can_transition_to(&self, next: DeliveryState) -> bool {
        matches!(
            (self, next),
            (DeliveryState::Sending, DeliveryState::Delivered)
                | (DeliveryState::Sending, DeliveryState::RetryScheduled)
                | (DeliveryState::Sending, DeliveryState::Failed)
                | (DeliveryState::RetryScheduled, DeliveryState::Sending)
        )
    }
}

impl Display for DeliveryState {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            DeliveryState::Sending => write!(f, "sending"),
            DeliveryState::RetryScheduled => write!(f, "retry_scheduled"),
            DeliveryState::Delivered => write!(f, "delivered"),
            DeliveryState::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle of a dead-letter record. This service only writes `Pending`
/// and `FailedPermanently`; the rest belong to the re-drive tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStatus {
    Pending,
    Retrying,
    Resolved,
    FailedPermanently,
}

impl Display for FailureStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            FailureStatus::Pending => write!(f, "pending"),
            FailureStatus::Retrying => write!(f, "retrying"),
            FailureStatus::Resolved => write!(f, "resolved"),
            FailureStatus::FailedPermanently => write!(f, "failed_permanently"),
        }
    }
}

impl FromStr for FailureStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FailureStatus::Pending),
            "retrying" => Ok(FailureStatus::Retrying),
            "resolved" => Ok(FailureStatus::Resolved),
            "failed_permanently" => Ok(FailureStatus::FailedPermanently),
            other => Err(format!("unknown failure status '{}'", other)),
        }
    }
}
