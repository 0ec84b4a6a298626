use serde::{Deserialize, Serialize};

use crate::models::event::RawNotificationEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub data: RawNotificationEvent,
}
