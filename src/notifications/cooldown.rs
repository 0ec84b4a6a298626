use std::{collections::HashMap, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::time::Instant;
use tracing::debug;

use crate::models::{
    event::{NotificationKey, NotificationType},
    routing::RoutingTable,
};

#[derive(Debug, Default)]
pub struct CooldownGate {
    cooldowns: HashMap<NotificationType, Duration>,
    last_sent: DashMap<NotificationKey, Instant>,
}

impl CooldownGate {
    pub fn new(cooldowns: HashMap<NotificationType, Duration>) -> Self {
        Self {
            cooldowns,
            last_sent: DashMap::new(),
        }
    }

    pub fn from_routing(routing: &RoutingTable) -> Self {
        let cooldowns = NotificationType::ALL
            .into_iter()
            .filter(|notification_type| !routing.route(*notification_type).is_digest())
            .map(|notification_type| (notification_type, routing.cooldown(notification_type)))
            .collect();

        Self::new(cooldowns)
    }

    pub fn with_cooldown(mut self, notification_type: NotificationType, cooldown: Duration) -> Self {
        self.cooldowns.insert(notification_type, cooldown);
        self
    }

    pub fn cooldown_for(&self, notification_type: NotificationType) -> Duration {
        self.cooldowns
            .get(&notification_type)
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    pub fn can_send(&self, user_id: &str, notification_type: NotificationType) -> bool {
        let cooldown = self.cooldown_for(notification_type);
        if cooldown.is_zero() {
            return true;
        }

        let key = NotificationKey::new(user_id, notification_type);
        self.last_sent
            .get(&key)
            .is_none_or(|last| Instant::now().saturating_duration_since(*last) > cooldown)
    }

    pub fn mark_sent(&self, user_id: &str, notification_type: NotificationType) {
        if self.cooldown_for(notification_type).is_zero() {
            return;
        }

        self.last_sent
            .insert(NotificationKey::new(user_id, notification_type), Instant::now());
    }

    /// Check-and-mark in one step under the key's lock. Callers must dispatch
    /// the send when this returns true.
    pub fn acquire(&self, user_id: &str, notification_type: NotificationType) -> bool {
        let cooldown = self.cooldown_for(notification_type);
        if cooldown.is_zero() {
            return true;
        }

        let now = Instant::now();
        match self.last_sent.entry(NotificationKey::new(user_id, notification_type)) {
            Entry::Occupied(mut entry) => {
                let elapsed = now.saturating_duration_since(*entry.get());
                if elapsed > cooldown {
                    entry.insert(now);
                    true
                } else {
                    debug!(
                        user_id,
                        notification_type = %notification_type,
                        remaining_ms = (cooldown - elapsed).as_millis() as u64,
                        "Cooldown active"
                    );
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    pub fn records(&self) -> usize {
        self.last_sent.len()
    }
}
