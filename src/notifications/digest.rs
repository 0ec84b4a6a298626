use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::time::Instant;
use tracing::{debug, error};

use crate::{
    errors::AggregationInvariantViolation,
    models::{
        delivery::DeliveryTarget,
        event::{NotificationEvent, NotificationKey, NotificationType},
        routing::{DigestSettings, RoutingTable},
    },
};

#[derive(Debug)]
struct DigestBucket {
    generation: u64,
    first_event_at: Instant,
    events: Vec<NotificationEvent>,
}

impl DigestBucket {
    fn is_expired(&self, settings: &DigestSettings, now: Instant) -> bool {
        now.saturating_duration_since(self.first_event_at) >= settings.window()
    }

    fn is_due(&self, settings: &DigestSettings, now: Instant) -> bool {
        self.events.len() >= settings.min_items || self.is_expired(settings, now)
    }
}

#[derive(Debug, Clone)]
pub struct DigestBatch {
    pub key: NotificationKey,
    pub generation: u64,
    pub first_event_at: Instant,
    pub events: Vec<NotificationEvent>,
}

impl DigestBatch {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn target(&self) -> Option<DeliveryTarget> {
        self.events.last().map(NotificationEvent::target)
    }
}

#[derive(Debug)]
pub enum OfferOutcome {
    Pending { pending: usize },
    Ready(DigestBatch),
}

/// Per `(user, type)` buffers of digestible events.
///
/// Buckets exist only while non-empty. Every flush path removes the bucket
/// from the map while holding the key's shard lock, so a generation is
/// claimed exactly once and later events start a fresh generation.
#[derive(Debug)]
pub struct DigestAggregator {
    defaults: DigestSettings,
    overrides: HashMap<NotificationType, DigestSettings>,
    buckets: DashMap<NotificationKey, DigestBucket>,
    next_generation: AtomicU64,
}

impl Default for DigestAggregator {
    fn default() -> Self {
        Self::new(DigestSettings::default())
    }
}

impl DigestAggregator {
    pub fn new(defaults: DigestSettings) -> Self {
        Self {
            defaults,
            overrides: HashMap::new(),
            buckets: DashMap::new(),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn from_routing(routing: &RoutingTable) -> Self {
        let mut aggregator = Self::new(routing.digest);
        for notification_type in NotificationType::ALL {
            if let Some(settings) = routing.digest_settings(notification_type) {
                aggregator.overrides.insert(notification_type, settings);
            }
        }
        aggregator
    }

    pub fn with_settings(mut self, notification_type: NotificationType, settings: DigestSettings) -> Self {
        self.overrides.insert(notification_type, settings);
        self
    }

    pub fn settings_for(&self, notification_type: NotificationType) -> DigestSettings {
        self.overrides
            .get(&notification_type)
            .copied()
            .unwrap_or(self.defaults)
    }

    fn new_bucket(&self, now: Instant) -> DigestBucket {
        DigestBucket {
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
            first_event_at: now,
            events: Vec::new(),
        }
    }

    pub fn add(&self, event: NotificationEvent) -> usize {
        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry(event.key())
            .or_insert_with(|| self.new_bucket(now));

        bucket.events.push(event);
        bucket.events.len()
    }

    pub fn should_flush(&self, user_id: &str, notification_type: NotificationType) -> bool {
        let settings = self.settings_for(notification_type);
        let key = NotificationKey::new(user_id, notification_type);

        self.buckets
            .get(&key)
            .is_some_and(|bucket| bucket.is_due(&settings, Instant::now()))
    }

    pub fn offer(&self, event: NotificationEvent) -> OfferOutcome {
        let settings = self.settings_for(event.notification_type());
        let now = Instant::now();

        match self.buckets.entry(event.key()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().events.push(event);

                if entry.get().is_due(&settings, now) {
                    let (key, bucket) = entry.remove_entry();
                    return self.claim(key, bucket).map_or(
                        OfferOutcome::Pending { pending: 0 },
                        OfferOutcome::Ready,
                    );
                }

                OfferOutcome::Pending {
                    pending: entry.get().events.len(),
                }
            }
            Entry::Vacant(entry) => {
                let mut bucket = self.new_bucket(now);
                bucket.events.push(event);

                if bucket.is_due(&settings, now) {
                    return self.claim(entry.into_key(), bucket).map_or(
                        OfferOutcome::Pending { pending: 0 },
                        OfferOutcome::Ready,
                    );
                }

                entry.insert(bucket);
                OfferOutcome::Pending { pending: 1 }
            }
        }
    }

    pub fn flush(&self, user_id: &str, notification_type: NotificationType) -> Option<DigestBatch> {
        let key = NotificationKey::new(user_id, notification_type);

        self.buckets
            .remove(&key)
            .and_then(|(key, bucket)| self.claim(key, bucket))
    }

    pub fn sweep(&self) -> Vec<DigestBatch> {
        let now = Instant::now();

        // Collect first: removing while iterating would deadlock on the shard.
        let expired: Vec<NotificationKey> = self
            .buckets
            .iter()
            .filter(|entry| {
                let settings = self.settings_for(entry.key().notification_type);
                entry.value().is_expired(&settings, now)
            })
            .map(|entry| entry.key().clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|key| {
                let settings = self.settings_for(key.notification_type);
                // Re-checked under the lock: the bucket may have been claimed
                // by a threshold flush, or replaced by a younger generation.
                self.buckets
                    .remove_if(&key, |_, bucket| bucket.is_expired(&settings, now))
                    .and_then(|(key, bucket)| self.claim(key, bucket))
            })
            .collect()
    }

    pub fn flush_all(&self) -> Vec<DigestBatch> {
        let keys: Vec<NotificationKey> = self.buckets.iter().map(|entry| entry.key().clone()).collect();

        keys.into_iter()
            .filter_map(|key| {
                self.buckets
                    .remove(&key)
                    .and_then(|(key, bucket)| self.claim(key, bucket))
            })
            .collect()
    }

    fn claim(&self, key: NotificationKey, bucket: DigestBucket) -> Option<DigestBatch> {
        if bucket.events.is_empty() {
            let violation = AggregationInvariantViolation {
                user_id: key.user_id,
                notification_type: key.notification_type,
                generation: bucket.generation,
            };
            error!(error = %violation, "Digest aggregation invariant violated");
            return None;
        }

        debug!(
            user_id = %key.user_id,
            notification_type = %key.notification_type,
            generation = bucket.generation,
            events = bucket.events.len(),
            "Digest generation claimed"
        );

        Some(DigestBatch {
            key,
            generation: bucket.generation,
            first_event_at: bucket.first_event_at,
            events: bucket.events,
        })
    }

    pub fn pending_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn pending_events(&self) -> usize {
        self.buckets.iter().map(|entry| entry.value().events.len()).sum()
    }
}
