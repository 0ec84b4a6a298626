use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::{
    errors::ValidationError,
    models::{
        delivery::OutboundNotification,
        event::{NotificationEvent, RawNotificationEvent},
        health::DispatcherStats,
        routing::{Route, RoutingTable},
        validation::validate_event,
    },
    notifications::{
        cooldown::CooldownGate,
        delivery::DeliveryClient,
        digest::{DigestAggregator, DigestBatch, OfferOutcome},
        formatter::Formatter,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeDecision {
    Queued { pending: usize },
    DigestFlushed { events: usize },
    Dispatched,
    RateLimited,
}

pub struct NotificationDispatcher {
    routing: Arc<RoutingTable>,
    cooldowns: CooldownGate,
    aggregator: DigestAggregator,
    formatter: Arc<dyn Formatter>,
    delivery: Arc<DeliveryClient>,
    tasks: TaskTracker,
    closed: Mutex<bool>,
}

impl NotificationDispatcher {
    pub fn new(
        routing: Arc<RoutingTable>,
        formatter: Arc<dyn Formatter>,
        delivery: Arc<DeliveryClient>,
    ) -> Self {
        Self {
            cooldowns: CooldownGate::from_routing(&routing),
            aggregator: DigestAggregator::from_routing(&routing),
            routing,
            formatter,
            delivery,
            tasks: TaskTracker::new(),
            closed: Mutex::new(false),
        }
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn aggregator(&self) -> &DigestAggregator {
        &self.aggregator
    }

    pub fn cooldowns(&self) -> &CooldownGate {
        &self.cooldowns
    }

    pub fn accept(&self, raw: RawNotificationEvent) -> Result<IntakeDecision, ValidationError> {
        let event = validate_event(raw).inspect_err(|e| {
            warn!(error = %e, "Dropping invalid notification event");
        })?;

        Ok(self.route(event))
    }

    pub fn route(&self, event: NotificationEvent) -> IntakeDecision {
        let notification_type = event.notification_type();

        match self.routing.route(notification_type) {
            Route::Digest { .. } => match self.aggregator.offer(event) {
                OfferOutcome::Pending { pending } => {
                    debug!(notification_type = %notification_type, pending, "Event queued for digest");
                    IntakeDecision::Queued { pending }
                }
                OfferOutcome::Ready(batch) => {
                    let events = batch.len();
                    self.dispatch_batch(batch);
                    IntakeDecision::DigestFlushed { events }
                }
            },
            Route::Direct { .. } => {
                if self.cooldowns.acquire(&event.user_id, notification_type) {
                    self.dispatch_single(event);
                    IntakeDecision::Dispatched
                } else {
                    info!(
                        user_id = %event.user_id,
                        notification_type = %notification_type,
                        "Notification rate limited"
                    );
                    IntakeDecision::RateLimited
                }
            }
        }
    }

    pub fn sweep(&self) -> usize {
        let batches = self.aggregator.sweep();
        let count = batches.len();

        for batch in batches {
            self.dispatch_batch(batch);
        }

        if count > 0 {
            info!(batches = count, "Digest sweep flushed expired buckets");
        }
        count
    }

    pub fn flush_all(&self) -> usize {
        let batches = self.aggregator.flush_all();
        let count = batches.len();

        for batch in batches {
            self.dispatch_batch(batch);
        }
        count
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            pending_buckets: self.aggregator.pending_buckets(),
            pending_events: self.aggregator.pending_events(),
            cooldown_records: self.cooldowns.records(),
            in_flight_deliveries: self.tasks.len(),
        }
    }

    pub async fn wait_for_deliveries(&self) {
        let closed = self.closed.lock().await;

        self.tasks.close();
        self.tasks.wait().await;
        if !*closed {
            self.tasks.reopen();
        }
    }

    pub async fn close(&self) {
        let mut closed = self.closed.lock().await;
        *closed = true;

        self.tasks.close();
        self.tasks.wait().await;
    }

    pub fn is_closed(&self) -> bool {
        self.tasks.is_closed()
    }

    fn dispatch_single(&self, event: NotificationEvent) {
        let message = self.formatter.format_single(&event);
        let outbound = OutboundNotification {
            target: event.target(),
            notification_type: event.notification_type(),
            message,
            original_payload: serde_json::to_value([&event]).unwrap_or(JsonValue::Null),
        };

        self.spawn_delivery(outbound);
    }

    fn dispatch_batch(&self, batch: DigestBatch) {
        let Some(target) = batch.target() else {
            return;
        };

        let message = self.formatter.format_batch(&batch.events);
        let outbound = OutboundNotification {
            target,
            notification_type: batch.key.notification_type,
            message,
            original_payload: serde_json::to_value(&batch.events).unwrap_or(JsonValue::Null),
        };

        debug!(
            user_id = %batch.key.user_id,
            notification_type = %batch.key.notification_type,
            generation = batch.generation,
            events = batch.len(),
            "Dispatching digest"
        );

        self.spawn_delivery(outbound);
    }

    fn spawn_delivery(&self, outbound: OutboundNotification) {
        let delivery = Arc::clone(&self.delivery);
        self.tasks.spawn(async move {
            delivery.send(outbound).await;
        });
    }
}
