use std::{
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use digest_service::{
    errors::{ChannelError, StoreError},
    models::{
        delivery::{DeliveryTarget, RenderedMessage},
        event::{
            CreditsEarnedPayload, LikePayload, NotificationEvent, NotificationPayload,
            RawNotificationEvent,
        },
        failure::FailedNotification,
        retry::RetryConfig,
        status::FailureStatus,
    },
    notifications::{ChannelClient, FailureStore, InMemoryFailureStore},
};
use serde_json::{Value as JsonValue, json};
use tokio::{sync::Mutex, time::Instant};

pub fn like(user_id: &str, liker: &str) -> NotificationEvent {
    NotificationEvent::new(
        user_id,
        1001,
        NotificationPayload::Like(LikePayload {
            track_id: format!("track-{}", liker),
            track_title: Some("Night Drive".to_string()),
            liker_name: Some(liker.to_string()),
            total_likes: None,
        }),
    )
}

pub fn credits(user_id: &str, amount: i64) -> NotificationEvent {
    NotificationEvent::new(
        user_id,
        1001,
        NotificationPayload::CreditsEarned(CreditsEarnedPayload {
            amount,
            reason: Some("daily bonus".to_string()),
            new_balance: None,
        }),
    )
}

pub fn raw_event(user_id: &str, chat_id: i64, notification_type: &str, payload: JsonValue) -> RawNotificationEvent {
    RawNotificationEvent {
        user_id: user_id.to_string(),
        chat_id,
        notification_type: notification_type.to_string(),
        payload,
        occurred_at: None,
    }
}

pub fn raw_like(user_id: &str, liker: &str) -> RawNotificationEvent {
    raw_event(
        user_id,
        1001,
        "like",
        json!({ "track_id": format!("track-{}", liker), "liker_name": liker }),
    )
}

/// Backoff of 1s, 2s, 4s and so on without jitter, so timing is exact.
pub fn retry_config(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_delay_ms: 1_000,
        max_delay_ms: 30_000,
        backoff_multiplier: 2,
        attempt_timeout_ms: 10_000,
        jitter_ratio: 0.0,
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub at: Instant,
    pub target: DeliveryTarget,
    pub message: RenderedMessage,
}

/// Channel that answers from a script and succeeds once the script runs out.
#[derive(Default)]
pub struct ScriptedChannel {
    script: Mutex<VecDeque<Result<(), ChannelError>>>,
    calls: Mutex<Vec<RecordedCall>>,
    hang_for: Option<Duration>,
}

impl ScriptedChannel {
    pub fn new(script: Vec<Result<(), ChannelError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Every attempt takes `duration` before answering.
    pub fn hanging(duration: Duration) -> Self {
        Self {
            hang_for: Some(duration),
            ..Self::default()
        }
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ChannelClient for ScriptedChannel {
    async fn deliver(
        &self,
        target: &DeliveryTarget,
        message: &RenderedMessage,
    ) -> Result<(), ChannelError> {
        self.calls.lock().await.push(RecordedCall {
            at: Instant::now(),
            target: target.clone(),
            message: message.clone(),
        });

        if let Some(duration) = self.hang_for {
            tokio::time::sleep(duration).await;
        }

        self.script.lock().await.pop_front().unwrap_or(Ok(()))
    }
}

/// In-memory store that counts every persist call, duplicates included, and
/// can fail its first calls.
#[derive(Default)]
pub struct CountingStore {
    pub inner: InMemoryFailureStore,
    persist_calls: AtomicUsize,
    fail_first: usize,
}

impl CountingStore {
    pub fn failing_first(fail_first: usize) -> Self {
        Self {
            fail_first,
            ..Self::default()
        }
    }

    pub fn persist_calls(&self) -> usize {
        self.persist_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FailureStore for CountingStore {
    async fn persist(&self, failure: FailedNotification) -> Result<bool, StoreError> {
        let call = self.persist_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(StoreError::Corrupt("connection closed".to_string()));
        }
        self.inner.persist(failure).await
    }

    async fn list_by_status(
        &self,
        status: FailureStatus,
        limit: usize,
    ) -> Result<Vec<FailedNotification>, StoreError> {
        self.inner.list_by_status(status, limit).await
    }
}
