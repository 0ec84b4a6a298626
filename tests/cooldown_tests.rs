use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use digest_service::{
    models::{event::NotificationType, routing::RoutingTable},
    notifications::CooldownGate,
};
use tokio::time::advance;

fn gate_with(notification_type: NotificationType, cooldown: Duration) -> CooldownGate {
    CooldownGate::default().with_cooldown(notification_type, cooldown)
}

/// Test: A second send inside the cooldown is refused, one after it is allowed
#[tokio::test(start_paused = true)]
async fn test_cooldown_window_boundaries() {
    let gate = gate_with(NotificationType::StatusChanged, Duration::from_millis(60_000));

    assert!(gate.acquire("user-1", NotificationType::StatusChanged));

    advance(Duration::from_secs(30)).await;
    assert!(
        !gate.acquire("user-1", NotificationType::StatusChanged),
        "30s after a send the 60s cooldown should still hold"
    );

    advance(Duration::from_secs(31)).await;
    assert!(
        gate.acquire("user-1", NotificationType::StatusChanged),
        "61s after the first send the cooldown should have elapsed"
    );
}

/// Test: The cooldown boundary itself is still inside the cooldown
#[tokio::test(start_paused = true)]
async fn test_cooldown_is_strictly_greater_than() {
    let gate = gate_with(NotificationType::CreditsEarned, Duration::from_secs(30));

    gate.mark_sent("user-1", NotificationType::CreditsEarned);
    advance(Duration::from_secs(30)).await;
    assert!(!gate.can_send("user-1", NotificationType::CreditsEarned));

    advance(Duration::from_millis(1)).await;
    assert!(gate.can_send("user-1", NotificationType::CreditsEarned));
}

/// Test: can_send never records a send
#[tokio::test(start_paused = true)]
async fn test_can_send_is_read_only() {
    let gate = gate_with(NotificationType::StatusChanged, Duration::from_secs(60));

    assert!(gate.can_send("user-1", NotificationType::StatusChanged));
    assert!(gate.can_send("user-1", NotificationType::StatusChanged));
    assert_eq!(gate.records(), 0);
}

/// Test: Zero cooldown types always pass and leave no records behind
#[tokio::test(start_paused = true)]
async fn test_zero_cooldown_always_allows() {
    let gate = CooldownGate::from_routing(&RoutingTable::default());

    for _ in 0..5 {
        assert!(gate.acquire("user-1", NotificationType::Achievement));
    }
    gate.mark_sent("user-1", NotificationType::JobCompleted);

    assert!(gate.can_send("user-1", NotificationType::JobCompleted));
    assert_eq!(gate.records(), 0);
}

/// Test: Cooldowns are tracked per user and per type
#[tokio::test(start_paused = true)]
async fn test_cooldowns_are_independent_per_key() {
    let gate = CooldownGate::from_routing(&RoutingTable::default());

    assert!(gate.acquire("user-1", NotificationType::StatusChanged));
    assert!(!gate.acquire("user-1", NotificationType::StatusChanged));

    assert!(gate.acquire("user-2", NotificationType::StatusChanged));
    assert!(gate.acquire("user-1", NotificationType::TrackAddedToProject));
    assert_eq!(gate.records(), 3);
}

/// Test: Default routing gives project updates 60s and credits 30s
#[test]
fn test_default_cooldowns_from_routing() {
    let gate = CooldownGate::from_routing(&RoutingTable::default());

    assert_eq!(gate.cooldown_for(NotificationType::StatusChanged), Duration::from_secs(60));
    assert_eq!(gate.cooldown_for(NotificationType::TrackAddedToProject), Duration::from_secs(60));
    assert_eq!(gate.cooldown_for(NotificationType::CreditsEarned), Duration::from_secs(30));
    assert_eq!(gate.cooldown_for(NotificationType::Announcement), Duration::ZERO);
    assert_eq!(gate.cooldown_for(NotificationType::Like), Duration::ZERO);
}

/// Test: Concurrent acquires on one key let exactly one send through
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acquire_admits_one() {
    let gate = Arc::new(gate_with(NotificationType::StatusChanged, Duration::from_secs(60)));
    let admitted = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let gate = Arc::clone(&gate);
            let admitted = Arc::clone(&admitted);
            tokio::spawn(async move {
                if gate.acquire("user-1", NotificationType::StatusChanged) {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    futures_util::future::join_all(handles).await;

    assert_eq!(admitted.load(Ordering::SeqCst), 1);
}
