use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use delivery_service::{
    clients::status_store::{DeliveryStatusStore, InMemoryStatusStore, StatusObservation},
    models::status::DeliveryStatus,
    verifier::{DeliveryVerifier, VerificationSettings},
};
use tokio::time::{Duration, Instant, sleep};

/// Store whose reads never complete.
struct HangingStore;

#[async_trait]
impl DeliveryStatusStore for HangingStore {
    async fn read(&self, _key: &str) -> Result<Option<StatusObservation>, Error> {
        std::future::pending().await
    }

    fn backend(&self) -> &'static str {
        "hanging"
    }
}

/// Store whose reads always fail.
struct FailingStore;

#[async_trait]
impl DeliveryStatusStore for FailingStore {
    async fn read(&self, _key: &str) -> Result<Option<StatusObservation>, Error> {
        Err(anyhow!("connection reset"))
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}

fn settings() -> Result<VerificationSettings> {
    Ok(VerificationSettings::new(
        Duration::from_secs(2),
        Duration::from_secs(20),
    )?)
}

fn publish_after(store: &Arc<InMemoryStatusStore>, key: &str, status: &str, delay: Duration) {
    let store = Arc::clone(store);
    let key = key.to_string();
    let status = status.to_string();

    tokio::spawn(async move {
        sleep(delay).await;
        store.publish(&key, &status).await;
    });
}

/// Test: Delivery confirmed on the fourth poll settles as delivered
#[tokio::test(start_paused = true)]
async fn test_delivered_after_three_poll_cycles() -> Result<()> {
    let store = Arc::new(InMemoryStatusStore::new());
    let verifier = DeliveryVerifier::new(store.clone(), settings()?);

    publish_after(&store, "trace-1", "delivered", Duration::from_secs(5));

    let start = Instant::now();
    let record = verifier
        .verify("notif-1", "trace-1", Duration::from_secs(20))
        .await;

    assert_eq!(record.status(), DeliveryStatus::Delivered);
    assert_eq!(record.polls(), 4, "Polls at 0s, 2s, 4s and 6s");
    assert!(start.elapsed() <= Duration::from_secs(8));
    assert!(record.last_checked_at().is_some());

    Ok(())
}

/// Test: A store that never updates times out at the deadline
#[tokio::test(start_paused = true)]
async fn test_never_updated_times_out() -> Result<()> {
    let store = Arc::new(InMemoryStatusStore::new());
    let verifier = DeliveryVerifier::new(store.clone(), settings()?);

    let start = Instant::now();
    let record = verifier
        .verify("notif-2", "trace-2", Duration::from_secs(20))
        .await;
    let elapsed = start.elapsed();

    assert_eq!(record.status(), DeliveryStatus::TimedOut);
    assert!(elapsed >= Duration::from_secs(20));
    assert!(elapsed <= Duration::from_secs(22));
    assert_eq!(record.polls(), 11);
    assert!(store.reads() >= 11);

    Ok(())
}

/// Test: A failed status settles the record as failed
#[tokio::test(start_paused = true)]
async fn test_failed_status_settles_failed() -> Result<()> {
    let store = Arc::new(InMemoryStatusStore::new());
    store.publish("trace-3", "rejected").await;
    let verifier = DeliveryVerifier::new(store.clone(), settings()?);

    let record = verifier
        .verify("notif-3", "trace-3", Duration::from_secs(20))
        .await;

    assert_eq!(record.status(), DeliveryStatus::Failed);
    assert_eq!(record.polls(), 1);

    Ok(())
}

/// Test: A hanging store cannot hold the verifier past deadline plus one interval
#[tokio::test(start_paused = true)]
async fn test_hanging_store_is_bounded() -> Result<()> {
    let settings = settings()?;
    let verifier = DeliveryVerifier::new(Arc::new(HangingStore), settings);

    let start = Instant::now();
    let record = verifier
        .verify("notif-4", "trace-4", settings.deadline)
        .await;

    assert_eq!(record.status(), DeliveryStatus::TimedOut);
    assert!(start.elapsed() <= settings.upper_bound() + Duration::from_millis(1));

    Ok(())
}

/// Test: Read errors are treated as pending until the deadline
#[tokio::test(start_paused = true)]
async fn test_read_errors_treated_as_pending() -> Result<()> {
    let verifier = DeliveryVerifier::new(Arc::new(FailingStore), settings()?);

    let record = verifier
        .verify("notif-5", "trace-5", Duration::from_secs(10))
        .await;

    assert_eq!(record.status(), DeliveryStatus::TimedOut);
    assert_eq!(record.polls(), 6);

    Ok(())
}

/// Test: Unknown status values keep polling instead of settling
#[tokio::test(start_paused = true)]
async fn test_unknown_status_keeps_polling() -> Result<()> {
    let store = Arc::new(InMemoryStatusStore::new());
    store.publish("trace-6", "bounced-maybe").await;
    publish_after(&store, "trace-6", "sent", Duration::from_secs(3));

    let verifier = DeliveryVerifier::new(store.clone(), settings()?);
    let record = verifier
        .verify("notif-6", "trace-6", Duration::from_secs(20))
        .await;

    assert_eq!(record.status(), DeliveryStatus::Delivered);
    assert_eq!(record.polls(), 3);

    Ok(())
}

/// Test: Status written under the notification id is found when the trace key is empty
#[tokio::test(start_paused = true)]
async fn test_falls_back_to_notification_id() -> Result<()> {
    let store = Arc::new(InMemoryStatusStore::new());
    store.publish("notif-7", "delivered").await;

    let verifier = DeliveryVerifier::new(store.clone(), settings()?);
    let record = verifier
        .verify("notif-7", "trace-7", Duration::from_secs(20))
        .await;

    assert_eq!(record.status(), DeliveryStatus::Delivered);
    assert_eq!(store.reads(), 2, "Trace key first, then the notification id");

    Ok(())
}

/// Test: A zero poll interval is rejected
#[test]
fn test_zero_poll_interval_rejected() {
    let result = VerificationSettings::new(Duration::ZERO, Duration::from_secs(20));

    assert!(result.is_err());
}

/// Test: Consumer payloads parse in both JSON and bare form
#[test]
fn test_status_observation_parsing() {
    let json =
        StatusObservation::parse(r#"{"status":"delivered","timestamp":"2025-01-01T00:00:00Z"}"#);
    assert_eq!(json.delivery_status(), Some(DeliveryStatus::Delivered));
    assert!(json.timestamp.is_some());

    let bare = StatusObservation::parse("failed");
    assert_eq!(bare.delivery_status(), Some(DeliveryStatus::Failed));

    let unknown = StatusObservation::parse("\"exploded\"");
    assert_eq!(unknown.delivery_status(), None);
}
