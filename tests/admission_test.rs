//! Integration tests for the in-process admission authority.

use std::sync::Arc;
use std::time::Duration;

use heimdall::{
    AdmissionConfig, AdmissionControl, HeimdallError, HolderId, LocalAdmission, WaitEstimate,
};

fn holder(id: &str) -> HolderId {
    HolderId::new(id).unwrap()
}

fn authority(capacity: usize) -> LocalAdmission {
    LocalAdmission::spawn(AdmissionConfig::new().capacity(capacity))
}

// ============================================================================
// Capacity
// ============================================================================

#[tokio::test]
async fn grants_up_to_capacity_then_denies_fast() {
    let admission = authority(2);

    let a = admission.acquire(&holder("a"), "scrape").await.unwrap();
    let b = admission.acquire(&holder("b"), "scrape").await.unwrap();
    assert!(a.granted && b.granted);
    assert_eq!(b.current_slots, 2);

    let c = admission.acquire(&holder("c"), "scrape").await.unwrap();
    assert!(!c.granted);
    assert_eq!(c.current_slots, 2);
    assert_eq!(c.max_slots, 2);
    assert_eq!(c.estimated_wait_secs, Some(30));

    let status = admission.status().await.unwrap();
    assert_eq!(status.current_slots, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acquires_never_exceed_capacity() {
    const CAPACITY: usize = 32;
    const EXTRA: usize = 40;

    let admission = Arc::new(authority(CAPACITY));
    let mut tasks = Vec::new();
    for i in 0..CAPACITY + EXTRA {
        let admission = Arc::clone(&admission);
        tasks.push(tokio::spawn(async move {
            admission
                .acquire(&holder(&format!("h{i}")), "scrape")
                .await
                .unwrap()
        }));
    }

    let mut granted = 0;
    for task in tasks {
        let result = task.await.unwrap();
        assert!(result.current_slots <= CAPACITY);
        assert_eq!(result.max_slots, CAPACITY);
        if result.granted {
            granted += 1;
        } else {
            assert_eq!(result.current_slots, CAPACITY);
            assert!(result.estimated_wait_secs.is_some());
        }
    }
    assert_eq!(granted, CAPACITY);
    assert_eq!(admission.status().await.unwrap().current_slots, CAPACITY);
}

#[tokio::test]
async fn saturation_at_default_capacity() {
    let admission = LocalAdmission::spawn(AdmissionConfig::default());

    for i in 0..32 {
        let r = admission
            .acquire(&holder(&format!("s{i}")), "scrape")
            .await
            .unwrap();
        assert!(r.granted, "slot {i} should be granted");
    }

    let denied = admission.acquire(&holder("late"), "scrape").await.unwrap();
    assert!(!denied.granted);
    assert_eq!(denied.current_slots, 32);
    assert_eq!(denied.max_slots, 32);

    let err = denied.into_granted().unwrap_err();
    assert!(err.to_string().contains("32/32"));
    assert!(err.is_user_visible());

    admission.release(&holder("s0")).await.unwrap();
    assert!(
        admission
            .acquire(&holder("late"), "scrape")
            .await
            .unwrap()
            .granted
    );
}

// ============================================================================
// Release
// ============================================================================

#[tokio::test]
async fn release_is_idempotent() {
    let admission = authority(4);
    admission.acquire(&holder("a"), "scrape").await.unwrap();
    admission.acquire(&holder("b"), "scrape").await.unwrap();

    admission.release(&holder("a")).await.unwrap();
    admission.release(&holder("a")).await.unwrap();
    admission.release(&holder("unknown")).await.unwrap();

    assert_eq!(admission.status().await.unwrap().current_slots, 1);
}

#[tokio::test]
async fn duplicate_holder_is_rejected() {
    let admission = authority(4);
    admission.acquire(&holder("a"), "scrape").await.unwrap();
    let err = admission.acquire(&holder("a"), "scrape").await.unwrap_err();
    assert!(matches!(err, HeimdallError::InvalidHolder(_)));
    assert_eq!(admission.status().await.unwrap().current_slots, 1);
}

#[tokio::test]
async fn clones_share_one_count() {
    let first = authority(1);
    let second = first.clone();
    assert!(first.acquire(&holder("a"), "t").await.unwrap().granted);
    assert!(!second.acquire(&holder("b"), "t").await.unwrap().granted);
    second.release(&holder("a")).await.unwrap();
    assert!(first.acquire(&holder("b"), "t").await.unwrap().granted);
}

// ============================================================================
// Stale reclamation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn explicit_cleanup_reclaims_old_slots() {
    let admission = authority(4);
    admission.acquire(&holder("old"), "scrape").await.unwrap();
    tokio::time::advance(Duration::from_secs(200)).await;
    admission.acquire(&holder("young"), "scrape").await.unwrap();
    tokio::time::advance(Duration::from_secs(101)).await;

    let reclaimed = admission
        .cleanup_stale(Duration::from_secs(300))
        .await
        .unwrap();
    assert_eq!(reclaimed, 1);
    assert_eq!(
        admission
            .cleanup_stale(Duration::from_secs(300))
            .await
            .unwrap(),
        0
    );

    // Releasing a reclaimed slot is a no-op and must not touch the other.
    admission.release(&holder("old")).await.unwrap();
    assert_eq!(admission.status().await.unwrap().current_slots, 1);
}

#[tokio::test(start_paused = true)]
async fn acquire_reclaims_abandoned_slots_lazily() {
    let admission = LocalAdmission::spawn(
        AdmissionConfig::new()
            .capacity(1)
            .stale_after(Duration::from_secs(60)),
    );
    assert!(admission.acquire(&holder("crashed"), "t").await.unwrap().granted);
    assert!(!admission.acquire(&holder("next"), "t").await.unwrap().granted);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(admission.acquire(&holder("next"), "t").await.unwrap().granted);
}

#[tokio::test(start_paused = true)]
async fn periodic_sweep_reclaims_without_traffic() {
    let admission = LocalAdmission::spawn(
        AdmissionConfig::new()
            .capacity(2)
            .stale_after(Duration::from_secs(60))
            .sweep_interval(Duration::from_secs(10)),
    );
    admission.acquire(&holder("a"), "t").await.unwrap();
    assert_eq!(admission.status().await.unwrap().current_slots, 1);

    tokio::time::sleep(Duration::from_secs(75)).await;
    assert_eq!(admission.status().await.unwrap().current_slots, 0);
}

// ============================================================================
// Wait estimate
// ============================================================================

#[tokio::test(start_paused = true)]
async fn average_hold_estimate_tracks_released_slots() {
    let admission = LocalAdmission::spawn(
        AdmissionConfig::new()
            .capacity(1)
            .wait_estimate(WaitEstimate::AverageHold {
                fallback: Duration::from_secs(45),
            }),
    );

    admission.acquire(&holder("a"), "t").await.unwrap();
    let denied = admission.acquire(&holder("b"), "t").await.unwrap();
    assert_eq!(denied.estimated_wait_secs, Some(45));

    tokio::time::advance(Duration::from_secs(20)).await;
    admission.release(&holder("a")).await.unwrap();

    admission.acquire(&holder("c"), "t").await.unwrap();
    tokio::time::advance(Duration::from_secs(5)).await;
    let denied = admission.acquire(&holder("d"), "t").await.unwrap();
    assert_eq!(denied.estimated_wait_secs, Some(15));
}
