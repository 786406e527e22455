use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use upstream_cache::{
    CacheLayerConfig, CacheStore, CacheWarmer, CancellationToken, CycleOutcome, DistributedLock,
    FailureKind, FetchOutcome, LockConfig, MemoryStore, StaticKeySource, WarmTarget, from_fn,
};

fn counted(key: &str, calls: Arc<AtomicUsize>, outcome: FetchOutcome) -> WarmTarget {
    WarmTarget::new(
        key,
        Arc::new(from_fn(move || {
            let calls = calls.clone();
            let outcome = outcome.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                outcome
            }
        })),
    )
}

fn fast_config() -> CacheLayerConfig {
    CacheLayerConfig::builder()
        .with_pacing(Duration::from_millis(10))
        .with_lease_ttl(Duration::from_secs(5))
        .with_renew_interval(Duration::from_millis(50))
        .build()
        .unwrap()
}

#[tokio::test]
async fn warming_cycle_fills_missing_and_tolerates_permanent_failure() {
    let store = Arc::new(MemoryStore::new());
    store
        .set("teamdetails:A", Bytes::from_static(b"cached"), Duration::from_secs(600))
        .await
        .unwrap();

    let a_calls = Arc::new(AtomicUsize::new(0));
    let b_calls = Arc::new(AtomicUsize::new(0));
    let c_calls = Arc::new(AtomicUsize::new(0));
    let targets = vec![
        counted(
            "teamdetails:A",
            a_calls.clone(),
            FetchOutcome::Success(Bytes::from_static(b"new")),
        ),
        counted(
            "teamdetails:B",
            b_calls.clone(),
            FetchOutcome::Success(Bytes::from_static(b"b")),
        ),
        counted(
            "teamdetails:C",
            c_calls.clone(),
            FetchOutcome::failure(FailureKind::NotFound, "404"),
        ),
    ];

    let warmer = CacheWarmer::from_config(
        store.clone(),
        Arc::new(StaticKeySource::new(targets)),
        &fast_config(),
    )
    .unwrap();

    let report = warmer.run_cycle(&CancellationToken::new()).await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.already_cached, 1);
    assert_eq!(report.filled, 1);
    assert_eq!(report.failed, 1);

    assert_eq!(a_calls.load(Ordering::SeqCst), 0);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    assert_eq!(c_calls.load(Ordering::SeqCst), 1);

    assert_eq!(
        store.get("teamdetails:A").await.unwrap(),
        Some(Bytes::from_static(b"cached"))
    );
    assert_eq!(
        store.get("teamdetails:B").await.unwrap(),
        Some(Bytes::from_static(b"b"))
    );
    assert!(!store.contains("teamdetails:C").await.unwrap());
    assert!(!store.contains("cache-warmer-lock").await.unwrap());

    // the failing key is simply tried again next cycle
    let report = warmer.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.already_cached, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(c_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn concurrent_acquires_have_exactly_one_winner() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let a = DistributedLock::new(store.clone(), LockConfig::default()).unwrap();
    let b = DistributedLock::new(store.clone(), LockConfig::default()).unwrap();

    let (ra, rb) = tokio::join!(a.try_acquire(), b.try_acquire());
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert!(ra ^ rb, "exactly one instance must win: {ra} {rb}");
}

#[tokio::test]
async fn concurrent_warmers_run_a_single_cycle() {
    let store = Arc::new(MemoryStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let mut config = fast_config();
    config.warmer.pacing = Duration::from_millis(100);

    let make = |calls: Arc<AtomicUsize>| {
        let targets = vec![
            counted("x:1", calls.clone(), FetchOutcome::Success(Bytes::from_static(b"1")))
                .with_entity("1"),
            counted("x:2", calls, FetchOutcome::Success(Bytes::from_static(b"2")))
                .with_entity("2"),
        ];
        CacheWarmer::from_config(
            store.clone(),
            Arc::new(StaticKeySource::new(targets)),
            &config,
        )
        .unwrap()
    };
    let first = make(calls.clone());
    let second = make(calls.clone());

    let shutdown = CancellationToken::new();
    let (r1, r2) = tokio::join!(first.run_cycle(&shutdown), second.run_cycle(&shutdown));

    let outcomes = [r1.outcome, r2.outcome];
    assert!(outcomes.contains(&CycleOutcome::Completed));
    assert!(outcomes.contains(&CycleOutcome::Skipped));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn renewal_keeps_lease_alive_and_stopped_holder_loses_it() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let config = LockConfig {
        key: "cache-warmer-lock".into(),
        lease_ttl: Duration::from_millis(200),
        renew_interval: Duration::from_millis(50),
    };
    let holder = DistributedLock::new(store.clone(), config.clone()).unwrap();
    let contender = DistributedLock::new(store.clone(), config).unwrap();

    assert!(holder.try_acquire().await.unwrap());
    let lost = CancellationToken::new();
    let renewal = holder.spawn_renewal(lost.clone());

    // well past the original lease
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!lost.is_cancelled());
    assert!(!contender.try_acquire().await.unwrap());
    assert_eq!(
        store.get("cache-warmer-lock").await.unwrap(),
        Some(Bytes::from(holder.token().to_owned()))
    );

    // holder stops renewing without releasing, as if it hung
    renewal.stop().await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(contender.try_acquire().await.unwrap());
}
