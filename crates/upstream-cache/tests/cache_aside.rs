use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bytes::Bytes;
use upstream_cache::{
    BackoffSchedule, CacheStore, CancellationToken, FailureKind, FetchOutcome, MemoryStore,
    ResolveError, Resolver, ResolverConfig, Source, from_fn,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("upstream_cache=debug")
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn standings_fresh_then_stale_then_unavailable() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let resolver = Resolver::new(
        store.clone(),
        ResolverConfig {
            ttl: Duration::from_millis(200),
            ..ResolverConfig::default()
        },
    );
    let key = "standings:2025-11-23";

    let success = from_fn(|| async { FetchOutcome::Success(Bytes::from_static(b"S1")) });
    let throttled = from_fn(|| async { FetchOutcome::Throttled("429 Too Many Requests".into()) });

    let first = resolver.resolve(key, &success).await.unwrap();
    assert_eq!(first.source, Source::Fresh);
    assert_eq!(first.data, Bytes::from_static(b"S1"));

    let second = resolver.resolve(key, &throttled).await.unwrap();
    assert_eq!(second.source, Source::Stale);
    assert_eq!(second.data, Bytes::from_static(b"S1"));

    // entry expires on its own; stale reads did not keep it alive
    tokio::time::sleep(Duration::from_millis(400)).await;

    let third = resolver.resolve(key, &throttled).await.unwrap_err();
    assert!(matches!(third, ResolveError::Throttled { .. }));
    assert_eq!(third.status_code(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn failure_leaves_store_unchanged() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let resolver = Resolver::new(store.clone(), ResolverConfig::default());

    let failing = from_fn(|| async { FetchOutcome::failure(FailureKind::Transport, "reset") });
    let err = resolver.resolve("team-news:10", &failing).await.unwrap_err();

    assert!(matches!(err, ResolveError::Upstream { .. }));
    assert!(!store.contains("team-news:10").await.unwrap());
}

#[tokio::test]
async fn always_throttled_backoff_exhausts_after_table_plus_one_attempts() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let resolver = Resolver::new(store.clone(), ResolverConfig::default());
    let calls = Arc::new(AtomicU32::new(0));

    let counter = calls.clone();
    let throttled = from_fn(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            FetchOutcome::Throttled("429".into())
        }
    });

    let schedule = BackoffSchedule::new(vec![
        Duration::from_millis(3),
        Duration::from_millis(6),
        Duration::from_millis(12),
    ]);
    let err = resolver
        .resolve_with_backoff("roster:TOR", &throttled, &schedule, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::Exhausted { attempts: 4, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(store.get("roster:TOR").await.unwrap().is_none());
}
