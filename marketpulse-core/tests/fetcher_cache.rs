//! Integration tests for the fetch orchestrator against a counting mock
//! provider and a real on-disk cache.

use chrono::NaiveDate;
use marketpulse_core::data::{BundleCache, DataFetcher, DataProvider, ProviderError, Route};
use marketpulse_core::sink::NullSink;
use marketpulse_core::Series;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Returns a short rising series for every symbol except those in `failing`.
struct CountingProvider {
    calls: Arc<AtomicUsize>,
    failing: HashSet<String>,
}

impl DataProvider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    fn fetch(&self, symbol: &str, _route: &Route) -> Result<Series, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(symbol) {
            return Err(ProviderError::NetworkUnreachable(format!(
                "{symbol}: connection refused"
            )));
        }
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Ok(Series::from_points(
            (0..20).map(|i| (start + chrono::Duration::days(i), 100.0 + i as f64)),
        ))
    }
}

fn roster() -> Vec<String> {
    ["^GSPC", "^VIX", "FX_USD", "MARGIN_BALANCE"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn fetcher(
    dir: &std::path::Path,
    freshness: Duration,
    failing: &[&str],
) -> (DataFetcher, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let provider = CountingProvider {
        calls: Arc::clone(&calls),
        failing: failing.iter().map(|s| s.to_string()).collect(),
    };
    let fetcher = DataFetcher::new(
        Box::new(provider),
        BundleCache::new(dir, freshness),
        roster(),
    );
    (fetcher, calls)
}

#[test]
fn fresh_cache_makes_no_provider_calls() {
    let dir = tempfile::tempdir().unwrap();

    let (mut first, first_calls) = fetcher(dir.path(), Duration::from_secs(3600), &[]);
    let summary = first.fetch_all(false, &NullSink);
    assert!(!summary.from_cache);
    assert!(summary.all_succeeded());
    assert_eq!(first_calls.load(Ordering::SeqCst), 4);

    let (mut second, second_calls) = fetcher(dir.path(), Duration::from_secs(3600), &[]);
    let summary = second.fetch_all(false, &NullSink);
    assert!(summary.from_cache);
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    assert_eq!(second.bundle().unwrap().len(), 4);
    assert_eq!(second.bundle().unwrap()["^GSPC"].len(), 20);
}

#[test]
fn force_refresh_ignores_fresh_cache() {
    let dir = tempfile::tempdir().unwrap();
    let (mut first, _) = fetcher(dir.path(), Duration::from_secs(3600), &[]);
    first.fetch_all(false, &NullSink);

    let (mut second, calls) = fetcher(dir.path(), Duration::from_secs(3600), &[]);
    let summary = second.fetch_all(true, &NullSink);
    assert!(!summary.from_cache);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn stale_cache_triggers_exactly_one_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let (mut first, _) = fetcher(dir.path(), Duration::from_millis(100), &[]);
    first.fetch_all(false, &NullSink);

    std::thread::sleep(Duration::from_millis(300));

    let (mut second, calls) = fetcher(dir.path(), Duration::from_millis(100), &[]);
    second.fetch_all(false, &NullSink);
    assert_eq!(calls.load(Ordering::SeqCst), roster().len());
}

#[test]
fn failed_symbol_degrades_to_empty_series() {
    let dir = tempfile::tempdir().unwrap();
    let (mut f, _) = fetcher(dir.path(), Duration::from_secs(3600), &["^VIX"]);
    let summary = f.fetch_all(false, &NullSink);

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.errors[0].0, "^VIX");

    let bundle = f.bundle().unwrap();
    for key in roster() {
        assert!(bundle.contains_key(&key), "missing key {key}");
    }
    assert!(bundle["^VIX"].is_empty());

    // The degraded key survives the cache round trip.
    let reloaded = BundleCache::new(dir.path(), Duration::from_secs(3600))
        .load_fresh()
        .unwrap();
    assert!(reloaded.contains_key("^VIX"));
    assert!(reloaded["^VIX"].is_empty());
}

#[test]
fn roster_drift_fetches_missing_symbol_once() {
    let dir = tempfile::tempdir().unwrap();
    let (mut first, _) = fetcher(dir.path(), Duration::from_secs(3600), &[]);
    first.fetch_all(false, &NullSink);

    let (mut second, calls) = fetcher(dir.path(), Duration::from_secs(3600), &[]);
    let len = second.get_cached("QQQ", &NullSink).len();
    assert_eq!(len, 20);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Now part of the bundle and of the persisted record.
    second.get_cached("QQQ", &NullSink);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let reloaded = BundleCache::new(dir.path(), Duration::from_secs(3600))
        .load_fresh()
        .unwrap();
    assert!(reloaded.contains_key("QQQ"));
}

#[test]
fn unavailable_drift_symbol_is_empty_not_error() {
    let dir = tempfile::tempdir().unwrap();
    let (mut f, _) = fetcher(dir.path(), Duration::from_secs(3600), &["DELISTED"]);
    f.fetch_all(false, &NullSink);
    assert!(f.get_cached("DELISTED", &NullSink).is_empty());
}

#[test]
fn get_cached_within_window_makes_no_calls() {
    let dir = tempfile::tempdir().unwrap();
    let (mut first, _) = fetcher(dir.path(), Duration::from_secs(3600), &[]);
    first.fetch_all(false, &NullSink);

    let (mut second, calls) = fetcher(dir.path(), Duration::from_secs(3600), &[]);
    assert_eq!(second.get_cached("^GSPC", &NullSink).len(), 20);
    assert_eq!(second.get_cached("FX_USD", &NullSink).len(), 20);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn drift_fetch_does_not_refresh_roster_freshness() {
    let dir = tempfile::tempdir().unwrap();
    let window = Duration::from_millis(600);
    let (mut first, _) = fetcher(dir.path(), window, &[]);
    first.fetch_all(false, &NullSink);

    std::thread::sleep(Duration::from_millis(400));
    assert_eq!(first.get_cached("^NEW", &NullSink).len(), 20);
    std::thread::sleep(Duration::from_millis(400));

    // The roster entries are now older than the window.
    let (mut second, calls) = fetcher(dir.path(), window, &[]);
    let summary = second.fetch_all(false, &NullSink);
    assert!(!summary.from_cache);
    assert_eq!(calls.load(Ordering::SeqCst), roster().len());
}

#[test]
fn drift_persist_keeps_the_loaded_record_time() {
    let dir = tempfile::tempdir().unwrap();
    let (mut first, _) = fetcher(dir.path(), Duration::from_secs(3600), &[]);
    first.fetch_all(false, &NullSink);
    let cache = BundleCache::new(dir.path(), Duration::from_secs(3600));
    let written = cache.read_meta().unwrap();

    std::thread::sleep(Duration::from_millis(200));

    let (mut second, calls) = fetcher(dir.path(), Duration::from_secs(3600), &[]);
    assert_eq!(second.get_cached("QQQ", &NullSink).len(), 20);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let after = cache.read_meta().unwrap();
    assert!(after.data_types.contains(&"QQQ".to_string()));
    assert_eq!(after.cache_time, written.cache_time);
    assert!(cache.status().age_secs.unwrap() >= 0.2);

    // A full cycle stamps a new time.
    second.fetch_all(true, &NullSink);
    assert!(cache.read_meta().unwrap().cache_time > written.cache_time);
}
