//! Fetch orchestrator: fills the bundle from the cache or the providers.
//!
//! A full refresh fetches every roster symbol once, replaces failures with
//! empty series, and persists the result. Symbols outside the loaded bundle
//! are fetched on demand by [`DataFetcher::get_cached`].

use super::cache::{BundleCache, CacheError};
use super::provider::{DataProvider, ProviderError, Route};
use super::router::ProviderRouter;
use super::settings::FetchSettings;
use crate::series::{Series, SeriesBundle};
use crate::sink::EventSink;

const CATEGORY: &str = "data_fetch";

/// Summary of a `fetch_all` call.
#[derive(Debug, Default)]
pub struct FetchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(String, ProviderError)>,
    /// True when the bundle came from a fresh cache record.
    pub from_cache: bool,
}

impl FetchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

pub struct DataFetcher {
    provider: Box<dyn DataProvider>,
    cache: BundleCache,
    roster: Vec<String>,
    bundle: Option<SeriesBundle>,
    /// `cache_time` of the record the bundle came from or was saved as.
    record_time: Option<f64>,
}

impl DataFetcher {
    pub fn new(provider: Box<dyn DataProvider>, cache: BundleCache, roster: Vec<String>) -> Self {
        Self {
            provider,
            cache,
            roster,
            bundle: None,
            record_time: None,
        }
    }

    /// Network-backed fetcher built from the `[fetch]` settings.
    pub fn from_settings(settings: &FetchSettings) -> Result<Self, ProviderError> {
        Ok(Self::new(
            Box::new(ProviderRouter::from_settings(settings)?),
            BundleCache::new(settings.cache_dir.clone(), settings.freshness()),
            settings.roster.symbols(),
        ))
    }

    pub fn cache(&self) -> &BundleCache {
        &self.cache
    }

    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    /// The bundle loaded or fetched so far, if any.
    pub fn bundle(&self) -> Option<&SeriesBundle> {
        self.bundle.as_ref()
    }

    /// Take ownership of the bundle, leaving the fetcher empty.
    pub fn into_bundle(self) -> SeriesBundle {
        self.bundle.unwrap_or_default()
    }

    /// Populate the bundle.
    ///
    /// Unless `force_refresh` is set, a fresh cache record short-circuits with
    /// no network calls. Otherwise every roster symbol is requested exactly
    /// once; a failure is reported to `sink` as a warning and stored as an
    /// empty series so the key is always present.
    pub fn fetch_all(&mut self, force_refresh: bool, sink: &dyn EventSink) -> FetchSummary {
        if !force_refresh {
            match self.cache.load_fresh() {
                Ok(bundle) => {
                    let total = bundle.len();
                    let populated = bundle.values().filter(|s| !s.is_empty()).count();
                    sink.success(
                        CATEGORY,
                        &format!("Loaded {total} series from cache ({populated} with data)"),
                    );
                    self.bundle = Some(bundle);
                    self.record_time = self.cache.read_meta().map(|m| m.cache_time);
                    return FetchSummary {
                        total,
                        succeeded: total,
                        from_cache: true,
                        ..FetchSummary::default()
                    };
                }
                Err(CacheError::Missing(_)) => {
                    tracing::info!("no cache record, fetching from providers");
                }
                Err(e) => {
                    tracing::info!(reason = %e, "cache not usable, fetching from providers");
                }
            }
        }

        sink.info(
            CATEGORY,
            &format!("Fetching {} series from providers", self.roster.len()),
        );

        let mut summary = FetchSummary {
            total: self.roster.len(),
            ..FetchSummary::default()
        };
        let mut bundle = SeriesBundle::new();
        for symbol in &self.roster {
            match self.fetch_symbol(symbol) {
                Ok(series) => {
                    tracing::debug!(symbol = %symbol, rows = series.len(), "fetched");
                    summary.succeeded += 1;
                    bundle.insert(symbol.clone(), series);
                }
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "degraded to empty series");
                    sink.warning(CATEGORY, &format!("{symbol}: {e}"));
                    summary.failed += 1;
                    summary.errors.push((symbol.clone(), e));
                    bundle.insert(symbol.clone(), Series::empty());
                }
            }
        }

        self.record_time = self.persist(&bundle, None, sink);
        self.bundle = Some(bundle);

        let message = format!(
            "Fetched {} of {} series ({} failed)",
            summary.succeeded, summary.total, summary.failed
        );
        if summary.all_succeeded() {
            sink.success(CATEGORY, &message);
        } else {
            sink.warning(CATEGORY, &message);
        }
        summary
    }

    /// The series for `symbol`.
    ///
    /// Loads the bundle first when none is populated. A symbol missing from
    /// the bundle (roster drift) is fetched on its own, added, and the bundle
    /// is persisted again. An unavailable symbol yields an empty series.
    pub fn get_cached(&mut self, symbol: &str, sink: &dyn EventSink) -> &Series {
        if self.bundle.is_none() {
            self.fetch_all(false, sink);
        }

        let present = self
            .bundle
            .as_ref()
            .is_some_and(|b| b.contains_key(symbol));
        if !present {
            sink.info(CATEGORY, &format!("{symbol} not in bundle, fetching"));
            let series = self.fetch_symbol(symbol).unwrap_or_else(|e| {
                sink.warning(CATEGORY, &format!("{symbol}: {e}"));
                Series::empty()
            });
            let mut bundle = self.bundle.take().unwrap_or_default();
            bundle.insert(symbol.to_string(), series);
            // Only a full cycle refreshes the record time.
            let stamped = self.persist(&bundle, self.record_time, sink);
            self.record_time = stamped.or(self.record_time);
            self.bundle = Some(bundle);
        }

        let bundle = self.bundle.get_or_insert_with(SeriesBundle::new);
        bundle.entry(symbol.to_string()).or_default()
    }

    fn fetch_symbol(&self, symbol: &str) -> Result<Series, ProviderError> {
        let route = Route::for_symbol(symbol);
        self.provider.fetch(symbol, &route)
    }

    /// Save the bundle, stamped `cache_time` or now. Returns the stamped
    /// time; write failures are reported but never fatal.
    fn persist(
        &self,
        bundle: &SeriesBundle,
        cache_time: Option<f64>,
        sink: &dyn EventSink,
    ) -> Option<f64> {
        let saved = match cache_time {
            Some(t) => self.cache.save_at(bundle, t),
            None => self.cache.save(bundle),
        };
        match saved {
            Ok(meta) => {
                tracing::debug!(
                    keys = meta.data_types.len(),
                    hash = %meta.data_hash,
                    "bundle cached"
                );
                Some(meta.cache_time)
            }
            Err(e) => {
                tracing::error!(error = %e, "cache write failed");
                sink.error(CATEGORY, &format!("Failed to write cache: {e}"));
                None
            }
        }
    }
}
