//! Single-file Parquet cache for the whole series bundle.
//!
//! Layout:
//! - `{cache_dir}/bundle.parquet`: long format, one row per (symbol, date, value)
//! - `{cache_dir}/cache_meta.json`: cache time, symbol keys, and content hash
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Freshness check against the meta sidecar's cache time
//! - Keys whose series was empty survive a round trip via `data_types`
//! - Quarantine for a corrupt blob (`bundle.parquet.quarantined`)

use crate::series::{Series, SeriesBundle};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const BLOB_FILE: &str = "bundle.parquet";
pub const META_FILE: &str = "cache_meta.json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no cached bundle in {}", .0.display())]
    Missing(PathBuf),

    #[error("cached bundle is stale ({age_secs:.0}s old)")]
    Stale { age_secs: f64 },

    #[error("cache I/O failed: {0}")]
    Io(String),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("cache metadata: {0}")]
    Meta(String),

    #[error("corrupt cache blob quarantined: {0}")]
    Corrupt(String),
}

/// Metadata sidecar for the cached bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    /// Unix seconds at which the bundle was written.
    pub cache_time: f64,
    /// Every symbol key in the bundle, including keys with empty series.
    pub data_types: Vec<String>,
    /// Human-readable local write time.
    pub last_update: String,
    pub data_hash: String,
}

impl CacheMeta {
    pub fn age_secs(&self) -> f64 {
        now_secs() - self.cache_time
    }
}

/// What `cache status` reports.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub blob_path: PathBuf,
    pub present: bool,
    pub fresh: bool,
    pub age_secs: Option<f64>,
    pub meta: Option<CacheMeta>,
}

pub struct BundleCache {
    cache_dir: PathBuf,
    freshness: Duration,
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

fn local_time_label(unix_secs: f64) -> String {
    chrono::DateTime::from_timestamp_millis((unix_secs * 1000.0) as i64)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_default()
}

impl BundleCache {
    pub fn new(cache_dir: impl Into<PathBuf>, freshness: Duration) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            freshness,
        }
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn blob_path(&self) -> PathBuf {
        self.cache_dir.join(BLOB_FILE)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.cache_dir.join(META_FILE)
    }

    /// The sidecar, or `None` when absent or unreadable.
    pub fn read_meta(&self) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path()).ok()?;
        match serde_json::from_str(&content) {
            Ok(meta) => Some(meta),
            Err(e) => {
                tracing::warn!(path = %self.meta_path().display(), error = %e, "unreadable cache metadata");
                None
            }
        }
    }

    fn is_fresh_meta(&self, meta: &CacheMeta) -> bool {
        meta.age_secs() < self.freshness.as_secs_f64()
    }

    pub fn status(&self) -> CacheStatus {
        let meta = self.read_meta();
        let present = meta.is_some() && self.blob_path().exists();
        CacheStatus {
            blob_path: self.blob_path(),
            present,
            fresh: present && meta.as_ref().is_some_and(|m| self.is_fresh_meta(m)),
            age_secs: meta.as_ref().map(CacheMeta::age_secs),
            meta,
        }
    }

    /// Load the bundle when the cache record is younger than the freshness
    /// window.
    pub fn load_fresh(&self) -> Result<SeriesBundle, CacheError> {
        let meta = self
            .read_meta()
            .ok_or_else(|| CacheError::Missing(self.cache_dir.clone()))?;
        if !self.is_fresh_meta(&meta) {
            return Err(CacheError::Stale {
                age_secs: meta.age_secs(),
            });
        }
        self.load_with_meta(&meta)
    }

    /// Load the bundle regardless of age.
    pub fn load(&self) -> Result<SeriesBundle, CacheError> {
        let meta = self
            .read_meta()
            .ok_or_else(|| CacheError::Missing(self.cache_dir.clone()))?;
        self.load_with_meta(&meta)
    }

    fn load_with_meta(&self, meta: &CacheMeta) -> Result<SeriesBundle, CacheError> {
        let path = self.blob_path();
        if !path.exists() {
            return Err(CacheError::Missing(self.cache_dir.clone()));
        }

        let mut bundle = match read_bundle(&path) {
            Ok(bundle) => bundle,
            Err(e) => {
                let quarantine = path.with_extension("parquet.quarantined");
                tracing::warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                if let Err(rename_err) = fs::rename(&path, &quarantine) {
                    tracing::warn!(
                        path = %path.display(),
                        error = %rename_err,
                        "failed to quarantine corrupt cache file"
                    );
                }
                return Err(CacheError::Corrupt(e.to_string()));
            }
        };

        for key in &meta.data_types {
            bundle.entry(key.clone()).or_default();
        }
        Ok(bundle)
    }

    /// Write the bundle and its sidecar, stamped now. Writes are atomic:
    /// write to .tmp then rename.
    pub fn save(&self, bundle: &SeriesBundle) -> Result<CacheMeta, CacheError> {
        self.save_at(bundle, now_secs())
    }

    /// Write the bundle with an explicit `cache_time`. Adding a symbol to an
    /// existing record keeps the record's original time, so the rest of the
    /// bundle does not look fresher than it is.
    pub fn save_at(&self, bundle: &SeriesBundle, cache_time: f64) -> Result<CacheMeta, CacheError> {
        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| CacheError::Io(format!("failed to create dir: {e}")))?;

        let df = bundle_to_dataframe(bundle)?;
        let path = self.blob_path();
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            CacheError::Io(format!("atomic rename failed: {e}"))
        })?;

        let meta = CacheMeta {
            cache_time,
            data_types: bundle.keys().cloned().collect(),
            last_update: local_time_label(cache_time),
            data_hash: blake3::hash(
                &serde_json::to_vec(bundle)
                    .map_err(|e| CacheError::Meta(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| CacheError::Meta(format!("serialization: {e}")))?;
        let meta_tmp = self.meta_path().with_extension("json.tmp");
        fs::write(&meta_tmp, meta_json).map_err(|e| CacheError::Io(format!("meta write: {e}")))?;
        fs::rename(&meta_tmp, self.meta_path())
            .map_err(|e| CacheError::Io(format!("meta rename: {e}")))?;

        Ok(meta)
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

/// 1970-01-01, the origin of the parquet `Date` type.
fn epoch() -> NaiveDate {
    NaiveDate::default()
}

/// Flatten the bundle into (symbol, date, value) rows.
fn bundle_to_dataframe(bundle: &SeriesBundle) -> Result<DataFrame, CacheError> {
    let rows = bundle.values().map(Series::len).sum();
    let mut symbols: Vec<&str> = Vec::with_capacity(rows);
    let mut dates: Vec<i32> = Vec::with_capacity(rows);
    let mut values: Vec<f64> = Vec::with_capacity(rows);

    for (symbol, series) in bundle {
        for (date, value) in series.iter() {
            symbols.push(symbol);
            dates.push((date - epoch()).num_days() as i32);
            values.push(value);
        }
    }

    DataFrame::new(vec![
        Column::new("symbol".into(), symbols),
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| CacheError::Parquet(format!("date cast: {e}")))?,
        Column::new("value".into(), values),
    ])
    .map_err(|e| CacheError::Parquet(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), CacheError> {
    let file =
        fs::File::create(path).map_err(|e| CacheError::Parquet(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| CacheError::Parquet(format!("write parquet: {e}")))?;
    Ok(())
}

/// Read the long-format blob back into a bundle.
fn read_bundle(path: &Path) -> Result<SeriesBundle, CacheError> {
    let file = fs::File::open(path).map_err(|e| CacheError::Parquet(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| CacheError::Parquet(format!("read: {e}")))?;

    let column = |name: &str| {
        df.column(name)
            .map_err(|_| CacheError::Parquet(format!("missing column '{name}'")))
    };
    let symbol_ca = column("symbol")?
        .str()
        .map_err(|e| CacheError::Parquet(format!("symbol column type: {e}")))?;
    let date_ca = column("date")?
        .date()
        .map_err(|e| CacheError::Parquet(format!("date column type: {e}")))?;
    let value_ca = column("value")?
        .f64()
        .map_err(|e| CacheError::Parquet(format!("value column type: {e}")))?;

    let mut points: BTreeMap<String, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for i in 0..df.height() {
        let symbol = symbol_ca
            .get(i)
            .ok_or_else(|| CacheError::Parquet(format!("null symbol at row {i}")))?;
        let days = date_ca
            .get(i)
            .ok_or_else(|| CacheError::Parquet(format!("null date at row {i}")))?;
        let date = epoch() + chrono::Duration::days(days as i64);
        let value = value_ca.get(i).unwrap_or(f64::NAN);
        points
            .entry(symbol.to_string())
            .or_default()
            .push((date, value));
    }

    Ok(points
        .into_iter()
        .map(|(symbol, pts)| (symbol, Series::from_points(pts)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::test_support::series_from;

    fn sample_bundle() -> SeriesBundle {
        let mut bundle = SeriesBundle::new();
        bundle.insert("^GSPC".into(), series_from(&[4700.0, 4710.5, 4695.25]));
        bundle.insert("MARGIN_BALANCE".into(), series_from(&[8.5e11, 8.6e11]));
        bundle.insert("FX_USD".into(), Series::empty());
        bundle
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BundleCache::new(dir.path(), Duration::from_secs(3600));

        let meta = cache.save(&sample_bundle()).unwrap();
        assert_eq!(meta.data_types.len(), 3);
        assert_eq!(meta.data_hash.len(), 64);

        let loaded = cache.load_fresh().unwrap();
        assert_eq!(loaded, sample_bundle());
        assert!(loaded["FX_USD"].is_empty());
    }

    #[test]
    fn missing_cache_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BundleCache::new(dir.path(), Duration::from_secs(3600));
        assert!(matches!(cache.load_fresh(), Err(CacheError::Missing(_))));
        let status = cache.status();
        assert!(!status.present);
        assert!(!status.fresh);
    }

    #[test]
    fn record_goes_stale_after_window() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BundleCache::new(dir.path(), Duration::from_millis(150));
        cache.save(&sample_bundle()).unwrap();
        assert!(cache.status().fresh);

        std::thread::sleep(Duration::from_millis(300));
        assert!(matches!(cache.load_fresh(), Err(CacheError::Stale { .. })));
        assert!(!cache.status().fresh);
        // Stale data is still readable on request.
        assert_eq!(cache.load().unwrap().len(), 3);
    }

    #[test]
    fn corrupt_blob_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BundleCache::new(dir.path(), Duration::from_secs(3600));
        cache.save(&sample_bundle()).unwrap();
        fs::write(cache.blob_path(), b"definitely not parquet").unwrap();

        assert!(matches!(cache.load_fresh(), Err(CacheError::Corrupt(_))));
        assert!(!cache.blob_path().exists());
        assert!(dir.path().join("bundle.parquet.quarantined").exists());
    }

    #[test]
    fn save_at_keeps_the_given_time() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BundleCache::new(dir.path(), Duration::from_secs(3600));
        let old = now_secs() - 7200.0;

        let meta = cache.save_at(&sample_bundle(), old).unwrap();
        assert_eq!(meta.cache_time, old);
        assert_eq!(cache.read_meta().unwrap().cache_time, old);
        assert!(!cache.status().fresh);
        assert!(matches!(cache.load_fresh(), Err(CacheError::Stale { .. })));
    }

    #[test]
    fn hash_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BundleCache::new(dir.path(), Duration::from_secs(3600));
        let first = cache.save(&sample_bundle()).unwrap();

        let mut changed = sample_bundle();
        changed.insert("^VIX".into(), series_from(&[13.0]));
        let second = cache.save(&changed).unwrap();
        assert_ne!(first.data_hash, second.data_hash);
    }
}
