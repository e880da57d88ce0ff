//! Data guards and min-max scaling.
//!
//! [`validate`] gates every computation that indexes into the tail of a
//! series, divides by its range, or takes percent changes.

use crate::series::Series;

/// Default minimum number of points when a caller has no stronger requirement.
pub const DEFAULT_MIN_POINTS: usize = 10;

/// True when `data` is present, not NaN-only, and has at least `min_points` rows.
pub fn validate(data: Option<&Series>, min_points: usize) -> bool {
    match data {
        None => false,
        Some(series) => {
            !series.is_empty() && series.valid_count() > 0 && series.len() >= min_points
        }
    }
}

/// Min-max scale to `[0, 1]`.
///
/// Returns an empty series when fewer than two points are available. A
/// constant series has `max == min`, so every point becomes `0 / 0 = NaN`;
/// that output is passed through unchanged. NaN inputs stay NaN.
pub fn normalize(series: &Series) -> Series {
    if !validate(Some(series), 2) {
        return Series::empty();
    }
    let (Some(min), Some(max)) = (series.min(), series.max()) else {
        return Series::empty();
    };
    let range = max - min;
    series.map(|v| (v - min) / range)
}

/// Share of points less than or equal to `value`, as 0–100.
///
/// NaN points count toward the length but never satisfy the comparison.
pub fn percentile_rank(series: &Series, value: f64) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let at_or_below = series.values().iter().filter(|&&v| v <= value).count();
    at_or_below as f64 / series.len() as f64 * 100.0
}
