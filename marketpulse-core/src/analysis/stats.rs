//! Derived statistics over a [`Series`].
//!
//! Everything here is pure and returns `None` (or `Trend::Unknown`) when the
//! input is too short, so callers decide what "not enough data" means.

use crate::series::Series;
use crate::validation::validate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading days per year used for annualization.
pub const TRADING_DAYS: f64 = 252.0;

/// Direction of the recent mean against the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Unknown,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Unknown => "unknown",
        })
    }
}

/// Mean of the last `period` points against the mean of the `period` points
/// before them. `Up` when strictly greater, otherwise `Down`.
pub fn trend(series: &Series, period: usize) -> Trend {
    if period == 0 || !validate(Some(series), period * 2) {
        return Trend::Unknown;
    }
    let values = series.values();
    let n = values.len();
    let mean = |w: &[f64]| w.iter().sum::<f64>() / w.len() as f64;
    let recent = mean(&values[n - period..]);
    let previous = mean(&values[n - 2 * period..n - period]);
    if recent > previous {
        Trend::Up
    } else {
        Trend::Down
    }
}

/// Pearson correlation of two equal-length samples. `None` with fewer than two
/// pairs or when either side has zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mean_x, y - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Pearson over the dates both series share, skipping pairs with a NaN.
pub fn aligned_pearson(a: &Series, b: &Series) -> Option<f64> {
    let (left, right) = a.inner_join(b);
    let (xs, ys): (Vec<f64>, Vec<f64>) = left
        .values()
        .iter()
        .zip(right.values())
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(&x, &y)| (x, y))
        .unzip();
    pearson(&xs, &ys)
}

/// Correlation of daily percent changes.
pub fn correlation(a: &Series, b: &Series) -> Option<f64> {
    aligned_pearson(&a.pct_change(1), &b.pct_change(1))
}

/// Percent change between the value `lookback` points from the end and the
/// last value: `(x[-1] / x[-lookback] - 1) * 100`.
pub fn period_return(series: &Series, lookback: usize) -> Option<f64> {
    let last = series.value_back(1)?;
    let base = series.value_back(lookback)?;
    Some((last / base - 1.0) * 100.0)
}

/// Percent change from the first to the last point.
pub fn total_return(series: &Series) -> Option<f64> {
    let (_, first) = series.first()?;
    let (_, last) = series.last()?;
    Some((last / first - 1.0) * 100.0)
}

/// Latest `window`-day rolling standard deviation of daily returns,
/// annualized and expressed in percent.
pub fn annualized_volatility(series: &Series, window: usize) -> Option<f64> {
    let std = series
        .pct_change(1)
        .rolling_std(window)
        .last_value()
        .filter(|v| !v.is_nan())?;
    Some(std * TRADING_DAYS.sqrt() * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::test_support::series_from;

    #[test]
    fn trend_needs_two_periods() {
        let s = series_from(&[1.0; 19]);
        assert_eq!(trend(&s, 10), Trend::Unknown);
    }

    #[test]
    fn trend_up_and_down() {
        let rising: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        assert_eq!(trend(&series_from(&rising), 10), Trend::Up);
        assert_eq!(trend(&series_from(&falling), 10), Trend::Down);
    }

    #[test]
    fn flat_series_trends_down() {
        assert_eq!(trend(&series_from(&[5.0; 20]), 10), Trend::Down);
    }

    #[test]
    fn self_correlation_is_one() {
        let s = series_from(&[100.0, 101.0, 99.5, 102.0, 103.5, 101.0]);
        let c = correlation(&s, &s).unwrap();
        assert!((c - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_zero_variance_is_none() {
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        assert_eq!(pearson(&[1.0], &[1.0]), None);
    }

    #[test]
    fn period_return_uses_position_from_end() {
        let s = series_from(&[100.0, 50.0, 110.0]);
        assert!((period_return(&s, 3).unwrap() - 10.0).abs() < 1e-12);
        assert_eq!(period_return(&s, 4), None);
        assert!((total_return(&s).unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn volatility_of_constant_growth_is_zero() {
        let values: Vec<f64> = (0..30).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let vol = annualized_volatility(&series_from(&values), 20).unwrap();
        assert!(vol.abs() < 1e-9);
    }

    #[test]
    fn volatility_needs_full_window() {
        let s = series_from(&[1.0, 2.0, 3.0]);
        assert_eq!(annualized_volatility(&s, 20), None);
    }
}
