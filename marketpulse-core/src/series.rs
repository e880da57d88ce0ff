//! Date-indexed numeric series and the symbol → series bundle.
//!
//! Every provider adapter converts its raw payload into a [`Series`] before
//! returning, so nothing downstream has to guess at column names or shapes.
//! The index is strictly increasing with no duplicate dates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping of symbol key → series. Unavailable data is an empty series,
/// never a missing key.
pub type SeriesBundle = BTreeMap<String, Series>;

/// A single-column numeric table indexed by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    index: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl Series {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a series from unordered points. Points are sorted by date and a
    /// duplicated date keeps the value seen last.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let by_date: BTreeMap<NaiveDate, f64> = points.into_iter().collect();
        let (index, values) = by_date.into_iter().unzip();
        Self { index, values }
    }

    /// Build from parallel vectors that are already strictly increasing.
    /// Falls back to [`Series::from_points`] when they are not.
    pub fn from_parts(index: Vec<NaiveDate>, values: Vec<f64>) -> Self {
        let sorted = index.windows(2).all(|w| w[0] < w[1]);
        if sorted && index.len() == values.len() {
            Self { index, values }
        } else {
            Self::from_points(index.into_iter().zip(values))
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.index.iter().copied().zip(self.values.iter().copied())
    }

    pub fn first(&self) -> Option<(NaiveDate, f64)> {
        Some((*self.index.first()?, *self.values.first()?))
    }

    pub fn last(&self) -> Option<(NaiveDate, f64)> {
        Some((*self.index.last()?, *self.values.last()?))
    }

    pub fn last_value(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Value `n` positions from the end (`n = 1` is the last value).
    pub fn value_back(&self, n: usize) -> Option<f64> {
        if n == 0 || n > self.values.len() {
            return None;
        }
        Some(self.values[self.values.len() - n])
    }

    /// Number of points that are not NaN.
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    /// The most recent `n` points.
    pub fn tail(&self, n: usize) -> Series {
        let start = self.len().saturating_sub(n);
        Series {
            index: self.index[start..].to_vec(),
            values: self.values[start..].to_vec(),
        }
    }

    /// Drop points whose value is NaN.
    pub fn drop_nan(&self) -> Series {
        let (index, values) = self.iter().filter(|(_, v)| !v.is_nan()).unzip();
        Series { index, values }
    }

    /// Apply `f` to every value, keeping the index.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Series {
        Series {
            index: self.index.clone(),
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Carry the last non-NaN value forward over NaN gaps.
    pub fn forward_fill(&self) -> Series {
        let mut last = f64::NAN;
        let values = self
            .values
            .iter()
            .map(|&v| {
                if !v.is_nan() {
                    last = v;
                }
                last
            })
            .collect();
        Series {
            index: self.index.clone(),
            values,
        }
    }

    /// `x[i] / x[i - periods] - 1`. The first `periods` points are NaN.
    pub fn pct_change(&self, periods: usize) -> Series {
        self.lagged(periods, |cur, prev| cur / prev - 1.0)
    }

    /// `x[i] - x[i - periods]`. The first `periods` points are NaN.
    pub fn diff(&self, periods: usize) -> Series {
        self.lagged(periods, |cur, prev| cur - prev)
    }

    fn lagged(&self, periods: usize, f: impl Fn(f64, f64) -> f64) -> Series {
        let values = (0..self.len())
            .map(|i| {
                if periods == 0 || i < periods {
                    f64::NAN
                } else {
                    f(self.values[i], self.values[i - periods])
                }
            })
            .collect();
        Series {
            index: self.index.clone(),
            values,
        }
    }

    /// Rolling mean over a full window; NaN until the window is full or when
    /// the window contains a NaN.
    pub fn rolling_mean(&self, window: usize) -> Series {
        self.rolling(window, |w| w.iter().sum::<f64>() / w.len() as f64)
    }

    /// Rolling sample standard deviation (n − 1 denominator).
    pub fn rolling_std(&self, window: usize) -> Series {
        self.rolling(window, sample_std)
    }

    fn rolling(&self, window: usize, f: impl Fn(&[f64]) -> f64) -> Series {
        let values = (0..self.len())
            .map(|i| {
                if window == 0 || i + 1 < window {
                    return f64::NAN;
                }
                let slice = &self.values[i + 1 - window..=i];
                if slice.iter().any(|v| v.is_nan()) {
                    f64::NAN
                } else {
                    f(slice)
                }
            })
            .collect();
        Series {
            index: self.index.clone(),
            values,
        }
    }

    /// Mean of the non-NaN values.
    pub fn mean(&self) -> Option<f64> {
        let (sum, n) = self
            .values
            .iter()
            .filter(|v| !v.is_nan())
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    pub fn min(&self) -> Option<f64> {
        self.values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f64::max)
    }

    /// Align two series on their shared dates.
    pub fn inner_join(&self, other: &Series) -> (Series, Series) {
        let (mut i, mut j) = (0, 0);
        let mut index = Vec::new();
        let (mut left, mut right) = (Vec::new(), Vec::new());
        while i < self.len() && j < other.len() {
            match self.index[i].cmp(&other.index[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    index.push(self.index[i]);
                    left.push(self.values[i]);
                    right.push(other.values[j]);
                    i += 1;
                    j += 1;
                }
            }
        }
        (
            Series {
                index: index.clone(),
                values: left,
            },
            Series {
                index,
                values: right,
            },
        )
    }

    /// Combine two series point-wise over their shared dates.
    pub fn zip_with(&self, other: &Series, f: impl Fn(f64, f64) -> f64) -> Series {
        let (left, right) = self.inner_join(other);
        let values = left
            .values
            .iter()
            .zip(&right.values)
            .map(|(&a, &b)| f(a, b))
            .collect();
        Series {
            index: left.index,
            values,
        }
    }
}

/// Sample standard deviation; NaN for fewer than two values.
pub(crate) fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Consecutive calendar days starting 2024-01-01.
    pub fn series_from(values: &[f64]) -> Series {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Series::from_points(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| (start + chrono::Duration::days(i as i64), v)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::series_from;
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn from_points_sorts_and_dedups() {
        let s = Series::from_points(vec![
            (d("2024-01-03"), 3.0),
            (d("2024-01-01"), 1.0),
            (d("2024-01-03"), 30.0),
        ]);
        assert_eq!(s.index(), &[d("2024-01-01"), d("2024-01-03")]);
        assert_eq!(s.values(), &[1.0, 30.0]);
    }

    #[test]
    fn tail_keeps_most_recent() {
        let s = series_from(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(s.tail(2).values(), &[3.0, 4.0]);
        assert_eq!(s.tail(10).len(), 4);
    }

    #[test]
    fn pct_change_leads_with_nan() {
        let s = series_from(&[100.0, 110.0, 99.0]);
        let pc = s.pct_change(1);
        assert!(pc.values()[0].is_nan());
        assert!((pc.values()[1] - 0.10).abs() < 1e-12);
        assert!((pc.values()[2] + 0.10).abs() < 1e-12);
    }

    #[test]
    fn rolling_mean_full_window_only() {
        let s = series_from(&[1.0, 2.0, 3.0, 4.0]);
        let rm = s.rolling_mean(3);
        assert!(rm.values()[1].is_nan());
        assert_eq!(rm.values()[2], 2.0);
        assert_eq!(rm.values()[3], 3.0);
    }

    #[test]
    fn rolling_std_matches_sample_std() {
        let s = series_from(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let rs = s.rolling_std(8);
        assert!((rs.values()[7] - 2.138_089_935).abs() < 1e-6);
    }

    #[test]
    fn forward_fill_carries_last_value() {
        let s = series_from(&[f64::NAN, 1.0, f64::NAN, f64::NAN, 2.0]);
        let ff = s.forward_fill();
        assert!(ff.values()[0].is_nan());
        assert_eq!(&ff.values()[1..], &[1.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn inner_join_keeps_shared_dates() {
        let a = Series::from_points(vec![
            (d("2024-01-01"), 1.0),
            (d("2024-01-02"), 2.0),
            (d("2024-01-04"), 4.0),
        ]);
        let b = Series::from_points(vec![(d("2024-01-02"), 20.0), (d("2024-01-04"), 40.0)]);
        let ratio = a.zip_with(&b, |x, y| x / y);
        assert_eq!(ratio.index(), &[d("2024-01-02"), d("2024-01-04")]);
        assert_eq!(ratio.values(), &[0.1, 0.1]);
    }

    #[test]
    fn value_back_indexes_from_end() {
        let s = series_from(&[1.0, 2.0, 3.0]);
        assert_eq!(s.value_back(1), Some(3.0));
        assert_eq!(s.value_back(3), Some(1.0));
        assert_eq!(s.value_back(4), None);
        assert_eq!(s.value_back(0), None);
    }
}
