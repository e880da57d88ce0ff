//! China macro datasets over the AKTools HTTP wrapper.
//!
//! Every dataset is served as `GET {base}/api/public/{name}?{params}` and
//! returns a JSON array of records keyed by the dataset's own column names.
//! [`DatasetSpec`] pins down which dataset, parameters, and date/value columns
//! serve each macro route.

use super::coerce::{coerce_date, coerce_f64};
use super::provider::{
    finish_points, http_client, send_once, DataProvider, ProviderError, Route, SpreadLeg,
};
use super::settings::FetchSettings;
use crate::series::Series;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::time::Duration;

type Record = Map<String, Value>;

/// Rows of the yield dataset considered before forward-filling.
const YIELD_ROWS: usize = 600;

const YIELD_DATE: &str = "日期";
const CN_10Y: &str = "中国国债收益率10年";
const US_10Y: &str = "美国国债收益率10年";

/// Request and column layout for one macro route.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSpec {
    pub dataset: &'static str,
    pub params: Vec<(&'static str, String)>,
    pub date_column: &'static str,
    pub value_column: &'static str,
}

impl DatasetSpec {
    /// Layout for `route`, or `None` when the route is not a macro dataset.
    /// The yield-spread route is handled separately since it derives three
    /// series from two columns.
    pub fn for_route(route: &Route, start: NaiveDate, end: NaiveDate) -> Option<DatasetSpec> {
        let ymd = |d: NaiveDate| d.format("%Y%m%d").to_string();
        let spec = match route {
            Route::MarginBalance => DatasetSpec {
                dataset: "stock_margin_sse",
                params: vec![("start_date", ymd(start)), ("end_date", ymd(end))],
                date_column: "信用交易日期",
                value_column: "融资余额",
            },
            Route::InterbankRate => DatasetSpec {
                dataset: "macro_china_shibor_all",
                params: Vec::new(),
                date_column: "日期",
                value_column: "1M-定价",
            },
            Route::EtfHistory { code } => DatasetSpec {
                dataset: "fund_etf_hist_em",
                params: vec![
                    ("symbol", code.clone()),
                    ("period", "daily".to_string()),
                    ("start_date", ymd(start)),
                    ("end_date", ymd(end)),
                ],
                date_column: "日期",
                value_column: "收盘",
            },
            Route::FuturesHistory { contract } => DatasetSpec {
                dataset: "futures_foreign_hist",
                params: vec![("symbol", contract.clone())],
                date_column: "date",
                value_column: "close",
            },
            Route::RollingPe => DatasetSpec {
                dataset: "stock_index_pe_lg",
                params: vec![("symbol", "上证50".to_string())],
                date_column: "日期",
                value_column: "滚动市盈率",
            },
            Route::YieldSpread(_) => DatasetSpec {
                dataset: "bond_zh_us_rate",
                params: vec![("start_date", ymd(start))],
                date_column: YIELD_DATE,
                value_column: CN_10Y,
            },
            Route::TimeSeries { .. } | Route::FxTable { .. } => return None,
        };
        Some(spec)
    }
}

pub struct MacroApiProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    timeout: Duration,
    lookback_days: i64,
    history_window: usize,
}

impl MacroApiProvider {
    pub fn new(settings: &FetchSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(settings.request_timeout(), &settings.user_agent)?,
            base_url: settings.macro_api_base_url.trim_end_matches('/').to_string(),
            timeout: settings.request_timeout(),
            lookback_days: settings.lookback_days,
            history_window: settings.history_window,
        })
    }

    fn fetch_records(&self, symbol: &str, spec: &DatasetSpec) -> Result<Vec<Record>, ProviderError> {
        let url = format!("{}/api/public/{}", self.base_url, spec.dataset);
        let request = self.client.get(&url).query(&spec.params);
        let resp = send_once(request, self.name(), symbol, self.timeout)?;
        let body: Value = resp.json().map_err(|e| {
            ProviderError::ResponseFormatChanged(format!("{}: body is not JSON: {e}", spec.dataset))
        })?;
        parse_records(symbol, spec.dataset, body)
    }
}

/// Require a non-empty JSON array of objects.
fn parse_records(symbol: &str, dataset: &str, body: Value) -> Result<Vec<Record>, ProviderError> {
    let Value::Array(rows) = body else {
        return Err(ProviderError::ResponseFormatChanged(format!(
            "{dataset}: expected a JSON array"
        )));
    };
    if rows.is_empty() {
        return Err(ProviderError::EmptyResponse {
            symbol: symbol.to_string(),
        });
    }
    rows.into_iter()
        .map(|row| match row {
            Value::Object(map) => Ok(map),
            _ => Err(ProviderError::ResponseFormatChanged(format!(
                "{dataset}: expected an array of records"
            ))),
        })
        .collect()
}

fn require_column(records: &[Record], dataset: &str, column: &str) -> Result<(), ProviderError> {
    match records.first() {
        Some(first) if first.contains_key(column) => Ok(()),
        _ => Err(ProviderError::ResponseFormatChanged(format!(
            "{dataset}: missing column '{column}'"
        ))),
    }
}

/// Pull (date, value) points out of records, dropping rows whose date or
/// value cannot be read.
pub(crate) fn extract_points(
    records: &[Record],
    spec: &DatasetSpec,
) -> Result<Vec<(NaiveDate, f64)>, ProviderError> {
    require_column(records, spec.dataset, spec.date_column)?;
    require_column(records, spec.dataset, spec.value_column)?;
    Ok(records
        .iter()
        .filter_map(|row| {
            let date = coerce_date(row.get(spec.date_column)?)?;
            let value = coerce_f64(row.get(spec.value_column)?)?;
            Some((date, value))
        })
        .collect())
}

/// Derive the requested leg from the China/US 10Y dataset.
///
/// Only the most recent rows are used. The spread is taken row-wise, so it is
/// missing wherever either leg is, and then every column is forward-filled.
pub(crate) fn yield_leg(records: &[Record], leg: SpreadLeg) -> Result<Series, ProviderError> {
    let dataset = "bond_zh_us_rate";
    require_column(records, dataset, YIELD_DATE)?;
    require_column(records, dataset, CN_10Y)?;
    require_column(records, dataset, US_10Y)?;

    let read = |row: &Record, col: &str| row.get(col).and_then(coerce_f64).unwrap_or(f64::NAN);
    let mut rows: Vec<(NaiveDate, f64, f64)> = records
        .iter()
        .filter_map(|row| {
            let date = coerce_date(row.get(YIELD_DATE)?)?;
            Some((date, read(row, CN_10Y), read(row, US_10Y)))
        })
        .collect();
    rows.sort_by_key(|(date, _, _)| *date);
    let start = rows.len().saturating_sub(YIELD_ROWS);
    let rows = &rows[start..];

    let column = |f: fn(&(NaiveDate, f64, f64)) -> f64| {
        Series::from_points(rows.iter().map(|r| (r.0, f(r)))).forward_fill()
    };
    Ok(match leg {
        SpreadLeg::Spread => column(|r| r.1 - r.2),
        SpreadLeg::Cn10y => column(|r| r.1),
        SpreadLeg::Us10y => column(|r| r.2),
    })
}

impl DataProvider for MacroApiProvider {
    fn name(&self) -> &str {
        "aktools"
    }

    fn fetch(&self, symbol: &str, route: &Route) -> Result<Series, ProviderError> {
        let end = chrono::Utc::now().date_naive();
        let start = end - chrono::Duration::days(self.lookback_days);
        let spec = DatasetSpec::for_route(route, start, end).ok_or_else(|| {
            ProviderError::UnsupportedRoute {
                provider: self.name().to_string(),
                symbol: symbol.to_string(),
            }
        })?;

        let records = self.fetch_records(symbol, &spec)?;
        let points = match route {
            Route::YieldSpread(leg) => yield_leg(&records, *leg)?.iter().collect(),
            _ => extract_points(&records, &spec)?,
        };
        finish_points(symbol, points, self.history_window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(body: Value) -> Vec<Record> {
        parse_records("X", "test", body).unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn margin_rows_with_compact_dates() {
        let rows = records(json!([
            {"信用交易日期": "20240103", "融资余额": 852_000_000_000.0_f64},
            {"信用交易日期": 20240102, "融资余额": "851,000,000,000"},
            {"信用交易日期": "bad", "融资余额": 1.0},
        ]));
        let spec = DatasetSpec::for_route(&Route::MarginBalance, d("2021-01-01"), d("2024-01-03"))
            .unwrap();
        assert_eq!(spec.params[0], ("start_date", "20210101".to_string()));
        let s = Series::from_points(extract_points(&rows, &spec).unwrap());
        assert_eq!(s.index(), &[d("2024-01-02"), d("2024-01-03")]);
        assert_eq!(s.values(), &[851e9, 852e9]);
    }

    #[test]
    fn missing_value_column_is_format_change() {
        let rows = records(json!([{"日期": "2024-01-02", "收盘价": 3.5}]));
        let spec = DatasetSpec::for_route(
            &Route::EtfHistory {
                code: "510300".into(),
            },
            d("2024-01-01"),
            d("2024-01-02"),
        )
        .unwrap();
        assert!(matches!(
            extract_points(&rows, &spec),
            Err(ProviderError::ResponseFormatChanged(_))
        ));
    }

    #[test]
    fn non_array_body_is_format_change() {
        assert!(matches!(
            parse_records("X", "t", json!({"error": "boom"})),
            Err(ProviderError::ResponseFormatChanged(_))
        ));
        assert!(matches!(
            parse_records("X", "t", json!([])),
            Err(ProviderError::EmptyResponse { .. })
        ));
    }

    #[test]
    fn yield_spread_forward_fills_gaps() {
        let rows = records(json!([
            {"日期": "2024-01-02", "中国国债收益率10年": 2.5, "美国国债收益率10年": 4.0},
            {"日期": "2024-01-03", "中国国债收益率10年": 2.6, "美国国债收益率10年": null},
            {"日期": "2024-01-04", "中国国债收益率10年": 2.4, "美国国债收益率10年": 3.9},
        ]));
        let spread = yield_leg(&rows, SpreadLeg::Spread).unwrap();
        assert_eq!(spread.values(), &[-1.5, -1.5, 2.4 - 3.9]);
        let us = yield_leg(&rows, SpreadLeg::Us10y).unwrap();
        assert_eq!(us.values(), &[4.0, 4.0, 3.9]);
        let cn = yield_leg(&rows, SpreadLeg::Cn10y).unwrap();
        assert_eq!(cn.values(), &[2.5, 2.6, 2.4]);
    }

    #[test]
    fn time_series_routes_have_no_dataset() {
        let route = Route::TimeSeries {
            ticker: "^GSPC".into(),
        };
        assert!(DatasetSpec::for_route(&route, d("2024-01-01"), d("2024-01-02")).is_none());
    }
}
