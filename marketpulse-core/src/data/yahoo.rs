//! Yahoo Finance time-series adapter.
//!
//! Fetches daily closes from Yahoo's v8 chart API. Serves every plain ticker
//! in the roster: indices, the 10Y yield, VIX, sector ETFs, and `CNY=X`.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes; a parse failure surfaces as `ResponseFormatChanged`.

use super::provider::{
    finish_points, http_client, send_once, DataProvider, ProviderError, Route,
};
use super::settings::FetchSettings;
use crate::series::Series;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    timeout: Duration,
    lookback_days: i64,
    history_window: usize,
}

impl YahooProvider {
    pub fn new(settings: &FetchSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(settings.request_timeout(), &settings.user_agent)?,
            base_url: settings.yahoo_base_url.trim_end_matches('/').to_string(),
            timeout: settings.request_timeout(),
            lookback_days: settings.lookback_days,
            history_window: settings.history_window,
        })
    }

    /// Build the chart API URL for a symbol and date range.
    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_hms_opt(0, 0, 0).map_or(0, |dt| dt.and_utc().timestamp());
        let end_ts = end
            .and_hms_opt(23, 59, 59)
            .map_or(0, |dt| dt.and_utc().timestamp());
        format!(
            "{}/v8/finance/chart/{}?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true",
            self.base_url,
            encode_symbol(symbol)
        )
    }
}

/// Percent-encode the characters Yahoo tickers use that are not path-safe.
fn encode_symbol(symbol: &str) -> String {
    symbol.replace('^', "%5E").replace('=', "%3D")
}

/// Parse the chart API response into (date, close) points. Adjusted close is
/// preferred when present; rows with neither are holidays and are skipped.
fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<(NaiveDate, f64)>, ProviderError> {
    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => ProviderError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(err) => {
            ProviderError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
        }
        None => ProviderError::ResponseFormatChanged("empty result with no error".into()),
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ResponseFormatChanged("result array is empty".into()))?;

    let Some(timestamps) = data.timestamp else {
        return Err(ProviderError::EmptyResponse {
            symbol: symbol.to_string(),
        });
    };

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ResponseFormatChanged("no quote data".into()))?;

    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let points = timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let date = chrono::DateTime::from_timestamp(ts, 0)?.date_naive();
            let adj = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());
            let close = adj.or_else(|| quote.close.get(i).copied().flatten())?;
            Some((date, close))
        })
        .collect();

    Ok(points)
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, symbol: &str, route: &Route) -> Result<Series, ProviderError> {
        let Route::TimeSeries { ticker } = route else {
            return Err(ProviderError::UnsupportedRoute {
                provider: self.name().to_string(),
                symbol: symbol.to_string(),
            });
        };

        let end = chrono::Utc::now().date_naive();
        let start = end - chrono::Duration::days(self.lookback_days);
        let url = self.chart_url(ticker, start, end);

        let resp = send_once(self.client.get(&url), self.name(), symbol, self.timeout)?;
        let chart: ChartResponse = resp.json().map_err(|e| {
            ProviderError::ResponseFormatChanged(format!(
                "failed to parse response for {symbol}: {e}"
            ))
        })?;

        let points = parse_response(symbol, chart)?;
        finish_points(symbol, points, self.history_window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Vec<(NaiveDate, f64)>, ProviderError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        parse_response("^GSPC", resp)
    }

    #[test]
    fn prefers_adjusted_close_and_skips_holidays() {
        let json = r#"{"chart":{"result":[{
            "timestamp":[1704205800,1704292200,1704378600],
            "indicators":{
                "quote":[{"close":[4742.8,null,4688.7]}],
                "adjclose":[{"adjclose":[4742.5,null,4688.5]}]
            }}],"error":null}}"#;
        let points = parse(json).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].0, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(points[0].1, 4742.5);
        assert_eq!(points[1].1, 4688.5);
    }

    #[test]
    fn falls_back_to_close_without_adjclose() {
        let json = r#"{"chart":{"result":[{
            "timestamp":[1704205800],
            "indicators":{"quote":[{"close":[17.5]}]}}],"error":null}}"#;
        assert_eq!(parse(json).unwrap()[0].1, 17.5);
    }

    #[test]
    fn not_found_error_maps_to_symbol_not_found() {
        let json = r#"{"chart":{"result":null,
            "error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        assert!(matches!(
            parse(json),
            Err(ProviderError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn missing_timestamps_is_empty_response() {
        let json = r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(matches!(parse(json), Err(ProviderError::EmptyResponse { .. })));
    }

    #[test]
    fn symbols_are_path_encoded() {
        assert_eq!(encode_symbol("^GSPC"), "%5EGSPC");
        assert_eq!(encode_symbol("CNY=X"), "CNY%3DX");
        assert_eq!(encode_symbol("QQQ"), "QQQ");
    }
}
