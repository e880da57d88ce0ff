//! Data provider trait, symbol routing, and structured error types.
//!
//! The [`DataProvider`] trait abstracts over the three backing sources (Yahoo
//! chart API, the AKTools macro REST wrapper, the SAFE FX table) so the
//! fetcher can be driven by mocks in tests. Which adapter serves a symbol is
//! decided by [`Route::for_symbol`] from the symbol's naming convention.

use super::roster::symbols;
use crate::series::Series;
use std::time::Duration;
use thiserror::Error;

/// Structured error types for provider requests.
///
/// The fetcher never propagates these: a failed symbol degrades to an empty
/// series and the error is reported as a warning.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("HTTP {status} from {provider} for {symbol}")]
    HttpStatus {
        provider: String,
        symbol: String,
        status: u16,
    },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("empty response for {symbol}")]
    EmptyResponse { symbol: String },

    #[error("{provider} cannot serve {symbol}")]
    UnsupportedRoute { provider: String, symbol: String },

    #[error("http client setup failed: {0}")]
    Client(String),
}

/// Leg of the China/US 10-year yield dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadLeg {
    /// China 10Y minus US 10Y.
    Spread,
    Us10y,
    Cn10y,
}

/// Adapter selection for a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Generic historical-price time series (index, ETF or FX ticker).
    TimeSeries { ticker: String },
    /// RMB central parity scraped from an HTML table, by ISO currency code.
    FxTable { currency: String },
    MarginBalance,
    InterbankRate,
    YieldSpread(SpreadLeg),
    /// Exchange-listed fund close history by product code.
    EtfHistory { code: String },
    /// Foreign futures close history by contract code.
    FuturesHistory { contract: String },
    RollingPe,
}

/// Which backing source serves a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    TimeSeries,
    MacroApi,
    FxTable,
}

impl Route {
    /// Dispatch on the symbol's naming convention: prefixes first, then
    /// exact names, and the generic time-series source for everything else.
    pub fn for_symbol(symbol: &str) -> Route {
        if let Some(currency) = symbol.strip_prefix(symbols::FX_PREFIX) {
            return Route::FxTable {
                currency: currency.to_string(),
            };
        }
        if let Some(code) = symbol.strip_prefix(symbols::ETF_PREFIX) {
            return Route::EtfHistory {
                code: code.to_string(),
            };
        }
        match symbol {
            symbols::MARGIN_BALANCE => Route::MarginBalance,
            symbols::SHIBOR_1M => Route::InterbankRate,
            symbols::CN_US_SPREAD => Route::YieldSpread(SpreadLeg::Spread),
            symbols::US_BOND => Route::YieldSpread(SpreadLeg::Us10y),
            symbols::CN_BOND_10Y => Route::YieldSpread(SpreadLeg::Cn10y),
            symbols::SSE50_PE_TTM => Route::RollingPe,
            symbols::CRUDE_OIL | symbols::GOLD => Route::FuturesHistory {
                contract: symbol.to_string(),
            },
            _ => Route::TimeSeries {
                ticker: symbol.to_string(),
            },
        }
    }

    pub fn family(&self) -> ProviderFamily {
        match self {
            Route::TimeSeries { .. } => ProviderFamily::TimeSeries,
            Route::FxTable { .. } => ProviderFamily::FxTable,
            _ => ProviderFamily::MacroApi,
        }
    }
}

/// Trait for data providers.
///
/// Implementations request raw data from their source and return it already
/// unified: a date-sorted series with invalid dates and missing values
/// dropped, truncated to the configured history window. The cache sits above
/// this trait; providers don't know about it.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the series for `symbol`, routed as `route`. One attempt, no retry.
    fn fetch(&self, symbol: &str, route: &Route) -> Result<Series, ProviderError>;
}

/// Build the blocking HTTP client shared by the network adapters.
pub(crate) fn http_client(
    timeout: Duration,
    user_agent: &str,
) -> Result<reqwest::blocking::Client, ProviderError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| ProviderError::Client(e.to_string()))
}

/// Send a request once and map transport failures and non-2xx statuses.
pub(crate) fn send_once(
    request: reqwest::blocking::RequestBuilder,
    provider: &str,
    symbol: &str,
    timeout: Duration,
) -> Result<reqwest::blocking::Response, ProviderError> {
    let resp = request.send().map_err(|e| {
        if e.is_timeout() {
            ProviderError::Timeout {
                secs: timeout.as_secs(),
            }
        } else {
            ProviderError::NetworkUnreachable(e.to_string())
        }
    })?;

    let status = resp.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ProviderError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }
    if !status.is_success() {
        return Err(ProviderError::HttpStatus {
            provider: provider.to_string(),
            symbol: symbol.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(resp)
}

/// Unify parsed points: sort, dedup, drop NaN, keep the last `window` rows.
pub(crate) fn finish_points(
    symbol: &str,
    points: Vec<(chrono::NaiveDate, f64)>,
    window: usize,
) -> Result<Series, ProviderError> {
    let series = Series::from_points(points).drop_nan().tail(window);
    if series.is_empty() {
        return Err(ProviderError::EmptyResponse {
            symbol: symbol.to_string(),
        });
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_route_to_fx_and_etf() {
        assert_eq!(
            Route::for_symbol("FX_USD"),
            Route::FxTable {
                currency: "USD".into()
            }
        );
        assert_eq!(
            Route::for_symbol("ETF_510300"),
            Route::EtfHistory {
                code: "510300".into()
            }
        );
    }

    #[test]
    fn exact_names_route_to_macro_datasets() {
        assert_eq!(Route::for_symbol("MARGIN_BALANCE"), Route::MarginBalance);
        assert_eq!(Route::for_symbol("SHIBOR_1M"), Route::InterbankRate);
        assert_eq!(
            Route::for_symbol("US_BOND"),
            Route::YieldSpread(SpreadLeg::Us10y)
        );
        assert_eq!(
            Route::for_symbol("GC"),
            Route::FuturesHistory {
                contract: "GC".into()
            }
        );
        assert_eq!(Route::for_symbol("SSE50_PE_TTM").family(), ProviderFamily::MacroApi);
    }

    #[test]
    fn everything_else_is_time_series() {
        let route = Route::for_symbol("^GSPC");
        assert_eq!(route.family(), ProviderFamily::TimeSeries);
        assert_eq!(Route::for_symbol("CNY=X").family(), ProviderFamily::TimeSeries);
    }

    #[test]
    fn finish_points_rejects_all_nan() {
        let d = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let err = finish_points("X", vec![(d, f64::NAN)], 300).unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse { .. }));
    }

    #[test]
    fn finish_points_truncates_to_window() {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let points = (0..10)
            .map(|i| (start + chrono::Duration::days(i), i as f64))
            .collect();
        let s = finish_points("X", points, 3).unwrap();
        assert_eq!(s.values(), &[7.0, 8.0, 9.0]);
    }
}
