//! RMB central parity rates scraped from the SAFE published HTML table.
//!
//! The page carries one table whose header row starts with `日期` followed by
//! one column per quoted currency (`美元`, `欧元`, ...). Values are CNY per
//! 100 units of the foreign currency.

use super::coerce::{parse_date_str, parse_f64_str};
use super::provider::{finish_points, http_client, send_once, DataProvider, ProviderError, Route};
use super::settings::FetchSettings;
use crate::series::Series;
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

const DATE_HEADER: &str = "日期";

/// Column header used for an ISO currency code on the parity table.
pub fn currency_header(code: &str) -> Option<&'static str> {
    let header = match code.to_ascii_uppercase().as_str() {
        "USD" => "美元",
        "EUR" => "欧元",
        "JPY" => "日元",
        "HKD" => "港元",
        "GBP" => "英镑",
        "AUD" => "澳大利亚元",
        "CAD" => "加拿大元",
        "CHF" => "瑞士法郎",
        _ => return None,
    };
    Some(header)
}

pub struct FxTableProvider {
    client: reqwest::blocking::Client,
    url: String,
    timeout: Duration,
    history_window: usize,
}

impl FxTableProvider {
    pub fn new(settings: &FetchSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(settings.request_timeout(), &settings.user_agent)?,
            url: settings.fx_table_url.clone(),
            timeout: settings.request_timeout(),
            history_window: settings.history_window,
        })
    }
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Parse the parity table for one currency column.
///
/// The first row containing a `日期` cell is taken as the header; every row
/// after it contributes a point when both its date and value parse.
pub fn parse_rate_table(
    html: &str,
    header: &str,
) -> Result<Vec<(NaiveDate, f64)>, ProviderError> {
    let document = Html::parse_document(html);
    let tr_selector = Selector::parse("tr")
        .map_err(|e| ProviderError::ResponseFormatChanged(format!("selector: {e:?}")))?;
    let cell_selector = Selector::parse("th, td")
        .map_err(|e| ProviderError::ResponseFormatChanged(format!("selector: {e:?}")))?;

    let mut rows = document
        .select(&tr_selector)
        .map(|tr| tr.select(&cell_selector).map(cell_text).collect::<Vec<_>>());

    let columns = rows
        .by_ref()
        .find(|cells| cells.iter().any(|c| c == DATE_HEADER))
        .ok_or_else(|| ProviderError::ResponseFormatChanged("no rate table header".into()))?;

    let date_idx = columns.iter().position(|c| c == DATE_HEADER).unwrap_or(0);
    let value_idx = columns.iter().position(|c| c == header).ok_or_else(|| {
        ProviderError::ResponseFormatChanged(format!("no '{header}' column in rate table"))
    })?;

    Ok(rows
        .filter_map(|cells| {
            let date = parse_date_str(cells.get(date_idx)?)?;
            let value = parse_f64_str(cells.get(value_idx)?)?;
            Some((date, value))
        })
        .collect())
}

impl DataProvider for FxTableProvider {
    fn name(&self) -> &str {
        "safe_fx_table"
    }

    fn fetch(&self, symbol: &str, route: &Route) -> Result<Series, ProviderError> {
        let Route::FxTable { currency } = route else {
            return Err(ProviderError::UnsupportedRoute {
                provider: self.name().to_string(),
                symbol: symbol.to_string(),
            });
        };
        let header = currency_header(currency).ok_or_else(|| ProviderError::SymbolNotFound {
            symbol: symbol.to_string(),
        })?;

        let resp = send_once(self.client.get(&self.url), self.name(), symbol, self.timeout)?;
        let html = resp
            .text()
            .map_err(|e| ProviderError::NetworkUnreachable(e.to_string()))?;

        let points = parse_rate_table(&html, header)?;
        finish_points(symbol, points, self.history_window)
    }
}
