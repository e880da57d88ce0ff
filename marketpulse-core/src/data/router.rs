//! Dispatches each route to the provider family that serves it.

use super::fx_table::FxTableProvider;
use super::macro_api::MacroApiProvider;
use super::provider::{DataProvider, ProviderError, ProviderFamily, Route};
use super::settings::FetchSettings;
use super::yahoo::YahooProvider;
use crate::series::Series;

/// A [`DataProvider`] composed of one provider per family.
pub struct ProviderRouter {
    time_series: Box<dyn DataProvider>,
    macro_api: Box<dyn DataProvider>,
    fx_table: Box<dyn DataProvider>,
}

impl ProviderRouter {
    pub fn new(
        time_series: Box<dyn DataProvider>,
        macro_api: Box<dyn DataProvider>,
        fx_table: Box<dyn DataProvider>,
    ) -> Self {
        Self {
            time_series,
            macro_api,
            fx_table,
        }
    }

    /// The network-backed router used by the CLI.
    pub fn from_settings(settings: &FetchSettings) -> Result<Self, ProviderError> {
        Ok(Self::new(
            Box::new(YahooProvider::new(settings)?),
            Box::new(MacroApiProvider::new(settings)?),
            Box::new(FxTableProvider::new(settings)?),
        ))
    }

    fn provider_for(&self, route: &Route) -> &dyn DataProvider {
        match route.family() {
            ProviderFamily::TimeSeries => self.time_series.as_ref(),
            ProviderFamily::MacroApi => self.macro_api.as_ref(),
            ProviderFamily::FxTable => self.fx_table.as_ref(),
        }
    }
}

impl DataProvider for ProviderRouter {
    fn name(&self) -> &str {
        "router"
    }

    fn fetch(&self, symbol: &str, route: &Route) -> Result<Series, ProviderError> {
        let provider = self.provider_for(route);
        tracing::debug!(symbol, provider = provider.name(), "fetching");
        provider.fetch(symbol, route)
    }
}
