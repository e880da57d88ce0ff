//! Data acquisition: provider adapters, the bundle cache, and the fetcher.

pub mod cache;
pub mod coerce;
pub mod fetcher;
pub mod fx_table;
pub mod macro_api;
pub mod provider;
pub mod roster;
pub mod router;
pub mod settings;
pub mod yahoo;

pub use cache::{BundleCache, CacheError, CacheMeta, CacheStatus};
pub use fetcher::{DataFetcher, FetchSummary};
pub use provider::{DataProvider, ProviderError, ProviderFamily, Route, SpreadLeg};
pub use roster::{symbols, Roster};
pub use router::ProviderRouter;
pub use settings::FetchSettings;
