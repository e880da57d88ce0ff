//! MarketPulse core: series model, data acquisition, and market analysis.
//!
//! This crate holds everything below the presentation layer:
//! - The date-indexed [`Series`] and the symbol → series bundle
//! - Validation and min-max normalization guards
//! - Provider adapters behind the [`data::DataProvider`] trait, routed by symbol
//! - The single-file bundle cache and the fetch orchestrator
//! - The analyzer and its threshold-ladder regime classifiers
//! - The [`sink::EventSink`] capability for user-facing run events

pub mod analysis;
pub mod data;
pub mod series;
pub mod sink;
pub mod validation;

pub use series::{Series, SeriesBundle};
pub use validation::{normalize, percentile_rank, validate};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn series_types_are_send_sync() {
        assert_send::<Series>();
        assert_sync::<Series>();
        assert_send::<SeriesBundle>();
        assert_sync::<SeriesBundle>();
    }

    #[test]
    fn error_and_meta_types_are_send_sync() {
        assert_send::<data::ProviderError>();
        assert_sync::<data::ProviderError>();
        assert_send::<data::CacheMeta>();
        assert_sync::<data::CacheMeta>();
        assert_send::<analysis::AnalysisError>();
        assert_sync::<analysis::AnalysisError>();
    }

    #[test]
    fn thresholds_are_send_sync() {
        assert_send::<analysis::Thresholds>();
        assert_sync::<analysis::Thresholds>();
    }

    #[test]
    fn router_boxes_as_a_provider() {
        let router = data::ProviderRouter::from_settings(&data::FetchSettings::default()).unwrap();
        let provider: Box<dyn data::DataProvider> = Box::new(router);
        assert_eq!(provider.name(), "router");
    }
}
