//! Core business logic abstractions

pub mod config;
pub mod currency;
pub mod dataset;
pub mod invalidate;
pub mod log;
pub mod price;
pub mod table;

// Re-export main types for cleaner imports
pub use currency::CurrencyRateProvider;
pub use dataset::{MarketData, SecondaryAssetError, SecondaryAssetSource};
pub use price::{ChartDataProvider, ChartQuery, HistoricalPriceProvider, UnknownPairError};
pub use table::{Table, TimeSeries};
