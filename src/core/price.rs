//! Price history abstractions

use crate::core::table::Table;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Column holding the volume-weighted daily price in historical datasets.
pub const WEIGHTED_PRICE: &str = "Weighted Price";

/// Column holding the volume-weighted price in chart data.
pub const WEIGHTED_AVERAGE: &str = "weightedAverage";

/// Query for a sampled chart of a trading pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartQuery {
    pub pair: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period_seconds: u64,
}

/// Raised when a chart provider does not know the requested pair.
#[derive(Debug, Clone, Error)]
#[error("Unknown currency pair {pair}: {reason}")]
pub struct UnknownPairError {
    pub pair: String,
    pub reason: String,
}

/// Fetches daily price history for a provider-specific dataset code.
#[async_trait]
pub trait HistoricalPriceProvider: Send + Sync {
    async fn fetch_history(&self, code: &str) -> Result<Table>;
}

/// Fetches sampled chart data for a trading pair.
#[async_trait]
pub trait ChartDataProvider: Send + Sync {
    async fn fetch_chart(&self, query: &ChartQuery) -> Result<Table>;
}
