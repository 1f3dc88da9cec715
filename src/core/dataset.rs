//! Assembly of the primary and secondary asset price tables

use crate::core::config::{AppConfig, PrimaryAssetConfig, SecondaryAssetConfig};
use crate::core::currency::{convert, relative_price};
use crate::core::price::{
    ChartDataProvider, ChartQuery, HistoricalPriceProvider, UnknownPairError, WEIGHTED_AVERAGE,
    WEIGHTED_PRICE,
};
use crate::core::table::{Table, merge_on_column};
use crate::store::DataStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveTime, Utc};
use thiserror::Error;
use tracing::{debug, instrument};

/// Why a secondary asset could not be priced.
#[derive(Debug, Error)]
pub enum SecondaryAssetError {
    #[error("Unknown asset code: {0}")]
    UnknownCode(String),
    #[error("Could not load data for {code}: {source}")]
    Unavailable {
        code: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// Builds secondary asset tables priced through the primary asset.
#[async_trait]
pub trait SecondaryAssetSource: Send + Sync {
    async fn secondary_dataset(
        &self,
        code: &str,
        primary: &Table,
    ) -> Result<Table, SecondaryAssetError>;
}

pub struct MarketData {
    store: DataStore,
    history: Box<dyn HistoricalPriceProvider>,
    charts: Box<dyn ChartDataProvider>,
    primary: PrimaryAssetConfig,
    secondary: SecondaryAssetConfig,
    price_column: String,
}

impl MarketData {
    pub fn new(
        config: &AppConfig,
        store: DataStore,
        history: Box<dyn HistoricalPriceProvider>,
        charts: Box<dyn ChartDataProvider>,
    ) -> Self {
        MarketData {
            store,
            history,
            charts,
            primary: config.primary.clone(),
            secondary: config.secondary.clone(),
            price_column: config.price_column(),
        }
    }

    pub fn price_column(&self) -> &str {
        &self.price_column
    }

    pub fn primary_name(&self) -> &str {
        &self.primary.name
    }

    /// Merges every exchange's weighted price, converted with the stored rate,
    /// into one table with the aggregate in [`MarketData::price_column`].
    ///
    /// `on_progress` is called once per exchange loaded, with a short status
    /// saying whether the dataset came from the cache.
    pub async fn primary_dataset(&self, on_progress: &(dyn Fn(&str) + Sync)) -> Result<Table> {
        let rate = self
            .store
            .read_rate()
            .context("Exchange rate is not available; refresh the cache first")?;
        debug!("Converting {} prices with rate {}", self.primary.name, rate);

        let mut tables = Vec::with_capacity(self.primary.exchanges.len());
        for exchange in &self.primary.exchanges {
            let code = self.primary.dataset_code(exchange);
            let fetch = |id: String| async move { self.history.fetch_history(&id).await };
            let (table, origin) = self.store.get_or_fetch(&code, fetch).await?;
            let converted = convert(&table, WEIGHTED_PRICE, rate)
                .with_context(|| format!("Dataset {code} has no '{WEIGHTED_PRICE}' column"))?;
            tables.push(converted);
            on_progress(&format!("{code} {origin}"));
        }

        let mut merged = merge_on_column(&tables, &self.primary.exchanges, WEIGHTED_PRICE)?;
        merged.mask_zeros();
        merged.add_row_mean(&self.price_column);
        debug!("Merged {} rows for {}", merged.len(), self.primary.name);
        Ok(merged)
    }

    fn chart_query(&self, pair: String) -> ChartQuery {
        let midnight = self.secondary.start_date.and_time(NaiveTime::default());
        ChartQuery {
            pair,
            start: midnight.and_utc(),
            end: Utc::now(),
            period_seconds: self.secondary.period_seconds,
        }
    }
}

fn normalize_code(code: &str) -> Option<String> {
    let code = code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(code.to_uppercase())
}

#[async_trait]
impl SecondaryAssetSource for MarketData {
    #[instrument(skip(self, primary))]
    async fn secondary_dataset(
        &self,
        code: &str,
        primary: &Table,
    ) -> Result<Table, SecondaryAssetError> {
        let code = normalize_code(code)
            .ok_or_else(|| SecondaryAssetError::UnknownCode(code.trim().to_string()))?;
        let pair = format!("{}_{}", self.secondary.pair_base, code);
        let query = self.chart_query(pair.clone());

        let (table, _) = self
            .store
            .get_or_fetch(&pair, |_| async { self.charts.fetch_chart(&query).await })
            .await
            .map_err(|e| {
                if e.downcast_ref::<UnknownPairError>().is_some() {
                    SecondaryAssetError::UnknownCode(code.clone())
                } else {
                    SecondaryAssetError::Unavailable {
                        code: code.clone(),
                        source: e.into(),
                    }
                }
            })?;

        relative_price(
            &table,
            WEIGHTED_AVERAGE,
            primary,
            &self.price_column,
            &self.price_column,
        )
        .map_err(|e| SecondaryAssetError::Unavailable {
            code,
            source: e.into(),
        })
    }
}
