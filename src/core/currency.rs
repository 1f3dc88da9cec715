//! Currency conversion abstractions

use crate::core::table::{Table, TimeSeries};
use anyhow::{Result, anyhow};
use async_trait::async_trait;

#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64>;
}

/// Returns a copy of `table` with every value of `column` multiplied by `rate`.
pub fn convert(table: &Table, column: &str, rate: f64) -> Result<Table> {
    let mut converted = table.clone();
    converted.map_column(column, |v| v * rate)?;
    Ok(converted)
}

/// Prices a secondary asset through the primary one.
///
/// `secondary[secondary_column]` is the secondary asset's price in units of
/// the primary asset, so multiplying by the primary price gives the price in
/// the primary's currency. The result keeps the secondary table's dates.
pub fn relative_price(
    secondary: &Table,
    secondary_column: &str,
    primary: &Table,
    primary_column: &str,
    out_column: &str,
) -> Result<Table> {
    let ratio = secondary
        .column(secondary_column)
        .ok_or_else(|| anyhow!("Column '{}' not found", secondary_column))?;
    let anchor = primary
        .column(primary_column)
        .ok_or_else(|| anyhow!("Column '{}' not found", primary_column))?;

    let points = ratio
        .iter()
        .filter_map(|(date, r)| anchor.get(&date).map(|p| (date, r * p)));
    let priced = TimeSeries::from_points(out_column, points);

    let mut table = secondary.clone();
    table.assign(out_column, &priced);
    Ok(table)
}
