use crate::core::price::{ChartDataProvider, ChartQuery, UnknownPairError, WEIGHTED_AVERAGE};
use crate::core::table::Table;
use crate::providers::util::{ensure_success, http_client, with_retry};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, instrument};

const CANDLE_COLUMNS: [&str; 7] = [
    "high",
    "low",
    "open",
    "close",
    "volume",
    "quoteVolume",
    WEIGHTED_AVERAGE,
];

/// Chart data from the Poloniex public `returnChartData` endpoint.
pub struct PoloniexProvider {
    base_url: String,
    retries: usize,
}

impl PoloniexProvider {
    pub fn new(base_url: &str, retries: usize) -> Self {
        PoloniexProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            retries,
        }
    }

    fn chart_url(&self, query: &ChartQuery) -> String {
        let pair = &query.pair;
        let start = query.start.timestamp();
        let end = query.end.timestamp();
        let period = query.period_seconds;
        let params = format!("currencyPair={pair}&start={start}&end={end}&period={period}");
        format!("{}/public?command=returnChartData&{params}", self.base_url)
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candle {
    date: i64,
    high: Option<f64>,
    low: Option<f64>,
    open: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
    quote_volume: Option<f64>,
    weighted_average: Option<f64>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum ChartResponse {
    Candles(Vec<Candle>),
    Error { error: String },
}

fn candles_to_table(pair: &str, candles: Vec<Candle>) -> Result<Table> {
    let mut table = Table::new(CANDLE_COLUMNS.iter().map(|c| c.to_string()).collect());
    for candle in candles {
        let date = Utc
            .timestamp_opt(candle.date, 0)
            .single()
            .ok_or_else(|| anyhow!("Invalid timestamp {} for pair {}", candle.date, pair))?
            .date_naive();
        let values = vec![
            candle.high,
            candle.low,
            candle.open,
            candle.close,
            candle.volume,
            candle.quote_volume,
            candle.weighted_average,
        ];
        table.insert_row(date, values)?;
    }
    Ok(table)
}

#[async_trait]
impl ChartDataProvider for PoloniexProvider {
    #[instrument(name = "PoloniexChartFetch", skip(self), fields(pair = %query.pair))]
    async fn fetch_chart(&self, query: &ChartQuery) -> Result<Table> {
        let url = self.chart_url(query);
        debug!("Requesting chart data from {}", url);

        let client = http_client()?;
        let response = with_retry(|| client.get(&url).send(), self.retries, 500)
            .await
            .with_context(|| format!("Failed to send request for pair: {}", query.pair))?;

        ensure_success(&response, &format!("pair: {}", query.pair))?;

        let text = response.text().await?;
        let data: ChartResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse chart response for {}: {}", query.pair, e))?;

        match data {
            ChartResponse::Candles(candles) => candles_to_table(&query.pair, candles),
            ChartResponse::Error { error } => {
                let err = UnknownPairError {
                    pair: query.pair.clone(),
                    reason: error,
                };
                Err(err.into())
            }
        }
    }
}
