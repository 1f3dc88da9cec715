use crate::core::price::HistoricalPriceProvider;
use crate::core::table::Table;
use crate::providers::util::{ensure_success, http_client, with_retry};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

/// Daily exchange history from the Quandl datasets API (e.g. `BCHARTS/KRAKENUSD`).
pub struct QuandlProvider {
    base_url: String,
    api_key: Option<String>,
    retries: usize,
}

impl QuandlProvider {
    pub fn new(base_url: &str, api_key: Option<String>, retries: usize) -> Self {
        QuandlProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            retries,
        }
    }
}

#[derive(Deserialize, Debug)]
struct QuandlResponse {
    dataset: QuandlDataset,
}

#[derive(Deserialize, Debug)]
struct QuandlDataset {
    column_names: Vec<String>,
    data: Vec<Vec<Value>>,
}

fn dataset_to_table(code: &str, dataset: QuandlDataset) -> Result<Table> {
    let (_, value_columns) = dataset
        .column_names
        .split_first()
        .ok_or_else(|| anyhow!("Dataset {} has no columns", code))?;

    let mut table = Table::new(value_columns.to_vec());
    for row in dataset.data {
        let (date, values) = row
            .split_first()
            .ok_or_else(|| anyhow!("Empty row in dataset {}", code))?;
        let date = date
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .ok_or_else(|| anyhow!("Invalid date {} in dataset {}", date, code))?;

        let mut parsed: Vec<Option<f64>> = values.iter().map(Value::as_f64).collect();
        parsed.resize(value_columns.len(), None);
        table.insert_row(date, parsed)?;
    }
    Ok(table)
}

#[async_trait]
impl HistoricalPriceProvider for QuandlProvider {
    #[instrument(name = "QuandlFetch", skip(self), fields(code = %code))]
    async fn fetch_history(&self, code: &str) -> Result<Table> {
        let url = format!("{}/api/v3/datasets/{}.json", self.base_url, code);
        debug!("Requesting dataset from {}", url);
        let mut target = Url::parse(&url).with_context(|| format!("Invalid URL: {url}"))?;
        if let Some(key) = &self.api_key {
            target.query_pairs_mut().append_pair("api_key", key);
        }

        let client = http_client()?;
        let response = with_retry(|| client.get(target.clone()).send(), self.retries, 500)
            .await
            .with_context(|| format!("Failed to send request for dataset: {code}"))?;

        ensure_success(&response, &format!("dataset: {code}"))?;

        let text = response.text().await?;
        let data: QuandlResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse dataset response for {}: {}", code, e))?;

        let table = dataset_to_table(code, data.dataset)?;
        debug!("Parsed {} rows for dataset {}", table.len(), code);
        Ok(table)
    }
}
