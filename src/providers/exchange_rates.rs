use crate::core::currency::CurrencyRateProvider;
use crate::providers::util::{ensure_success, http_client, with_retry};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Latest reference rates from an exchangeratesapi.io compatible service.
pub struct ExchangeRatesProvider {
    base_url: String,
    retries: usize,
}

impl ExchangeRatesProvider {
    pub fn new(base_url: &str, retries: usize) -> Self {
        ExchangeRatesProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            retries,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    rates: HashMap<String, f64>,
}

#[async_trait]
impl CurrencyRateProvider for ExchangeRatesProvider {
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
        if from.eq_ignore_ascii_case(to) {
            return Ok(1.0);
        }

        let url = format!("{}/latest?base={}", self.base_url, from);
        debug!("Requesting currency rate from {}", url);

        let pair = format!("{from}{to}");
        let client = http_client()?;
        let response = with_retry(|| client.get(&url).send(), self.retries, 500)
            .await
            .with_context(|| format!("Failed to send request for currency pair: {pair}"))?;

        ensure_success(&response, &format!("currency pair: {pair}"))?;

        let text = response.text().await?;
        let data: LatestRatesResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", pair, e))?;

        data.rates
            .get(&to.to_uppercase())
            .copied()
            .ok_or_else(|| anyhow!("No rate data found for currency pair: {}", pair))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .and(query_param("base", "USD"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn test_successful_rate_fetch() {
        let body = r#"{"rates": {"CAD": 1.3456, "EUR": 0.91}, "base": "USD"}"#;
        let mock_server = create_mock_server(200, body).await;
        let provider = ExchangeRatesProvider::new(&mock_server.uri(), 0);

        let rate = provider
            .get_rate("USD", "CAD")
            .await
            .expect("Failed to get rate");
        assert_eq!(rate, 1.3456);
    }

    #[tokio::test]
    async fn test_no_currency_rate_found() {
        let body = r#"{"rates": {"EUR": 0.91}, "base": "USD"}"#;
        let mock_server = create_mock_server(200, body).await;
        let provider = ExchangeRatesProvider::new(&mock_server.uri(), 0);

        let result = provider.get_rate("USD", "CAD").await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "No rate data found for currency pair: USDCAD"
        );
    }

    #[tokio::test]
    async fn test_api_error_response() {
        let mock_server = create_mock_server(500, "").await;
        let provider = ExchangeRatesProvider::new(&mock_server.uri(), 0);

        let result = provider.get_rate("USD", "CAD").await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 500 Internal Server Error for currency pair: USDCAD"
        );
    }

    #[tokio::test]
    async fn test_same_currency_skips_request() {
        // No server behind this URL; a request would fail
        let provider = ExchangeRatesProvider::new("http://127.0.0.1:9", 0);
        assert_eq!(provider.get_rate("USD", "usd").await.unwrap(), 1.0);
    }
}
