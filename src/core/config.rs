use anyhow::{Context, Result};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PrimaryAssetConfig {
    /// Display name used in prompts and chart titles
    pub name: String,
    /// Dataset prefix on the historical provider
    pub dataset_prefix: String,
    /// Currency the exchanges quote in
    pub quote_currency: String,
    pub exchanges: Vec<String>,
}

impl Default for PrimaryAssetConfig {
    fn default() -> Self {
        PrimaryAssetConfig {
            name: "bitcoin".to_string(),
            dataset_prefix: "BCHARTS".to_string(),
            quote_currency: "USD".to_string(),
            exchanges: ["KRAKEN", "BITFLYER", "BITSTAMP", "LAKE", "CEX"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl PrimaryAssetConfig {
    /// Historical dataset code for one exchange, e.g. `BCHARTS/KRAKENUSD`.
    pub fn dataset_code(&self, exchange: &str) -> String {
        format!("{}/{}{}", self.dataset_prefix, exchange, self.quote_currency)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SecondaryAssetConfig {
    /// Symbol of the primary asset on the chart provider, used as the pair base
    pub pair_base: String,
    pub start_date: NaiveDate,
    pub period_seconds: u64,
}

impl Default for SecondaryAssetConfig {
    fn default() -> Self {
        SecondaryAssetConfig {
            pair_base: "BTC".to_string(),
            start_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default(),
            period_seconds: 86400,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct QuandlProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PoloniexProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExchangeRatesProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProvidersConfig {
    pub quandl: Option<QuandlProviderConfig>,
    pub poloniex: Option<PoloniexProviderConfig>,
    pub exchange_rates: Option<ExchangeRatesProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            quandl: Some(QuandlProviderConfig {
                base_url: "https://www.quandl.com".to_string(),
                api_key: None,
            }),
            poloniex: Some(PoloniexProviderConfig {
                base_url: "https://poloniex.com".to_string(),
            }),
            exchange_rates: Some(ExchangeRatesProviderConfig {
                base_url: "https://api.exchangeratesapi.io".to_string(),
            }),
        }
    }
}

impl ProvidersConfig {
    pub fn quandl_base_url(&self) -> &str {
        self.quandl
            .as_ref()
            .map_or("https://www.quandl.com", |p| &p.base_url)
    }

    pub fn quandl_api_key(&self) -> Option<String> {
        self.quandl.as_ref().and_then(|p| p.api_key.clone())
    }

    pub fn poloniex_base_url(&self) -> &str {
        self.poloniex
            .as_ref()
            .map_or("https://poloniex.com", |p| &p.base_url)
    }

    pub fn exchange_rates_base_url(&self) -> &str {
        self.exchange_rates
            .as_ref()
            .map_or("https://api.exchangeratesapi.io", |p| &p.base_url)
    }
}

fn default_retries() -> usize {
    2
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Currency prices are shown in
    #[serde(default = "AppConfig::default_currency")]
    pub currency: String,
    #[serde(default)]
    pub primary: PrimaryAssetConfig,
    #[serde(default)]
    pub secondary: SecondaryAssetConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Directory for cached datasets and rate stamps
    pub data_path: Option<String>,
    /// Extra attempts for failed requests
    #[serde(default = "default_retries")]
    pub retries: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            currency: Self::default_currency(),
            primary: PrimaryAssetConfig::default(),
            secondary: SecondaryAssetConfig::default(),
            providers: ProvidersConfig::default(),
            data_path: None,
            retries: default_retries(),
        }
    }
}

impl AppConfig {
    fn default_currency() -> String {
        "CAD".to_string()
    }

    /// Loads the config at the default location, or defaults if there is none.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "coinchart", "coinchart")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    /// Data directory, relative to the working directory unless configured.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(self.data_path.as_deref().unwrap_or("data"))
    }

    /// Name of the aggregate price column, e.g. `price_cad`.
    pub fn price_column(&self) -> String {
        format!("price_{}", self.currency.to_lowercase())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").expect("Failed to deserialize");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.currency, "CAD");
        assert_eq!(config.price_column(), "price_cad");
        assert_eq!(config.data_path(), PathBuf::from("data"));
        assert_eq!(config.primary.exchanges.len(), 5);
        assert_eq!(config.primary.dataset_code("KRAKEN"), "BCHARTS/KRAKENUSD");
        assert_eq!(config.providers.poloniex_base_url(), "https://poloniex.com");
        assert_eq!(config.retries, 2);
    }

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
currency: "EUR"
data_path: "/tmp/coinchart"
retries: 0
primary:
  name: "Bitcoin"
  exchanges: ["KRAKEN", "BITSTAMP"]
secondary:
  start_date: 2017-06-01
  period_seconds: 14400
providers:
  quandl:
    base_url: "http://example.com/quandl"
    api_key: "abc123"
  poloniex:
    base_url: "http://example.com/polo"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.price_column(), "price_eur");
        assert_eq!(config.data_path(), PathBuf::from("/tmp/coinchart"));
        assert_eq!(config.retries, 0);

        assert_eq!(config.primary.name, "Bitcoin");
        assert_eq!(config.primary.exchanges, vec!["KRAKEN", "BITSTAMP"]);
        // Unset fields keep their defaults
        assert_eq!(config.primary.dataset_prefix, "BCHARTS");
        assert_eq!(config.secondary.pair_base, "BTC");
        assert_eq!(
            config.secondary.start_date,
            NaiveDate::from_ymd_opt(2017, 6, 1).unwrap()
        );
        assert_eq!(config.secondary.period_seconds, 14400);

        assert_eq!(
            config.providers.quandl_base_url(),
            "http://example.com/quandl"
        );
        assert_eq!(config.providers.quandl_api_key().as_deref(), Some("abc123"));
        assert_eq!(
            config.providers.poloniex_base_url(),
            "http://example.com/polo"
        );
        assert!(config.providers.exchange_rates.is_none());
        assert_eq!(
            config.providers.exchange_rates_base_url(),
            "https://api.exchangeratesapi.io"
        );
    }

    #[test]
    fn test_load_from_missing_path() {
        let result = AppConfig::load_from_path("/nonexistent/coinchart.yaml");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Failed to read config file"));
    }
}
