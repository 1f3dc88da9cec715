pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::chart::{ChartRenderer, TerminalChart};
use crate::cli::driver::{Console, Driver, TerminalConsole};
use crate::cli::ui;
use crate::core::config::AppConfig;
use crate::core::dataset::MarketData;
use crate::core::invalidate::refresh_if_stale;
use crate::providers::{ExchangeRatesProvider, PoloniexProvider, QuandlProvider};
use crate::store::DataStore;
use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info};

/// Loads configuration and runs an interactive session on the terminal.
pub async fn run(config_path: Option<&str>, data_path: Option<&str>) -> Result<()> {
    info!("coinchart starting...");

    let mut config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    if let Some(path) = data_path {
        config.data_path = Some(path.to_string());
    }
    debug!("Loaded config: {config:#?}");

    let mut console = TerminalConsole::new();
    let mut chart = TerminalChart::new();
    let today = chrono::Local::now().date_naive();
    run_session(&config, &mut console, &mut chart, today).await
}

/// Refreshes the cache if needed, builds the primary dataset and hands
/// control to the menu loop.
pub async fn run_session(
    config: &AppConfig,
    console: &mut dyn Console,
    renderer: &mut dyn ChartRenderer,
    today: NaiveDate,
) -> Result<()> {
    let store = DataStore::open(config.data_path())?;
    let rates =
        ExchangeRatesProvider::new(config.providers.exchange_rates_base_url(), config.retries);
    let freshness = refresh_if_stale(
        &store,
        &rates,
        &config.primary.quote_currency,
        &config.currency,
        today,
    )
    .await?;
    debug!("Cache state: {freshness:?}");

    let history = QuandlProvider::new(
        config.providers.quandl_base_url(),
        config.providers.quandl_api_key(),
        config.retries,
    );
    let charts = PoloniexProvider::new(config.providers.poloniex_base_url(), config.retries);
    let market = MarketData::new(config, store, Box::new(history), Box::new(charts));

    let pb = ui::new_progress_bar(config.primary.exchanges.len() as u64);
    pb.set_message(format!("Loading {} prices...", market.primary_name()));
    let on_progress = |status: &str| {
        pb.println(status);
        pb.inc(1);
    };
    let primary = market.primary_dataset(&on_progress).await;
    pb.finish_and_clear();
    let primary = primary?;

    let mut driver = Driver::new(
        console,
        renderer,
        &market,
        primary,
        market.primary_name(),
        market.price_column(),
    );
    driver.run().await
}
