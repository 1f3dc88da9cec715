//! Daily invalidation of the dataset cache

use crate::core::currency::CurrencyRateProvider;
use crate::store::{DataStore, PurgeReport};
use anyhow::{Result, bail};
use chrono::NaiveDate;
use tracing::{debug, info};

/// State of the cache after a [`refresh_if_stale`] check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Freshness {
    /// Stamp matched today; nothing was touched
    Fresh,
    /// Cache was purged and the rate re-fetched
    Refreshed { rate: f64 },
}

/// Purges the cache and refreshes the rate stamp unless it was written `today`.
///
/// A missing or unreadable date stamp counts as stale. Without a stamp the
/// directory is only cleared if everything in it was written by the store, so
/// pointing the data path at an existing directory fails instead of wiping it.
pub async fn refresh_if_stale(
    store: &DataStore,
    rates: &dyn CurrencyRateProvider,
    base_currency: &str,
    target_currency: &str,
    today: NaiveDate,
) -> Result<Freshness> {
    match store.read_date() {
        Ok(stamp) if stamp == today => {
            debug!("Cache stamp {} is current", stamp);
            return Ok(Freshness::Fresh);
        }
        Ok(stamp) => info!("Cache stamp {} is older than {}, refreshing", stamp, today),
        Err(e) => {
            if let Some(first) = store.foreign_entries()?.first() {
                let dir = store.path().display();
                let first = first.display();
                bail!("Refusing to clear {dir}: no date stamp and it holds {first}");
            }
            info!("No usable cache stamp ({}), refreshing", e);
        }
    }

    let PurgeReport { removed, failed } = store.purge()?;
    let dir = store.path().display();
    debug!("Purged {removed} entries from {dir} ({failed} failures)");

    let rate = rates.get_rate(base_currency, target_currency).await?;
    store.write_rate(rate)?;
    store.write_date(today)?;
    info!("Stored {base_currency}{target_currency} rate {rate} for {today}");

    Ok(Freshness::Refreshed { rate })
}
