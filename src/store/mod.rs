//! File-backed cache for downloaded datasets and the daily rate stamps

use crate::core::table::Table;
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use std::fmt;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const RATE_FILE: &str = "rate.txt";
const DATE_FILE: &str = "date.txt";

/// Where [`DataStore::get_or_fetch`] found a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Download,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Cache => write!(f, "loaded from cache"),
            Origin::Download => write!(f, "downloaded"),
        }
    }
}

/// Outcome of a [`DataStore::purge`] pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub removed: usize,
    pub failed: usize,
}

/// Datasets and stamps persisted under a single directory.
#[derive(Debug, Clone)]
pub struct DataStore {
    base: PathBuf,
}

impl DataStore {
    /// Opens the store at `path`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base = path.as_ref().to_path_buf();
        fs::create_dir_all(&base)
            .with_context(|| format!("Failed to create data directory: {}", base.display()))?;
        Ok(Self { base })
    }

    pub fn path(&self) -> &Path {
        &self.base
    }

    /// Path of the cache file for `identifier`.
    pub fn entry_path(&self, identifier: &str) -> PathBuf {
        let file = format!("{}.json", flatten_identifier(identifier));
        self.base.join(file)
    }

    /// Returns the cached table for `identifier`, or fetches and caches it.
    ///
    /// Any failure to read the cached entry counts as a miss.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        identifier: &str,
        fetch: F,
    ) -> Result<(Table, Origin)>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Table>>,
    {
        let path = self.entry_path(identifier);
        match self.load(&path) {
            Ok(table) => {
                info!("Loaded {} from cache", identifier);
                return Ok((table, Origin::Cache));
            }
            Err(e) => debug!("Cache MISS for {}: {}", identifier, e),
        }

        info!("Downloading {}", identifier);
        let table = fetch(identifier.to_string()).await?;

        let bytes = serde_json::to_vec(&table)?;
        fs::write(&path, bytes)
            .with_context(|| format!("Failed to write cache file: {}", path.display()))?;
        info!("Cached {} at {}", identifier, path.display());
        Ok((table, Origin::Download))
    }

    fn load(&self, path: &Path) -> Result<Table> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn read_rate(&self) -> Result<f64> {
        let path = self.base.join(RATE_FILE);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read exchange rate: {}", path.display()))?;
        text.trim()
            .parse::<f64>()
            .map_err(|e| anyhow!("Invalid exchange rate '{}': {}", text.trim(), e))
    }

    pub fn write_rate(&self, rate: f64) -> Result<()> {
        let path = self.base.join(RATE_FILE);
        fs::write(&path, rate.to_string())
            .with_context(|| format!("Failed to write exchange rate: {}", path.display()))
    }

    pub fn read_date(&self) -> Result<NaiveDate> {
        let path = self.base.join(DATE_FILE);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read date stamp: {}", path.display()))?;
        NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
            .with_context(|| format!("Invalid date stamp '{}'", text.trim()))
    }

    pub fn write_date(&self, date: NaiveDate) -> Result<()> {
        let path = self.base.join(DATE_FILE);
        fs::write(&path, date.format("%Y-%m-%d").to_string())
            .with_context(|| format!("Failed to write date stamp: {}", path.display()))
    }

    /// Entries in the data directory that the store did not write: anything
    /// other than `.json` cache files and the two stamp files.
    pub fn foreign_entries(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.base)
            .with_context(|| format!("Failed to list data directory: {}", self.base.display()))?;

        let mut foreign = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_file = fs::symlink_metadata(&path)?.is_file();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            let owned = name == RATE_FILE || name == DATE_FILE || name.ends_with(".json");
            if !(is_file && owned) {
                foreign.push(path);
            }
        }
        foreign.sort();
        Ok(foreign)
    }

    /// Deletes everything in the data directory. Individual failures are
    /// logged and counted but do not stop the pass.
    pub fn purge(&self) -> Result<PurgeReport> {
        let mut report = PurgeReport::default();
        let entries = fs::read_dir(&self.base)
            .with_context(|| format!("Failed to list data directory: {}", self.base.display()))?;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to read directory entry: {}", e);
                    report.failed += 1;
                    continue;
                }
            };
            let path = entry.path();
            // symlink_metadata so links are unlinked rather than followed
            let result = fs::symlink_metadata(&path).and_then(|meta| {
                if meta.is_dir() {
                    fs::remove_dir_all(&path)
                } else {
                    fs::remove_file(&path)
                }
            });
            match result {
                Ok(()) => {
                    debug!("Deleted {}", path.display());
                    report.removed += 1;
                }
                Err(e) => {
                    warn!("Failed to delete {}. Reason: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}

/// Maps an identifier to a flat file name by replacing separators.
pub fn flatten_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn sample_table() -> Table {
        let mut table = Table::new(vec!["Weighted Price".to_string()]);
        let day = NaiveDate::from_ymd_opt(2020, 5, 1).unwrap();
        table.insert_row(day, vec![Some(8800.5)]).unwrap();
        table
    }

    #[test]
    fn test_flatten_identifier() {
        assert_eq!(flatten_identifier("BCHARTS/KRAKENUSD"), "BCHARTS-KRAKENUSD");
        assert_eq!(flatten_identifier("BTC_ETH"), "BTC_ETH");
        assert_eq!(flatten_identifier("../a b"), "---a-b");
    }

    #[tokio::test]
    async fn test_second_fetch_hits_cache() {
        let dir = tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();
        let calls = AtomicUsize::new(0);

        let mut origins = Vec::new();
        for _ in 0..2 {
            let (table, origin) = store
                .get_or_fetch("BCHARTS/KRAKENUSD", |_| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(sample_table())
                })
                .await
                .unwrap();
            assert_eq!(table, sample_table());
            origins.push(origin);
        }

        assert_eq!(origins, vec![Origin::Download, Origin::Cache]);
        assert_eq!(Origin::Cache.to_string(), "loaded from cache");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("BCHARTS-KRAKENUSD.json").exists());
    }

    #[tokio::test]
    async fn test_fetch_receives_identifier() {
        let dir = tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();

        let (table, _) = store
            .get_or_fetch("BTC_ETH", |id| async move {
                assert_eq!(id, "BTC_ETH");
                Ok(sample_table())
            })
            .await
            .unwrap();
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_cached() {
        let dir = tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();

        let result = store
            .get_or_fetch("BTC_NOPE", |_| async { Err(anyhow!("network down")) })
            .await;
        assert!(result.is_err());
        assert!(!store.entry_path("BTC_NOPE").exists());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_refetched() {
        let dir = tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();
        fs::write(store.entry_path("BTC_LTC"), b"not json").unwrap();

        let (table, origin) = store
            .get_or_fetch("BTC_LTC", |_| async { Ok(sample_table()) })
            .await
            .unwrap();
        assert_eq!(table, sample_table());
        assert_eq!(origin, Origin::Download);

        let (cached, _) = store
            .get_or_fetch("BTC_LTC", |_| async { Err(anyhow!("should not fetch")) })
            .await
            .unwrap();
        assert_eq!(cached, sample_table());
    }

    #[test]
    fn test_stamps_round_trip() {
        let dir = tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();

        assert!(store.read_rate().is_err());
        assert!(store.read_date().is_err());

        store.write_rate(1.3521).unwrap();
        store
            .write_date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
            .unwrap();

        assert_eq!(store.read_rate().unwrap(), 1.3521);
        assert_eq!(
            fs::read_to_string(dir.path().join("date.txt")).unwrap(),
            "2024-02-29"
        );
        assert_eq!(
            store.read_date().unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn test_purge_removes_files_and_directories() {
        let dir = tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();

        fs::write(dir.path().join("a.json"), b"{}").unwrap();
        fs::write(dir.path().join("rate.txt"), b"1.2").unwrap();
        fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
        fs::write(dir.path().join("nested/deeper/file"), b"x").unwrap();

        let report = store.purge().unwrap();
        assert_eq!((report.removed, report.failed), (3, 0));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(dir.path().exists());
    }

    #[test]
    fn test_foreign_entries_ignores_cache_and_stamps() {
        let dir = tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();
        assert!(store.foreign_entries().unwrap().is_empty());

        fs::write(store.entry_path("BCHARTS/CEXUSD"), b"{}").unwrap();
        store.write_rate(1.2).unwrap();
        fs::write(dir.path().join("date.txt"), b"garbage").unwrap();
        assert!(store.foreign_entries().unwrap().is_empty());

        fs::write(dir.path().join("thesis.tex"), b"draft").unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        let foreign = store.foreign_entries().unwrap();
        let expected = vec![dir.path().join("src"), dir.path().join("thesis.tex")];
        assert_eq!(foreign, expected);
    }

    #[cfg(unix)]
    #[test]
    fn test_purge_unlinks_symlinks_without_following() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let target = outside.path().join("keep.txt");
        fs::write(&target, b"keep").unwrap();

        let store = DataStore::open(dir.path()).unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let report = store.purge().unwrap();
        assert_eq!(report.removed, 1);
        assert!(target.exists());
    }
}
