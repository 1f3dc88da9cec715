//! Date-indexed price tables and the merge helpers built on them

use anyhow::{Result, anyhow, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named series of values keyed by calendar date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub name: String,
    points: BTreeMap<NaiveDate, f64>,
}

impl TimeSeries {
    pub fn from_points<I>(name: &str, points: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        Self {
            name: name.to_string(),
            points: points.into_iter().collect(),
        }
    }

    pub fn get(&self, date: &NaiveDate) -> Option<f64> {
        self.points.get(date).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterates in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points.iter().map(|(d, v)| (*d, *v))
    }
}

/// A table of optional values with one row per date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: BTreeMap<NaiveDate, Vec<Option<f64>>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: BTreeMap::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Inserts or replaces the row for `date`. The row must have one value per column.
    pub fn insert_row(&mut self, date: NaiveDate, values: Vec<Option<f64>>) -> Result<()> {
        let (got, want) = (values.len(), self.columns.len());
        if got != want {
            bail!("Row for {date} has {got} values but the table has {want} columns");
        }
        self.rows.insert(date, values);
        Ok(())
    }

    pub fn value(&self, date: &NaiveDate, column: &str) -> Option<f64> {
        let index = self.column_index(column)?;
        self.rows.get(date).and_then(|row| row[index])
    }

    /// Returns the non-missing values of a column, or `None` if the column does not exist.
    pub fn column(&self, name: &str) -> Option<TimeSeries> {
        let index = self.column_index(name)?;
        let points = self
            .rows
            .iter()
            .filter_map(|(date, row)| row[index].map(|v| (*date, v)));
        Some(TimeSeries::from_points(name, points))
    }

    /// Assigns `series` to column `name` on the dates already in the table.
    /// Dates of `series` outside the table are ignored; table dates missing
    /// from `series` become missing values.
    pub fn assign(&mut self, name: &str, series: &TimeSeries) {
        let index = self.ensure_column(name);
        for (date, row) in self.rows.iter_mut() {
            row[index] = series.get(date);
        }
    }

    /// Adds `series` as column `name`, creating rows for any new dates.
    pub fn join(&mut self, name: &str, series: &TimeSeries) {
        let index = self.ensure_column(name);
        let width = self.columns.len();
        for (date, value) in series.iter() {
            let row = self.rows.entry(date).or_insert_with(|| vec![None; width]);
            row[index] = Some(value);
        }
    }

    /// Applies `f` to every present value of a column.
    pub fn map_column<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: Fn(f64) -> f64,
    {
        let index = self
            .column_index(name)
            .ok_or_else(|| anyhow!("Column '{}' not found", name))?;
        for row in self.rows.values_mut() {
            if let Some(v) = row[index] {
                row[index] = Some(f(v));
            }
        }
        Ok(())
    }

    /// Treats exact zeros as missing readings across every column.
    ///
    /// Upstream feeds report days without trades as zero. A genuine price of
    /// zero would be dropped too; revisit if a feed can legitimately report it.
    pub fn mask_zeros(&mut self) {
        for row in self.rows.values_mut() {
            for value in row.iter_mut() {
                if *value == Some(0.0) {
                    *value = None;
                }
            }
        }
    }

    /// Appends column `name` holding the per-row mean of all current columns,
    /// ignoring missing values. Rows with no values get a missing mean.
    pub fn add_row_mean(&mut self, name: &str) {
        let index = self.ensure_column(name);
        for row in self.rows.values_mut() {
            let present: Vec<f64> = row
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .filter_map(|(_, v)| *v)
                .collect();
            row[index] = if present.is_empty() {
                None
            } else {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            };
        }
    }

    fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(index) = self.column_index(name) {
            return index;
        }
        self.columns.push(name.to_string());
        for row in self.rows.values_mut() {
            row.push(None);
        }
        self.columns.len() - 1
    }
}

/// Builds a table with column `labels[i]` taken from `tables[i][column]`,
/// outer-joined on date.
pub fn merge_on_column(tables: &[Table], labels: &[String], column: &str) -> Result<Table> {
    let (count, names) = (tables.len(), labels.len());
    if count != names {
        bail!("Cannot merge {count} tables with {names} labels");
    }

    let mut merged = Table::new(Vec::new());
    for (table, label) in tables.iter().zip(labels) {
        let series = table
            .column(column)
            .ok_or_else(|| anyhow!("Column '{}' not found in dataset {}", column, label))?;
        merged.join(label, &series);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, d).unwrap()
    }

    fn single_column(name: &str, values: &[(u32, f64)]) -> Table {
        let mut table = Table::new(vec![name.to_string()]);
        for (d, v) in values {
            table.insert_row(day(*d), vec![Some(*v)]).unwrap();
        }
        table
    }

    #[test]
    fn test_merge_masks_zeros_before_mean() {
        let a = single_column("Weighted Price", &[(1, 1.0), (2, 0.0), (3, 3.0)]);
        let b = single_column("Weighted Price", &[(1, 2.0), (2, 2.0), (3, 0.0)]);
        let c = single_column("Weighted Price", &[(1, 3.0), (2, 4.0), (3, 5.0)]);
        let labels = vec!["A".to_string(), "B".to_string(), "C".to_string()];

        let mut merged = merge_on_column(&[a, b, c], &labels, "Weighted Price").unwrap();
        merged.mask_zeros();
        merged.add_row_mean("price");

        let mean = merged.column("price").unwrap();
        let values: Vec<f64> = mean.iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
        assert_eq!(merged.value(&day(2), "A"), None);
    }

    #[test]
    fn test_merge_is_an_outer_join() {
        let a = single_column("close", &[(1, 10.0), (2, 20.0)]);
        let b = single_column("close", &[(2, 30.0), (3, 40.0)]);
        let labels = vec!["A".to_string(), "B".to_string()];

        let mut merged = merge_on_column(&[a, b], &labels, "close").unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.value(&day(1), "B"), None);
        assert_eq!(merged.value(&day(3), "A"), None);

        merged.add_row_mean("mean");
        assert_eq!(merged.value(&day(1), "mean"), Some(10.0));
        assert_eq!(merged.value(&day(2), "mean"), Some(25.0));
        assert_eq!(merged.value(&day(3), "mean"), Some(40.0));
    }

    #[test]
    fn test_row_mean_missing_when_all_sources_zero() {
        let a = single_column("close", &[(1, 0.0)]);
        let b = single_column("close", &[(1, 0.0)]);
        let labels = vec!["A".to_string(), "B".to_string()];

        let mut merged = merge_on_column(&[a, b], &labels, "close").unwrap();
        merged.mask_zeros();
        merged.add_row_mean("mean");
        assert_eq!(merged.value(&day(1), "mean"), None);
        assert!(merged.column("mean").unwrap().is_empty());
    }

    #[test]
    fn test_merge_rejects_missing_column() {
        let a = single_column("close", &[(1, 1.0)]);
        let result = merge_on_column(&[a], &["A".to_string()], "Weighted Price");
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "Column 'Weighted Price' not found in dataset A"
        );
    }

    #[test]
    fn test_merge_rejects_label_mismatch() {
        let a = single_column("close", &[(1, 1.0)]);
        assert!(merge_on_column(&[a], &[], "close").is_err());
    }

    #[test]
    fn test_assign_aligns_on_existing_dates() {
        let mut table = single_column("rate", &[(1, 0.5), (2, 0.25)]);
        let other = TimeSeries::from_points("x", [(day(2), 8.0), (day(3), 9.0)]);

        table.assign("x", &other);
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(&day(1), "x"), None);
        assert_eq!(table.value(&day(2), "x"), Some(8.0));
    }

    #[test]
    fn test_insert_row_checks_width() {
        let mut table = Table::new(vec!["a".to_string(), "b".to_string()]);
        assert!(table.insert_row(day(1), vec![Some(1.0)]).is_err());
        assert!(table.insert_row(day(1), vec![Some(1.0), None]).is_ok());
    }

    #[test]
    fn test_map_column_skips_missing_values() {
        let mut table = Table::new(vec!["a".to_string()]);
        table.insert_row(day(1), vec![Some(2.0)]).unwrap();
        table.insert_row(day(2), vec![None]).unwrap();

        table.map_column("a", |v| v * 3.0).unwrap();
        assert_eq!(table.value(&day(1), "a"), Some(6.0));
        assert_eq!(table.value(&day(2), "a"), None);
        assert!(table.map_column("missing", |v| v).is_err());
    }
}
