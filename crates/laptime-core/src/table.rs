//! Immutable per-driver result collections.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{AnalysisError, Result};
use crate::models::DriverNumber;

/// A result entity that belongs to exactly one driver.
pub trait DriverKeyed {
    fn driver(&self) -> DriverNumber;
}

/// Accumulates validated per-driver entities one at a time.
#[derive(Debug)]
pub struct DriverTableBuilder<T> {
    entries: BTreeMap<DriverNumber, T>,
}

impl<T: DriverKeyed> DriverTableBuilder<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Append `entry`, rejecting a second entry for the same driver.
    pub fn push(&mut self, entry: T) -> Result<()> {
        let driver = entry.driver();
        if self.entries.contains_key(&driver) {
            return Err(AnalysisError::DuplicateDriver(driver));
        }
        self.entries.insert(driver, entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze the accumulated entries, ordered by ascending driver number.
    pub fn build(self) -> DriverTable<T> {
        DriverTable {
            rows: self.entries.into_values().collect(),
        }
    }
}

impl<T: DriverKeyed> Default for DriverTableBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-driver results ordered by ascending driver number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DriverTable<T> {
    rows: Vec<T>,
}

impl<T: DriverKeyed> DriverTable<T> {
    /// Look up the entry for `driver`.
    pub fn get(&self, driver: DriverNumber) -> Option<&T> {
        self.rows
            .binary_search_by_key(&driver, DriverKeyed::driver)
            .ok()
            .map(|i| &self.rows[i])
    }

    pub fn contains(&self, driver: DriverNumber) -> bool {
        self.get(driver).is_some()
    }

    pub fn drivers(&self) -> impl Iterator<Item = DriverNumber> + '_ {
        self.rows.iter().map(DriverKeyed::driver)
    }
}

impl<T> DriverTable<T> {
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.rows
    }
}

impl<T> Default for DriverTable<T> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<'a, T> IntoIterator for &'a DriverTable<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Entry {
        driver: DriverNumber,
        value: f64,
    }

    impl DriverKeyed for Entry {
        fn driver(&self) -> DriverNumber {
            self.driver
        }
    }

    fn entry(driver: DriverNumber, value: f64) -> Entry {
        Entry { driver, value }
    }

    #[test]
    fn test_builder_orders_by_driver() {
        let mut builder = DriverTableBuilder::new();
        builder.push(entry(55, 1.0)).unwrap();
        builder.push(entry(2, 2.0)).unwrap();
        builder.push(entry(13, 3.0)).unwrap();
        let table = builder.build();

        assert_eq!(table.drivers().collect::<Vec<_>>(), vec![2, 13, 55]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_builder_rejects_duplicate_driver() {
        let mut builder = DriverTableBuilder::new();
        builder.push(entry(7, 1.0)).unwrap();
        let err = builder.push(entry(7, 2.0)).unwrap_err();
        assert!(matches!(err, AnalysisError::DuplicateDriver(7)));
        // The first entry is kept untouched.
        assert_eq!(builder.build().get(7).map(|e| e.value), Some(1.0));
    }

    #[test]
    fn test_table_get_missing_driver() {
        let mut builder = DriverTableBuilder::new();
        builder.push(entry(3, 1.0)).unwrap();
        let table = builder.build();
        assert!(table.get(4).is_none());
        assert!(table.contains(3));
    }

    #[test]
    fn test_empty_table() {
        let table: DriverTable<Entry> = DriverTableBuilder::new().build();
        assert!(table.is_empty());
        assert_eq!(table.iter().count(), 0);
    }
}
