//! Static game data consumed by formulas.
//!
//! `GameData` holds tuning constants and reference tables (monster base
//! stats, minion tables, ...). It is loaded once from JSON and only read
//! afterwards. Missing entries come back as `None`; formulas degrade to a
//! neutral value instead of failing.

use crate::error::StatError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// One row of a reference table, keyed by column name.
///
/// # Examples
///
/// ```rust
/// use vstat::data::DataRow;
///
/// let row = DataRow::from_iter([("life", 120.0), ("armour", 30.0)]);
/// assert_eq!(row.get("life"), Some(120.0));
/// assert_eq!(row.get("evasion"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataRow(BTreeMap<String, f64>);

impl DataRow {
    /// Read one column of the row.
    pub fn get(&self, column: &str) -> Option<f64> {
        self.0.get(column).copied()
    }

    /// Iterate the columns in name order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for DataRow {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Constants and reference tables shared by every evaluation context.
///
/// The JSON layout is:
///
/// ```json
/// {
///   "constants": { "globals": { "legacy_leech_effectiveness": 60.0 } },
///   "tables": { "minions": { "zombie": { "life": 150.0 } } }
/// }
/// ```
///
/// Both sections are optional.
///
/// # Examples
///
/// ```rust
/// use vstat::GameData;
///
/// let data = GameData::from_json_str(
///     r#"{ "constants": { "globals": { "max_charges": 3 } } }"#,
/// ).unwrap();
///
/// assert_eq!(data.constant("globals", "max_charges"), Some(3.0));
/// assert_eq!(data.constant("globals", "missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameData {
    #[serde(default)]
    constants: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(default)]
    tables: BTreeMap<String, BTreeMap<String, DataRow>>,
}

static EMPTY: GameData = GameData {
    constants: BTreeMap::new(),
    tables: BTreeMap::new(),
};

impl GameData {
    /// Create an empty data set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A shared empty data set, used when an evaluator is given no data.
    pub fn empty() -> &'static GameData {
        &EMPTY
    }

    /// Parse game data from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, StatError> {
        let data: GameData = serde_json::from_str(json)?;
        data.log_loaded();
        Ok(data)
    }

    /// Parse game data from a JSON reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, StatError> {
        let data: GameData = serde_json::from_reader(reader)?;
        data.log_loaded();
        Ok(data)
    }

    fn log_loaded(&self) {
        tracing::debug!(
            constant_tables = self.constants.len(),
            reference_tables = self.tables.len(),
            "loaded game data"
        );
    }

    /// Set a constant, replacing any previous value.
    pub fn with_constant(
        mut self,
        table: impl Into<String>,
        key: impl Into<String>,
        value: f64,
    ) -> Self {
        self.constants
            .entry(table.into())
            .or_default()
            .insert(key.into(), value);
        self
    }

    /// Add or replace a reference table row.
    ///
    /// # Arguments
    ///
    /// * `table` - Reference table name
    /// * `key` - Row key within the table
    /// * `row` - The row's columns
    pub fn with_row(
        mut self,
        table: impl Into<String>,
        key: impl Into<String>,
        row: DataRow,
    ) -> Self {
        self.tables
            .entry(table.into())
            .or_default()
            .insert(key.into(), row);
        self
    }

    /// Read a tuning constant.
    pub fn constant(&self, table: &str, key: &str) -> Option<f64> {
        self.constants.get(table)?.get(key).copied()
    }

    /// Look up a reference table row.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use vstat::data::DataRow;
    /// use vstat::GameData;
    ///
    /// let zombie = DataRow::from_iter([("life", 150.0)]);
    /// let data = GameData::new().with_row("minions", "zombie", zombie);
    ///
    /// let life = data
    ///     .lookup("minions", "zombie")
    ///     .and_then(|row| row.get("life"))
    ///     .unwrap_or(0.0);
    /// assert_eq!(life, 150.0);
    /// assert!(data.lookup("minions", "skeleton").is_none());
    /// ```
    pub fn lookup(&self, table: &str, key: &str) -> Option<&DataRow> {
        self.tables.get(table)?.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sections_default_to_empty() {
        let data = GameData::from_json_str("{}").unwrap();
        assert_eq!(data, GameData::new());
        assert_eq!(data.constant("globals", "x"), None);
        assert!(data.lookup("minions", "zombie").is_none());
    }

    #[test]
    fn test_lookup_row() {
        let json = r#"{
            "tables": { "minions": { "zombie": { "life": 150.0, "armour": 20 } } }
        }"#;
        let data = GameData::from_json_str(json).unwrap();
        let row = data.lookup("minions", "zombie").unwrap();
        assert_eq!(row.get("life"), Some(150.0));
        assert_eq!(row.get("armour"), Some(20.0));
        assert!(data.lookup("minions", "skeleton").is_none());
        let columns: Vec<_> = row.columns().collect();
        assert_eq!(columns, vec![("armour", 20.0), ("life", 150.0)]);
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let result = GameData::from_json_str(r#"{ "constants": 5 }"#);
        assert!(matches!(result, Err(StatError::InvalidData(_))));
    }

    #[test]
    fn test_from_reader() {
        let json = br#"{ "constants": { "globals": { "a": 1.5 } } }"#;
        let data = GameData::from_reader(&json[..]).unwrap();
        assert_eq!(data.constant("globals", "a"), Some(1.5));
    }

    #[test]
    fn test_builders() {
        let data = GameData::new()
            .with_constant("globals", "a", 2.0)
            .with_constant("globals", "a", 3.0)
            .with_row("minions", "zombie", DataRow::from_iter([("life", 10.0)]));
        assert_eq!(data.constant("globals", "a"), Some(3.0));
        assert_eq!(
            data.lookup("minions", "zombie").and_then(|r| r.get("life")),
            Some(10.0)
        );
        assert!(GameData::empty().constant("globals", "a").is_none());
    }
}
