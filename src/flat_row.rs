//! The per-record flat mapping of column name to string value.

use hashbrown::HashMap as FastMap;

/// One record's worth of columns, in insertion order.
///
/// Inserting an existing column replaces its value in place (last-write-wins)
/// without disturbing the original position, mirroring how repeated
/// `EventData` names are reconciled within a single record.
#[derive(Debug, Clone, Default)]
pub struct FlatRow {
    columns: Vec<(String, String)>,
    index: FastMap<String, usize, ahash::RandomState>,
}

impl FlatRow {
    pub fn new() -> Self {
        FlatRow::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self.index.get(&name) {
            Some(&pos) => self.columns[pos].1 = value,
            None => {
                self.index.insert(name.clone(), self.columns.len());
                self.columns.push((name, value));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .map(|&pos| self.columns[pos].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
