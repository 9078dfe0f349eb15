//! Accumulates the union of column names seen across a batch into one
//! ordered header.
//!
//! Order contract: the fixed base columns come first, then every dynamic
//! column in first-seen order under sequential observation. The accumulator
//! is append-only and dedup-checked; once frozen it can no longer grow, which
//! is what lets the output phase guarantee identical row widths.

use crate::flat_row::FlatRow;

use hashbrown::HashSet;
use log::warn;

/// Fixed columns every row carries, in output order.
pub const BASE_COLUMNS: [&str; 22] = [
    "EventID",
    "EventIDQualifiers",
    "Version",
    "TimeCreated",
    "Channel",
    "Computer",
    "Level",
    "LevelText",
    "Task",
    "Opcode",
    "Keywords",
    "Provider",
    "ProviderGUID",
    "EventRecordID",
    "Correlation_ActivityID",
    "Correlation_RelatedActivityID",
    "ProcessID",
    "ThreadID",
    "UserID",
    "EventData",
    "UserData_Raw",
    "Binary",
];

/// A single record contributing more new columns than this is logged as a
/// schema-inconsistency signal. Informational only.
const NEW_COLUMN_WARN_THRESHOLD: usize = 64;

#[derive(Debug)]
pub struct UnifiedSchema {
    columns: Vec<String>,
    seen: HashSet<String, ahash::RandomState>,
}

impl Default for UnifiedSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl UnifiedSchema {
    pub fn new() -> Self {
        let mut schema = UnifiedSchema {
            columns: Vec::with_capacity(BASE_COLUMNS.len()),
            seen: HashSet::default(),
        };

        for column in BASE_COLUMNS {
            schema.seen.insert(column.to_string());
            schema.columns.push(column.to_string());
        }

        schema
    }

    /// Appends every column of `row` not seen before, preserving the row's
    /// own order. Returns the number of columns added.
    pub fn observe(&mut self, row: &FlatRow) -> usize {
        let mut added = 0;

        for name in row.column_names() {
            if !self.seen.contains(name) {
                self.seen.insert(name.to_string());
                self.columns.push(name.to_string());
                added += 1;
            }
        }

        if added > NEW_COLUMN_WARN_THRESHOLD {
            warn!("a single record contributed {added} new columns to the schema");
        }

        added
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Ends the discovery phase. A frozen schema cannot grow.
    pub fn freeze(self) -> FrozenSchema {
        FrozenSchema {
            columns: self.columns,
        }
    }
}

/// The immutable header a whole batch is emitted against.
#[derive(Debug, Clone)]
pub struct FrozenSchema {
    columns: Vec<String>,
}

impl FrozenSchema {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Assembles a row against this schema: values in column order, with the
    /// empty string for every column the row does not carry. The output
    /// always has exactly `self.len()` values.
    pub fn align<'a>(&self, row: &'a FlatRow) -> Vec<&'a str> {
        self.columns
            .iter()
            .map(|column| row.get(column).unwrap_or(""))
            .collect()
    }
}
