//! Two-pass batch conversion: flatten and discover the schema, then emit.
//!
//! Pass one parses and flattens every record, caching the resulting
//! [`FlatRow`]s in memory while the [`UnifiedSchema`] observes their columns.
//! Pass two freezes the schema and re-emits the cached rows against it, in
//! original record order, through the `csv` crate. Caching rows trades memory
//! for never re-parsing a record.

use crate::err::{Error, Result};
use crate::fixed_fields::FixedFields;
use crate::flat_row::FlatRow;
use crate::flatten::flatten_payload;
use crate::schema::UnifiedSchema;
use crate::xml_record::parse_record;

use log::{debug, warn};
use std::io::Write;

/// Flattens a single record's XML into its full per-record column mapping
/// (fixed fields plus dynamic payload fields).
pub fn flatten_record(xml: &str) -> Result<FlatRow> {
    let event = parse_record(xml)?;

    let mut row = FlatRow::new();
    FixedFields::from_event(&event).write_into(&mut row);
    flatten_payload(&event, &mut row);

    Ok(row)
}

/// A record that could not be flattened, reported with its position in the
/// input sequence. Never aborts the batch.
#[derive(Debug)]
pub struct RecordFailure {
    pub index: usize,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct ConversionSummary {
    pub records_written: usize,
    pub failures: Vec<RecordFailure>,
}

/// Accumulates a batch of records (pass one), then writes them out as CSV
/// against the unified schema (pass two).
#[derive(Debug, Default)]
pub struct BatchFlattener {
    rows: Vec<FlatRow>,
    schema: UnifiedSchema,
    failures: Vec<RecordFailure>,
    next_index: usize,
}

impl BatchFlattener {
    pub fn new() -> Self {
        BatchFlattener::default()
    }

    /// Flattens one record and feeds its columns to the schema. A malformed
    /// record is recorded as a failure and skipped; the batch continues.
    pub fn push_record(&mut self, xml: &str) {
        let index = self.next_index;
        self.next_index += 1;

        match flatten_record(xml) {
            Ok(row) => {
                let added = self.schema.observe(&row);
                if added > 0 {
                    debug!("record {index} contributed {added} new columns");
                }
                self.rows.push(row);
            }
            Err(error) => {
                warn!("skipping record {index}: {error}");
                self.failures.push(RecordFailure { index, error });
            }
        }
    }

    pub fn rows(&self) -> &[FlatRow] {
        &self.rows
    }

    pub fn failures(&self) -> &[RecordFailure] {
        &self.failures
    }

    /// Freezes the schema and writes the header plus every cached row, in
    /// input order, to `output`. Every emitted row has exactly as many values
    /// as the header.
    pub fn write_csv<W: Write>(self, output: W) -> Result<ConversionSummary> {
        let schema = self.schema.freeze();
        let mut writer = csv::Writer::from_writer(output);

        writer.write_record(schema.columns())?;

        for row in &self.rows {
            writer.write_record(schema.align(row))?;
        }
        writer.flush()?;

        Ok(ConversionSummary {
            records_written: self.rows.len(),
            failures: self.failures,
        })
    }
}

/// Converts a whole batch of record XML strings to CSV in one call.
pub fn convert_to_csv<I, S, W>(records: I, output: W) -> Result<ConversionSummary>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    W: Write,
{
    let mut batch = BatchFlattener::new();
    for record in records {
        batch.push_record(record.as_ref());
    }

    batch.write_csv(output)
}
