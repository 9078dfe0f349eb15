//! Flattens Windows XML Event Log records into tabular CSV rows.
//!
//! An EVTX record is a fixed `System` header plus a vendor-defined payload
//! (`EventData`/`UserData`) whose shape varies per provider. This crate turns
//! each record into a flat column→value mapping, reconciles the union of
//! columns seen across a whole batch into one header, and emits every record
//! against that header so the output is a single coherent CSV table.
//!
//! ```rust
//! let records = [
//!     r#"<Event><System><EventID>4624</EventID></System>
//!        <EventData><Data Name="IpAddress">10.0.0.1</Data></EventData></Event>"#,
//! ];
//!
//! let mut out = Vec::new();
//! let summary = evtx2csv::convert_to_csv(records, &mut out).unwrap();
//! assert_eq!(summary.records_written, 1);
//! ```
//!
//! Reading the binary `.evtx` container is delegated to the `evtx` crate;
//! the library boundary is a sequence of per-record XML strings.

pub mod converter;
pub mod err;
pub mod fixed_fields;
pub mod flat_row;
pub mod flatten;
pub mod schema;
pub mod xml_record;

pub use converter::{
    convert_to_csv, flatten_record, BatchFlattener, ConversionSummary, RecordFailure,
};
pub use err::{Error, Result};
pub use fixed_fields::FixedFields;
pub use flat_row::FlatRow;
pub use schema::{FrozenSchema, UnifiedSchema, BASE_COLUMNS};
pub use xml_record::{parse_record, XmlNode};
