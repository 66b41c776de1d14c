//! Input side of the pipeline.
//!
//! - [`discovery`]: find the files in a folder that become tables
//! - [`csv`]: parse one delimited file into typed rows
//! - [`observability`]: observer hooks for per-table outcomes

pub mod csv;
pub mod discovery;
pub mod observability;

pub use csv::{parse_csv_from_path, parse_csv_from_reader, read_table, ParseOptions};
pub use discovery::{discover_tables, SourceFile};
pub use observability::{
    severity_for_error, CompositeObserver, RunObserver, Severity, TableContext, TableStats, TracingObserver,
};
