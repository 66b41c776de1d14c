//! `csv-sqlite-etl` loads a folder of delimited text files into a SQLite database.
//!
//! For every matching file it:
//!
//! 1. parses the file into typed rows ([`ingestion::csv`]), normalizing header names, trailing
//!    spaces and comma decimals (`"1,5"` becomes `1.5`)
//! 2. infers a [`types::Schema`] ([`schema`]): an `id` primary key (`INTEGER` for row indices,
//!    `VARCHAR(32)` for text keys) followed by one column per field of the first row
//! 3. materializes it ([`store`]) with `CREATE TABLE IF NOT EXISTS` and `INSERT OR IGNORE`, so
//!    re-running over the same input adds no duplicate rows
//!
//! The [`pipeline`] module drives this per table, skips tables that fail, and appends a
//! timestamped report of every executed statement to `<database-stem>_history.txt`.
//!
//! ## Quick example
//!
//! ```no_run
//! use csv_sqlite_etl::pipeline::{populate_db, RunConfig};
//!
//! # fn main() -> Result<(), csv_sqlite_etl::EtlError> {
//! let config = RunConfig::default()
//!     .with_folder("data")
//!     .with_database("database.sqlite");
//! let outcome = populate_db(&config)?;
//! for (name, table) in &outcome.tables {
//!     println!("{name}: {} rows", table.row_count());
//! }
//! for failure in &outcome.failures {
//!     eprintln!("skipped {}: {}", failure.table, failure.error);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Materializing in-memory rows
//!
//! ```rust
//! use csv_sqlite_etl::store::{ConnectionStrategy, Materializer};
//! use csv_sqlite_etl::types::{Row, Table, Value};
//!
//! # fn main() -> Result<(), csv_sqlite_etl::EtlError> {
//! # let db = std::env::temp_dir().join("csv-sqlite-etl-doc.sqlite");
//! # let _ = std::fs::remove_file(&db);
//! let table = Table::from_rows(
//!     "people",
//!     vec![
//!         Row::new().with("name", Value::Text("a".into())).with("age", Value::Integer(1)),
//!         Row::new().with("name", Value::Text("b".into())).with("age", Value::Integer(2)),
//!     ],
//! );
//! let mut store = Materializer::open(&db, ConnectionStrategy::PerTable)?;
//! let first = store.materialize(&table)?;
//! let second = store.materialize(&table)?;
//! assert_eq!((first.rows_inserted, second.rows_inserted), (2, 0));
//! # Ok(())
//! # }
//! ```
//!
//! ## Known limitations
//!
//! - Column types come from the first row only; later rows are inserted as-is.
//! - Columns that appear only in later rows are dropped.
//! - An existing table is never altered, even if the new input has different columns.

pub mod error;
pub mod ingestion;
pub mod pipeline;
pub mod queries;
pub mod report;
pub mod schema;
pub mod store;
pub mod types;

pub use error::{EtlError, EtlResult};
