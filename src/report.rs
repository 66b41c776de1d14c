//! Execution history.
//!
//! Each run appends one block to `<database-stem>_history.txt`: a timestamp, a blank line, the
//! executed statements for every table, then two newlines.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::EtlResult;

/// Format used for the run timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Current local time as `YYYYMMDD_HHMMSS`.
pub fn generate_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// `<dir>/<stem>_history.txt` for a database path.
pub fn history_path_for(database: &Path) -> PathBuf {
    let stem = database
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("database");
    database.with_file_name(format!("{stem}_history.txt"))
}

/// Append `report` to `path`, followed by two newlines.
pub fn append_history(path: &Path, report: &str) -> EtlResult<()> {
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    f.write_all(report.as_bytes())?;
    f.write_all(b"\n\n")?;
    Ok(())
}
