//! Run orchestration: discover → parse → infer → materialize, per table.
//!
//! Tables are processed independently. A table that fails to parse, has no rows, or fails to
//! insert is skipped and noted in the report; the run moves on to the next table. Discovery and
//! store-level failures end the run.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{EtlError, EtlResult};
use crate::ingestion::{
    discover_tables, read_table, severity_for_error, ParseOptions, RunObserver, Severity, SourceFile, TableContext,
    TableStats,
};
use crate::report::{append_history, generate_timestamp, history_path_for};
use crate::schema::DEFAULT_KEY_COLUMN;
use crate::store::{ConnectionStrategy, Materializer};
use crate::types::Table;

/// Configuration for a run.
///
/// Use [`Default`] for the documented defaults: folder `data`, extension `.csv`, database
/// `database.sqlite`, comma delimiter, key column `id`, one connection per table.
#[derive(Clone)]
pub struct RunConfig {
    /// Folder scanned for input files (top level only).
    pub folder: PathBuf,
    /// Recognized file extensions.
    pub extensions: Vec<String>,
    /// SQLite database file.
    pub database: PathBuf,
    /// Parser options (delimiter).
    pub parse: ParseOptions,
    /// Name of the primary key column in every table.
    pub key_column: String,
    /// Connection scoping for the materializer.
    pub connection_strategy: ConnectionStrategy,
    /// Optional observer for per-table outcomes.
    pub observer: Option<Arc<dyn RunObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: Severity,
    /// Append the run report to the history file.
    pub write_history: bool,
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("folder", &self.folder)
            .field("extensions", &self.extensions)
            .field("database", &self.database)
            .field("parse", &self.parse)
            .field("key_column", &self.key_column)
            .field("connection_strategy", &self.connection_strategy)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .field("write_history", &self.write_history)
            .finish()
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("data"),
            extensions: vec![".csv".to_string()],
            database: PathBuf::from("database.sqlite"),
            parse: ParseOptions::default(),
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            connection_strategy: ConnectionStrategy::default(),
            observer: None,
            alert_at_or_above: Severity::Critical,
            write_history: true,
        }
    }
}

impl RunConfig {
    pub fn with_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<PathBuf>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_connection_strategy(mut self, strategy: ConnectionStrategy) -> Self {
        self.connection_strategy = strategy;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// `<database-stem>_history.txt`, next to the database.
    pub fn history_path(&self) -> PathBuf {
        history_path_for(&self.database)
    }

    fn validate(&self) -> EtlResult<()> {
        if self.extensions.is_empty() {
            return Err(EtlError::config("at least one file extension is required"));
        }
        if self.key_column.trim().is_empty() {
            return Err(EtlError::config("key column name is required"));
        }
        if self.database.as_os_str().is_empty() {
            return Err(EtlError::config("database path is required"));
        }
        Ok(())
    }
}

/// A table that was skipped, and why.
#[derive(Debug)]
pub struct TableFailure {
    pub table: String,
    pub path: PathBuf,
    pub error: EtlError,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunOutcome {
    /// Timestamp heading the report.
    pub timestamp: String,
    /// Successfully materialized tables, by name.
    pub tables: BTreeMap<String, Table>,
    /// Full report text (also appended to the history file when enabled).
    pub report: String,
    /// Tables that were skipped.
    pub failures: Vec<TableFailure>,
}

/// Parse every matching file into a table map without touching the database.
///
/// Files that fail to parse are reported to the observer and left out.
pub fn build_tables(config: &RunConfig) -> EtlResult<BTreeMap<String, Table>> {
    config.validate()?;
    let mut tables = BTreeMap::new();
    let mut claimed = TableNames::default();
    for source in discover_tables(&config.folder, &config.extensions)? {
        let result = claimed
            .claim(&source)
            .and_then(|()| read_table(&source.path, source.table_name.as_str(), &config.key_column, &config.parse));
        match result {
            Ok(table) => {
                tables.insert(table.name.clone(), table);
            }
            Err(e) => report_failure(config, &source, &e),
        }
    }
    Ok(tables)
}

/// Run the full pipeline and append the report to the history file.
pub fn populate_db(config: &RunConfig) -> EtlResult<RunOutcome> {
    config.validate()?;
    let sources = discover_tables(&config.folder, &config.extensions)?;
    info!(folder = %config.folder.display(), files = sources.len(), "discovered input files");

    let mut materializer =
        Materializer::open(&config.database, config.connection_strategy)?.with_key_column(config.key_column.as_str());

    let timestamp = generate_timestamp();
    let mut report = format!("{timestamp}\n\n");
    let mut tables = BTreeMap::new();
    let mut failures = Vec::new();
    let mut claimed = TableNames::default();

    for source in sources {
        let result = claimed
            .claim(&source)
            .and_then(|()| read_table(&source.path, source.table_name.as_str(), &config.key_column, &config.parse))
            .and_then(|table| materializer.materialize(&table).map(|outcome| (table, outcome)));

        match result {
            Ok((table, outcome)) => {
                report.push_str(&outcome.log);
                if let Some(obs) = config.observer.as_ref() {
                    obs.on_table_success(
                        &context(&source),
                        TableStats {
                            rows: outcome.rows_seen,
                            inserted: outcome.rows_inserted,
                        },
                    );
                }
                tables.insert(table.name.clone(), table);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                report.push_str(&format!("Table {} skipped: {e}\n", source.table_name));
                report_failure(config, &source, &e);
                failures.push(TableFailure {
                    table: source.table_name,
                    path: source.path,
                    error: e,
                });
            }
        }
    }

    materializer.close()?;

    if config.write_history {
        append_history(&config.history_path(), &report)?;
    }

    info!(
        tables = tables.len(),
        failed = failures.len(),
        database = %config.database.display(),
        "run finished"
    );
    Ok(RunOutcome {
        timestamp,
        tables,
        report,
        failures,
    })
}

/// Table names already taken in this run, compared the way SQLite compares them.
#[derive(Default)]
struct TableNames {
    seen: HashMap<String, PathBuf>,
}

impl TableNames {
    /// The first file to claim a name keeps it; later ones fail with
    /// [`EtlError::DuplicateTable`].
    fn claim(&mut self, source: &SourceFile) -> EtlResult<()> {
        match self.seen.entry(source.table_name.to_ascii_lowercase()) {
            Entry::Occupied(first) => Err(EtlError::DuplicateTable {
                table: source.table_name.clone(),
                first: first.get().clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(source.path.clone());
                Ok(())
            }
        }
    }
}

fn context(source: &SourceFile) -> TableContext {
    TableContext {
        table: source.table_name.clone(),
        path: Some(source.path.clone()),
    }
}

fn report_failure(config: &RunConfig, source: &SourceFile, e: &EtlError) {
    debug!(table = %source.table_name, path = %source.path.display(), error = %e, "skipping table");
    if let Some(obs) = config.observer.as_ref() {
        let ctx = context(source);
        let sev = severity_for_error(e);
        obs.on_table_failure(&ctx, sev, e);
        if sev >= config.alert_at_or_above {
            obs.on_alert(&ctx, sev, e);
        }
    }
}
