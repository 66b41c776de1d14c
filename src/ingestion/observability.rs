use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::EtlError;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (one table failed).
    Error,
    /// Critical error (the store or input folder is unusable).
    Critical,
}

/// Context about one table's trip through the pipeline.
#[derive(Debug, Clone)]
pub struct TableContext {
    /// Target table name.
    pub table: String,
    /// Source file, when the table came from disk.
    pub path: Option<PathBuf>,
}

impl fmt::Display for TableContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(p) => write!(f, "table={} path={}", self.table, p.display()),
            None => write!(f, "table={}", self.table),
        }
    }
}

/// Stats reported when a table is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    /// Rows parsed from the source.
    pub rows: usize,
    /// Rows newly inserted (the rest already existed).
    pub inserted: usize,
}

/// Observer interface for per-table outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait RunObserver: Send + Sync {
    /// Called when a table is materialized.
    fn on_table_success(&self, _ctx: &TableContext, _stats: TableStats) {}

    /// Called when a table fails.
    fn on_table_failure(&self, _ctx: &TableContext, _severity: Severity, _error: &EtlError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_table_failure`].
    fn on_alert(&self, ctx: &TableContext, severity: Severity, error: &EtlError) {
        self.on_table_failure(ctx, severity, error)
    }
}

/// Severity for a failure.
pub fn severity_for_error(e: &EtlError) -> Severity {
    match e {
        EtlError::Parse { .. }
        | EtlError::Schema { .. }
        | EtlError::DuplicateTable { .. }
        | EtlError::Insert { .. } => Severity::Error,
        EtlError::Query { .. } => Severity::Warning,
        EtlError::Discovery { .. }
        | EtlError::StoreIo { .. }
        | EtlError::Config { .. }
        | EtlError::Io(_)
        | EtlError::Json(_) => Severity::Critical,
    }
}

/// Fans callbacks out to several observers, in order.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn RunObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn RunObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl RunObserver for CompositeObserver {
    fn on_table_success(&self, ctx: &TableContext, stats: TableStats) {
        for o in &self.observers {
            o.on_table_success(ctx, stats);
        }
    }

    fn on_table_failure(&self, ctx: &TableContext, severity: Severity, error: &EtlError) {
        for o in &self.observers {
            o.on_table_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &TableContext, severity: Severity, error: &EtlError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Forwards table outcomes to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn on_table_success(&self, ctx: &TableContext, stats: TableStats) {
        tracing::info!(table = %ctx.table, rows = stats.rows, inserted = stats.inserted, "table loaded");
    }

    fn on_table_failure(&self, ctx: &TableContext, severity: Severity, error: &EtlError) {
        tracing::warn!(table = %ctx.table, ?severity, %error, "table skipped");
    }

    fn on_alert(&self, ctx: &TableContext, severity: Severity, error: &EtlError) {
        tracing::error!(table = %ctx.table, ?severity, %error, "table failure alert");
    }
}
