use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use csv_sqlite_etl::ingestion::TracingObserver;
use csv_sqlite_etl::pipeline::{populate_db, RunConfig};
use csv_sqlite_etl::queries::{default_queries, load_queries, print_results, run_queries, DEFAULT_QUERIES_FILE};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = RunConfig::default().with_observer(Arc::new(TracingObserver));
    let outcome = match populate_db(&config) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "run aborted");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        loaded = outcome.tables.len(),
        skipped = outcome.failures.len(),
        history = %config.history_path().display(),
        "load complete"
    );

    let (queries, required) = if Path::new(DEFAULT_QUERIES_FILE).exists() {
        match load_queries(DEFAULT_QUERIES_FILE) {
            Ok(q) => (q, true),
            Err(e) => {
                tracing::error!(error = %e, file = DEFAULT_QUERIES_FILE, "cannot load queries");
                return ExitCode::FAILURE;
            }
        }
    } else {
        (default_queries(), false)
    };

    match run_queries(&config.database, &queries) {
        Ok(results) => {
            if let Err(e) = print_results(&results, std::io::stdout().lock()) {
                tracing::error!(error = %e, "cannot print query results");
                return ExitCode::FAILURE;
            }
        }
        // The demo query only works when an `Orders` table was loaded.
        Err(e) if !required => tracing::warn!(error = %e, "demo query skipped"),
        Err(e) => {
            tracing::error!(error = %e, "query failed");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
