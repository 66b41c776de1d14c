//! SQLite materialization.
//!
//! A [`Materializer`] turns a [`Table`] plus its [`Schema`] into two idempotent steps:
//!
//! - `CREATE TABLE IF NOT EXISTS` built from the schema (a no-op when the table exists, even if
//!   its columns differ)
//! - one `INSERT OR IGNORE` per row, keyed by the row identifier, so repeated runs add nothing
//!
//! All inserts for a table run in a single transaction that is committed once the whole row set
//! has been processed. If an insert fails the transaction is dropped, which rolls it back.
//!
//! Every executed statement is written to a textual log returned in [`TableOutcome::log`].

mod connection;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use rusqlite::{params_from_iter, Connection, ErrorCode};
use tracing::{debug, info};

use crate::error::{EtlError, EtlResult};
use crate::schema::{check_key_lengths, infer_schema, DEFAULT_KEY_COLUMN};
use crate::types::{quote_ident, Schema, Table, Value};

pub use connection::ConnectionStrategy;
use connection::ScopedConnection;

/// Result of materializing one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOutcome {
    pub table: String,
    /// Rows offered for insertion.
    pub rows_seen: usize,
    /// Rows actually inserted (the rest already existed).
    pub rows_inserted: usize,
    /// Executed statements and their bound values.
    pub log: String,
}

/// Creates tables and inserts rows into a file-backed SQLite store.
#[derive(Debug)]
pub struct Materializer {
    database: PathBuf,
    strategy: ConnectionStrategy,
    key_column: String,
    shared: Option<Connection>,
}

impl Materializer {
    /// Create a materializer for `database`.
    ///
    /// With [`ConnectionStrategy::PerRun`] the store is opened immediately and kept open until
    /// the materializer is dropped or [`Materializer::close`]d. With
    /// [`ConnectionStrategy::PerTable`] each table opens and closes its own connection.
    pub fn open(database: impl AsRef<Path>, strategy: ConnectionStrategy) -> EtlResult<Self> {
        let database = database.as_ref().to_path_buf();
        let shared = match strategy {
            ConnectionStrategy::PerRun => Some(connection::open(&database)?),
            ConnectionStrategy::PerTable => None,
        };
        Ok(Self {
            database,
            strategy,
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            shared,
        })
    }

    /// Name the primary key column (default `id`).
    pub fn with_key_column(mut self, key_column: impl Into<String>) -> Self {
        self.key_column = key_column.into();
        self
    }

    /// Path of the backing database file.
    pub fn database(&self) -> &Path {
        &self.database
    }

    pub fn strategy(&self) -> ConnectionStrategy {
        self.strategy
    }

    /// Infer a schema for `table` and materialize it.
    pub fn materialize(&mut self, table: &Table) -> EtlResult<TableOutcome> {
        let schema = infer_schema(table, &self.key_column)?;
        self.materialize_with_schema(table, &schema)
    }

    /// Create `table` from `schema` if absent, then insert every row not already present.
    pub fn materialize_with_schema(&mut self, table: &Table, schema: &Schema) -> EtlResult<TableOutcome> {
        if table.name.trim().is_empty() {
            return Err(EtlError::config("table name is required"));
        }
        check_key_lengths(table, schema)?;

        let mut conn = ScopedConnection::acquire(&self.database, self.shared.as_mut())?;
        let mut log = create_table(&conn, &self.database, &table.name, schema)?;
        let rows_inserted = insert_rows(&mut conn, &self.database, table, schema, &mut log)?;

        info!(
            table = %table.name,
            rows = table.row_count(),
            inserted = rows_inserted,
            "materialized table"
        );
        Ok(TableOutcome {
            table: table.name.clone(),
            rows_seen: table.row_count(),
            rows_inserted,
            log,
        })
    }

    /// Close the shared connection, if any, reporting close errors.
    pub fn close(mut self) -> EtlResult<()> {
        if let Some(conn) = self.shared.take() {
            conn.close().map_err(|(_, source)| EtlError::StoreIo {
                path: self.database.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Run `CREATE TABLE IF NOT EXISTS` for `schema`. Returns the log line.
pub fn create_table(conn: &Connection, database: &Path, table: &str, schema: &Schema) -> EtlResult<String> {
    let instruction = format!(
        "CREATE TABLE IF NOT EXISTS {} {}",
        quote_ident(table),
        schema.definition_list()
    );
    debug!(%instruction, "executing");
    conn.execute(&instruction, [])
        .map_err(|e| classify(e, database, table))?;
    Ok(format!("Instruction executed: {instruction}\n"))
}

/// Insert-or-ignore every row of `table` in one transaction. Returns the number inserted.
///
/// Column list, placeholders and bound values are all derived from `schema`, key first. A
/// column a row does not carry is bound as NULL; columns outside the schema are not inserted.
pub fn insert_rows(
    conn: &mut Connection,
    database: &Path,
    table: &Table,
    schema: &Schema,
    log: &mut String,
) -> EtlResult<usize> {
    let instruction = format!(
        "INSERT OR IGNORE INTO {} {} VALUES {}",
        quote_ident(&table.name),
        schema.column_list(),
        schema.placeholders()
    );

    let tx = conn
        .transaction()
        .map_err(|e| classify(e, database, &table.name))?;
    let mut inserted = 0usize;
    {
        let mut stmt = tx
            .prepare(&instruction)
            .map_err(|e| classify(e, database, &table.name))?;

        for (key, row) in &table.rows {
            let mut values = Vec::with_capacity(schema.columns.len());
            values.push(key.to_value());
            for col in schema.data_columns() {
                values.push(row.get(&col.name).cloned().unwrap_or(Value::Null));
            }

            let row_string = format!(
                "Instruction executed: {instruction} in table {} in {}.\nValues: {}\n",
                table.name,
                database.display(),
                format_values(&values)
            );
            debug!(table = %table.name, row = %key, "executing insert");

            inserted += stmt
                .execute(params_from_iter(values.iter()))
                .map_err(|e| classify(e, database, &table.name))?;
            log.push_str(&row_string);
        }
    }
    tx.commit().map_err(|e| classify(e, database, &table.name))?;

    Ok(inserted)
}

fn format_values(values: &[Value]) -> String {
    let mut out = String::from("(");
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{v}");
    }
    out.push(')');
    out
}

/// Store-level failures (cannot open, read-only, disk full, ...) end the run; anything else
/// is scoped to the table being written.
fn classify(err: rusqlite::Error, database: &Path, table: &str) -> EtlError {
    match err.sqlite_error_code() {
        Some(
            ErrorCode::CannotOpen
            | ErrorCode::ReadOnly
            | ErrorCode::DiskFull
            | ErrorCode::PermissionDenied
            | ErrorCode::SystemIoFailure
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseCorrupt,
        ) => EtlError::StoreIo {
            path: database.to_path_buf(),
            source: err,
        },
        _ => EtlError::Insert {
            table: table.to_string(),
            source: err,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnSpec, Row, RowKey, SqlType};

    fn people() -> Table {
        Table::from_rows(
            "people",
            vec![
                Row::new()
                    .with("name", Value::Text("a".into()))
                    .with("age", Value::Integer(1)),
                Row::new()
                    .with("name", Value::Text("b".into()))
                    .with("age", Value::Integer(2)),
            ],
        )
    }

    #[test]
    fn format_values_reads_like_a_tuple() {
        let values = vec![Value::Integer(0), Value::Text("a".into()), Value::Real(1.5)];
        assert_eq!(format_values(&values), "(0, 'a', 1.5)");
    }

    #[test]
    fn create_and_insert_log_every_statement() {
        let mut conn = Connection::open_in_memory().unwrap();
        let table = people();
        let schema = infer_schema(&table, "id").unwrap();

        let mut log = create_table(&conn, Path::new(":memory:"), &table.name, &schema).unwrap();
        let inserted = insert_rows(&mut conn, Path::new(":memory:"), &table, &schema, &mut log).unwrap();

        assert_eq!(inserted, 2);
        assert!(log.starts_with(
            "Instruction executed: CREATE TABLE IF NOT EXISTS \"people\" (\"id\" INTEGER PRIMARY KEY, \"name\" TEXT, \"age\" INTEGER)\n"
        ));
        assert!(log.contains("INSERT OR IGNORE INTO \"people\" (\"id\", \"name\", \"age\") VALUES (?, ?, ?)"));
        assert!(log.contains("Values: (0, 'a', 1)"));
        assert!(log.contains("Values: (1, 'b', 2)"));
    }

    #[test]
    fn second_insert_pass_is_ignored() {
        let mut conn = Connection::open_in_memory().unwrap();
        let table = people();
        let schema = infer_schema(&table, "id").unwrap();
        let db = Path::new(":memory:");

        let mut log = create_table(&conn, db, &table.name, &schema).unwrap();
        assert_eq!(insert_rows(&mut conn, db, &table, &schema, &mut log).unwrap(), 2);
        assert_eq!(insert_rows(&mut conn, db, &table, &schema, &mut log).unwrap(), 0);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM people", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn existing_table_with_other_columns_fails_insert_and_rolls_back() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE people (id INTEGER PRIMARY KEY, other TEXT)", [])
            .unwrap();
        let table = people();
        let schema = infer_schema(&table, "id").unwrap();
        let db = Path::new(":memory:");

        let mut log = create_table(&conn, db, &table.name, &schema).unwrap();
        let err = insert_rows(&mut conn, db, &table, &schema, &mut log).unwrap_err();
        assert!(matches!(err, EtlError::Insert { ref table, .. } if table == "people"));
        assert!(!err.is_fatal());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM people", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn text_keys_and_quoted_columns_round_trip() {
        let mut conn = Connection::open_in_memory().unwrap();
        let table = Table::with_keys(
            "my orders",
            vec![
                (RowKey::from("A-1"), Row::new().with("unit price", Value::Real(2.5))),
                (RowKey::from("B-2"), Row::new().with("unit price", Value::Bool(true))),
            ],
        );
        let schema = Schema::new(
            ColumnSpec::new("id", SqlType::Varchar(32)),
            vec![ColumnSpec::new("unit price", SqlType::Real)],
        );
        let db = Path::new(":memory:");

        let mut log = create_table(&conn, db, &table.name, &schema).unwrap();
        insert_rows(&mut conn, db, &table, &schema, &mut log).unwrap();

        let rows: Vec<(String, f64)> = conn
            .prepare("SELECT id, \"unit price\" FROM \"my orders\" ORDER BY id")
            .unwrap()
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows, vec![("A-1".to_string(), 2.5), ("B-2".to_string(), 1.0)]);
    }

    #[test]
    fn keyword_table_and_column_names_are_quoted() {
        let mut conn = Connection::open_in_memory().unwrap();
        let table = Table::from_rows(
            "group",
            vec![Row::new()
                .with("name", Value::Text("a".into()))
                .with("order", Value::Integer(7))],
        );
        let schema = infer_schema(&table, "id").unwrap();
        let db = Path::new(":memory:");

        let mut log = create_table(&conn, db, &table.name, &schema).unwrap();
        assert_eq!(insert_rows(&mut conn, db, &table, &schema, &mut log).unwrap(), 1);

        let order: i64 = conn
            .query_row("SELECT \"order\" FROM \"group\" WHERE id = 0", [], |r| r.get(0))
            .unwrap();
        assert_eq!(order, 7);
    }

    #[test]
    fn overlong_text_key_fails_before_any_ddl() {
        let db = std::env::temp_dir().join(format!(
            "csv-sqlite-etl-long-key-{}.sqlite",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let mut m = Materializer::open(&db, ConnectionStrategy::PerTable).unwrap();
        let table = Table::with_keys(
            "codes",
            vec![(RowKey::from("x".repeat(40).as_str()), Row::new().with("a", Value::Integer(1)))],
        );
        let err = m.materialize(&table).unwrap_err();
        assert!(matches!(err, EtlError::Schema { ref table, .. } if table == "codes"));
        assert!(!db.exists());
    }

    #[test]
    fn empty_table_name_is_a_config_error() {
        let db = std::env::temp_dir().join("csv-sqlite-etl-unused.sqlite");
        let mut m = Materializer::open(&db, ConnectionStrategy::PerTable).unwrap();
        let table = Table::from_rows("", people().rows.into_iter().map(|(_, r)| r).collect());
        let err = m.materialize(&table).unwrap_err();
        assert!(matches!(err, EtlError::Config { .. }));
        assert!(!db.exists());
    }
}
