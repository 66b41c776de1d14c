//! Auxiliary query runner.
//!
//! Runs a list of `(description, query)` pairs against the materialized database. The list can
//! be loaded from a JSON object whose values are `["description", "SELECT ..."]` pairs (or
//! `{"description": ..., "query": ...}` objects); keys are ignored and file order is kept.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use rusqlite::Connection;
use serde::Deserialize;
use tracing::debug;

use crate::error::{EtlError, EtlResult};
use crate::types::Value;

/// Default queries file name.
pub const DEFAULT_QUERIES_FILE: &str = "queries.json";

/// A described SQL query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "QueryEntry")]
pub struct Query {
    pub description: String,
    pub sql: String,
}

impl Query {
    pub fn new(description: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            sql: sql.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QueryEntry {
    Pair(String, String),
    Object {
        description: String,
        #[serde(alias = "sql")]
        query: String,
    },
}

impl From<QueryEntry> for Query {
    fn from(e: QueryEntry) -> Self {
        match e {
            QueryEntry::Pair(description, sql) => Query { description, sql },
            QueryEntry::Object { description, query } => Query {
                description,
                sql: query,
            },
        }
    }
}

/// The built-in demo query list.
pub fn default_queries() -> Vec<Query> {
    vec![Query::new("See all records in table Orders", "SELECT * FROM Orders")]
}

/// Load queries from a JSON object file.
pub fn load_queries(path: impl AsRef<Path>) -> EtlResult<Vec<Query>> {
    let text = fs::read_to_string(path)?;
    parse_queries(&text)
}

/// Parse queries from a JSON object string.
pub fn parse_queries(input: &str) -> EtlResult<Vec<Query>> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(input)?;
    let mut out = Vec::with_capacity(map.len());
    for (_, v) in map {
        out.push(serde_json::from_value::<Query>(v)?);
    }
    Ok(out)
}

/// Result set of one query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub description: String,
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Run each query against `database`, in order. Stops at the first failing query.
pub fn run_queries(database: impl AsRef<Path>, queries: &[Query]) -> EtlResult<Vec<QueryResult>> {
    let database = database.as_ref();
    let conn = Connection::open(database).map_err(|source| EtlError::StoreIo {
        path: database.to_path_buf(),
        source,
    })?;

    queries.iter().map(|q| run_query(&conn, q)).collect()
}

fn run_query(conn: &Connection, query: &Query) -> EtlResult<QueryResult> {
    debug!(description = %query.description, sql = %query.sql, "running query");
    let to_err = |source| EtlError::Query {
        description: query.description.clone(),
        source,
    };

    let mut stmt = conn.prepare(&query.sql).map_err(to_err)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();
    let width = columns.len();

    let rows = stmt
        .query_map([], |r| {
            (0..width)
                .map(|i| r.get_ref(i).map(Value::from_sql_ref))
                .collect::<rusqlite::Result<Vec<Value>>>()
        })
        .map_err(to_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(to_err)?;

    Ok(QueryResult {
        description: query.description.clone(),
        sql: query.sql.clone(),
        columns,
        rows,
    })
}

/// Print results with a `#` banner around each query.
pub fn print_results(results: &[QueryResult], mut out: impl Write) -> io::Result<()> {
    let banner = "#".repeat(50);
    for r in results {
        writeln!(out, "\n\n{banner}")?;
        writeln!(out, "Executing query:")?;
        writeln!(out, "{}", r.description)?;
        writeln!(out, "{}\n", r.sql)?;
        writeln!(out, "{}", r.columns.join(" | "))?;
        for row in &r.rows {
            let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
            writeln!(out, "({})", cells.join(", "))?;
        }
        writeln!(out, "{banner}")?;
    }
    Ok(())
}
