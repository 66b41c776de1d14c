//! Core data model types.
//!
//! A [`Table`] is a name plus an ordered list of keyed [`Row`]s. Each row maps column names to
//! tagged scalar [`Value`]s. The [`crate::schema`] module derives a [`Schema`] (a list of
//! [`ColumnSpec`]s, primary key first) from a table's rows.

use std::fmt;

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};

/// A single scalar cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 string.
    Text(String),
    /// Boolean.
    Bool(bool),
}

impl Value {
    /// Convert a value read back from SQLite.
    pub fn from_sql_ref(v: ValueRef<'_>) -> Self {
        match v {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) | ValueRef::Blob(t) => {
                Value::Text(String::from_utf8_lossy(t).into_owned())
            }
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bool(b) => ToSqlOutput::Borrowed(ValueRef::Integer(i64::from(*b))),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(v) => write!(f, "{v:?}"),
            Value::Text(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
        }
    }
}

/// Identifier of a row within a table.
///
/// Parsed tables use the zero-based row index, or the values of the source's own key column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowKey {
    Integer(i64),
    Text(String),
}

impl RowKey {
    /// The key as a bindable value.
    pub fn to_value(&self) -> Value {
        match self {
            RowKey::Integer(i) => Value::Integer(*i),
            RowKey::Text(s) => Value::Text(s.clone()),
        }
    }

    /// Key for a cell taken from a source key column. `None` for an empty cell.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Integer(i) => Some(RowKey::Integer(*i)),
            Value::Text(s) => Some(RowKey::Text(s.clone())),
            Value::Real(f) => Some(RowKey::Text(format!("{f:?}"))),
            Value::Bool(b) => Some(RowKey::Text(b.to_string())),
        }
    }
}

impl From<i64> for RowKey {
    fn from(v: i64) -> Self {
        RowKey::Integer(v)
    }
}

impl From<&str> for RowKey {
    fn from(v: &str) -> Self {
        RowKey::Text(v.to_owned())
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_value(), f)
    }
}

/// An ordered mapping from column name to value.
///
/// Setting an existing column replaces its value in place, so first-seen order is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `column` to `value`.
    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    /// Builder-style [`Row::set`].
    pub fn with(mut self, column: impl Into<String>, value: Value) -> Self {
        self.set(column, value);
        self
    }

    /// Value for `column`, if the row carries it.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    /// Remove `column`, returning its value.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|(name, _)| name == column)?;
        Some(self.fields.remove(idx).1)
    }

    /// Iterate `(column, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, v)| (name.as_str(), v))
    }

    /// Iterate column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (S, Value)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.set(column, value);
        }
        row
    }
}

/// A named, ordered sequence of keyed rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Table name (source file name without extension).
    pub name: String,
    /// Rows in parse order, each paired with its identifier.
    pub rows: Vec<(RowKey, Row)>,
}

impl Table {
    /// Create a table keyed by zero-based row index.
    pub fn from_rows(name: impl Into<String>, rows: Vec<Row>) -> Self {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| (RowKey::Integer(i as i64), row))
            .collect();
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Create a table with caller-supplied keys.
    pub fn with_keys(name: impl Into<String>, rows: Vec<(RowKey, Row)>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Number of rows in the table.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row by identifier.
    pub fn get(&self, key: &RowKey) -> Option<&Row> {
        self.rows.iter().find(|(k, _)| k == key).map(|(_, r)| r)
    }
}

/// Column type used in generated DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Text,
    Real,
    /// Booleans. SQLite gives this NUMERIC affinity; values are stored as 0/1.
    Binary,
    /// Bounded text, used for non-integer primary keys.
    Varchar(usize),
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Integer => write!(f, "INTEGER"),
            SqlType::Text => write!(f, "TEXT"),
            SqlType::Real => write!(f, "REAL"),
            SqlType::Binary => write!(f, "BINARY"),
            SqlType::Varchar(n) => write!(f, "VARCHAR({n})"),
        }
    }
}

/// A single named, typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub sql_type: SqlType,
    pub primary_key: bool,
}

impl ColumnSpec {
    /// Create a regular (non-key) column.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            primary_key: false,
        }
    }

    /// Create the primary key column.
    pub fn primary_key(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            primary_key: true,
        }
    }

    /// Column definition as used inside `CREATE TABLE (...)`.
    pub fn definition(&self) -> String {
        let mut out = format!("{} {}", quote_ident(&self.name), self.sql_type);
        if self.primary_key {
            out.push_str(" PRIMARY KEY");
        }
        out
    }
}

/// Ordered list of columns. The first entry is always the primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<ColumnSpec>,
}

impl Schema {
    /// Create a schema from a key column and data columns.
    ///
    /// Data columns whose name repeats an earlier column are dropped.
    pub fn new(key: ColumnSpec, data: Vec<ColumnSpec>) -> Self {
        let mut columns = vec![ColumnSpec {
            primary_key: true,
            ..key
        }];
        for col in data {
            if columns.iter().any(|c| c.name == col.name) {
                continue;
            }
            columns.push(ColumnSpec {
                primary_key: false,
                ..col
            });
        }
        Self { columns }
    }

    /// The primary key column.
    pub fn key(&self) -> &ColumnSpec {
        &self.columns[0]
    }

    /// Columns after the key, in order.
    pub fn data_columns(&self) -> &[ColumnSpec] {
        &self.columns[1..]
    }

    /// Iterate column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Returns the index of a column by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// `("a", "b", "c d")` column list for `INSERT`.
    pub fn column_list(&self) -> String {
        let names: Vec<String> = self.columns.iter().map(|c| quote_ident(&c.name)).collect();
        format!("({})", names.join(", "))
    }

    /// `("a" INTEGER PRIMARY KEY, "b" TEXT)` definition list for `CREATE TABLE`.
    pub fn definition_list(&self) -> String {
        let defs: Vec<String> = self.columns.iter().map(ColumnSpec::definition).collect();
        format!("({})", defs.join(", "))
    }

    /// `(?, ?, ?)` with one placeholder per column.
    pub fn placeholders(&self) -> String {
        format!("({})", vec!["?"; self.columns.len()].join(", "))
    }
}

/// Quote an identifier for SQL use.
///
/// Every name is wrapped in double quotes, with embedded quotes doubled, so keywords (`order`,
/// `group`) and names with spaces are both valid table and column names.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
