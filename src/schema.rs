//! Schema inference.
//!
//! The primary key type comes from the row identifiers: `INTEGER` when every key is an integer,
//! otherwise bounded text. Data column types come from the first (representative) row only.
//! Later rows are not reconciled: a differently typed value is inserted as-is and SQLite's type
//! affinity decides how it is stored.

use tracing::{debug, warn};

use crate::error::{EtlError, EtlResult};
use crate::types::{ColumnSpec, RowKey, Schema, SqlType, Table, Value};

/// Default name of the primary key column.
pub const DEFAULT_KEY_COLUMN: &str = "id";

/// Maximum length, in characters, of a text primary key. Enforced by [`check_key_lengths`].
pub const TEXT_KEY_MAX_LEN: usize = 32;

/// Map a scalar to the column type it implies.
pub fn sql_type_of(value: &Value) -> SqlType {
    match value {
        Value::Integer(_) => SqlType::Integer,
        Value::Text(_) => SqlType::Text,
        Value::Bool(_) => SqlType::Binary,
        Value::Real(_) => SqlType::Real,
        Value::Null => SqlType::Text,
    }
}

/// Key column type for a set of row identifiers.
pub fn key_type<'a>(keys: impl IntoIterator<Item = &'a RowKey>) -> SqlType {
    if keys.into_iter().all(|k| matches!(k, RowKey::Integer(_))) {
        SqlType::Integer
    } else {
        SqlType::Varchar(TEXT_KEY_MAX_LEN)
    }
}

/// Infer a [`Schema`] for `table`, naming the key column `key_column`.
///
/// Fails with [`EtlError::Schema`] when the table has no rows.
pub fn infer_schema(table: &Table, key_column: &str) -> EtlResult<Schema> {
    let Some((_, first)) = table.rows.first() else {
        return Err(EtlError::Schema {
            table: table.name.clone(),
            message: "no rows to infer a schema from".to_string(),
        });
    };

    let key = ColumnSpec::primary_key(key_column, key_type(table.rows.iter().map(|(k, _)| k)));

    let mut data = Vec::with_capacity(first.len());
    for (name, value) in first.iter() {
        if name == key_column {
            warn!(table = %table.name, column = name, "data column shadows the key column; row identifiers win");
            continue;
        }
        data.push(ColumnSpec::new(name, sql_type_of(value)));
    }

    let schema = Schema::new(key, data);

    for (key, row) in table.rows.iter().skip(1) {
        for name in row.columns() {
            if schema.index_of(name).is_none() {
                debug!(table = %table.name, row = %key, column = name, "column not in representative row; dropped");
            }
        }
    }

    debug!(table = %table.name, columns = %schema.definition_list(), "inferred schema");
    Ok(schema)
}

/// Reject text keys longer than a `VARCHAR(n)` key column allows.
///
/// SQLite does not enforce declared lengths, so this runs before any statement is issued.
pub fn check_key_lengths(table: &Table, schema: &Schema) -> EtlResult<()> {
    let SqlType::Varchar(max) = schema.key().sql_type else {
        return Ok(());
    };
    let too_long = table.rows.iter().find_map(|(key, _)| match key {
        RowKey::Text(s) if s.chars().count() > max => Some(s),
        _ => None,
    });
    match too_long {
        Some(s) => Err(EtlError::Schema {
            table: table.name.clone(),
            message: format!("key '{s}' is longer than {max} characters"),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Row;

    fn single_column(values: Vec<Value>) -> Table {
        let rows = values
            .into_iter()
            .map(|v| Row::new().with("col", v))
            .collect();
        Table::from_rows("t", rows)
    }

    fn inferred_col_type(values: Vec<Value>) -> SqlType {
        let schema = infer_schema(&single_column(values), DEFAULT_KEY_COLUMN).unwrap();
        schema.columns[1].sql_type
    }

    #[test]
    fn infers_column_types_from_scalars() {
        assert_eq!(
            inferred_col_type(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]),
            SqlType::Integer
        );
        assert_eq!(
            inferred_col_type(vec![Value::Real(1.5), Value::Real(2.0)]),
            SqlType::Real
        );
        assert_eq!(
            inferred_col_type(vec![Value::Text("x".into()), Value::Text("y".into())]),
            SqlType::Text
        );
        assert_eq!(
            inferred_col_type(vec![Value::Bool(true), Value::Bool(false)]),
            SqlType::Binary
        );
        assert_eq!(inferred_col_type(vec![Value::Null]), SqlType::Text);
    }

    #[test]
    fn representative_row_wins_over_later_rows() {
        assert_eq!(
            inferred_col_type(vec![Value::Integer(1), Value::Text("two".into())]),
            SqlType::Integer
        );
    }

    #[test]
    fn sequential_keys_give_integer_primary_key() {
        let schema = infer_schema(&single_column(vec![Value::Integer(1); 3]), "id").unwrap();
        assert_eq!(schema.key().name, "id");
        assert_eq!(schema.key().sql_type, SqlType::Integer);
        assert!(schema.key().primary_key);
    }

    #[test]
    fn text_keys_give_bounded_text_primary_key() {
        let table = Table::with_keys(
            "t",
            vec![
                (RowKey::Integer(0), Row::new().with("a", Value::Integer(1))),
                (RowKey::from("second"), Row::new().with("a", Value::Integer(2))),
            ],
        );
        let schema = infer_schema(&table, "id").unwrap();
        assert_eq!(schema.key().sql_type, SqlType::Varchar(32));
        assert_eq!(schema.key().definition(), "\"id\" VARCHAR(32) PRIMARY KEY");
    }

    #[test]
    fn empty_table_is_a_schema_error() {
        let err = infer_schema(&Table::from_rows("empty", vec![]), "id").unwrap_err();
        assert!(matches!(err, EtlError::Schema { ref table, .. } if table == "empty"));
    }

    #[test]
    fn columns_follow_first_row_and_ignore_extras() {
        let table = Table::from_rows(
            "t",
            vec![
                Row::new()
                    .with("name", Value::Text("a".into()))
                    .with("age", Value::Integer(1)),
                Row::new()
                    .with("name", Value::Text("b".into()))
                    .with("age", Value::Integer(2))
                    .with("extra", Value::Bool(true)),
            ],
        );
        let schema = infer_schema(&table, "id").unwrap();
        assert_eq!(
            schema.column_names().collect::<Vec<_>>(),
            vec!["id", "name", "age"]
        );
    }

    #[test]
    fn text_keys_over_the_limit_are_rejected() {
        let row = || Row::new().with("a", Value::Integer(1));
        let fits = Table::with_keys("t", vec![(RowKey::from("x".repeat(32).as_str()), row())]);
        let schema = infer_schema(&fits, "id").unwrap();
        check_key_lengths(&fits, &schema).unwrap();

        let long = Table::with_keys("t", vec![(RowKey::from("x".repeat(33).as_str()), row())]);
        let err = check_key_lengths(&long, &schema).unwrap_err();
        assert!(matches!(err, EtlError::Schema { .. }));
        assert!(err.to_string().contains("longer than 32"));
    }

    #[test]
    fn data_column_named_like_the_key_is_folded() {
        let table = Table::from_rows(
            "t",
            vec![Row::new()
                .with("id", Value::Text("A-1".into()))
                .with("qty", Value::Integer(3))],
        );
        let schema = infer_schema(&table, "id").unwrap();
        assert_eq!(schema.column_names().collect::<Vec<_>>(), vec!["id", "qty"]);
        assert_eq!(schema.key().sql_type, SqlType::Integer);
    }
}
