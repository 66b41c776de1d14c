//! Delimited-text parsing.
//!
//! Column names come from the header line. Cell types are guessed per cell, the way a typical
//! tabular reader would: integer, then float, then boolean, then text.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::error::{EtlError, EtlResult};
use crate::types::{Row, RowKey, Table, Value};

/// Options controlling delimited-text parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Field delimiter byte.
    pub delimiter: u8,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// Parse a delimited file into rows, one per data line.
///
/// Rules:
///
/// - The first line is the header. One leading and one trailing space are stripped from names,
///   and repeated names become `a`, `a.1`, `a.2`, ...
/// - One trailing space is stripped from every cell.
/// - A cell containing a comma is read as a decimal with `,` as separator (`"1,5"` -> `1.5`).
/// - Ragged lines, undecodable text, or zero data lines are a [`EtlError::Parse`].
pub fn parse_csv_from_path(path: impl AsRef<Path>, options: &ParseOptions) -> EtlResult<Vec<Row>> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(options.delimiter)
        .from_path(path)
        .map_err(|e| EtlError::parse(path, e.to_string()))?;
    parse_csv_from_reader(&mut rdr, path)
}

/// Parse rows from an existing CSV reader. `source` is only used in error messages.
pub fn parse_csv_from_reader<R: Read>(rdr: &mut csv::Reader<R>, source: &Path) -> EtlResult<Vec<Row>> {
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| EtlError::parse(source, format!("cannot read header: {e}")))?
        .iter()
        .map(normalize_header)
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(EtlError::parse(source, "missing header line"));
    }
    let headers = dedupe_headers(headers);

    let mut rows = Vec::new();
    for (row_idx0, result) in rdr.records().enumerate() {
        // 1-based line number for users; +1 again because the header is line 1.
        let line = row_idx0 + 2;
        let record =
            result.map_err(|e| EtlError::parse(source, format!("line {line}: {e}")))?;

        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(name, raw)| (name.clone(), parse_cell(raw)))
            .collect();
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(EtlError::parse(source, "no data rows after header"));
    }

    debug!(source = %source.display(), rows = rows.len(), columns = headers.len(), "parsed delimited file");
    Ok(rows)
}

/// Parse a file into a [`Table`].
///
/// When the header carries `key_column`, its values become the row identifiers and the column
/// is removed from the rows; an empty key cell is a [`EtlError::Parse`]. Otherwise rows are keyed
/// by zero-based index.
pub fn read_table(
    path: impl AsRef<Path>,
    table_name: impl Into<String>,
    key_column: &str,
    options: &ParseOptions,
) -> EtlResult<Table> {
    let path = path.as_ref();
    let rows = parse_csv_from_path(path, options)?;
    if !rows.first().is_some_and(|r| r.get(key_column).is_some()) {
        return Ok(Table::from_rows(table_name, rows));
    }

    let mut keyed = Vec::with_capacity(rows.len());
    for (row_idx0, mut row) in rows.into_iter().enumerate() {
        let key = row
            .remove(key_column)
            .as_ref()
            .and_then(RowKey::from_value)
            .ok_or_else(|| {
                EtlError::parse(
                    path,
                    format!("line {}: empty value in key column '{key_column}'", row_idx0 + 2),
                )
            })?;
        keyed.push((key, row));
    }
    debug!(source = %path.display(), key_column, "rows keyed by source column");
    Ok(Table::with_keys(table_name, keyed))
}

/// Rename repeated header names so every column survives: `a, a, a` becomes `a, a.1, a.2`.
pub fn dedupe_headers(names: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(names.len());
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.clone();
        let mut n = 0;
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{name}.{n}");
        }
        if n > 0 {
            debug!(column = %name, renamed = %candidate, "duplicate header renamed");
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

/// Strip one leading and one trailing space from a header name.
pub fn normalize_header(raw: &str) -> String {
    let name = raw.strip_prefix(' ').unwrap_or(raw);
    let name = name.strip_suffix(' ').unwrap_or(name);
    name.to_owned()
}

/// Turn one raw cell into a typed [`Value`].
pub fn parse_cell(raw: &str) -> Value {
    let cell = raw.strip_suffix(' ').unwrap_or(raw);
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }

    if trimmed.contains(',') {
        // Locale-style decimal; anything that still isn't a number stays text.
        return match parse_float(&trimmed.replace(',', ".")) {
            Some(v) => Value::Real(v),
            None => Value::Text(cell.to_owned()),
        };
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Some(f) = parse_float(trimmed) {
        return Value::Real(f);
    }
    if let Some(b) = parse_bool(trimmed) {
        return Value::Bool(b);
    }
    Value::Text(cell.to_owned())
}

// f64::from_str also accepts "inf"/"NaN"; those stay text.
fn parse_float(s: &str) -> Option<f64> {
    if !s.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<f64>().ok()
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(input: &str) -> EtlResult<Vec<Row>> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(input.as_bytes());
        parse_csv_from_reader(&mut rdr, Path::new("inline.csv"))
    }

    #[test]
    fn parse_cell_guesses_scalar_types() {
        assert_eq!(parse_cell("42"), Value::Integer(42));
        assert_eq!(parse_cell("-7"), Value::Integer(-7));
        assert_eq!(parse_cell("2.5"), Value::Real(2.5));
        assert_eq!(parse_cell("TRUE"), Value::Bool(true));
        assert_eq!(parse_cell("false"), Value::Bool(false));
        assert_eq!(parse_cell("hello"), Value::Text("hello".to_string()));
        assert_eq!(parse_cell(""), Value::Null);
        assert_eq!(parse_cell("inf"), Value::Text("inf".to_string()));
    }

    #[test]
    fn parse_cell_reads_comma_decimals() {
        assert_eq!(parse_cell("1,5"), Value::Real(1.5));
        assert_eq!(parse_cell("3,0 "), Value::Real(3.0));
        assert_eq!(
            parse_cell("Smith, John"),
            Value::Text("Smith, John".to_string())
        );
        assert_eq!(parse_cell("1,234,5"), Value::Text("1,234,5".to_string()));
    }

    #[test]
    fn parse_cell_strips_a_single_trailing_space() {
        assert_eq!(parse_cell("abc "), Value::Text("abc".to_string()));
        assert_eq!(parse_cell("abc  "), Value::Text("abc ".to_string()));
        assert_eq!(parse_cell("12 "), Value::Integer(12));
    }

    #[test]
    fn normalize_header_strips_one_space_each_side() {
        assert_eq!(normalize_header(" name "), "name");
        assert_eq!(normalize_header("unit price"), "unit price");
        assert_eq!(normalize_header("  padded"), " padded");
    }

    #[test]
    fn parses_rows_in_order_with_normalized_names() {
        let rows = parse_str("name, age ,price\nAda,36,\"1,5\"\nGrace ,45,2.25\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), vec!["name", "age", "price"]);
        assert_eq!(rows[0].get("price"), Some(&Value::Real(1.5)));
        assert_eq!(rows[1].get("name"), Some(&Value::Text("Grace".to_string())));
        assert_eq!(rows[1].get("age"), Some(&Value::Integer(45)));
    }

    #[test]
    fn repeated_headers_keep_every_column() {
        let rows = parse_str("a,a\n1,2\n").unwrap();
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), vec!["a", "a.1"]);
        assert_eq!(rows[0].get("a"), Some(&Value::Integer(1)));
        assert_eq!(rows[0].get("a.1"), Some(&Value::Integer(2)));

        // Only duplicates once the surrounding spaces are stripped.
        let rows = parse_str("a, a ,a.1\nx,y,z\n").unwrap();
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), vec!["a", "a.1", "a.1.1"]);
        assert_eq!(rows[0].get("a.1.1"), Some(&Value::Text("z".to_string())));
    }

    #[test]
    fn header_only_input_is_a_parse_error() {
        let err = parse_str("a,b\n").unwrap_err();
        assert!(matches!(err, EtlError::Parse { .. }));
        assert!(err.to_string().contains("no data rows"));
    }

    #[test]
    fn ragged_line_is_a_parse_error() {
        let err = parse_str("a,b\n1,2\n3\n").unwrap_err();
        assert!(matches!(err, EtlError::Parse { .. }));
        assert!(err.to_string().contains("line 3"));
    }
}
