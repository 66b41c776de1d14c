//! Input discovery: find the files in a folder that become tables.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{EtlError, EtlResult};

/// A file selected for ingestion, paired with the table it becomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// File name with the matched extension removed.
    pub table_name: String,
}

/// List the files directly inside `folder` whose name ends with one of `extensions`.
///
/// Extensions may be given with or without the leading dot and match case-insensitively.
/// Results are sorted by file name. Sub-folders are not searched.
pub fn discover_tables(folder: impl AsRef<Path>, extensions: &[String]) -> EtlResult<Vec<SourceFile>> {
    let folder = folder.as_ref();
    if !folder.is_dir() {
        return Err(EtlError::Discovery {
            folder: folder.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let suffixes: Vec<String> = extensions
        .iter()
        .map(|e| {
            let e = e.to_ascii_lowercase();
            if e.starts_with('.') { e } else { format!(".{e}") }
        })
        .collect();

    let mut out = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| EtlError::Discovery {
            folder: folder.to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str() else {
            continue;
        };
        if let Some(table_name) = strip_extension(file_name, &suffixes) {
            out.push(SourceFile {
                path: entry.path().to_path_buf(),
                table_name,
            });
        }
    }

    Ok(out)
}

fn strip_extension(file_name: &str, suffixes: &[String]) -> Option<String> {
    let lower = file_name.to_ascii_lowercase();
    suffixes
        .iter()
        .find(|s| lower.len() > s.len() && lower.ends_with(s.as_str()))
        .map(|s| file_name[..file_name.len() - s.len()].to_owned())
}

#[cfg(test)]
mod tests {
    use super::strip_extension;

    #[test]
    fn strip_extension_matches_case_insensitively() {
        let suffixes = vec![".csv".to_string(), ".txt".to_string()];
        assert_eq!(strip_extension("Orders.CSV", &suffixes), Some("Orders".to_string()));
        assert_eq!(strip_extension("notes.txt", &suffixes), Some("notes".to_string()));
        assert_eq!(strip_extension("data.json", &suffixes), None);
        assert_eq!(strip_extension(".csv", &suffixes), None);
    }
}
