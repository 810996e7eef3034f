//! CSV output for extracted records.
//!
//! Writes a two-column table (name, points). Points keep their digit grouping,
//! so fields containing commas are quoted.

use anyhow::{Context, Result};
use std::borrow::Cow;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::config::LayoutMode;
use crate::error::ExtractError;
use crate::matcher::AssignmentRecord;

/// Header of the name column for a layout.
pub fn name_header(layout: LayoutMode) -> &'static str {
    match layout {
        LayoutMode::Chunked => "Nickname",
        LayoutMode::Single | LayoutMode::Auto => "Name",
    }
}

/// Writes all records to `path`, replacing any existing file.
///
/// Refuses to write an empty table.
pub fn write_records(path: &Path, name_column: &str, records: &[AssignmentRecord]) -> Result<()> {
    if records.is_empty() {
        return Err(ExtractError::NoRecords.into());
    }

    let mut file = File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

    writeln!(file, "{},Points", escape_field(name_column)).context("Failed to write CSV header")?;
    for record in records {
        writeln!(
            file,
            "{},{}",
            escape_field(&record.name),
            escape_field(&record.points)
        )
        .context("Failed to write CSV row")?;
    }
    Ok(())
}

/// Quotes a field if it contains a delimiter, quote or line break.
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_records() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("clan_points.csv");
        let records = vec![
            AssignmentRecord::new("Spider Friend", "215,600"),
            AssignmentRecord::new("Finde", "9,876"),
        ];

        write_records(&csv_path, "Name", &records).unwrap();

        let content = std::fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["Name,Points", "Spider Friend,\"215,600\"", "Finde,\"9,876\""]);
    }

    #[test]
    fn test_write_records_replaces_existing() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("clan_points.csv");
        std::fs::write(&csv_path, "old,data\n1,2\n3,4\n").unwrap();

        write_records(&csv_path, "Nickname", &[AssignmentRecord::new("Akshat", "196,570")]).unwrap();

        let content = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.starts_with("Nickname,Points"));
    }

    #[test]
    fn test_write_records_empty_is_error() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("clan_points.csv");

        let err = write_records(&csv_path, "Name", &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExtractError>(),
            Some(ExtractError::NoRecords)
        ));
        assert!(!csv_path.exists());
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("Finde"), "Finde");
        assert_eq!(escape_field("1,000"), "\"1,000\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_name_header() {
        assert_eq!(name_header(LayoutMode::Single), "Name");
        assert_eq!(name_header(LayoutMode::Chunked), "Nickname");
    }
}
