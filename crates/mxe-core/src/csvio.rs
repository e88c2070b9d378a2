//! Shared CSV helpers for the table files
//!
//! All tables are comma-delimited, double-quoted-as-needed UTF-8 with one
//! header row. Readers are flexible because subgraph tables have
//! variable-width rows; blank lines are skipped. Each file is fully read
//! and closed before the caller moves on.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Read a table file into its header row and data rows
pub fn read_rows(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }

    Ok((header, rows))
}

/// Write a table file: one header row, then the data rows verbatim
pub fn write_rows<S: AsRef<str>>(path: &Path, header: &[S], rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;

    writer
        .write_record(header.iter().map(|s| s.as_ref()))
        .map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
    for row in rows {
        writer.write_record(row).map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_preserves_quoted_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");

        let rows = vec![
            vec!["0".to_string(), "has, comma".to_string()],
            vec!["1".to_string(), "has \"quote\"".to_string()],
        ];
        write_rows(&path, &["ID", "Name"], &rows).unwrap();

        let (header, read) = read_rows(&path).unwrap();
        assert_eq!(header, vec!["ID", "Name"]);
        assert_eq!(read, rows);
    }

    #[test]
    fn test_variable_width_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");

        let rows = vec![
            vec!["0".to_string(), "5".to_string(), "3".to_string(), "10 11".to_string()],
            vec!["1".to_string(), "6".to_string()],
        ];
        write_rows(&path, &["ID", "Node Parameter", "Next Node 1", "Next Node 1 Parameters"], &rows)
            .unwrap();

        let (_, read) = read_rows(&path).unwrap();
        assert_eq!(read[0].len(), 4);
        assert_eq!(read[1].len(), 2);
        assert_eq!(read[0][3], "10 11");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_rows(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
