// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Delimited-file connectors
//!
//! One record per line, fields separated by a single delimiter, no quoting.
//! NULL is written as an empty field.

use log::debug;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{ConnectorError, TableSink, TableSource};
use crate::types::{ResolvedSchema, Row, Value};

/// Default field delimiter
pub const DEFAULT_DELIMITER: char = ',';

/// Reads a delimited file according to a schema
#[derive(Debug, Clone)]
pub struct CsvTableSource {
    path: PathBuf,
    schema: ResolvedSchema,
    delimiter: char,
}

impl CsvTableSource {
    pub fn new(path: impl Into<PathBuf>, schema: ResolvedSchema) -> Self {
        Self {
            path: path.into(),
            schema,
            delimiter: DEFAULT_DELIMITER,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_line(&self, line_no: usize, line: &str) -> Result<Row, ConnectorError> {
        let fields: Vec<&str> = line.split(self.delimiter).collect();
        if fields.len() != self.schema.column_count() {
            return Err(ConnectorError::InvalidRecord {
                line: line_no,
                message: format!(
                    "expected {} fields, found {}",
                    self.schema.column_count(),
                    fields.len()
                ),
            });
        }

        let values = fields
            .iter()
            .zip(self.schema.columns())
            .map(|(field, column)| Value::parse_as(field, column.data_type))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|message| ConnectorError::InvalidRecord {
                line: line_no,
                message,
            })?;
        Ok(Row::insert(values))
    }
}

impl TableSource for CsvTableSource {
    fn read(&self) -> Result<Vec<Row>, ConnectorError> {
        let content = fs::read_to_string(&self.path)?;
        let rows = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| self.parse_line(i + 1, line))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Read {} rows from {:?}", rows.len(), self.path);
        Ok(rows)
    }

    fn describe(&self) -> String {
        format!("CsvTableSource(path={})", self.path.display())
    }
}

/// Writes rows to a delimited file
///
/// `write` appends to the file, `overwrite` stages a sibling file and renames
/// it over the target so readers see either the old or the new content.
#[derive(Debug, Clone)]
pub struct CsvTableSink {
    path: PathBuf,
    delimiter: char,
}

impl CsvTableSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: DEFAULT_DELIMITER,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode<W: Write>(&self, out: &mut W, rows: &[Row]) -> Result<(), ConnectorError> {
        let delimiter = self.delimiter.to_string();
        for row in rows {
            if row.kind().is_retraction() {
                return Err(ConnectorError::Unsupported(format!(
                    "{} is append-only but received {}",
                    self.describe(),
                    row
                )));
            }
            let fields: Vec<String> = row.values().iter().map(Value::to_field_string).collect();
            writeln!(out, "{}", fields.join(&delimiter))?;
        }
        Ok(())
    }

    fn ensure_parent(&self) -> Result<(), ConnectorError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sink".to_string());
        self.path
            .with_file_name(format!(".{}.inprogress.{}", file_name, uuid::Uuid::new_v4()))
    }
}

impl TableSink for CsvTableSink {
    fn write(&self, rows: &[Row]) -> Result<(), ConnectorError> {
        self.ensure_parent()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut out = BufWriter::new(file);
        self.encode(&mut out, rows)?;
        out.flush()?;
        debug!("Appended {} rows to {:?}", rows.len(), self.path);
        Ok(())
    }

    fn overwrite(&self, rows: &[Row]) -> Result<(), ConnectorError> {
        self.ensure_parent()?;
        let staging = self.staging_path();
        let result = (|| -> Result<(), ConnectorError> {
            let mut out = BufWriter::new(fs::File::create(&staging)?);
            self.encode(&mut out, rows)?;
            out.flush()?;
            fs::rename(&staging, &self.path)?;
            Ok(())
        })();
        match &result {
            Ok(()) => debug!("Overwrote {:?} with {} rows", self.path, rows.len()),
            Err(e) => {
                debug!("Overwrite of {:?} failed: {}", self.path, e);
                let _ = fs::remove_file(&staging);
            }
        }
        result
    }

    fn supports_overwrite(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        format!("CsvTableSink(path={})", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;
    use tempfile::TempDir;

    fn schema() -> ResolvedSchema {
        ResolvedSchema::of(&[("name", DataType::String), ("age", DataType::BigInt)])
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("people.csv");
        let sink = CsvTableSink::new(&path).with_delimiter('|');
        sink.write(&[Row::insert(vec![Value::from("Ann"), Value::BigInt(31)])])
            .unwrap();
        sink.write(&[Row::insert(vec![Value::from("Bo"), Value::Null])])
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "Ann|31\nBo|\n");

        let source = CsvTableSource::new(&path, schema()).with_delimiter('|');
        let rows = source.read().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].values(), &[Value::from("Bo"), Value::Null]);
    }

    #[test]
    fn test_overwrite_replaces_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.csv");
        let sink = CsvTableSink::new(&path);
        sink.write(&[Row::insert(vec![Value::from("old"), Value::BigInt(1)])])
            .unwrap();
        sink.overwrite(&[Row::insert(vec![Value::from("new"), Value::BigInt(2)])])
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new,2\n");
        // no staging files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_rejects_retractions() {
        let dir = TempDir::new().unwrap();
        let sink = CsvTableSink::new(dir.path().join("t.csv"));
        let err = sink.overwrite(&[Row::delete(vec![Value::BigInt(1)])]);
        assert!(matches!(err, Err(ConnectorError::Unsupported(_))));
        assert!(!dir.path().join("t.csv").exists());
    }

    #[test]
    fn test_failed_overwrite_keeps_previous_content() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.csv");
        let sink = CsvTableSink::new(&path);
        sink.write(&[Row::insert(vec![Value::from("old"), Value::BigInt(1)])])
            .unwrap();

        let err = sink.overwrite(&[
            Row::insert(vec![Value::from("new"), Value::BigInt(2)]),
            Row::delete(vec![Value::from("old"), Value::BigInt(1)]),
        ]);
        assert!(matches!(err, Err(ConnectorError::Unsupported(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "old,1\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_bad_record_reports_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "Ann,31\nBo,xx\n").unwrap();
        let err = CsvTableSource::new(&path, schema()).read().unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidRecord { line: 2, .. }));
    }

    #[test]
    fn test_missing_file() {
        let source = CsvTableSource::new("/nonexistent/file.csv", schema());
        assert!(matches!(source.read(), Err(ConnectorError::Io(_))));
    }
}
