// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory connectors

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ConnectorError, TableSink, TableSource};
use crate::types::{Row, Value};

/// Source over a fixed set of rows, counting how often it is read
#[derive(Debug)]
pub struct MemorySource {
    rows: Vec<Row>,
    reads: AtomicUsize,
}

impl MemorySource {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            reads: AtomicUsize::new(0),
        }
    }

    /// Build insert rows from plain value vectors
    pub fn from_values(values: Vec<Vec<Value>>) -> Self {
        Self::new(values.into_iter().map(Row::insert).collect())
    }

    /// Number of completed `read` calls
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl TableSource for MemorySource {
    fn read(&self) -> Result<Vec<Row>, ConnectorError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.clone())
    }

    fn describe(&self) -> String {
        format!("MemorySource(rows={})", self.rows.len())
    }
}

/// Sink collecting rows in memory
#[derive(Debug)]
pub struct MemorySink {
    rows: Mutex<Vec<Row>>,
    commits: AtomicUsize,
    overwrite: bool,
    changelog: bool,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    /// Sink supporting overwrite and changelog rows
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            commits: AtomicUsize::new(0),
            overwrite: true,
            changelog: true,
        }
    }

    /// Insert-only sink without overwrite support
    pub fn append_only() -> Self {
        Self::new().with_overwrite(false).with_changelog(false)
    }

    pub fn with_overwrite(mut self, enabled: bool) -> Self {
        self.overwrite = enabled;
        self
    }

    pub fn with_changelog(mut self, enabled: bool) -> Self {
        self.changelog = enabled;
        self
    }

    /// Every row received, changelog kinds included
    pub fn rows(&self) -> Vec<Row> {
        self.rows.lock().clone()
    }

    /// Net content after applying retractions
    pub fn materialized(&self) -> Vec<Vec<Value>> {
        let mut result: Vec<Vec<Value>> = Vec::new();
        for row in self.rows.lock().iter() {
            if row.kind().is_accumulate() {
                result.push(row.values().to_vec());
            } else if let Some(pos) = result.iter().position(|v| v.as_slice() == row.values()) {
                result.remove(pos);
            }
        }
        result
    }

    /// Number of successful write/overwrite calls
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    fn check_kinds(&self, rows: &[Row]) -> Result<(), ConnectorError> {
        if !self.changelog && rows.iter().any(|r| r.kind().is_retraction()) {
            return Err(ConnectorError::Unsupported(
                "append-only MemorySink received a retraction".to_string(),
            ));
        }
        Ok(())
    }
}

impl TableSink for MemorySink {
    fn write(&self, rows: &[Row]) -> Result<(), ConnectorError> {
        self.check_kinds(rows)?;
        self.rows.lock().extend_from_slice(rows);
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn overwrite(&self, rows: &[Row]) -> Result<(), ConnectorError> {
        if !self.overwrite {
            return Err(ConnectorError::Unsupported(
                "MemorySink configured without overwrite".to_string(),
            ));
        }
        self.check_kinds(rows)?;
        *self.rows.lock() = rows.to_vec();
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn supports_overwrite(&self) -> bool {
        self.overwrite
    }

    fn accepts_changelog(&self) -> bool {
        self.changelog
    }

    fn describe(&self) -> String {
        "MemorySink".to_string()
    }
}

/// Sink discarding everything it receives
#[derive(Debug, Default)]
pub struct BlackholeSink;

impl TableSink for BlackholeSink {
    fn write(&self, _rows: &[Row]) -> Result<(), ConnectorError> {
        Ok(())
    }

    fn overwrite(&self, _rows: &[Row]) -> Result<(), ConnectorError> {
        Ok(())
    }

    fn supports_overwrite(&self) -> bool {
        true
    }

    fn accepts_changelog(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "BlackholeSink".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_counts_reads() {
        let source = MemorySource::from_values(vec![vec![Value::BigInt(1)]]);
        assert_eq!(source.read_count(), 0);
        assert_eq!(source.read().unwrap().len(), 1);
        assert_eq!(source.read_count(), 1);
    }

    #[test]
    fn test_sink_materializes_retractions() {
        let sink = MemorySink::new();
        sink.write(&[
            Row::insert(vec![Value::BigInt(1)]),
            Row::delete(vec![Value::BigInt(1)]),
            Row::insert(vec![Value::BigInt(2)]),
        ])
        .unwrap();
        assert_eq!(sink.rows().len(), 3);
        assert_eq!(sink.materialized(), vec![vec![Value::BigInt(2)]]);
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let sink = MemorySink::new();
        sink.write(&[Row::insert(vec![Value::BigInt(1)])]).unwrap();
        sink.overwrite(&[Row::insert(vec![Value::BigInt(7)])]).unwrap();
        assert_eq!(sink.materialized(), vec![vec![Value::BigInt(7)]]);
        assert_eq!(sink.commit_count(), 2);
    }

    #[test]
    fn test_append_only_rejects_retractions_and_overwrite() {
        let sink = MemorySink::append_only();
        assert!(!sink.supports_overwrite());
        assert!(sink.write(&[Row::delete(vec![Value::BigInt(1)])]).is_err());
        assert!(sink.overwrite(&[]).is_err());
    }
}
