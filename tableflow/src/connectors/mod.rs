// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Source and sink connector contracts
//!
//! The execution core only depends on the [`TableSource`] and [`TableSink`]
//! traits. Concrete connectors shipped here:
//! - In-memory source/sink (tests and embedding)
//! - Delimited-file (CSV) source/sink
//! - Blackhole sink
//! - A factory turning table descriptors into connector instances

pub mod memory;
pub mod filesystem;
pub mod factory;

use std::fmt;
use thiserror::Error;

use crate::types::Row;

pub use factory::{ConnectorFactory, TableDescriptor};
pub use filesystem::{CsvTableSink, CsvTableSource};
pub use memory::{BlackholeSink, MemorySink, MemorySource};

/// Errors raised by connector implementations
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be decoded
    #[error("Invalid record at line {line}: {message}")]
    InvalidRecord { line: usize, message: String },

    /// The connector does not support the requested operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Missing or invalid connector options
    #[error("Invalid connector options: {0}")]
    InvalidOptions(String),
}

/// Bounded origin of rows
pub trait TableSource: Send + Sync + fmt::Debug {
    /// Read every row of the source
    fn read(&self) -> Result<Vec<Row>, ConnectorError>;

    /// Short description used in plan explanations
    fn describe(&self) -> String;
}

/// Destination of rows produced by a submission
///
/// A job calls exactly one of `write` or `overwrite` per sink, once, with
/// all rows it produced.
pub trait TableSink: Send + Sync + fmt::Debug {
    /// Append rows to the existing content
    fn write(&self, rows: &[Row]) -> Result<(), ConnectorError>;

    /// Replace the existing content with `rows`
    fn overwrite(&self, rows: &[Row]) -> Result<(), ConnectorError> {
        let _ = rows;
        Err(ConnectorError::Unsupported(format!(
            "{} does not support overwrite",
            self.describe()
        )))
    }

    fn supports_overwrite(&self) -> bool {
        false
    }

    /// Whether update and delete rows may be written
    fn accepts_changelog(&self) -> bool {
        false
    }

    /// Short description used in plan explanations
    fn describe(&self) -> String;
}
