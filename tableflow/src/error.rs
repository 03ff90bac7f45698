// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for TableFlow

use thiserror::Error;

use crate::connectors::ConnectorError;

/// Result type alias for table environment operations
pub type Result<T> = std::result::Result<T, TableError>;

/// Main error type for table environment operations
#[derive(Error, Debug)]
pub enum TableError {
    /// A name did not resolve to a registered table of the expected role
    #[error("Unknown {role} '{name}'")]
    UnknownTable { name: String, role: &'static str },

    /// A name is already bound within its catalog/database scope
    #[error("Table '{0}' is already registered")]
    DuplicateName(String),

    /// Query output and target sink disagree on field count, order or type
    #[error("Schema mismatch for sink '{sink}': {reason}")]
    SchemaMismatch { sink: String, reason: String },

    /// Overwrite requested for a sink without overwrite support
    #[error("Sink '{0}' does not support INSERT OVERWRITE")]
    UnsupportedSinkMode(String),

    /// Plan construction failed; no job was started
    #[error("Compile error: {0}")]
    Compile(String),

    /// A result iterator was requested twice
    #[error("Result has already been consumed")]
    AlreadyConsumed,

    /// Failure raised by a running job
    #[error("Job '{job}' failed: {message}")]
    RuntimeExecution { job: String, message: String },

    /// The SQL text could not be parsed
    #[error("SQL parse error: {0}")]
    Parse(String),

    /// Another running submission already writes the sink
    #[error("Sink '{0}' is already being written by a running submission")]
    ConcurrentSinkWrite(String),

    /// Illegal execution state transition
    #[error("Invalid execution state: {0}")]
    InvalidState(String),

    /// Source or sink failure outside a running job
    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// Invalid environment settings
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TableError {
    pub(crate) fn unknown_table(name: impl Into<String>, role: &'static str) -> Self {
        TableError::UnknownTable {
            name: name.into(),
            role,
        }
    }

    pub(crate) fn schema_mismatch(sink: impl Into<String>, reason: impl Into<String>) -> Self {
        TableError::SchemaMismatch {
            sink: sink.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn runtime(job: impl Into<String>, message: impl ToString) -> Self {
        TableError::RuntimeExecution {
            job: job.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error was raised before any job was submitted
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            TableError::UnknownTable { .. }
                | TableError::DuplicateName(_)
                | TableError::SchemaMismatch { .. }
                | TableError::UnsupportedSinkMode(_)
                | TableError::Compile(_)
                | TableError::Parse(_)
        )
    }
}

impl From<serde_json::Error> for TableError {
    fn from(e: serde_json::Error) -> Self {
        TableError::Config(e.to_string())
    }
}
