// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! TableFlow - table-oriented query execution environment
//!
//! TableFlow resolves queries and INSERT statements against registered
//! tables and controls when, and how often, the resulting computation runs.
//!
//! # Quick Start
//!
//! ```no_run
//! use tableflow::{EnvironmentSettings, TableEnvironment};
//!
//! # fn main() -> tableflow::Result<()> {
//! let env = TableEnvironment::create(EnvironmentSettings::batch())?;
//! env.execute_sql(
//!     "CREATE TABLE people (first STRING, last STRING) \
//!      WITH ('connector' = 'filesystem', 'path' = 'people.csv')",
//! )?;
//! env.execute_sql(
//!     "CREATE TABLE names (name STRING) \
//!      WITH ('connector' = 'filesystem', 'path' = 'names.csv')",
//! )?;
//!
//! let mut set = env.create_statement_set();
//! set.add_insert_sql("INSERT INTO names SELECT first FROM people")?;
//! println!("{}", set.explain(false)?);
//! let result = set.execute()?;
//! println!("{}", result.print_to_string()?);
//! # Ok(())
//! # }
//! ```
//!
//! # Execution guarantees
//!
//! - Building tables and buffering statements runs nothing
//! - Explaining never starts a job
//! - Each submission starts at most one job, and its sinks are written at
//!   most once
//! - Result rows can be consumed exactly once

pub mod catalog;
pub mod config;
pub mod connectors;
pub mod env;
pub mod error;
pub mod exec;
pub mod plan;
pub mod sql;
pub mod stream;
pub mod types;

pub use catalog::ObjectIdentifier;
pub use config::{EnvironmentSettings, RuntimeMode};
pub use connectors::{TableDescriptor, TableSink, TableSource};
pub use env::{Internal, Public, Table, TableEnvironment};
pub use error::{Result, TableError};
pub use exec::{
    ExecutionState, JobClient, JobStatus, ResultKind, RowIterator, StatementSet, TableResult,
};
pub use plan::normalize_stage_ids;
pub use stream::{DataStream, StreamEnvironment};
pub use types::{Column, DataType, ResolvedSchema, Row, RowKind, Value};
