// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statement execution
//!
//! This module decides when a compiled plan runs and makes sure it runs at
//! most once per submission:
//! - Statement buffering (statement sets)
//! - The per-submission execution state machine
//! - The execution backend contract and the local tokio-based backend
//! - Job handles and sink write locks
//! - Lazy, single-pass result iteration

pub mod job;
mod operators;
pub mod runtime;
pub mod row_iterator;
pub mod result;
pub mod controller;
pub mod statement_set;

pub use job::{JobClient, JobExecutionResult, JobStatus, SinkLockRegistry, SinkWriteGuard};
pub use runtime::{ExecutionBackend, JobSubmission, LocalExecutor, SubmittedJob};
pub use row_iterator::RowIterator;
pub use result::{ResultKind, TableResult};
pub use controller::{ExecutionController, ExecutionServices, ExecutionState};
pub use statement_set::{Statement, StatementKind, StatementSet};
