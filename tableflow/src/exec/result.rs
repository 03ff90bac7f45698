// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statement results

use comfy_table::presets::ASCII_FULL;
use comfy_table::Table as TextTable;
use log::debug;
use parking_lot::Mutex;

use super::controller::{ExecutionController, ExecutionState};
use super::job::JobClient;
use super::row_iterator::RowIterator;
use crate::error::{Result, TableError};
use crate::types::{Column, DataType, ResolvedSchema, Row, Value};

/// Whether a result carries rows beyond an acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
    SuccessNoContent,
    SuccessWithContent,
}

/// Outcome of executing a statement or statement set
///
/// The rows can be taken exactly once.
#[derive(Debug)]
pub struct TableResult {
    schema: ResolvedSchema,
    kind: ResultKind,
    job: Option<JobClient>,
    controller: Option<ExecutionController>,
    /// Whether rows carry a changelog kind worth printing
    changelog: bool,
    /// Whether the job blocks until its rows are pulled
    streams_rows: bool,
    rows: Mutex<Option<RowIterator>>,
}

impl TableResult {
    fn build(schema: ResolvedSchema, kind: ResultKind, rows: RowIterator) -> Self {
        Self {
            schema,
            kind,
            job: None,
            controller: None,
            changelog: false,
            streams_rows: false,
            rows: Mutex::new(Some(rows)),
        }
    }

    /// Acknowledgement without a job
    pub(crate) fn ok() -> Self {
        Self::build(
            ResolvedSchema::new(vec![Column::new("result", DataType::String)]),
            ResultKind::SuccessNoContent,
            RowIterator::from_rows(vec![Row::insert(vec![Value::from("OK")])]),
        )
    }

    /// Precomputed content without a job
    pub(crate) fn with_rows(schema: ResolvedSchema, rows: Vec<Row>) -> Self {
        Self::build(schema, ResultKind::SuccessWithContent, RowIterator::from_rows(rows))
    }

    /// Result backed by a submitted job
    pub(crate) fn for_job(
        schema: ResolvedSchema,
        rows: RowIterator,
        job: JobClient,
        controller: ExecutionController,
    ) -> Self {
        Self {
            job: Some(job),
            controller: Some(controller),
            ..Self::build(schema, ResultKind::SuccessWithContent, rows)
        }
    }

    /// Result whose rows are streamed out of a running query job
    pub(crate) fn for_query(
        schema: ResolvedSchema,
        rows: RowIterator,
        job: JobClient,
        controller: ExecutionController,
        changelog: bool,
    ) -> Self {
        Self {
            changelog,
            streams_rows: true,
            ..Self::for_job(schema, rows, job, controller)
        }
    }

    pub fn resolved_schema(&self) -> &ResolvedSchema {
        &self.schema
    }

    pub fn result_kind(&self) -> ResultKind {
        self.kind
    }

    /// Handle of the job behind this result; `None` when nothing was submitted
    pub fn job_client(&self) -> Option<&JobClient> {
        self.job.as_ref()
    }

    /// State of the submission that produced this result
    pub fn execution_state(&self) -> ExecutionState {
        match &self.controller {
            Some(controller) => controller.state(),
            None => ExecutionState::Completed,
        }
    }

    /// Take the row iterator; a second call fails with `AlreadyConsumed`
    pub fn collect(&self) -> Result<RowIterator> {
        self.rows.lock().take().ok_or(TableError::AlreadyConsumed)
    }

    /// Block until the job behind this result terminates
    ///
    /// A query job only finishes once its rows are pulled, so rows of a
    /// query result not taken yet are drained and discarded first.
    pub fn await_completion(&self) -> Result<()> {
        let job = match &self.job {
            Some(job) => job,
            None => return Ok(()),
        };
        if self.streams_rows {
            let pending = self.rows.lock().take();
            if let Some(rows) = pending {
                let discarded = rows.into_rows()?.len();
                debug!(
                    "Discarded {} unread row(s) of job '{}'",
                    discarded,
                    job.job_name()
                );
            }
        }
        job.await_completion().map(|_| ())
    }

    /// Render all rows as a text table; consumes the rows
    pub fn print_to_string(&self) -> Result<String> {
        let rows = self.collect()?.into_rows()?;

        let mut table = TextTable::new();
        table.load_preset(ASCII_FULL);
        let mut header = Vec::with_capacity(self.schema.column_count() + 1);
        if self.changelog {
            header.push("op".to_string());
        }
        header.extend(self.schema.column_names());
        table.set_header(header);

        for row in &rows {
            let mut cells = Vec::with_capacity(row.arity() + 1);
            if self.changelog {
                cells.push(row.kind().short_string().to_string());
            }
            cells.extend(row.values().iter().map(Value::to_string));
            table.add_row(cells);
        }

        let noun = if rows.len() == 1 { "row" } else { "rows" };
        Ok(format!("{}\n{} {} in set", table, rows.len(), noun))
    }
}
