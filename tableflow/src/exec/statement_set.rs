// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statement sets - buffered INSERTs executed as one unit

use log::{debug, info};
use std::fmt;
use std::sync::Arc;

use super::controller::{ExecutionController, ExecutionState};
use super::result::TableResult;
use crate::env::{EnvContext, Table};
use crate::error::{Result, TableError};
use crate::plan::{LogicalNode, PlanOutput, PlanRequest, SinkTarget};
use crate::sql::SqlStatement;
use crate::types::ResolvedSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Insert,
    InsertOverwrite,
}

/// One validated INSERT; immutable once built
#[derive(Debug, Clone)]
pub struct Statement {
    kind: StatementKind,
    target: SinkTarget,
    query: LogicalNode,
}

impl Statement {
    /// Validate the query against the target schema by position
    pub fn new(target: SinkTarget, query: LogicalNode) -> Result<Self> {
        let sink_name = target
            .table
            .as_ref()
            .map(|t| t.as_summary_string())
            .unwrap_or_else(|| target.sink.describe());
        check_positional_schema(&sink_name, &query.schema(), &target.schema)?;
        let kind = if target.overwrite {
            StatementKind::InsertOverwrite
        } else {
            StatementKind::Insert
        };
        Ok(Self {
            kind,
            target,
            query,
        })
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn target(&self) -> &SinkTarget {
        &self.target
    }

    pub fn query(&self) -> &LogicalNode {
        &self.query
    }

    pub(crate) fn to_request(&self) -> PlanRequest {
        PlanRequest::insert(self.query.clone(), self.target.clone())
    }
}

/// Field count and types must line up; names are ignored
fn check_positional_schema(sink: &str, query: &ResolvedSchema, target: &ResolvedSchema) -> Result<()> {
    if query.column_count() != target.column_count() {
        return Err(TableError::schema_mismatch(
            sink,
            format!(
                "query has {} column(s) but the sink has {}",
                query.column_count(),
                target.column_count()
            ),
        ));
    }
    for (index, (produced, expected)) in query.columns().iter().zip(target.columns()).enumerate() {
        if produced.data_type != expected.data_type {
            return Err(TableError::schema_mismatch(
                sink,
                format!(
                    "column {} has type {} in the query but {} (`{}`) in the sink",
                    index, produced.data_type, expected.data_type, expected.name
                ),
            ));
        }
    }
    Ok(())
}

/// Job name for a set of insert requests, e.g. `insert-into_c.d.a,c.d.b`
pub(crate) fn insert_job_name(prefix: &str, requests: &[PlanRequest]) -> String {
    let targets: Vec<String> = requests
        .iter()
        .filter_map(|r| match &r.output {
            PlanOutput::Sink(SinkTarget {
                table: Some(table), ..
            }) => Some(table.as_summary_string()),
            _ => None,
        })
        .collect();
    if targets.is_empty() {
        prefix.to_string()
    } else {
        format!("{}_{}", prefix, targets.join(","))
    }
}

/// Ordered buffer of INSERT statements sharing one execution unit
///
/// The buffer only changes through `add_*`, `clear` and a successful
/// `execute`, which empties it.
pub struct StatementSet {
    ctx: Arc<EnvContext>,
    statements: Vec<Statement>,
    controller: ExecutionController,
}

impl fmt::Debug for StatementSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementSet")
            .field("statements", &self.statements.len())
            .field("state", &self.controller.state())
            .finish()
    }
}

impl StatementSet {
    pub(crate) fn new(ctx: Arc<EnvContext>) -> Self {
        Self {
            ctx,
            statements: Vec::new(),
            controller: ExecutionController::new(),
        }
    }

    /// Buffer `INSERT INTO target <table>`
    pub fn add_insert(&mut self, target: &str, table: &Table, overwrite: bool) -> Result<&mut Self> {
        let target = self.ctx.sink_target(target, overwrite)?;
        let statement = Statement::new(target, table.logical_plan().clone())?;
        self.push(statement);
        Ok(self)
    }

    /// Parse an INSERT statement and buffer it
    pub fn add_insert_sql(&mut self, sql: &str) -> Result<&mut Self> {
        let insert = match self.ctx.parse(sql)? {
            SqlStatement::Insert(insert) => insert,
            other => {
                return Err(TableError::Compile(format!(
                    "only INSERT statements can be added to a statement set, got {}",
                    other.kind_name()
                )))
            }
        };
        let query = self.ctx.plan_select(&insert.query)?;
        let target = self.ctx.sink_target(&insert.target, insert.overwrite)?;
        let statement = Statement::new(target, query)?;
        self.push(statement);
        Ok(self)
    }

    fn push(&mut self, statement: Statement) {
        debug!(
            "Buffered {:?} into {}",
            statement.kind,
            statement.target.sink.describe()
        );
        self.statements.push(statement);
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Drop every buffered statement
    pub fn clear(&mut self) {
        self.statements.clear();
    }

    /// State of the submission the next `execute` will start
    pub fn state(&self) -> ExecutionState {
        self.controller.state()
    }

    fn requests(&self) -> Vec<PlanRequest> {
        self.statements.iter().map(Statement::to_request).collect()
    }

    /// Render the plan of the buffered statements without running them
    pub fn explain(&mut self, extended: bool) -> Result<String> {
        let requests = self.requests();
        self.controller
            .explain(&self.ctx.services.compiler, &requests, extended)
    }

    /// Run every buffered statement as one job, then empty the buffer
    ///
    /// An empty set is a no-op returning `OK`. On a compile or submission
    /// error nothing runs and the buffer is kept.
    pub fn execute(&mut self) -> Result<TableResult> {
        self.run(None)
    }

    /// Like [`StatementSet::execute`], submitting the job as `job_name`
    pub fn execute_with_name(&mut self, job_name: &str) -> Result<TableResult> {
        self.run(Some(job_name))
    }

    fn run(&mut self, job_name: Option<&str>) -> Result<TableResult> {
        if self.statements.is_empty() {
            debug!("Statement set is empty; nothing to execute");
            return Ok(TableResult::ok());
        }
        let requests = self.requests();
        let job_name = match job_name {
            Some(name) => name.to_string(),
            None => insert_job_name(&self.ctx.settings.default_job_name, &requests),
        };

        // every execute is a new submission
        let controller = std::mem::take(&mut self.controller);
        let result = controller.execute_inserts(&self.ctx.services, &requests, &job_name)?;

        info!(
            "Executed statement set with {} statement(s) as job '{}'",
            self.statements.len(),
            job_name
        );
        self.statements.clear();
        Ok(result)
    }
}
