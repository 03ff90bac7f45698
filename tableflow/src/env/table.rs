// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Table handle - a query bound to its environment

use std::fmt;
use std::sync::Arc;

use super::context::EnvContext;
use crate::error::{Result, TableError};
use crate::exec::{ExecutionController, RowIterator, TableResult};
use crate::exec::statement_set::{insert_job_name, Statement};
use crate::plan::{LogicalNode, PlanRequest};
use crate::types::{ResolvedSchema, Value};

const COLLECT_JOB_NAME: &str = "collect";

/// Immutable description of a query
///
/// Building a table runs nothing. Each `execute`, `collect` or
/// `execute_insert` call is its own submission.
#[derive(Clone)]
pub struct Table {
    ctx: Arc<EnvContext>,
    node: LogicalNode,
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("schema", &self.node.schema())
            .finish()
    }
}

impl Table {
    pub(crate) fn new(ctx: Arc<EnvContext>, node: LogicalNode) -> Self {
        Self { ctx, node }
    }

    pub(crate) fn logical_plan(&self) -> &LogicalNode {
        &self.node
    }

    pub fn resolved_schema(&self) -> ResolvedSchema {
        self.node.schema()
    }

    /// Whether running the query incrementally produces updates
    pub fn is_updating(&self) -> bool {
        self.node.is_updating()
    }

    /// Project columns by name
    pub fn select(&self, columns: &[&str]) -> Result<Table> {
        let schema = self.node.schema();
        let projection = columns
            .iter()
            .map(|&name| {
                schema
                    .index_of(name)
                    .map(|index| (index, name.to_string()))
                    .ok_or_else(|| TableError::Compile(format!("column `{}` not found", name)))
            })
            .collect::<Result<Vec<_>>>()?;
        let node = LogicalNode::project(self.node.clone(), projection)?;
        Ok(Table::new(self.ctx.clone(), node))
    }

    /// Keep rows whose column equals `value`
    pub fn where_eq(&self, column: &str, value: impl Into<Value>) -> Result<Table> {
        let index = self
            .node
            .schema()
            .index_of(column)
            .ok_or_else(|| TableError::Compile(format!("column `{}` not found", column)))?;
        let node = LogicalNode::filter(self.node.clone(), index, value.into())?;
        Ok(Table::new(self.ctx.clone(), node))
    }

    pub fn explain(&self, extended: bool) -> Result<String> {
        ExecutionController::new().explain(
            &self.ctx.services.compiler,
            &[PlanRequest::collect(self.node.clone())],
            extended,
        )
    }

    /// Submit the query now and return its result
    pub fn execute(&self) -> Result<TableResult> {
        ExecutionController::new().execute_query(
            &self.ctx.services,
            PlanRequest::collect(self.node.clone()),
            COLLECT_JOB_NAME,
        )
    }

    /// Compile now; the job is submitted when the first row is pulled
    pub fn collect(&self) -> Result<RowIterator> {
        ExecutionController::new().collect_lazily(
            &self.ctx.services,
            PlanRequest::collect(self.node.clone()),
            COLLECT_JOB_NAME,
        )
    }

    /// Run `INSERT [OVERWRITE] target <this query>` as its own submission
    pub fn execute_insert(&self, target: &str, overwrite: bool) -> Result<TableResult> {
        let target = self.ctx.sink_target(target, overwrite)?;
        let request = Statement::new(target, self.node.clone())?.to_request();
        let requests = [request];
        let job_name = insert_job_name(&self.ctx.settings.default_job_name, &requests);
        ExecutionController::new().execute_inserts(&self.ctx.services, &requests, &job_name)
    }
}
