// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Per-submission execution state machine
//!
//! One controller drives one logical submission:
//!
//! ```text
//! Idle -> Explaining -> Idle
//! Idle -> Compiling -> Idle            (compile or launch failed)
//! Idle -> Compiling -> Running -> Completed
//! ```
//!
//! Once a job was launched the controller never goes back to `Idle`, so the
//! same submission cannot start a second job.

use log::{debug, warn};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::job::{JobClient, JobExecutionResult, SinkLockRegistry};
use super::result::TableResult;
use super::row_iterator::RowIterator;
use super::runtime::{ExecutionBackend, JobSubmission, SubmittedJob};
use crate::config::RuntimeMode;
use crate::error::{Result, TableError};
use crate::plan::explain::explain_plan;
use crate::plan::{CompiledPlan, PlanCompiler, PlanRequest};
use crate::types::{Column, DataType, ResolvedSchema, Row, Value};

/// Observable state of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionState {
    Idle,
    Explaining,
    Compiling,
    Running,
    Completed,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionState::Idle => "IDLE",
            ExecutionState::Explaining => "EXPLAINING",
            ExecutionState::Compiling => "COMPILING",
            ExecutionState::Running => "RUNNING",
            ExecutionState::Completed => "COMPLETED",
        };
        f.write_str(name)
    }
}

/// Compiler, backend and sink locks shared by every submission of an environment
#[derive(Debug, Clone)]
pub struct ExecutionServices {
    pub compiler: PlanCompiler,
    pub backend: Arc<dyn ExecutionBackend>,
    pub sink_locks: SinkLockRegistry,
}

impl ExecutionServices {
    pub fn new(compiler: PlanCompiler, backend: Arc<dyn ExecutionBackend>) -> Self {
        Self {
            compiler,
            backend,
            sink_locks: SinkLockRegistry::new(),
        }
    }

    pub fn runtime_mode(&self) -> RuntimeMode {
        self.compiler.runtime_mode()
    }
}

#[derive(Debug)]
enum Phase {
    Idle,
    Explaining,
    Compiling,
    Launched(JobClient),
}

/// Drives one logical submission through its states
#[derive(Debug)]
pub struct ExecutionController {
    submission_id: Uuid,
    phase: Phase,
}

impl Default for ExecutionController {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionController {
    pub fn new() -> Self {
        Self {
            submission_id: Uuid::new_v4(),
            phase: Phase::Idle,
        }
    }

    pub fn submission_id(&self) -> Uuid {
        self.submission_id
    }

    pub fn state(&self) -> ExecutionState {
        match &self.phase {
            Phase::Idle => ExecutionState::Idle,
            Phase::Explaining => ExecutionState::Explaining,
            Phase::Compiling => ExecutionState::Compiling,
            Phase::Launched(job) if job.status().is_terminal() => ExecutionState::Completed,
            Phase::Launched(_) => ExecutionState::Running,
        }
    }

    /// Job started by this submission, if any
    pub fn job_client(&self) -> Option<&JobClient> {
        match &self.phase {
            Phase::Launched(job) => Some(job),
            _ => None,
        }
    }

    fn require(&self, expected: ExecutionState, action: &str) -> Result<()> {
        let state = self.state();
        if state != expected {
            warn!(
                "Rejected {} for submission {} in state {}",
                action, self.submission_id, state
            );
            return Err(TableError::InvalidState(format!(
                "cannot {} a submission in state {}",
                action, state
            )));
        }
        Ok(())
    }

    /// Compile and render the plan without starting a job
    pub fn explain(
        &mut self,
        compiler: &PlanCompiler,
        requests: &[PlanRequest],
        extended: bool,
    ) -> Result<String> {
        self.require(ExecutionState::Idle, "explain")?;
        self.phase = Phase::Explaining;
        let explained = compiler
            .compile(requests)
            .map(|plan| explain_plan(&plan, extended));
        self.phase = Phase::Idle;
        explained
    }

    /// Compile all requests into one plan; back to `Idle` on failure
    pub fn compile(&mut self, compiler: &PlanCompiler, requests: &[PlanRequest]) -> Result<CompiledPlan> {
        self.require(ExecutionState::Idle, "compile")?;
        self.phase = Phase::Compiling;
        match compiler.compile(requests) {
            Ok(plan) => Ok(plan),
            Err(e) => {
                debug!("Compilation of submission {} failed: {}", self.submission_id, e);
                self.phase = Phase::Idle;
                Err(e)
            }
        }
    }

    /// Lock the plan's sinks and hand it to the backend
    pub fn launch(
        &mut self,
        services: &ExecutionServices,
        plan: CompiledPlan,
        job_name: &str,
    ) -> Result<SubmittedJob> {
        self.require(ExecutionState::Compiling, "launch")?;
        let launched = services
            .sink_locks
            .acquire(&plan.sinks())
            .and_then(|sink_guard| {
                services.backend.submit(JobSubmission {
                    plan,
                    job_name: job_name.to_string(),
                    sink_guard,
                })
            });
        match launched {
            Ok(job) => {
                debug!(
                    "Submission {} launched job {}",
                    self.submission_id,
                    job.client.job_id()
                );
                self.phase = Phase::Launched(job.client.clone());
                Ok(job)
            }
            Err(e) => {
                self.phase = Phase::Idle;
                Err(e)
            }
        }
    }

    /// Run insert requests as one job
    ///
    /// The result holds one row with a count column per insert. In batch
    /// mode this blocks until the job finished; in streaming mode the first
    /// pull of the row blocks instead.
    pub(crate) fn execute_inserts(
        mut self,
        services: &ExecutionServices,
        requests: &[PlanRequest],
        job_name: &str,
    ) -> Result<TableResult> {
        let plan = self.compile(&services.compiler, requests)?;
        let names = plan.sink_names();
        let mode = plan.runtime_mode;
        let job = self.launch(services, plan, job_name)?;

        let schema = ResolvedSchema::new(
            names
                .iter()
                .map(|name| Column::not_null(name.as_str(), DataType::BigInt))
                .collect(),
        );
        let client = job.client;
        let rows = match mode {
            RuntimeMode::Batch => {
                let result = client.await_completion()?;
                RowIterator::from_rows(vec![count_row(&result)])
            }
            RuntimeMode::Streaming => {
                let waiting = client.clone();
                RowIterator::deferred(move || {
                    let result = waiting.await_completion()?;
                    Ok(RowIterator::from_rows(vec![count_row(&result)]))
                })
            }
        };
        Ok(TableResult::for_job(schema, rows, client, self))
    }

    /// Run a query and stream its rows into the result
    pub(crate) fn execute_query(
        mut self,
        services: &ExecutionServices,
        request: PlanRequest,
        job_name: &str,
    ) -> Result<TableResult> {
        let schema = request.query.schema();
        let changelog =
            services.runtime_mode() == RuntimeMode::Streaming && request.query.is_updating();
        let plan = self.compile(&services.compiler, std::slice::from_ref(&request))?;
        let job = self.launch(services, plan, job_name)?;
        let rows = job.rows.ok_or_else(|| {
            TableError::InvalidState("query job has no result collector".to_string())
        })?;
        Ok(TableResult::for_query(schema, rows, job.client, self, changelog))
    }

    /// Compile now, submit when the first row is pulled
    pub(crate) fn collect_lazily(
        mut self,
        services: &ExecutionServices,
        request: PlanRequest,
        job_name: &str,
    ) -> Result<RowIterator> {
        let plan = self.compile(&services.compiler, std::slice::from_ref(&request))?;
        let services = services.clone();
        let job_name = job_name.to_string();
        Ok(RowIterator::deferred(move || {
            let mut controller = self;
            let job = controller.launch(&services, plan, &job_name)?;
            job.rows.ok_or_else(|| {
                TableError::InvalidState("query job has no result collector".to_string())
            })
        }))
    }
}

fn count_row(result: &JobExecutionResult) -> Row {
    Row::insert(
        result
            .sink_counts
            .iter()
            .map(|(_, count)| Value::BigInt(*count))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ObjectIdentifier;
    use crate::connectors::{MemorySink, MemorySource};
    use crate::exec::runtime::LocalExecutor;
    use crate::plan::{LogicalNode, SinkTarget};

    fn services(mode: RuntimeMode) -> ExecutionServices {
        ExecutionServices::new(
            PlanCompiler::new(mode),
            Arc::new(LocalExecutor::new(8).unwrap()),
        )
    }

    fn insert(sink: Arc<MemorySink>, overwrite: bool) -> PlanRequest {
        let source = Arc::new(MemorySource::from_values(vec![
            vec![Value::BigInt(1)],
            vec![Value::BigInt(2)],
        ]));
        let scan = LogicalNode::scan(
            ObjectIdentifier::new("c", "d", "src"),
            ResolvedSchema::of(&[("n", DataType::BigInt)]),
            source,
        );
        PlanRequest::insert(
            scan,
            SinkTarget {
                table: Some(ObjectIdentifier::new("c", "d", "dst")),
                sink,
                schema: ResolvedSchema::of(&[("n", DataType::BigInt)]),
                overwrite,
            },
        )
    }

    #[test]
    fn test_explain_returns_to_idle() {
        let services = services(RuntimeMode::Batch);
        let mut controller = ExecutionController::new();
        let text = controller
            .explain(&services.compiler, &[insert(Arc::new(MemorySink::new()), false)], false)
            .unwrap();
        assert!(text.starts_with("== Abstract Syntax Tree =="));
        assert_eq!(controller.state(), ExecutionState::Idle);
    }

    #[test]
    fn test_compile_failure_returns_to_idle() {
        let services = services(RuntimeMode::Batch);
        let mut controller = ExecutionController::new();
        let err = controller
            .compile(&services.compiler, &[insert(Arc::new(MemorySink::append_only()), true)])
            .unwrap_err();
        assert!(matches!(err, TableError::UnsupportedSinkMode(_)));
        assert_eq!(controller.state(), ExecutionState::Idle);
    }

    #[test]
    fn test_launched_submission_cannot_run_again() {
        let services = services(RuntimeMode::Batch);
        let requests = [insert(Arc::new(MemorySink::new()), false)];
        let mut controller = ExecutionController::new();
        let plan = controller.compile(&services.compiler, &requests).unwrap();
        assert_eq!(controller.state(), ExecutionState::Compiling);

        let job = controller.launch(&services, plan.clone(), "job").unwrap();
        job.client.await_completion().unwrap();
        assert_eq!(controller.state(), ExecutionState::Completed);

        assert!(matches!(
            controller.launch(&services, plan, "job"),
            Err(TableError::InvalidState(_))
        ));
        assert!(matches!(
            controller.compile(&services.compiler, &requests),
            Err(TableError::InvalidState(_))
        ));
    }

    #[test]
    fn test_busy_sink_fails_launch() {
        let services = services(RuntimeMode::Batch);
        let sink = Arc::new(MemorySink::new());
        let requests = [insert(sink.clone(), false)];

        let held: Arc<dyn crate::connectors::TableSink> = sink;
        let _guard = services
            .sink_locks
            .acquire(&[("c.d.dst".to_string(), held)])
            .unwrap();

        let mut controller = ExecutionController::new();
        let plan = controller.compile(&services.compiler, &requests).unwrap();
        let err = controller.launch(&services, plan, "job").unwrap_err();
        assert!(matches!(err, TableError::ConcurrentSinkWrite(name) if name == "c.d.dst"));
        assert_eq!(controller.state(), ExecutionState::Idle);
    }

    #[test]
    fn test_batch_inserts_report_counts() {
        let services = services(RuntimeMode::Batch);
        let sink = Arc::new(MemorySink::new());
        let result = ExecutionController::new()
            .execute_inserts(&services, &[insert(sink.clone(), false)], "job")
            .unwrap();
        assert_eq!(result.resolved_schema().column_names(), vec!["c.d.dst"]);
        let rows = result.collect().unwrap().into_rows().unwrap();
        assert_eq!(rows, vec![Row::insert(vec![Value::BigInt(2)])]);
        assert_eq!(sink.rows().len(), 2);
        assert_eq!(result.execution_state(), ExecutionState::Completed);
    }
}
