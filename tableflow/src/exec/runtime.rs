// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Execution backends
//!
//! A backend receives a compiled plan and runs it as one job. The local
//! backend runs jobs on a tokio blocking pool:
//! - every scan is read once and fanned out to the pipelines using it
//! - sink-bound rows are staged per sink and committed when the job ends
//! - collected rows stream to the result iterator through a bounded channel
//!
//! A cancelled or failed job commits nothing.

use log::{debug, error, info, warn};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;

use super::job::{JobClient, JobExecutionResult, JobOutcome, JobShared, SinkWriteGuard};
use super::operators::OperatorChain;
use super::row_iterator::RowIterator;
use crate::config::RuntimeMode;
use crate::connectors::TableSink;
use crate::error::{Result, TableError};
use crate::plan::physical::{sink_key, CompiledPlan, PipelineOutput};
use crate::types::{ResolvedSchema, Row};

/// Everything a backend needs to start one job
#[derive(Debug)]
pub struct JobSubmission {
    pub plan: CompiledPlan,
    pub job_name: String,
    /// Must be held until the job terminates
    pub sink_guard: SinkWriteGuard,
}

/// A started job
#[derive(Debug)]
pub struct SubmittedJob {
    pub client: JobClient,
    /// Rows of the collect pipeline, if the plan has one
    pub rows: Option<RowIterator>,
}

/// Runs compiled plans
pub trait ExecutionBackend: Send + Sync + fmt::Debug {
    /// Start the job; returns once it is running
    fn submit(&self, submission: JobSubmission) -> Result<SubmittedJob>;
}

/// In-process backend on a tokio multi-thread runtime
pub struct LocalExecutor {
    runtime: Runtime,
    buffer_capacity: usize,
}

impl fmt::Debug for LocalExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalExecutor")
            .field("buffer_capacity", &self.buffer_capacity)
            .finish()
    }
}

impl LocalExecutor {
    pub fn new(buffer_capacity: usize) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("tableflow-job")
            .enable_all()
            .build()
            .map_err(|e| TableError::Config(format!("cannot start job runtime: {}", e)))?;
        Ok(Self {
            runtime,
            buffer_capacity: buffer_capacity.max(1),
        })
    }
}

impl ExecutionBackend for LocalExecutor {
    fn submit(&self, submission: JobSubmission) -> Result<SubmittedJob> {
        let JobSubmission {
            plan,
            job_name,
            sink_guard,
        } = submission;

        let client = JobClient::new(job_name);
        let (sender, rows) = match plan.collect_pipeline() {
            Some(_) => {
                let (tx, rx) = mpsc::channel(self.buffer_capacity);
                (Some(tx), Some(RowIterator::from_channel(rx, client.clone())))
            }
            None => (None, None),
        };

        info!(
            "Submitting job '{}' ({}) with {} pipeline(s)",
            client.job_name(),
            client.job_id(),
            plan.pipelines.len()
        );

        let shared = client.shared();
        let name = client.job_name().to_string();
        self.runtime.spawn_blocking(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| run_job(&plan, &shared, sender)))
                .unwrap_or_else(|_| JobOutcome::Failed("job panicked".to_string()));
            match &outcome {
                JobOutcome::Finished(_) => info!("Job '{}' finished", name),
                JobOutcome::Failed(message) => error!("Job '{}' failed: {}", name, message),
                JobOutcome::Cancelled => warn!("Job '{}' was cancelled", name),
            }
            // sinks become writable again before waiters observe completion
            drop(sink_guard);
            shared.complete(outcome);
        });

        Ok(SubmittedJob { client, rows })
    }
}

enum JobStop {
    Cancelled,
    Failed(String),
}

struct PipelineRun {
    chain: OperatorChain,
    staged: Vec<Row>,
}

fn run_job(
    plan: &CompiledPlan,
    shared: &JobShared,
    collector: Option<mpsc::Sender<Result<Row>>>,
) -> JobOutcome {
    match execute_pipelines(plan, shared, collector.as_ref()) {
        Ok(result) => JobOutcome::Finished(result),
        Err(JobStop::Cancelled) => JobOutcome::Cancelled,
        Err(JobStop::Failed(message)) => JobOutcome::Failed(message),
    }
}

fn execute_pipelines(
    plan: &CompiledPlan,
    shared: &JobShared,
    collector: Option<&mpsc::Sender<Result<Row>>>,
) -> std::result::Result<JobExecutionResult, JobStop> {
    let mut runs: Vec<PipelineRun> = plan
        .pipelines
        .iter()
        .map(|p| PipelineRun {
            chain: OperatorChain::new(&p.operators),
            staged: Vec::new(),
        })
        .collect();

    for (scan_index, scan) in plan.scans.iter().enumerate() {
        let rows = scan
            .source
            .read()
            .map_err(|e| JobStop::Failed(format!("reading {}: {}", scan.table, e)))?;
        debug!("Scan of {} produced {} row(s)", scan.table, rows.len());

        for row in rows {
            if shared.is_cancel_requested() {
                return Err(JobStop::Cancelled);
            }
            let row = row.into_retract_encoding();
            if !matches_schema(&row, &scan.schema) {
                return Err(JobStop::Failed(format!(
                    "{} produced a row not matching its schema: {}",
                    scan.table, row
                )));
            }
            for (index, pipeline) in plan.pipelines.iter().enumerate() {
                if pipeline.scan != scan_index {
                    continue;
                }
                let mut produced = Vec::new();
                runs[index].chain.push(row.clone(), &mut produced);
                emit(&pipeline.output, &mut runs[index], produced, collector)?;
            }
        }
    }

    for (index, pipeline) in plan.pipelines.iter().enumerate() {
        let mut produced = Vec::new();
        runs[index].chain.finish(&mut produced);
        emit(&pipeline.output, &mut runs[index], produced, collector)?;
    }

    if shared.is_cancel_requested() {
        return Err(JobStop::Cancelled);
    }
    commit_sinks(plan, &runs)?;

    let sink_counts = plan
        .pipelines
        .iter()
        .zip(&runs)
        .filter(|(p, _)| matches!(p.output, PipelineOutput::Sink { .. }))
        .map(|(p, run)| {
            let count = match plan.runtime_mode {
                RuntimeMode::Batch => run.staged.len() as i64,
                RuntimeMode::Streaming => -1,
            };
            (p.output.display_name(), count)
        })
        .collect();
    Ok(JobExecutionResult { sink_counts })
}

fn matches_schema(row: &Row, schema: &ResolvedSchema) -> bool {
    row.arity() == schema.column_count()
        && row
            .values()
            .iter()
            .zip(schema.columns())
            .all(|(value, column)| column.accepts(value))
}

fn emit(
    output: &PipelineOutput,
    run: &mut PipelineRun,
    rows: Vec<Row>,
    collector: Option<&mpsc::Sender<Result<Row>>>,
) -> std::result::Result<(), JobStop> {
    match output {
        PipelineOutput::Sink { .. } => run.staged.extend(rows),
        PipelineOutput::Collect => {
            let sender = collector
                .ok_or_else(|| JobStop::Failed("no result collector attached".to_string()))?;
            for row in rows {
                // a closed channel means the iterator was dropped
                sender.blocking_send(Ok(row)).map_err(|_| JobStop::Cancelled)?;
            }
        }
    }
    Ok(())
}

/// Write every sink once with all rows staged for it
fn commit_sinks(plan: &CompiledPlan, runs: &[PipelineRun]) -> std::result::Result<(), JobStop> {
    let mut commits: Vec<(usize, String, Arc<dyn TableSink>, bool, Vec<Row>)> = Vec::new();
    for (pipeline, run) in plan.pipelines.iter().zip(runs) {
        if let PipelineOutput::Sink { sink, overwrite, .. } = &pipeline.output {
            let key = sink_key(sink);
            match commits.iter_mut().find(|(k, ..)| *k == key) {
                Some((_, _, _, ow, rows)) => {
                    *ow |= *overwrite;
                    rows.extend(run.staged.iter().cloned());
                }
                None => commits.push((
                    key,
                    pipeline.output.display_name(),
                    sink.clone(),
                    *overwrite,
                    run.staged.clone(),
                )),
            }
        }
    }

    for (_, name, sink, overwrite, rows) in commits {
        let written = if overwrite {
            sink.overwrite(&rows)
        } else {
            sink.write(&rows)
        };
        written.map_err(|e| JobStop::Failed(format!("writing {}: {}", name, e)))?;
        debug!("Committed {} row(s) to {}", rows.len(), name);
    }
    Ok(())
}
