// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Stream programs built from tables
//!
//! A [`DataStream`] is a table query followed by user transformations.
//! Streams only run through their [`StreamEnvironment`], which is
//! triggered independently of any statement set: executing one never runs
//! pipelines buffered in the other.

use log::info;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::connectors::TableSink;
use crate::error::{Result, TableError};
use crate::exec::{ExecutionController, ExecutionServices, JobExecutionResult};
use crate::plan::{LogicalNode, PlanOutput, PlanRequest, SinkTarget, StreamTransform};
use crate::types::{ResolvedSchema, Row};

/// Rows of a table query plus transformations applied to them
#[derive(Debug, Clone)]
pub struct DataStream {
    query: LogicalNode,
    transforms: Vec<StreamTransform>,
    changelog: bool,
}

impl DataStream {
    pub(crate) fn new(query: LogicalNode, changelog: bool) -> Self {
        Self {
            query,
            transforms: Vec::new(),
            changelog,
        }
    }

    /// Schema of the underlying table query
    pub fn table_schema(&self) -> ResolvedSchema {
        self.query.schema()
    }

    /// Whether rows may carry retraction kinds
    pub fn is_changelog(&self) -> bool {
        self.changelog
    }

    /// Transform each row; the row kind is preserved
    pub fn map<F>(mut self, f: F) -> Self
    where
        F: Fn(Row) -> Row + Send + Sync + 'static,
    {
        self.transforms.push(StreamTransform::Map(Arc::new(f)));
        self
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Row) -> bool + Send + Sync + 'static,
    {
        self.transforms.push(StreamTransform::Filter(Arc::new(predicate)));
        self
    }
}

/// Buffers stream pipelines until `execute`
pub struct StreamEnvironment {
    services: ExecutionServices,
    pipelines: Mutex<Vec<PlanRequest>>,
}

impl fmt::Debug for StreamEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamEnvironment")
            .field("pipelines", &self.pipelines.lock().len())
            .finish()
    }
}

impl StreamEnvironment {
    pub(crate) fn new(services: ExecutionServices) -> Self {
        Self {
            services,
            pipelines: Mutex::new(Vec::new()),
        }
    }

    /// Attach a sink to a stream; nothing runs until `execute`
    pub fn sink_to(&self, stream: DataStream, sink: Arc<dyn TableSink>) {
        let DataStream {
            query,
            transforms,
            ..
        } = stream;
        let schema = query.schema();
        self.pipelines.lock().push(PlanRequest {
            query,
            transforms,
            output: PlanOutput::Sink(SinkTarget {
                table: None,
                sink,
                schema,
                overwrite: false,
            }),
        });
    }

    pub fn pending_pipelines(&self) -> usize {
        self.pipelines.lock().len()
    }

    /// Run every buffered pipeline as one job and wait for it
    ///
    /// The buffer is emptied once the job was submitted.
    pub fn execute(&self, job_name: &str) -> Result<JobExecutionResult> {
        let pipelines = std::mem::take(&mut *self.pipelines.lock());
        if pipelines.is_empty() {
            return Err(TableError::Compile(
                "no stream pipelines to execute; call sink_to first".to_string(),
            ));
        }
        let mut controller = ExecutionController::new();
        let launched = controller
            .compile(&self.services.compiler, &pipelines)
            .and_then(|plan| controller.launch(&self.services, plan, job_name));
        let job = match launched {
            Ok(job) => job,
            Err(e) => {
                // nothing ran; keep the pipelines for a retry
                self.pipelines.lock().extend(pipelines);
                return Err(e);
            }
        };
        info!("Stream job '{}' submitted with {} pipeline(s)", job_name, pipelines.len());
        job.client.await_completion()
    }
}
