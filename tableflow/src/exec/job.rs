// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Job handles and sink write locks

use chrono::{DateTime, Utc};
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::connectors::TableSink;
use crate::error::{Result, TableError};
use crate::plan::physical::sink_key;

/// Lifecycle of a submitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Running,
    Finished,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Running => "RUNNING",
            JobStatus::Finished => "FINISHED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELED",
        };
        f.write_str(name)
    }
}

/// What a finished job reports back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobExecutionResult {
    /// Rows written per sink output, in statement order; -1 when not tracked
    pub sink_counts: Vec<(String, i64)>,
}

/// How a job ended, as reported by the backend
#[derive(Debug)]
pub(crate) enum JobOutcome {
    Finished(JobExecutionResult),
    Failed(String),
    Cancelled,
}

#[derive(Debug)]
struct JobProgress {
    status: JobStatus,
    result: Option<JobExecutionResult>,
    failure: Option<String>,
}

/// State shared between a job and its clients
#[derive(Debug)]
pub(crate) struct JobShared {
    progress: Mutex<JobProgress>,
    terminated: Condvar,
    cancel_requested: AtomicBool,
}

impl JobShared {
    fn new() -> Self {
        Self {
            progress: Mutex::new(JobProgress {
                status: JobStatus::Running,
                result: None,
                failure: None,
            }),
            terminated: Condvar::new(),
            cancel_requested: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Record the terminal state and wake every waiter
    pub(crate) fn complete(&self, outcome: JobOutcome) {
        let mut progress = self.progress.lock();
        if progress.status.is_terminal() {
            return;
        }
        match outcome {
            JobOutcome::Finished(result) => {
                progress.status = JobStatus::Finished;
                progress.result = Some(result);
            }
            JobOutcome::Failed(message) => {
                progress.status = JobStatus::Failed;
                progress.failure = Some(message);
            }
            JobOutcome::Cancelled => progress.status = JobStatus::Cancelled,
        }
        self.terminated.notify_all();
    }
}

/// Handle to a submitted job
#[derive(Debug, Clone)]
pub struct JobClient {
    job_id: Uuid,
    job_name: String,
    submitted_at: DateTime<Utc>,
    shared: Arc<JobShared>,
}

impl JobClient {
    pub(crate) fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            job_name: job_name.into(),
            submitted_at: Utc::now(),
            shared: Arc::new(JobShared::new()),
        }
    }

    pub(crate) fn shared(&self) -> Arc<JobShared> {
        self.shared.clone()
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn status(&self) -> JobStatus {
        self.shared.progress.lock().status
    }

    /// Ask the job to stop; nothing is committed to its sinks afterwards
    pub fn cancel(&self) {
        if !self.status().is_terminal() {
            debug!("Cancellation requested for job '{}' ({})", self.job_name, self.job_id);
            self.shared.cancel_requested.store(true, Ordering::SeqCst);
        }
    }

    /// Block until the job reaches a terminal state
    pub fn await_completion(&self) -> Result<JobExecutionResult> {
        let mut progress = self.shared.progress.lock();
        while !progress.status.is_terminal() {
            self.shared.terminated.wait(&mut progress);
        }
        match progress.status {
            JobStatus::Finished => Ok(progress.result.clone().unwrap_or_default()),
            JobStatus::Failed => Err(TableError::runtime(
                &self.job_name,
                progress.failure.clone().unwrap_or_else(|| "unknown failure".to_string()),
            )),
            JobStatus::Cancelled => Err(TableError::runtime(&self.job_name, "job was cancelled")),
            JobStatus::Running => Err(TableError::InvalidState(format!(
                "job '{}' is still running",
                self.job_name
            ))),
        }
    }
}

/// Tracks which sinks are written by running submissions
#[derive(Debug, Clone, Default)]
pub struct SinkLockRegistry {
    held: Arc<Mutex<HashMap<usize, String>>>,
}

impl SinkLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock all given sinks, or none of them
    pub fn acquire(&self, sinks: &[(String, Arc<dyn TableSink>)]) -> Result<SinkWriteGuard> {
        let mut held = self.held.lock();
        if let Some((name, _)) = sinks.iter().find(|(_, sink)| held.contains_key(&sink_key(sink))) {
            warn!("Rejected submission: sink '{}' is busy", name);
            return Err(TableError::ConcurrentSinkWrite(name.clone()));
        }
        let keys: Vec<usize> = sinks.iter().map(|(_, sink)| sink_key(sink)).collect();
        for ((name, _), key) in sinks.iter().zip(&keys) {
            held.insert(*key, name.clone());
        }
        Ok(SinkWriteGuard {
            registry: self.clone(),
            keys,
        })
    }

    pub fn is_locked(&self, sink: &Arc<dyn TableSink>) -> bool {
        self.held.lock().contains_key(&sink_key(sink))
    }

    /// Number of sinks currently locked
    pub fn locked_count(&self) -> usize {
        self.held.lock().len()
    }
}

/// Held for as long as a job may write its sinks
#[derive(Debug)]
pub struct SinkWriteGuard {
    registry: SinkLockRegistry,
    keys: Vec<usize>,
}

impl SinkWriteGuard {
    /// Guard over no sinks
    pub fn empty() -> Self {
        Self {
            registry: SinkLockRegistry::new(),
            keys: Vec::new(),
        }
    }
}

impl Drop for SinkWriteGuard {
    fn drop(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        let mut held = self.registry.held.lock();
        for key in &self.keys {
            held.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::MemorySink;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_await_completion_wakes_on_finish() {
        let client = JobClient::new("job");
        let shared = client.shared();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            shared.complete(JobOutcome::Finished(JobExecutionResult {
                sink_counts: vec![("c.d.t".to_string(), 3)],
            }));
        });
        let result = client.await_completion().unwrap();
        handle.join().unwrap();
        assert_eq!(result.sink_counts, vec![("c.d.t".to_string(), 3)]);
        assert_eq!(client.status(), JobStatus::Finished);
    }

    #[test]
    fn test_failed_job_reports_runtime_error() {
        let client = JobClient::new("broken");
        client.shared().complete(JobOutcome::Failed("disk full".to_string()));
        let err = client.await_completion().unwrap_err();
        assert!(matches!(err, TableError::RuntimeExecution { ref job, ref message }
            if job == "broken" && message == "disk full"));
        // first terminal state wins
        client.shared().complete(JobOutcome::Cancelled);
        assert_eq!(client.status(), JobStatus::Failed);
    }

    #[test]
    fn test_cancel_after_termination_is_ignored() {
        let client = JobClient::new("job");
        client.shared().complete(JobOutcome::Cancelled);
        client.cancel();
        assert!(!client.shared().is_cancel_requested());
    }

    #[test]
    fn test_sink_locks_are_all_or_nothing() {
        let registry = SinkLockRegistry::new();
        let a: Arc<dyn TableSink> = Arc::new(MemorySink::new());
        let b: Arc<dyn TableSink> = Arc::new(MemorySink::new());

        let guard = registry.acquire(&[("a".to_string(), a.clone())]).unwrap();
        let err = registry
            .acquire(&[("b".to_string(), b.clone()), ("a".to_string(), a.clone())])
            .unwrap_err();
        assert!(matches!(err, TableError::ConcurrentSinkWrite(name) if name == "a"));
        assert!(!registry.is_locked(&b));

        drop(guard);
        assert_eq!(registry.locked_count(), 0);
        assert!(registry.acquire(&[("a".to_string(), a)]).is_ok());
    }
}
