// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Single-pass iteration over result rows
//!
//! Rows are pulled from a running job as the caller consumes them. Pulling
//! blocks the calling thread, so an iterator must not be driven from inside
//! an async task.

use log::debug;
use std::collections::VecDeque;
use std::fmt;
use tokio::sync::mpsc;

use super::job::JobClient;
use crate::error::Result;
use crate::types::Row;

type DeferredRows = Box<dyn FnOnce() -> Result<RowIterator> + Send>;

enum RowSource {
    /// Produces the real iterator on first pull
    Deferred(DeferredRows),
    Channel {
        receiver: mpsc::Receiver<Result<Row>>,
        client: JobClient,
    },
    Buffered(VecDeque<Row>),
    Exhausted,
}

/// Iterator over the rows of a statement result
///
/// Every item is either a row or the error that stopped the producing job.
/// After an error the iterator is exhausted.
pub struct RowIterator {
    source: RowSource,
    peeked: Option<Result<Row>>,
}

impl fmt::Debug for RowIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.source {
            RowSource::Deferred(_) => "deferred",
            RowSource::Channel { .. } => "streaming",
            RowSource::Buffered(_) => "buffered",
            RowSource::Exhausted => "exhausted",
        };
        f.debug_struct("RowIterator").field("state", &state).finish()
    }
}

impl RowIterator {
    pub(crate) fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            source: RowSource::Buffered(rows.into()),
            peeked: None,
        }
    }

    pub(crate) fn from_channel(receiver: mpsc::Receiver<Result<Row>>, client: JobClient) -> Self {
        Self {
            source: RowSource::Channel { receiver, client },
            peeked: None,
        }
    }

    /// Iterator whose rows are produced by `start` when first pulled
    pub(crate) fn deferred<F>(start: F) -> Self
    where
        F: FnOnce() -> Result<RowIterator> + Send + 'static,
    {
        Self {
            source: RowSource::Deferred(Box::new(start)),
            peeked: None,
        }
    }

    /// Whether another item (row or error) is available; may block
    pub fn has_next(&mut self) -> bool {
        if self.peeked.is_none() {
            self.peeked = self.pull();
        }
        self.peeked.is_some()
    }

    /// Drain the iterator, stopping at the first error
    pub fn into_rows(self) -> Result<Vec<Row>> {
        self.collect()
    }

    fn pull(&mut self) -> Option<Result<Row>> {
        loop {
            match &mut self.source {
                RowSource::Exhausted => return None,
                RowSource::Buffered(rows) => {
                    let row = rows.pop_front();
                    if row.is_none() {
                        self.source = RowSource::Exhausted;
                    }
                    return row.map(Ok);
                }
                RowSource::Channel { receiver, client } => match receiver.blocking_recv() {
                    Some(Ok(row)) => return Some(Ok(row)),
                    Some(Err(e)) => {
                        self.source = RowSource::Exhausted;
                        return Some(Err(e));
                    }
                    None => {
                        // producer is gone; surface its failure, if any
                        let outcome = client.await_completion();
                        self.source = RowSource::Exhausted;
                        return outcome.err().map(Err);
                    }
                },
                RowSource::Deferred(_) => {
                    let start = match std::mem::replace(&mut self.source, RowSource::Exhausted) {
                        RowSource::Deferred(start) => start,
                        _ => return None,
                    };
                    match start() {
                        Ok(mut inner) => {
                            if let Some(peeked) = inner.peeked.take() {
                                self.peeked = Some(peeked);
                            }
                            self.source = std::mem::replace(&mut inner.source, RowSource::Exhausted);
                            if let Some(peeked) = self.peeked.take() {
                                return Some(peeked);
                            }
                        }
                        Err(e) => return Some(Err(e)),
                    }
                }
            }
        }
    }
}

impl Iterator for RowIterator {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.peeked.take() {
            Some(item) => Some(item),
            None => self.pull(),
        }
    }
}

impl Drop for RowIterator {
    fn drop(&mut self) {
        if let RowSource::Channel { client, .. } = &self.source {
            if !client.status().is_terminal() {
                debug!("Result iterator dropped; cancelling job '{}'", client.job_name());
                client.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TableError;
    use crate::types::Value;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn rows(n: i64) -> Vec<Row> {
        (0..n).map(|i| Row::insert(vec![Value::BigInt(i)])).collect()
    }

    #[test]
    fn test_has_next_does_not_consume() {
        let mut iter = RowIterator::from_rows(rows(2));
        assert!(iter.has_next());
        assert!(iter.has_next());
        assert_eq!(iter.next().unwrap().unwrap(), Row::insert(vec![Value::BigInt(0)]));
        assert_eq!(iter.by_ref().count(), 1);
        assert!(!iter.has_next());
    }

    #[test]
    fn test_deferred_runs_on_first_pull_only() {
        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();
        let mut iter = RowIterator::deferred(move || {
            flag.store(true, Ordering::SeqCst);
            Ok(RowIterator::from_rows(rows(3)))
        });
        assert!(!started.load(Ordering::SeqCst));
        assert!(iter.has_next());
        assert!(started.load(Ordering::SeqCst));
        assert_eq!(iter.into_rows().unwrap().len(), 3);
    }

    #[test]
    fn test_deferred_error_is_yielded() {
        let mut iter = RowIterator::deferred(|| Err(TableError::runtime("job", "boom")));
        assert!(matches!(iter.next(), Some(Err(TableError::RuntimeExecution { .. }))));
        assert!(iter.next().is_none());
    }
}
