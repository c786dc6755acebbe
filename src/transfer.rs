//! Manifest-driven fan-out of fetch-then-upload units.
//!
//! Every descriptor becomes one [`TransferTask`]. Workers run on scoped
//! threads, pull tasks in manifest order from a shared cursor and send exactly
//! one [`TransferOutcome`] per task over a channel; the scope join is the
//! completion barrier.

use std::io;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{NetworkDescriptor, NetworkId, TransferTask};
use crate::error::MirrorError;
use crate::ndex::ContentFetcher;
use crate::sink::ObjectSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// One worker per descriptor, all launched at once.
    Unbounded,
    Limited(NonZeroUsize),
}

impl Concurrency {
    pub fn worker_count(self, tasks: usize) -> usize {
        match self {
            Concurrency::Unbounded => tasks,
            Concurrency::Limited(limit) => limit.get().min(tasks),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransferOptions {
    pub concurrency: Concurrency,
    /// Stop launching new units after the first failure. Units already in
    /// flight still run to completion.
    pub fail_fast: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            concurrency: Concurrency::Unbounded,
            fail_fast: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferStatus {
    Uploaded { bytes: u64 },
    Failed { message: String },
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub index: usize,
    pub id: NetworkId,
    pub name: String,
    #[serde(flatten)]
    pub status: TransferStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    pub bucket: String,
    pub total: usize,
    pub uploaded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<TransferOutcome>,
}

impl TransferReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &TransferOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, TransferStatus::Failed { .. }))
    }
}

pub struct Dispatcher<F: ContentFetcher, S: ObjectSink> {
    fetcher: F,
    sink: S,
    bucket: String,
    options: TransferOptions,
    spawn_limit: Option<usize>,
}

impl<F: ContentFetcher, S: ObjectSink> Dispatcher<F, S> {
    pub fn new(fetcher: F, sink: S, bucket: impl Into<String>, options: TransferOptions) -> Self {
        Self {
            fetcher,
            sink,
            bucket: bucket.into(),
            options,
            spawn_limit: None,
        }
    }

    /// Refuses every worker thread past `limit`, the way an exhausted OS does.
    #[cfg(test)]
    fn with_spawn_limit(mut self, limit: usize) -> Self {
        self.spawn_limit = Some(limit);
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Transfers every descriptor and blocks until all launched units are done.
    pub fn dispatch_all(
        &self,
        descriptors: &[NetworkDescriptor],
        progress: &dyn ProgressSink,
    ) -> TransferReport {
        let total = descriptors.len();
        let workers = self.options.concurrency.worker_count(total);
        tracing::info!(total, workers, bucket = %self.bucket, "dispatching transfers");

        let cursor = AtomicUsize::new(0);
        let halted = AtomicBool::new(false);
        let (tx, rx) = mpsc::channel::<TransferOutcome>();

        thread::scope(|scope| {
            let mut spawned = 0usize;
            for worker in 0..workers {
                let tx = tx.clone();
                let cursor = &cursor;
                let halted = &halted;
                let result = self.spawn_worker(scope, worker, move || {
                    self.run_worker(descriptors, progress, cursor, halted, tx)
                });
                match result {
                    Ok(()) => spawned += 1,
                    Err(err) => {
                        // Running workers keep pulling from the cursor, so the
                        // remaining descriptors are still drained.
                        tracing::warn!(
                            requested = workers,
                            spawned,
                            error = %err,
                            "could not start every transfer worker"
                        );
                        break;
                    }
                }
            }
            if spawned == 0 && total > 0 {
                tracing::error!(total, "no transfer worker could be started");
            }
        });
        drop(tx);

        let mut slots: Vec<Option<TransferOutcome>> = vec![None; total];
        for outcome in rx {
            let index = outcome.index;
            slots[index] = Some(outcome);
        }
        let outcomes: Vec<TransferOutcome> = slots
            .into_iter()
            .zip(descriptors)
            .enumerate()
            .map(|(index, (slot, descriptor))| {
                slot.unwrap_or_else(|| TransferOutcome {
                    index,
                    id: descriptor.id.clone(),
                    name: descriptor.name.clone(),
                    status: TransferStatus::Skipped,
                })
            })
            .collect();

        let report = summarize(&self.bucket, outcomes);
        tracing::info!(
            uploaded = report.uploaded,
            failed = report.failed,
            skipped = report.skipped,
            "transfers finished"
        );
        report
    }

    fn spawn_worker<'scope, 'env, W>(
        &self,
        scope: &'scope thread::Scope<'scope, 'env>,
        worker: usize,
        body: W,
    ) -> io::Result<()>
    where
        W: FnOnce() + Send + 'scope,
    {
        if self.spawn_limit.is_some_and(|limit| worker >= limit) {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "thread limit reached",
            ));
        }
        thread::Builder::new()
            .name(format!("ndex-transfer-{worker}"))
            .spawn_scoped(scope, body)?;
        Ok(())
    }

    fn run_worker(
        &self,
        descriptors: &[NetworkDescriptor],
        progress: &dyn ProgressSink,
        cursor: &AtomicUsize,
        halted: &AtomicBool,
        tx: mpsc::Sender<TransferOutcome>,
    ) {
        loop {
            if self.options.fail_fast && halted.load(Ordering::Acquire) {
                break;
            }
            let index = cursor.fetch_add(1, Ordering::AcqRel);
            let Some(descriptor) = descriptors.get(index) else {
                break;
            };
            let task = TransferTask::new(index, descriptor);
            let status = match self.run_task(&task, progress) {
                Ok(bytes) => TransferStatus::Uploaded { bytes },
                Err(err) => {
                    tracing::warn!(index, id = %task.id, error = %err, "transfer failed");
                    halted.store(true, Ordering::Release);
                    TransferStatus::Failed {
                        message: err.to_string(),
                    }
                }
            };
            let outcome = TransferOutcome {
                index,
                id: task.id,
                name: task.name,
                status,
            };
            if tx.send(outcome).is_err() {
                break;
            }
        }
    }

    fn run_task(
        &self,
        task: &TransferTask,
        progress: &dyn ProgressSink,
    ) -> Result<u64, MirrorError> {
        let mut body = self.fetcher.fetch(&task.id)?;
        progress.event(ProgressEvent {
            message: format!(
                "Upload num: {} name: {} id: {}",
                task.index, task.name, task.id
            ),
            elapsed: None,
        });
        self.sink.put(&self.bucket, task.id.as_str(), &mut body)
    }
}

fn summarize(bucket: &str, outcomes: Vec<TransferOutcome>) -> TransferReport {
    let mut uploaded = 0;
    let mut failed = 0;
    let mut skipped = 0;
    for outcome in &outcomes {
        match outcome.status {
            TransferStatus::Uploaded { .. } => uploaded += 1,
            TransferStatus::Failed { .. } => failed += 1,
            TransferStatus::Skipped => skipped += 1,
        }
    }
    TransferReport {
        bucket: bucket.to_string(),
        total: outcomes.len(),
        uploaded,
        failed,
        skipped,
        finished_at: Utc::now(),
        outcomes,
    }
}
