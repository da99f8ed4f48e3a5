//! Single-writer submission queue
//!
//! The [`Workflow`] lives on one blocking worker that drains a channel in
//! order, so appends to a workbook never interleave and callers on an async
//! runtime are never blocked by encoding or file I/O.

use super::{SubmitOutcome, Workflow};
use crate::error::{Error, Result};
use crate::record::FieldLabels;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const DEFAULT_CAPACITY: usize = 32;

enum Command {
    Submit {
        values: Vec<String>,
        reply: oneshot::Sender<SubmitOutcome>,
    },
    Relabel {
        labels: FieldLabels,
        reply: oneshot::Sender<Result<PathBuf>>,
    },
    Labels {
        reply: oneshot::Sender<FieldLabels>,
    },
    WorkbookPath {
        reply: oneshot::Sender<Result<PathBuf>>,
    },
}

/// Handle to the submission worker. Clones share the same worker.
#[derive(Clone)]
pub struct SubmissionQueue {
    tx: mpsc::Sender<Command>,
}

impl SubmissionQueue {
    /// Move `workflow` onto a blocking worker. Must be called within a Tokio runtime.
    ///
    /// The returned join handle yields the workflow back once every queue
    /// handle has been dropped and queued commands have drained.
    pub fn spawn(workflow: Workflow) -> (Self, JoinHandle<Workflow>) {
        Self::with_capacity(workflow, DEFAULT_CAPACITY)
    }

    /// [`Self::spawn`] with an explicit channel capacity
    pub fn with_capacity(
        mut workflow: Workflow,
        capacity: usize,
    ) -> (Self, JoinHandle<Workflow>) {
        let (tx, mut rx) = mpsc::channel::<Command>(capacity.max(1));

        let worker = tokio::task::spawn_blocking(move || {
            tracing::debug!("Submission worker started");
            while let Some(command) = rx.blocking_recv() {
                match command {
                    Command::Submit { values, reply } => {
                        let _ = reply.send(workflow.submit(values.as_slice()));
                    }
                    Command::Relabel { labels, reply } => {
                        let _ = reply.send(workflow.relabel(labels));
                    }
                    Command::Labels { reply } => {
                        let _ = reply.send(workflow.labels().clone());
                    }
                    Command::WorkbookPath { reply } => {
                        let _ = reply.send(workflow.workbook_path());
                    }
                }
            }
            tracing::debug!("Submission worker stopped");
            workflow
        });

        (Self { tx }, worker)
    }

    /// Queue a submission and wait for its outcome.
    pub async fn submit(&self, values: Vec<String>) -> SubmitOutcome {
        match self.enqueue(values).await {
            Ok(pending) => pending
                .await
                .unwrap_or_else(|_| SubmitOutcome::failure(&worker_gone(), None)),
            Err(err) => SubmitOutcome::failure(&err, None),
        }
    }

    /// Queue a submission without waiting for it to run.
    ///
    /// Submissions run in the order they were enqueued.
    pub async fn enqueue(&self, values: Vec<String>) -> Result<oneshot::Receiver<SubmitOutcome>> {
        let (reply, pending) = oneshot::channel();
        self.send(Command::Submit { values, reply }).await?;
        Ok(pending)
    }

    /// Replace field labels, rotating the workbook if they changed.
    pub async fn relabel(&self, labels: FieldLabels) -> Result<PathBuf> {
        let (reply, pending) = oneshot::channel();
        self.send(Command::Relabel { labels, reply }).await?;
        pending.await.map_err(|_| worker_gone())?
    }

    /// Labels currently used by the worker
    pub async fn labels(&self) -> Result<FieldLabels> {
        let (reply, pending) = oneshot::channel();
        self.send(Command::Labels { reply }).await?;
        pending.await.map_err(|_| worker_gone())
    }

    /// Workbook the next submission goes to
    pub async fn workbook_path(&self) -> Result<PathBuf> {
        let (reply, pending) = oneshot::channel();
        self.send(Command::WorkbookPath { reply }).await?;
        pending.await.map_err(|_| worker_gone())?
    }

    /// Drop this handle and wait for the worker to drain and hand back the workflow.
    ///
    /// Clones still alive elsewhere keep the worker running until they are dropped too.
    pub async fn shutdown(self, worker: JoinHandle<Workflow>) -> Result<Workflow> {
        drop(self.tx);
        worker
            .await
            .map_err(|e| Error::Other(format!("submission worker failed: {e}")))
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).await.map_err(|_| worker_gone())
    }
}

fn worker_gone() -> Error {
    Error::Other("submission worker has stopped".to_string())
}
