//! Background execution.
//!
//! An [`ExecutionTask`] takes exclusive ownership of a [`SharedDocument`]
//! for the whole pass and runs the engine on tokio's blocking pool. Other
//! writers see [`ExecError::DocumentBusy`] until the pass ends. Status
//! changes are published on a watch channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;

use actdata_core::Document;

use crate::engine::{ExecuteOptions, ExecutionEngine, ExecutionReport, RunStatus};
use crate::error::ExecError;

/// A document shared between foreground editing and background execution.
#[derive(Debug, Clone)]
pub struct SharedDocument(Arc<Mutex<Document>>);

impl SharedDocument {
    pub fn new(doc: Document) -> Self {
        Self(Arc::new(Mutex::new(doc)))
    }

    /// Waits for any running pass to finish.
    pub async fn lock(&self) -> MutexGuard<'_, Document> {
        self.0.lock().await
    }

    /// Write access without waiting.
    pub fn try_write(&self) -> Result<MutexGuard<'_, Document>, ExecError> {
        self.0.try_lock().map_err(|_| ExecError::DocumentBusy)
    }
}

pub struct ExecutionTask {
    handle: JoinHandle<Result<ExecutionReport, ExecError>>,
    cancel: Arc<AtomicBool>,
    status: watch::Receiver<RunStatus>,
}

impl ExecutionTask {
    /// Starts a pass. Must be called from within a tokio runtime.
    pub fn spawn(
        document: &SharedDocument,
        engine: Arc<ExecutionEngine>,
        options: ExecuteOptions,
    ) -> Result<Self, ExecError> {
        let mut guard = Arc::clone(&document.0)
            .try_lock_owned()
            .map_err(|_| ExecError::DocumentBusy)?;

        let (sender, status) = watch::channel(RunStatus::Idle);
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);

        sender.send_replace(RunStatus::Running);
        tracing::info!("background execution started");

        let handle = tokio::task::spawn_blocking(move || {
            let result = engine.execute_with_cancel(&mut *guard, &options, &flag);
            drop(guard);
            let final_status = match &result {
                Ok(report) => report.status,
                Err(err) => {
                    tracing::warn!(error = %err, "background execution failed");
                    RunStatus::Failed
                }
            };
            sender.send_replace(final_status);
            result
        });

        Ok(Self {
            handle,
            cancel,
            status,
        })
    }

    /// Requests cancellation; checked between vertices.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn status(&self) -> RunStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn join(self) -> Result<ExecutionReport, ExecError> {
        self.handle.await.map_err(|err| ExecError::TaskJoin {
            reason: err.to_string(),
        })?
    }
}
