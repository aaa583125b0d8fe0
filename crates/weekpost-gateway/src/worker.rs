//! Single-flight sync worker.
//!
//! Every reconciliation in the process goes through one bounded queue drained
//! by one task, in submission order. Callers either wait for the reply or fire
//! and forget.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::reconciler::{Reconciler, SyncOutcome};

const QUEUE_CAPACITY: usize = 64;

enum SyncRequest {
    Sync {
        force_create: bool,
        reply: Option<oneshot::Sender<Result<SyncOutcome, SyncError>>>,
    },
    Test {
        reply: Option<oneshot::Sender<Result<String, SyncError>>>,
    },
    /// Answered once everything queued before it was handled.
    Flush { reply: oneshot::Sender<()> },
}

/// Cloneable front of the worker queue.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<SyncRequest>,
}

pub struct SyncWorker;

impl SyncWorker {
    /// Spawn the worker task. It stops when `cancel` fires or every handle is
    /// dropped.
    pub fn spawn(reconciler: Arc<Reconciler>, cancel: CancellationToken) -> (SyncHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let handle = tokio::spawn(run(rx, reconciler, cancel));
        (SyncHandle { tx }, handle)
    }
}

impl SyncHandle {
    /// Queue a sync without waiting for it.
    pub fn request_sync(&self, force_create: bool) {
        let request = SyncRequest::Sync {
            force_create,
            reply: None,
        };
        if let Err(e) = self.tx.try_send(request) {
            warn!(force_create, error = %e, "Sync request dropped");
        }
    }

    /// Queue a sync and wait for its result.
    pub async fn sync(&self, force_create: bool) -> Result<SyncOutcome, SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(SyncRequest::Sync {
            force_create,
            reply: Some(reply_tx),
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| SyncError::Unavailable("sync reply dropped".into()))?
    }

    pub fn request_test_message(&self) {
        if let Err(e) = self.tx.try_send(SyncRequest::Test { reply: None }) {
            warn!(error = %e, "Test message request dropped");
        }
    }

    /// Queue a test send and wait for the sent message id.
    pub async fn send_test(&self) -> Result<String, SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(SyncRequest::Test {
            reply: Some(reply_tx),
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| SyncError::Unavailable("test reply dropped".into()))?
    }

    /// Wait until every request queued so far has been handled.
    pub async fn flush(&self) -> Result<(), SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(SyncRequest::Flush { reply: reply_tx }).await?;
        reply_rx
            .await
            .map_err(|_| SyncError::Unavailable("flush reply dropped".into()))
    }

    async fn submit(&self, request: SyncRequest) -> Result<(), SyncError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| SyncError::Unavailable("sync queue closed".into()))
    }
}

async fn run(mut rx: mpsc::Receiver<SyncRequest>, reconciler: Arc<Reconciler>, cancel: CancellationToken) {
    loop {
        let request = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            request = rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        match request {
            SyncRequest::Sync { force_create, reply } => {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        warn!(force_create, "Abandoning in-flight sync on shutdown");
                        break;
                    }
                    result = reconciler.sync(force_create) => result,
                };
                match &result {
                    Ok(outcome) => debug!(?outcome, force_create, "Sync finished"),
                    Err(e) => debug!(category = e.category(), force_create, "Sync failed"),
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            SyncRequest::Test { reply } => {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        warn!("Abandoning in-flight test send on shutdown");
                        break;
                    }
                    result = reconciler.send_test() => result,
                };
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            SyncRequest::Flush { reply } => {
                let _ = reply.send(());
            }
        }
    }

    // Pending requests are dropped; waiting callers see `Unavailable`.
    rx.close();
    let mut dropped = 0usize;
    while rx.try_recv().is_ok() {
        dropped += 1;
    }
    info!(dropped, "Sync worker stopped");
}
