//! Serialised mutation requests.
//!
//! Interactive callers submit mutations to a queue drained by one worker
//! task, so requests that would otherwise race for the gate run in order.
//! A request whose caller stopped waiting before it started is dropped;
//! once started, a request runs to completion.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::confirm::Confirmation;
use crate::session::StoreSession;
use passdeck_common::{EntryPath, Error, Result, SecretValue};

/// Default number of requests that may wait in the queue.
pub const DEFAULT_CAPACITY: usize = 32;

/// A store mutation to run on the worker.
#[derive(Debug, Clone)]
pub enum Mutation {
    Create {
        path: EntryPath,
        content: SecretValue,
    },
    Update {
        path: EntryPath,
        content: SecretValue,
    },
    Rename {
        from: EntryPath,
        to: EntryPath,
        overwrite: Option<Confirmation>,
    },
    Delete {
        path: EntryPath,
        confirmation: Option<Confirmation>,
    },
    /// Rebuild from the backend without mutating.
    Refresh,
}

impl Mutation {
    fn label(&self) -> &'static str {
        match self {
            Mutation::Create { .. } => "create",
            Mutation::Update { .. } => "update",
            Mutation::Rename { .. } => "rename",
            Mutation::Delete { .. } => "delete",
            Mutation::Refresh => "refresh",
        }
    }
}

type Reply = oneshot::Sender<Result<()>>;

enum Request {
    Apply(Mutation, Reply),
    Shutdown,
}

/// Submission side of the queue.
#[derive(Clone)]
pub struct MutationQueue {
    request_tx: mpsc::Sender<Request>,
}

/// A submitted mutation. Dropping it before the worker reaches the
/// request cancels the request.
pub struct PendingMutation {
    response_rx: oneshot::Receiver<Result<()>>,
}

impl PendingMutation {
    /// Wait for the worker's result.
    pub async fn wait(self) -> Result<()> {
        self.response_rx.await.map_err(|_| Error::QueueClosed)?
    }
}

impl MutationQueue {
    /// Create a queue for `session` and the worker that drains it.
    ///
    /// The worker must be spawned for submitted requests to run.
    pub fn new(session: Arc<StoreSession>, capacity: usize) -> (Self, MutationWorker) {
        let (request_tx, request_rx) = mpsc::channel(capacity.max(1));
        (
            Self { request_tx },
            MutationWorker {
                session,
                request_rx,
            },
        )
    }

    /// Queue a mutation and return a handle to its result.
    ///
    /// # Errors
    /// - `QueueClosed` if the worker has stopped
    pub async fn enqueue(&self, mutation: Mutation) -> Result<PendingMutation> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(Request::Apply(mutation, response_tx))
            .await
            .map_err(|_| Error::QueueClosed)?;
        Ok(PendingMutation { response_rx })
    }

    /// Queue a mutation and wait for it to finish.
    pub async fn submit(&self, mutation: Mutation) -> Result<()> {
        self.enqueue(mutation).await?.wait().await
    }

    /// Ask the worker to stop after the requests queued before this one.
    pub async fn shutdown(&self) {
        let _ = self.request_tx.send(Request::Shutdown).await;
    }
}

/// Background task running queued mutations one at a time.
pub struct MutationWorker {
    session: Arc<StoreSession>,
    request_rx: mpsc::Receiver<Request>,
}

impl MutationWorker {
    /// Run until shutdown or until every queue handle is dropped.
    ///
    /// This should be spawned in a tokio task.
    pub async fn run(mut self) {
        info!(session = self.session.handle().as_str(), "Mutation queue started");

        while let Some(request) = self.request_rx.recv().await {
            match request {
                Request::Shutdown => {
                    info!("Mutation queue shutting down");
                    break;
                }
                Request::Apply(mutation, response_tx) => {
                    if response_tx.is_closed() {
                        debug!(mutation = mutation.label(), "Discarding cancelled request");
                        continue;
                    }
                    debug!(mutation = mutation.label(), "Processing request");
                    let result = self.apply(mutation).await;
                    let _ = response_tx.send(result);
                }
            }
        }
    }

    async fn apply(&self, mutation: Mutation) -> Result<()> {
        let engine = self.session.waiting_engine();
        match mutation {
            Mutation::Create { path, content } => engine.create(&path, &content).await,
            Mutation::Update { path, content } => engine.update(&path, &content).await,
            Mutation::Rename {
                from,
                to,
                overwrite,
            } => engine.rename(&from, &to, overwrite.as_ref()).await,
            Mutation::Delete { path, confirmation } => {
                engine.delete(&path, confirmation.as_ref()).await
            }
            Mutation::Refresh => engine.refresh().await,
        }
    }
}
