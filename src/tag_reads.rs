//! The badge-read pipeline: a bounded queue fed by readers, a background worker
//! draining it, and the handler that performs lookup, persistence and unlock.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{
    clock::ClockState,
    error::AppError,
    events::{TagReadEffect, TagReadEvent, plan_tag_read},
    models::ActivationRecord,
    notifier::NotifierState,
    repository::RepositoryState,
};

/// What happened to a single tag read.
#[derive(Debug, Clone, PartialEq)]
pub enum TagReadOutcome {
    /// No user owns the tag. Nothing was written or signalled.
    Ignored,
    /// The record was persisted and the unlock emitted.
    Unlocked { record: ActivationRecord },
    /// The user directory could not be queried.
    LookupFailed,
    /// The activation record could not be written; no unlock was emitted.
    PersistenceFailed,
}

/// TagReadHandler
///
/// Thin I/O adapter around [`plan_tag_read`]: resolves the tag, asks the planner
/// for effects and executes them in order. No retries; a failed write drops the read.
#[derive(Clone)]
pub struct TagReadHandler {
    repo: RepositoryState,
    notifier: NotifierState,
    clock: ClockState,
}

impl TagReadHandler {
    pub fn new(repo: RepositoryState, notifier: NotifierState, clock: ClockState) -> Self {
        Self {
            repo,
            notifier,
            clock,
        }
    }

    pub async fn handle(&self, event: TagReadEvent) -> TagReadOutcome {
        // Unmatched tags are dropped without a log line.
        let matched = match self.repo.find_user_by_uid(&event.tag_rfid).await {
            Ok(matched) => matched,
            Err(e) => {
                tracing::error!(error = %e, "tag read lookup failed");
                return TagReadOutcome::LookupFailed;
            }
        };

        let mut outcome = TagReadOutcome::Ignored;
        for effect in plan_tag_read(&event, matched.as_ref(), self.clock.now()) {
            match effect {
                TagReadEffect::RecordActivation(record) => {
                    let user_id = record.user_id;
                    match self.repo.append_activation_record(record).await {
                        Ok(record) => outcome = TagReadOutcome::Unlocked { record },
                        Err(e) => {
                            tracing::error!(user_id, error = %e, "failed to persist activation record");
                            return TagReadOutcome::PersistenceFailed;
                        }
                    }
                }
                TagReadEffect::Unlock(unlock) => self.notifier.notify(unlock).await,
            }
        }
        outcome
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("tag read queue is full")]
    Full,
    #[error("tag read worker has stopped")]
    Closed,
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        tracing::warn!(error = %err, "tag read rejected");
        AppError::QueueUnavailable
    }
}

/// TagReadDispatcher
///
/// Producer half of the tag-read queue. Cloned into the HTTP state so the reader
/// endpoint can enqueue without waiting on the database.
#[derive(Clone, Debug)]
pub struct TagReadDispatcher {
    sender: mpsc::Sender<TagReadEvent>,
}

impl TagReadDispatcher {
    /// Creates the queue. `capacity` must be non-zero.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TagReadEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Enqueues without blocking. A full queue is reported rather than awaited.
    pub fn dispatch(&self, event: TagReadEvent) -> Result<(), DispatchError> {
        self.sender.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DispatchError::Full,
            mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
        })
    }
}

/// Drains the queue on a background task until every dispatcher is dropped.
pub fn spawn_tag_read_worker(
    handler: TagReadHandler,
    mut receiver: mpsc::Receiver<TagReadEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            handler.handle(event).await;
        }
        tracing::info!("tag read worker stopped");
    })
}
