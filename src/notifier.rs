use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::events::UnlockEvent;

/// UnlockNotifier
///
/// Downstream consumer of unlock signals (door actuator, audit sink, ...).
/// Delivery is fire-and-forget: implementations never report failure upstream.
#[async_trait]
pub trait UnlockNotifier: Send + Sync {
    async fn notify(&self, event: UnlockEvent);
}

pub type NotifierState = Arc<dyn UnlockNotifier>;

/// BroadcastUnlockNotifier
///
/// Fans unlock signals out over a `tokio::sync::broadcast` channel. Actuator
/// integrations call [`subscribe`](Self::subscribe); a send with no subscribers is dropped.
#[derive(Clone, Debug)]
pub struct BroadcastUnlockNotifier {
    sender: broadcast::Sender<UnlockEvent>,
}

impl BroadcastUnlockNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UnlockEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl UnlockNotifier for BroadcastUnlockNotifier {
    async fn notify(&self, event: UnlockEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("unlock granted with no actuator subscribed");
        }
    }
}

/// forward_unlocks
///
/// Subscriber loop for actuator integrations. Calls `on_unlock` for every signal
/// received and returns once the notifier is dropped. A subscriber that falls
/// behind skips the overwritten signals and keeps consuming.
pub async fn forward_unlocks<F>(mut receiver: broadcast::Receiver<UnlockEvent>, mut on_unlock: F)
where
    F: FnMut(UnlockEvent),
{
    loop {
        match receiver.recv().await {
            Ok(event) => on_unlock(event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "unlock subscriber lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
