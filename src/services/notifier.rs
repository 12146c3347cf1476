//! Session-scoped publish/subscribe for upload progress.
//!
//! `SocketHub` is created once at startup and shared by every request. Each
//! connected socket registers under the session id it wants to follow;
//! publishing for a session only ever reaches the senders stored under that
//! exact id.

use crate::models::progress::ProgressEvent;
use dashmap::DashMap;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no subscriber for session `{0}`")]
    NoSubscriber(String),
    #[error("every subscriber of session `{0}` has disconnected")]
    Disconnected(String),
}

/// Best-effort delivery of progress events to one session.
///
/// Callers on the upload path log and discard the error.
pub trait Notifier: Send + Sync {
    fn notify(&self, session_id: &str, event: ProgressEvent) -> Result<(), NotifyError>;
}

/// Receiving half handed to a socket connection.
#[derive(Debug)]
pub struct Subscription {
    pub session_id: String,
    pub subscriber_id: Uuid,
    pub events: mpsc::UnboundedReceiver<ProgressEvent>,
}

type Subscribers = HashMap<Uuid, mpsc::UnboundedSender<ProgressEvent>>;

#[derive(Debug, Default)]
pub struct SocketHub {
    sessions: DashMap<String, Subscribers>,
    shutdown: CancellationToken,
}

impl SocketHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber under `session_id`.
    pub fn subscribe(&self, session_id: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriber_id = Uuid::new_v4();
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(subscriber_id, tx);
        debug!(session_id, %subscriber_id, "socket subscribed");

        Subscription {
            session_id: session_id.to_string(),
            subscriber_id,
            events: rx,
        }
    }

    /// Drop one subscriber; the session entry goes away with its last subscriber.
    pub fn unsubscribe(&self, session_id: &str, subscriber_id: Uuid) {
        if let Some(mut subscribers) = self.sessions.get_mut(session_id) {
            subscribers.remove(&subscriber_id);
        }
        self.sessions
            .remove_if(session_id, |_, subscribers| subscribers.is_empty());
        debug!(session_id, %subscriber_id, "socket unsubscribed");
    }

    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.sessions
            .get(session_id)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }

    /// Token cancelled by [`shutdown`](Self::shutdown); sockets select on it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Close every subscription. Called once when the server stops.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.sessions.clear();
    }
}

impl Notifier for SocketHub {
    fn notify(&self, session_id: &str, event: ProgressEvent) -> Result<(), NotifyError> {
        let Some(subscribers) = self.sessions.get(session_id) else {
            return Err(NotifyError::NoSubscriber(session_id.to_string()));
        };

        let delivered = subscribers
            .values()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count();
        if delivered == 0 {
            return Err(NotifyError::Disconnected(session_id.to_string()));
        }

        debug!(session_id, event = event.name(), delivered, "progress event emitted");
        Ok(())
    }
}
