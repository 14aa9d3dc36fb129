//! Per-session async runtime
//!
//! Each live session runs in its own tokio task that owns the `Session` and
//! consumes one queue in receipt order. Projection notifications are fanned
//! out to subscribers through a broadcast channel.

mod executor;

pub use executor::{BroadcastProjector, SessionRuntime};

use crate::config::RelayConfig;
use crate::protocol::SessionId;
use crate::reconcile::ItemSnapshot;
use crate::session::{Session, SessionView};
use crate::turns::TurnState;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;

/// Notifications sent to stream subscribers
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// Full state at the moment of subscribing
    Init { view: SessionView },
    Item { snapshot: ItemSnapshot },
    Turn { turn: TurnState },
    /// The session was torn down; no further events follow
    Disposed,
}

/// Work queued for a session task
#[derive(Debug)]
pub enum SessionCommand {
    /// Raw frame bytes, applied in queue order
    Ingest(Vec<u8>),
    /// Read the current view after everything queued before it
    View(oneshot::Sender<SessionView>),
    /// Subscribe to notifications, atomically with an initial view
    Subscribe(oneshot::Sender<Subscription>),
}

/// Initial view plus the live notification stream that continues from it
#[derive(Debug)]
pub struct Subscription {
    pub view: SessionView,
    pub events: broadcast::Receiver<RelayEvent>,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("session '{0}' not found")]
    NotFound(SessionId),
    #[error("session '{0}' is shutting down")]
    Closed(SessionId),
}

/// Handle to interact with a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub command_tx: mpsc::Sender<SessionCommand>,
    cancel: CancellationToken,
}

impl SessionHandle {
    async fn send(&self, session_id: &SessionId, command: SessionCommand) -> Result<(), RelayError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| RelayError::Closed(session_id.clone()))
    }
}

/// Registry of live session runtimes
pub struct RelayManager {
    config: RelayConfig,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl RelayManager {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Get the runtime of a session, starting one if needed
    pub async fn get_or_create(&self, session_id: &SessionId) -> SessionHandle {
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(session_id) {
                return handle.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        // Another request may have started it while we waited for the lock
        if let Some(handle) = sessions.get(session_id) {
            return handle.clone();
        }

        let (command_tx, command_rx) = mpsc::channel(self.config.queue_depth);
        let (broadcast_tx, _) = broadcast::channel(self.config.broadcast_capacity);
        let cancel = CancellationToken::new();

        let runtime = SessionRuntime::new(
            Session::new(session_id.clone(), self.config.orphan_policy),
            command_rx,
            broadcast_tx,
            cancel.clone(),
        );
        tokio::spawn(runtime.run());

        tracing::info!(
            session_id = %session_id,
            policy = %self.config.orphan_policy,
            "Session runtime started"
        );

        let handle = SessionHandle { command_tx, cancel };
        sessions.insert(session_id.clone(), handle.clone());
        handle
    }

    async fn existing(&self, session_id: &SessionId) -> Result<SessionHandle, RelayError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| RelayError::NotFound(session_id.clone()))
    }

    /// Queue a raw frame for a session, starting the session if needed.
    /// Frames are decoded by the session, so bytes that are not UTF-8 JSON
    /// surface as decode failures there.
    ///
    /// Waits for queue space when the session is behind.
    pub async fn ingest(
        &self,
        session_id: &SessionId,
        raw: impl Into<Vec<u8>>,
    ) -> Result<(), RelayError> {
        let handle = self.get_or_create(session_id).await;
        handle
            .send(session_id, SessionCommand::Ingest(raw.into()))
            .await
    }

    /// Current view of a live session
    pub async fn view(&self, session_id: &SessionId) -> Result<SessionView, RelayError> {
        let handle = self.existing(session_id).await?;
        let (tx, rx) = oneshot::channel();
        handle.send(session_id, SessionCommand::View(tx)).await?;
        rx.await.map_err(|_| RelayError::Closed(session_id.clone()))
    }

    /// Subscribe to a session's notifications, starting the session if needed
    pub async fn subscribe(&self, session_id: &SessionId) -> Result<Subscription, RelayError> {
        let handle = self.get_or_create(session_id).await;
        let (tx, rx) = oneshot::channel();
        handle.send(session_id, SessionCommand::Subscribe(tx)).await?;
        rx.await.map_err(|_| RelayError::Closed(session_id.clone()))
    }

    /// Tear down a session and discard its state. Returns `false` if it was
    /// not running.
    pub async fn dispose(&self, session_id: &SessionId) -> bool {
        let Some(handle) = self.sessions.write().await.remove(session_id) else {
            return false;
        };
        handle.cancel.cancel();
        tracing::info!(session_id = %session_id, "Session dispose requested");
        true
    }

    /// Ids of live sessions, sorted
    pub async fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
