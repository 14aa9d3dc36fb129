//! Session runtime task

use super::{RelayEvent, SessionCommand, Subscription};
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::projection::Projector;
use crate::protocol::SessionId;
use crate::reconcile::ItemSnapshot;
use crate::session::Session;
use crate::turns::TurnState;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Projector that forwards every notification to broadcast subscribers
#[derive(Debug, Clone)]
pub struct BroadcastProjector {
    broadcast_tx: broadcast::Sender<RelayEvent>,
}

impl BroadcastProjector {
    pub fn new(broadcast_tx: broadcast::Sender<RelayEvent>) -> Self {
        Self { broadcast_tx }
    }

    fn send(&self, event: RelayEvent) {
        // No subscribers is fine; the view is always available on request
        let _ = self.broadcast_tx.send(event);
    }
}

impl Projector for BroadcastProjector {
    fn on_item_change(&mut self, _session_id: &SessionId, snapshot: &ItemSnapshot) {
        self.send(RelayEvent::Item {
            snapshot: snapshot.clone(),
        });
    }

    fn on_turn_change(&mut self, _session_id: &SessionId, turn: &TurnState) {
        self.send(RelayEvent::Turn { turn: turn.clone() });
    }

    fn on_session_disposed(&mut self, _session_id: &SessionId) {
        self.send(RelayEvent::Disposed);
    }
}

/// Owns one session and processes its queue until cancelled
pub struct SessionRuntime<D = TracingSink> {
    session: Session,
    projector: BroadcastProjector,
    sink: D,
    command_rx: mpsc::Receiver<SessionCommand>,
    cancel: CancellationToken,
}

impl SessionRuntime<TracingSink> {
    pub fn new(
        session: Session,
        command_rx: mpsc::Receiver<SessionCommand>,
        broadcast_tx: broadcast::Sender<RelayEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self::with_sink(session, command_rx, broadcast_tx, cancel, TracingSink)
    }
}

impl<D: DiagnosticSink> SessionRuntime<D> {
    pub fn with_sink(
        session: Session,
        command_rx: mpsc::Receiver<SessionCommand>,
        broadcast_tx: broadcast::Sender<RelayEvent>,
        cancel: CancellationToken,
        sink: D,
    ) -> Self {
        Self {
            session,
            projector: BroadcastProjector::new(broadcast_tx),
            sink,
            command_rx,
            cancel,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.session.id(), "Starting session runtime");

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    self.projector.on_session_disposed(self.session.id());
                    break;
                }
                Some(command) = self.command_rx.recv() => self.handle(command),
                else => break,
            }
        }

        tracing::info!(
            session_id = %self.session.id(),
            items = self.session.items().len(),
            turns = self.session.turns().len(),
            "Session runtime stopped"
        );
    }

    fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Ingest(raw) => {
                self.session
                    .ingest_slice(&raw, &mut self.projector, &self.sink);
            }
            SessionCommand::View(reply) => {
                let _ = reply.send(self.session.view());
            }
            SessionCommand::Subscribe(reply) => {
                let subscription = Subscription {
                    view: self.session.view(),
                    events: self.projector.broadcast_tx.subscribe(),
                };
                let _ = reply.send(subscription);
            }
        }
    }
}
