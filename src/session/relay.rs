//! Multi-session front door

use super::{Ingested, OrphanPolicy, Session};
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::projection::Projector;
use crate::protocol::SessionId;
use serde_json::Value;
use std::collections::HashMap;

/// Routes frames to per-session state and owns the shared projector and sink.
///
/// Sessions are created on their first frame and live until `dispose`.
#[derive(Debug)]
pub struct Relay<P, D = TracingSink> {
    sessions: HashMap<SessionId, Session>,
    projector: P,
    sink: D,
    policy: OrphanPolicy,
}

impl<P: Projector> Relay<P, TracingSink> {
    pub fn new(projector: P, policy: OrphanPolicy) -> Self {
        Self::with_sink(projector, TracingSink, policy)
    }
}

impl<P: Projector, D: DiagnosticSink> Relay<P, D> {
    pub fn with_sink(projector: P, sink: D, policy: OrphanPolicy) -> Self {
        Self {
            sessions: HashMap::new(),
            projector,
            sink,
            policy,
        }
    }

    /// Decode `raw` and apply it to `session_id`, in receipt order
    pub fn ingest(&mut self, session_id: &SessionId, raw: &str) -> Ingested {
        let session = open_session(&mut self.sessions, session_id, self.policy);
        session.ingest_str(raw, &mut self.projector, &self.sink)
    }

    /// Apply an already parsed JSON frame
    pub fn ingest_value(&mut self, session_id: &SessionId, raw: &Value) -> Ingested {
        let session = open_session(&mut self.sessions, session_id, self.policy);
        session.ingest(raw, &mut self.projector, &self.sink)
    }

    /// Discard all state of a session. Returns `false` if it was unknown.
    pub fn dispose(&mut self, session_id: &SessionId) -> bool {
        let Some(session) = self.sessions.remove(session_id) else {
            return false;
        };
        tracing::info!(
            session_id = %session_id,
            items = session.items().len(),
            turns = session.turns().len(),
            "Session disposed"
        );
        self.projector.on_session_disposed(session_id);
        true
    }

    pub fn session(&self, session_id: &SessionId) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn session_ids(&self) -> impl Iterator<Item = &SessionId> + '_ {
        self.sessions.keys()
    }

    pub fn projector(&self) -> &P {
        &self.projector
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }
}

fn open_session<'a>(
    sessions: &'a mut HashMap<SessionId, Session>,
    session_id: &SessionId,
    policy: OrphanPolicy,
) -> &'a mut Session {
    sessions.entry(session_id.clone()).or_insert_with(|| {
        tracing::info!(session_id = %session_id, %policy, "Session opened");
        Session::new(session_id.clone(), policy)
    })
}
