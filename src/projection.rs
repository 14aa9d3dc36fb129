//! Render projection contract
//!
//! The reconciliation core never depends on a UI. It tells a `Projector`
//! about every accepted item change and every turn change, always with the
//! full current state, so a consumer can render idempotently by item id.

mod handles;
mod transcript;

pub use handles::RenderHandles;
pub use transcript::{render_item, Transcript, TranscriptEntry, TranscriptProjector};

use crate::protocol::SessionId;
use crate::reconcile::ItemSnapshot;
use crate::turns::TurnState;

/// Observer of reconciled state
pub trait Projector {
    /// Called once per accepted upsert (and per forced finalization) with the
    /// item's full snapshot
    fn on_item_change(&mut self, session_id: &SessionId, snapshot: &ItemSnapshot);

    /// Called whenever a turn's lifecycle changes
    fn on_turn_change(&mut self, session_id: &SessionId, turn: &TurnState);

    /// Called after the session's state has been discarded
    fn on_session_disposed(&mut self, _session_id: &SessionId) {}
}

impl<P: Projector + ?Sized> Projector for &mut P {
    fn on_item_change(&mut self, session_id: &SessionId, snapshot: &ItemSnapshot) {
        (**self).on_item_change(session_id, snapshot);
    }

    fn on_turn_change(&mut self, session_id: &SessionId, turn: &TurnState) {
        (**self).on_turn_change(session_id, turn);
    }

    fn on_session_disposed(&mut self, session_id: &SessionId) {
        (**self).on_session_disposed(session_id);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Projector;
    use crate::protocol::SessionId;
    use crate::reconcile::ItemSnapshot;
    use crate::turns::TurnState;

    /// One notification received by a `RecordingProjector`
    #[derive(Debug, Clone, PartialEq)]
    pub enum Notification {
        Item(SessionId, ItemSnapshot),
        Turn(SessionId, TurnState),
        Disposed(SessionId),
    }

    /// Projector that records every notification
    #[derive(Debug, Default)]
    pub struct RecordingProjector {
        pub notifications: Vec<Notification>,
    }

    impl RecordingProjector {
        pub fn items(&self) -> Vec<&ItemSnapshot> {
            self.notifications
                .iter()
                .filter_map(|n| match n {
                    Notification::Item(_, snapshot) => Some(snapshot),
                    _ => None,
                })
                .collect()
        }

        pub fn turns(&self) -> Vec<&TurnState> {
            self.notifications
                .iter()
                .filter_map(|n| match n {
                    Notification::Turn(_, turn) => Some(turn),
                    _ => None,
                })
                .collect()
        }
    }

    impl Projector for RecordingProjector {
        fn on_item_change(&mut self, session_id: &SessionId, snapshot: &ItemSnapshot) {
            self.notifications
                .push(Notification::Item(session_id.clone(), snapshot.clone()));
        }

        fn on_turn_change(&mut self, session_id: &SessionId, turn: &TurnState) {
            self.notifications
                .push(Notification::Turn(session_id.clone(), turn.clone()));
        }

        fn on_session_disposed(&mut self, session_id: &SessionId) {
            self.notifications
                .push(Notification::Disposed(session_id.clone()));
        }
    }
}
