//! Upsert Relay
//!
//! Reconciles a partial, out-of-order, duplicated stream of item upserts and
//! turn events from an agent process into one stable snapshot per item, and
//! notifies a render projection of every accepted change.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod api;
pub mod config;
pub mod diagnostics;
pub mod projection;
pub mod protocol;
pub mod reconcile;
pub mod runtime;
pub mod session;
pub mod turns;

pub use config::{ConfigError, RelayConfig};
pub use diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
pub use projection::{Projector, RenderHandles, TranscriptProjector};
pub use protocol::{DecodeError, Frame, SessionId, TurnEvent, Upsert};
pub use reconcile::{Discard, ItemMap, ItemSnapshot};
pub use session::{Ingested, OrphanPolicy, Relay, Session, SessionView};
pub use turns::{TurnState, TurnStatus, TurnTracker};
