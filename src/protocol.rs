//! Wire model for the upsert stream
//!
//! Item upserts and turn events as they arrive from the transport, plus the
//! pure decoder that turns raw JSON into typed frames.

mod decode;
mod ids;
mod turn_event;
mod upsert;

pub use decode::{decode_frame, decode_frame_str, decode_upsert};
pub use ids::{parse_timestamp, SessionId};
pub use turn_event::{TurnEvent, TurnOutcome, Usage};
pub use upsert::{ErrorDetail, ItemKind, ItemPayload, ItemStatus, ToolOutput, Upsert};

use thiserror::Error;

/// Discriminant of the envelope that wraps an item upsert
pub const UPSERT_FRAME_TYPE: &str = "session:upsert";

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Upsert(Upsert),
    Turn(TurnEvent),
}

impl Frame {
    /// Session the frame belongs to
    pub fn session_id(&self) -> &SessionId {
        match self {
            Frame::Upsert(upsert) => &upsert.session_id,
            Frame::Turn(event) => event.session_id(),
        }
    }
}

/// Why a raw frame could not be decoded
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("{context} must be a JSON object")]
    NotAnObject { context: &'static str },
    #[error("{context} is missing required field '{field}'")]
    MissingField {
        context: &'static str,
        field: &'static str,
    },
    #[error("field '{field}' must not be empty")]
    EmptyField { field: &'static str },
    #[error("field '{field}' is not allowed on a {kind} {status} upsert")]
    UnexpectedField {
        field: &'static str,
        kind: ItemKind,
        status: ItemStatus,
    },
    #[error("unknown frame type '{0}'")]
    UnknownFrameType(String),
    #[error("unknown item type '{0}'")]
    UnknownItemType(String),
    #[error("unknown item status '{0}'")]
    UnknownStatus(String),
    #[error("invalid session id '{0}' (expected <providerKind>:<id>)")]
    InvalidSessionId(String),
    #[error("invalid timestamp in '{field}': {value}")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("session mismatch: expected '{expected}', frame names '{found}'")]
    SessionMismatch { expected: String, found: String },
    #[error("malformed {context}: {source}")]
    Malformed {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
