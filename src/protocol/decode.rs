//! Pure decoding of raw frames into typed upserts and turn events
//!
//! Decoding never has side effects. Every (type, status) combination is
//! matched explicitly; anything else is a `DecodeError`.

use super::{
    parse_timestamp, DecodeError, ErrorDetail, Frame, ItemKind, ItemPayload, ItemStatus,
    SessionId, ToolOutput, TurnEvent, Upsert, UPSERT_FRAME_TYPE,
};
use serde::Deserialize;
use serde_json::{Map, Value};

const UPSERT_CONTEXT: &str = "upsert";

/// All fields an upsert payload may carry, before validation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUpsert {
    turn_id: Option<String>,
    session_id: Option<String>,
    item_id: Option<String>,
    source_timestamp: Option<Value>,
    emitted_at: Option<Value>,
    status: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    content: Option<String>,
    origin: Option<String>,
    error_code: Option<String>,
    error_message: Option<String>,
    provider_id: Option<String>,
    tool_name: Option<String>,
    tool_arguments: Option<Value>,
    call_id: Option<String>,
    tool_output: Option<Value>,
    tool_output_is_error: Option<bool>,
}

/// Decode a frame received as text
pub fn decode_frame_str(raw: &str) -> Result<Frame, DecodeError> {
    let value: Value = serde_json::from_str(raw).map_err(DecodeError::InvalidJson)?;
    decode_frame(&value)
}

/// Decode one raw frame: either a `session:upsert` envelope or a turn event
pub fn decode_frame(raw: &Value) -> Result<Frame, DecodeError> {
    let obj = raw
        .as_object()
        .ok_or(DecodeError::NotAnObject { context: "frame" })?;
    let frame_type = required_str(obj, "frame", "type")?;

    match frame_type {
        UPSERT_FRAME_TYPE => decode_envelope(obj).map(Frame::Upsert),
        "turn_started" | "turn_complete" | "turn_error" => {
            let event: TurnEvent =
                serde_json::from_value(raw.clone()).map_err(|source| DecodeError::Malformed {
                    context: "turn event",
                    source,
                })?;
            if event.turn_id().is_empty() {
                return Err(DecodeError::EmptyField { field: "turnId" });
            }
            Ok(Frame::Turn(event))
        }
        other => Err(DecodeError::UnknownFrameType(other.to_string())),
    }
}

fn decode_envelope(obj: &Map<String, Value>) -> Result<Upsert, DecodeError> {
    let envelope_session: SessionId = required_str(obj, "envelope", "sessionId")?.parse()?;
    let payload = obj.get("payload").ok_or(DecodeError::MissingField {
        context: "envelope",
        field: "payload",
    })?;
    let upsert = decode_upsert(payload)?;

    if upsert.session_id != envelope_session {
        return Err(DecodeError::SessionMismatch {
            expected: envelope_session.to_string(),
            found: upsert.session_id.to_string(),
        });
    }
    Ok(upsert)
}

/// Decode and validate a bare upsert payload
pub fn decode_upsert(raw: &Value) -> Result<Upsert, DecodeError> {
    if !raw.is_object() {
        return Err(DecodeError::NotAnObject {
            context: UPSERT_CONTEXT,
        });
    }
    let raw: RawUpsert =
        serde_json::from_value(raw.clone()).map_err(|source| DecodeError::Malformed {
            context: UPSERT_CONTEXT,
            source,
        })?;

    let kind_str = require(raw.kind, "type")?;
    let kind =
        ItemKind::from_wire(&kind_str).ok_or_else(|| DecodeError::UnknownItemType(kind_str))?;
    let status_str = require(raw.status, "status")?;
    let status =
        ItemStatus::from_wire(&status_str).ok_or_else(|| DecodeError::UnknownStatus(status_str))?;

    let turn_id = require_non_empty(raw.turn_id, "turnId")?;
    let item_id = require_non_empty(raw.item_id, "itemId")?;
    let session_id: SessionId = require(raw.session_id, "sessionId")?.parse()?;
    let source_timestamp = parse_timestamp(
        "sourceTimestamp",
        &require(raw.source_timestamp, "sourceTimestamp")?,
    )?;
    let emitted_at = parse_timestamp("emittedAt", &require(raw.emitted_at, "emittedAt")?)?;

    let error = match status {
        ItemStatus::Error => Some(ErrorDetail {
            code: require(raw.error_code, "errorCode")?,
            message: require(raw.error_message, "errorMessage")?,
        }),
        ItemStatus::Create | ItemStatus::Update | ItemStatus::Complete => None,
    };

    let tool_output = raw.tool_output.map(|content| ToolOutput {
        content,
        is_error: raw.tool_output_is_error.unwrap_or(false),
    });

    let payload = match (kind, status) {
        (ItemKind::Message, ItemStatus::Create | ItemStatus::Update | ItemStatus::Complete) => {
            ItemPayload::Message {
                content: Some(require(raw.content, "content")?),
                origin: raw.origin,
            }
        }
        (ItemKind::Message, ItemStatus::Error) => ItemPayload::Message {
            content: raw.content,
            origin: raw.origin,
        },
        (ItemKind::Thinking, ItemStatus::Create | ItemStatus::Update | ItemStatus::Complete) => {
            ItemPayload::Thinking {
                content: Some(require(raw.content, "content")?),
                provider_id: raw.provider_id,
            }
        }
        (ItemKind::Thinking, ItemStatus::Error) => ItemPayload::Thinking {
            content: raw.content,
            provider_id: raw.provider_id,
        },
        (ItemKind::ToolCall, ItemStatus::Create) => {
            reject_tool_output(tool_output.as_ref(), kind, status)?;
            ItemPayload::ToolCall {
                tool_name: raw.tool_name,
                call_id: Some(require_non_empty(raw.call_id, "callId")?),
                arguments: raw.tool_arguments,
                content: raw.content,
                output: None,
            }
        }
        (ItemKind::ToolCall, ItemStatus::Update) => {
            reject_tool_output(tool_output.as_ref(), kind, status)?;
            ItemPayload::ToolCall {
                tool_name: raw.tool_name,
                call_id: raw.call_id,
                arguments: raw.tool_arguments,
                content: raw.content,
                output: None,
            }
        }
        (ItemKind::ToolCall, ItemStatus::Complete | ItemStatus::Error) => ItemPayload::ToolCall {
            tool_name: raw.tool_name,
            call_id: raw.call_id,
            arguments: raw.tool_arguments,
            content: raw.content,
            output: tool_output,
        },
    };

    Ok(Upsert {
        turn_id,
        session_id,
        item_id,
        source_timestamp,
        emitted_at,
        status,
        payload,
        error,
    })
}

fn require<T>(field: Option<T>, name: &'static str) -> Result<T, DecodeError> {
    field.ok_or(DecodeError::MissingField {
        context: UPSERT_CONTEXT,
        field: name,
    })
}

fn require_non_empty(field: Option<String>, name: &'static str) -> Result<String, DecodeError> {
    let value = require(field, name)?;
    if value.is_empty() {
        return Err(DecodeError::EmptyField { field: name });
    }
    Ok(value)
}

fn required_str<'a>(
    obj: &'a Map<String, Value>,
    context: &'static str,
    field: &'static str,
) -> Result<&'a str, DecodeError> {
    obj.get(field)
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingField { context, field })
}

fn reject_tool_output(
    output: Option<&ToolOutput>,
    kind: ItemKind,
    status: ItemStatus,
) -> Result<(), DecodeError> {
    match output {
        Some(_) => Err(DecodeError::UnexpectedField {
            field: "toolOutput",
            kind,
            status,
        }),
        None => Ok(()),
    }
}
