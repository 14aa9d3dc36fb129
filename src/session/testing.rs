//! Frame builders shared by session, runtime and API tests

use crate::protocol::SessionId;
use serde_json::{json, Value};

pub const SESSION: &str = "claude:s1";

pub fn session_id() -> SessionId {
    SessionId::new("claude", "s1")
}

fn envelope(payload: Value) -> Value {
    json!({ "type": "session:upsert", "sessionId": SESSION, "payload": payload })
}

pub fn message(turn_id: &str, item_id: &str, status: &str, content: &str, emitted_at: i64) -> Value {
    envelope(json!({
        "turnId": turn_id,
        "sessionId": SESSION,
        "itemId": item_id,
        "sourceTimestamp": emitted_at,
        "emittedAt": emitted_at,
        "status": status,
        "type": "message",
        "content": content,
        "origin": "assistant"
    }))
}

pub fn tool_call(
    turn_id: &str,
    item_id: &str,
    status: &str,
    content: &str,
    emitted_at: i64,
) -> Value {
    envelope(json!({
        "turnId": turn_id,
        "sessionId": SESSION,
        "itemId": item_id,
        "sourceTimestamp": emitted_at,
        "emittedAt": emitted_at,
        "status": status,
        "type": "tool_call",
        "callId": "read_file",
        "content": content
    }))
}

pub fn turn_started(turn_id: &str) -> Value {
    json!({
        "type": "turn_started",
        "turnId": turn_id,
        "sessionId": SESSION,
        "modelId": "sonnet",
        "providerId": "anthropic"
    })
}

pub fn turn_complete(turn_id: &str, status: &str) -> Value {
    json!({
        "type": "turn_complete",
        "turnId": turn_id,
        "sessionId": SESSION,
        "status": status
    })
}

pub fn turn_error(turn_id: &str, code: &str) -> Value {
    json!({
        "type": "turn_error",
        "turnId": turn_id,
        "sessionId": SESSION,
        "errorCode": code,
        "errorMessage": "Provider process exited"
    })
}
