use crate::Message;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for a server frame; a full history replay must fit.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;
/// Upper bound for a single client submission.
pub const MAX_SUBMISSION_BYTES: usize = 16 * 1024;

pub const ANONYMOUS_USER: &str = "Anonymous";

/// Frames the session store pushes to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Sent once per connection, before any feedback.
    History { messages: Vec<Message> },
    /// One newly accepted message, fanned out to every session.
    Feedback(Message),
}

/// Frames a client may send; `message` is the only submission kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Message(Submission),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Submission {
    #[serde(default = "anonymous_user")]
    pub user: String,
    #[serde(default)]
    pub message: String,
}

impl ClientFrame {
    pub fn message(user: impl Into<String>, message: impl Into<String>) -> Self {
        ClientFrame::Message(Submission {
            user: user.into(),
            message: message.into(),
        })
    }
}

fn anonymous_user() -> String {
    ANONYMOUS_USER.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame exceeds max size: {size} > {max}")]
    OversizedFrame { size: usize, max: usize },
    #[error("frame encode failed: {0}")]
    Encode(String),
    #[error("frame decode failed: {0}")]
    Decode(String),
}

pub fn encode_frame<T: Serialize>(value: &T, max_frame_bytes: usize) -> Result<String, FrameError> {
    let encoded = serde_json::to_string(value).map_err(|err| FrameError::Encode(err.to_string()))?;
    if encoded.len() > max_frame_bytes {
        return Err(FrameError::OversizedFrame {
            size: encoded.len(),
            max: max_frame_bytes,
        });
    }
    Ok(encoded)
}

pub fn decode_frame<T: DeserializeOwned>(text: &str, max_frame_bytes: usize) -> Result<T, FrameError> {
    let raw = text.trim_end_matches(['\r', '\n']);
    if raw.len() > max_frame_bytes {
        return Err(FrameError::OversizedFrame {
            size: raw.len(),
            max: max_frame_bytes,
        });
    }
    serde_json::from_str(raw).map_err(|err| FrameError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, user: &str, text: &str, ts: &str) -> Message {
        Message {
            id: id.to_string(),
            user: user.to_string(),
            message: text.to_string(),
            timestamp: ts.to_string(),
        }
    }

    #[test]
    fn history_frame_decodes_in_store_order() {
        let frame: ServerFrame = decode_frame(
            r#"{"type":"history","messages":[
                {"id":"1","user":"SYSTEM","message":"joined","timestamp":"t0"},
                {"id":"2","user":"Field-Unit-01","message":"status ok","timestamp":"t1"}
            ]}"#,
            DEFAULT_MAX_FRAME_BYTES,
        )
        .expect("decode history");
        assert_eq!(
            frame,
            ServerFrame::History {
                messages: vec![
                    message("1", "SYSTEM", "joined", "t0"),
                    message("2", "Field-Unit-01", "status ok", "t1"),
                ],
            }
        );
    }

    #[test]
    fn feedback_frame_carries_flattened_message_fields() {
        let frame: ServerFrame = decode_frame(
            r#"{"type":"feedback","id":"2","user":"Field-Unit-01","message":"status ok","timestamp":"t1"}"#,
            DEFAULT_MAX_FRAME_BYTES,
        )
        .expect("decode feedback");
        assert_eq!(
            frame,
            ServerFrame::Feedback(message("2", "Field-Unit-01", "status ok", "t1"))
        );

        let encoded = encode_frame(&frame, DEFAULT_MAX_FRAME_BYTES).expect("encode feedback");
        let value: serde_json::Value = serde_json::from_str(&encoded).expect("json");
        assert_eq!(value["type"], "feedback");
        assert_eq!(value["id"], "2");
        assert!(value.get("messages").is_none());
    }

    #[test]
    fn unknown_frame_type_is_a_decode_error() {
        let result: Result<ServerFrame, _> = decode_frame(
            r#"{"type":"status","progress":40}"#,
            DEFAULT_MAX_FRAME_BYTES,
        );
        assert!(matches!(result, Err(FrameError::Decode(_))));

        let result: Result<ServerFrame, _> = decode_frame("not json", DEFAULT_MAX_FRAME_BYTES);
        assert!(matches!(result, Err(FrameError::Decode(_))));
    }

    #[test]
    fn client_submission_has_the_message_envelope_shape() {
        let encoded = encode_frame(
            &ClientFrame::message("Field-Unit-01", "bridge clear"),
            MAX_SUBMISSION_BYTES,
        )
        .expect("encode submission");
        let value: serde_json::Value = serde_json::from_str(&encoded).expect("json");
        assert_eq!(
            value,
            serde_json::json!({"type": "message", "user": "Field-Unit-01", "message": "bridge clear"})
        );
    }

    #[test]
    fn submission_defaults_missing_user_and_text() {
        let frame: ClientFrame =
            decode_frame(r#"{"type":"message"}"#, MAX_SUBMISSION_BYTES).expect("decode");
        assert_eq!(frame, ClientFrame::message(ANONYMOUS_USER, ""));
    }

    #[test]
    fn oversized_frames_are_rejected_both_ways() {
        let frame = ClientFrame::message("unit", "x".repeat(256));
        assert!(matches!(
            encode_frame(&frame, 64),
            Err(FrameError::OversizedFrame { .. })
        ));

        let text = format!(r#"{{"type":"message","user":"u","message":"{}"}}"#, "y".repeat(200));
        let result: Result<ClientFrame, _> = decode_frame(&text, 128);
        assert!(matches!(result, Err(FrameError::OversizedFrame { .. })));
    }
}
