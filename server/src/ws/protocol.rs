//! JSON event protocol spoken over `/ws`.
//!
//! Every frame is `{"event": "<name>", "data": {...}}`. Inbound frames never
//! carry a sender identity: the sender is always the authenticated session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Error code echoed to the client for frames that fail shape validation.
pub const ERROR_MALFORMED: u16 = 400;

/// Events a client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// First-frame credential for clients that cannot set handshake metadata.
    Authenticate { token: String },
    SendMessage(SendMessage),
}

/// `send_message` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub conversation_id: String,
    pub to_user_id: UserId,
    pub text: String,
}

/// Events the server pushes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    ReceiveMessage(MessagePayload),
    MessageSent(MessagePayload),
    Error(ErrorPayload),
}

/// Wire view of a routed envelope, shared by delivery and acknowledgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub conversation_id: String,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub text: String,
    /// Server-assigned, Unix millis
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("invalid event: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("binary frames are not supported")]
    Binary,
}

impl PayloadError {
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::Error(ErrorPayload {
            code: ERROR_MALFORMED,
            message: self.to_string(),
        })
    }
}

/// Decode and validate a client text frame.
pub fn parse_client_event(text: &str) -> Result<ClientEvent, PayloadError> {
    let event: ClientEvent = serde_json::from_str(text)?;
    if let ClientEvent::SendMessage(msg) = &event {
        msg.validate()?;
    }
    Ok(event)
}

impl SendMessage {
    /// The conversation id is opaque to the relay and passes through as-is.
    fn validate(&self) -> Result<(), PayloadError> {
        if self.to_user_id.is_empty() {
            return Err(PayloadError::EmptyField("toUserId"));
        }
        if self.text.trim().is_empty() {
            return Err(PayloadError::EmptyField("text"));
        }
        Ok(())
    }
}

/// Immutable unit of transit. The sender is stamped from the authenticated
/// session and the timestamp from the server clock at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEnvelope {
    conversation_id: String,
    sender: UserId,
    recipient: UserId,
    text: String,
    timestamp: DateTime<Utc>,
}

impl MessageEnvelope {
    pub fn stamp(sender: &str, request: SendMessage) -> Self {
        Self {
            conversation_id: request.conversation_id,
            sender: sender.to_string(),
            recipient: request.to_user_id,
            text: request.text,
            timestamp: Utc::now(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn to_payload(&self) -> MessagePayload {
        MessagePayload {
            conversation_id: self.conversation_id.clone(),
            from_user_id: self.sender.clone(),
            to_user_id: self.recipient.clone(),
            text: self.text.clone(),
            timestamp: self.timestamp.timestamp_millis(),
        }
    }
}
