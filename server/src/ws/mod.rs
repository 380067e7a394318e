pub mod actor;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod session;

use axum::extract::ws::{CloseFrame, Message};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ws::protocol::ServerEvent;

pub use registry::PresenceRegistry;
pub use router::{MessageRouter, RouteOutcome};
pub use session::{Session, SessionState};

/// Opaque, stable identifier of a registered user.
pub type UserId = String;

/// Sender half of a connection's outbound channel. The connection's writer task
/// owns the receiver and forwards every frame to the WebSocket sink.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// Close code pushed to a connection replaced by a newer one for the same user.
pub const CLOSE_SUPERSEDED: u16 = 4005;

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("connection {0} is closed")]
    Closed(Uuid),
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One live, authenticated transport connection.
///
/// Cloning is cheap; clones share the underlying channel. Two handles are equal
/// only when they refer to the same connection, so a reconnect from the same
/// user never compares equal to the connection it replaced.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    user_id: UserId,
    connection_id: Uuid,
    sender: ConnectionSender,
}

impl ConnectionHandle {
    pub fn new(user_id: impl Into<UserId>, sender: ConnectionSender) -> Self {
        Self {
            user_id: user_id.into(),
            connection_id: Uuid::now_v7(),
            sender,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Push a server event to this peer as a JSON text frame.
    /// Never blocks; fails once the connection's writer has gone away.
    pub fn push(&self, event: &ServerEvent) -> Result<(), PushError> {
        let json = serde_json::to_string(event)?;
        self.send_raw(Message::Text(json.into()))
    }

    /// Ask the writer to send a Close frame and stop.
    pub fn force_close(&self, code: u16, reason: &str) -> Result<(), PushError> {
        self.send_raw(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
    }

    pub fn send_raw(&self, msg: Message) -> Result<(), PushError> {
        self.sender
            .send(msg)
            .map_err(|_| PushError::Closed(self.connection_id))
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.connection_id == other.connection_id
    }
}

impl Eq for ConnectionHandle {}
