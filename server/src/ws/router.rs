//! Directed message routing between present users.
//!
//! Delivery is best-effort and online-only: an absent recipient means the
//! message is dropped. The sender is always acknowledged, whether or not the
//! recipient received anything.

use super::protocol::{MessageEnvelope, SendMessage, ServerEvent};
use super::{ConnectionHandle, PresenceRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Delivered,
    RecipientOffline,
}

#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: PresenceRegistry,
}

impl MessageRouter {
    pub fn new(registry: PresenceRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PresenceRegistry {
        &self.registry
    }

    /// Route one message from `sender`'s connection.
    ///
    /// The envelope's sender is taken from the handle, never from the request.
    /// A recipient whose transport already failed is treated as offline.
    pub fn route(&self, sender: &ConnectionHandle, request: SendMessage) -> RouteOutcome {
        let envelope = MessageEnvelope::stamp(sender.user_id(), request);
        let payload = envelope.to_payload();

        let outcome = match self.registry.lookup(envelope.recipient()) {
            Some(recipient) => match recipient.push(&ServerEvent::ReceiveMessage(payload.clone())) {
                Ok(()) => RouteOutcome::Delivered,
                Err(e) => {
                    tracing::debug!(
                        to = %envelope.recipient(),
                        connection_id = %recipient.connection_id(),
                        error = %e,
                        "Recipient transport gone, dropping message"
                    );
                    RouteOutcome::RecipientOffline
                }
            },
            None => RouteOutcome::RecipientOffline,
        };

        if let Err(e) = sender.push(&ServerEvent::MessageSent(payload)) {
            tracing::debug!(
                user_id = %sender.user_id(),
                connection_id = %sender.connection_id(),
                error = %e,
                "Failed to acknowledge sender"
            );
        }

        tracing::debug!(
            from = %envelope.sender(),
            to = %envelope.recipient(),
            conversation_id = %envelope.conversation_id(),
            outcome = ?outcome,
            "Message routed"
        );
        outcome
    }
}
