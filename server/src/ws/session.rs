//! Lifecycle of one authenticated connection.
//!
//! No session exists while the upgrade handler is still waiting for a
//! credential. A `Session` is created `Authenticated`, registers and
//! becomes `Active`, and reaches `Closed` exactly once: either through
//! [`Session::close`] or by being dropped. Both paths end in the same `Drop`,
//! which is the only place that unregisters.

use super::{ConnectionHandle, ConnectionSender, PresenceRegistry, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Authenticated,
    Active,
    Closed,
}

/// Why a session ended. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientClosed,
    TransportError,
    /// Writer stopped after sending a close frame: supersession or heartbeat timeout
    ServerClosed,
    WriterFailed,
}

#[derive(Debug)]
pub struct Session {
    handle: ConnectionHandle,
    registry: PresenceRegistry,
    state: SessionState,
}

impl Session {
    /// Register a freshly authenticated connection and move it to `Active`.
    pub fn activate(registry: &PresenceRegistry, user_id: UserId, sender: ConnectionSender) -> Self {
        let mut session = Session {
            handle: ConnectionHandle::new(user_id, sender),
            registry: registry.clone(),
            state: SessionState::Authenticated,
        };

        registry.register(session.handle.clone());
        session.state = SessionState::Active;

        tracing::info!(
            user_id = %session.handle.user_id(),
            connection_id = %session.handle.connection_id(),
            online = registry.online_count(),
            "Session active"
        );
        session
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub fn user_id(&self) -> &str {
        self.handle.user_id()
    }

    /// Close the session. Consuming `self` makes a second close impossible.
    pub fn close(self, reason: CloseReason) {
        tracing::info!(
            user_id = %self.handle.user_id(),
            connection_id = %self.handle.connection_id(),
            reason = ?reason,
            "Session closed"
        );
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        self.registry.unregister(&self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_activate_registers_handle() {
        let registry = PresenceRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = Session::activate(&registry, "a1".to_string(), tx);

        assert_eq!(session.state, SessionState::Active);
        assert_eq!(registry.lookup("a1").as_ref(), Some(session.handle()));
    }

    #[test]
    fn test_close_unregisters_own_handle() {
        let registry = PresenceRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = Session::activate(&registry, "a1".to_string(), tx);

        session.close(CloseReason::ClientClosed);
        assert!(registry.lookup("a1").is_none());
    }

    #[test]
    fn test_drop_without_close_still_unregisters() {
        let registry = PresenceRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        {
            let _session = Session::activate(&registry, "a1".to_string(), tx);
            assert!(registry.is_online("a1"));
        }
        assert!(!registry.is_online("a1"));
    }

    #[test]
    fn test_superseded_session_close_leaves_newer_session_registered() {
        let registry = PresenceRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let first = Session::activate(&registry, "a1".to_string(), tx1);
        let second = Session::activate(&registry, "a1".to_string(), tx2);

        // First connection was told to close
        assert!(rx1.try_recv().is_ok());

        first.close(CloseReason::ServerClosed);
        assert_eq!(registry.lookup("a1").as_ref(), Some(second.handle()));

        second.close(CloseReason::ClientClosed);
        assert!(registry.lookup("a1").is_none());
    }

    #[tokio::test]
    async fn test_close_racing_reconnect_never_removes_newer_entry() {
        let registry = PresenceRegistry::new();

        for _ in 0..50 {
            let (tx1, _rx1) = mpsc::unbounded_channel();
            let (tx2, _rx2) = mpsc::unbounded_channel();
            let first = Session::activate(&registry, "a1".to_string(), tx1);

            let reg = registry.clone();
            let reconnect = tokio::spawn(async move { Session::activate(&reg, "a1".to_string(), tx2) });
            let close = tokio::spawn(async move { first.close(CloseReason::TransportError) });

            close.await.unwrap();
            let second = reconnect.await.unwrap();

            // Whatever the interleaving, the newest session stays registered
            assert_eq!(registry.lookup("a1").as_ref(), Some(second.handle()));
            drop(second);
            assert!(registry.lookup("a1").is_none());
        }
    }
}
