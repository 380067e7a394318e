//! Presence registry: which users are reachable right now, and through which
//! connection.
//!
//! Backed by a sharded DashMap so register/unregister for different users only
//! contend when they hash to the same shard. One handle per user: a newer
//! registration supersedes the older one, which is force-closed.

use dashmap::DashMap;
use std::sync::Arc;

use super::{ConnectionHandle, CLOSE_SUPERSEDED};

#[derive(Debug, Clone, Default)]
pub struct PresenceRegistry {
    entries: Arc<DashMap<String, ConnectionHandle>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for the handle's user.
    ///
    /// Returns the superseded handle, if any, after asking it to close. The
    /// close is pushed outside the shard lock.
    pub fn register(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let user_id = handle.user_id().to_string();
        let connection_id = handle.connection_id();
        let previous = self.entries.insert(user_id.clone(), handle)?;

        if previous.connection_id() == connection_id {
            return None;
        }

        tracing::info!(
            user_id = %user_id,
            superseded = %previous.connection_id(),
            connection_id = %connection_id,
            "Connection superseded by newer login"
        );
        if let Err(e) = previous.force_close(CLOSE_SUPERSEDED, "Superseded by newer connection") {
            tracing::debug!(error = %e, "Superseded connection already gone");
        }
        Some(previous)
    }

    /// Remove the entry for the handle's user, but only if it is still this handle.
    /// A stale unregister racing a newer registration leaves the newer one intact.
    pub fn unregister(&self, handle: &ConnectionHandle) -> bool {
        let removed = self
            .entries
            .remove_if(handle.user_id(), |_, current| current == handle)
            .is_some();

        tracing::debug!(
            user_id = %handle.user_id(),
            connection_id = %handle.connection_id(),
            removed,
            "Connection unregistered"
        );
        removed
    }

    pub fn lookup(&self, user_id: &str) -> Option<ConnectionHandle> {
        self.entries.get(user_id).map(|entry| entry.value().clone())
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.entries.contains_key(user_id)
    }

    pub fn online_count(&self) -> usize {
        self.entries.len()
    }
}
