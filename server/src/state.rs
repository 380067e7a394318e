use std::sync::Arc;
use std::time::Duration;

use crate::auth::CredentialVerifier;
use crate::config::Config;
use crate::db::DbPool;
use crate::ws::{MessageRouter, PresenceRegistry};

/// Per-connection timing knobs, resolved from config once at startup.
#[derive(Debug, Clone, Copy)]
pub struct WsSettings {
    /// How long an unauthenticated socket may wait before sending `authenticate`
    pub auth_timeout: Duration,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
}

impl WsSettings {
    pub fn from_config(config: &Config) -> Self {
        // interval() panics on a zero period
        Self {
            auth_timeout: Duration::from_secs(config.auth_timeout_secs.max(1)),
            ping_interval: Duration::from_secs(config.ping_interval_secs.max(1)),
            pong_timeout: Duration::from_secs(config.pong_timeout_secs.max(1)),
        }
    }
}

impl Default for WsSettings {
    fn default() -> Self {
        Self {
            auth_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection for the message archive
    pub db: DbPool,
    /// Verifies connection and request credentials
    pub verifier: Arc<dyn CredentialVerifier>,
    /// Routes messages between present users; owns the presence registry
    pub router: MessageRouter,
    pub settings: WsSettings,
}

impl AppState {
    /// Wire a fresh registry and router around the given collaborators.
    pub fn new(db: DbPool, verifier: Arc<dyn CredentialVerifier>, settings: WsSettings) -> Self {
        let registry = PresenceRegistry::new();
        Self {
            db,
            verifier,
            router: MessageRouter::new(registry),
            settings,
        }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        self.router.registry()
    }
}
