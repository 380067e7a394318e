use std::path::Path;

use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ws::UserId;

/// WebSocket close code sent when the presented token has expired.
pub const CLOSE_TOKEN_EXPIRED: u16 = 4001;
/// WebSocket close code sent for missing or malformed tokens and bad signatures.
pub const CLOSE_TOKEN_INVALID: u16 = 4002;

/// Claims carried by access tokens issued by the account service.
/// `id` is the user identity; `exp` is mandatory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
}

/// Why a credential was refused. Every variant means "refuse the connection";
/// the kind only selects the close code reported to the peer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no credential presented")]
    Missing,
    #[error("credential expired")]
    Expired,
    #[error("credential invalid")]
    Invalid,
}

impl AuthError {
    pub fn close_code(&self) -> u16 {
        match self {
            AuthError::Expired => CLOSE_TOKEN_EXPIRED,
            AuthError::Missing | AuthError::Invalid => CLOSE_TOKEN_INVALID,
        }
    }

    pub fn close_reason(&self) -> &'static str {
        match self {
            AuthError::Missing => "Token missing",
            AuthError::Expired => "Token expired",
            AuthError::Invalid => "Token invalid",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::Invalid,
        }
    }
}

/// Turns a raw connection credential into a trusted user identity.
///
/// Implementations must be free of side effects and hold no mutable state:
/// the same verifier is shared by every connection task.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, credential: &str) -> Result<UserId, AuthError>;
}

/// HS256 JWT verifier keyed with the shared signing secret.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(jsonwebtoken::Algorithm::HS256),
        }
    }
}

impl CredentialVerifier for JwtVerifier {
    fn verify(&self, credential: &str) -> Result<UserId, AuthError> {
        let token = credential.trim();
        if token.is_empty() {
            return Err(AuthError::Missing);
        }

        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        if data.claims.id.is_empty() {
            return Err(AuthError::Invalid);
        }
        Ok(data.claims.id)
    }
}

/// Resolve the signing secret: an explicitly configured secret wins,
/// otherwise a 256-bit key is loaded from (or generated into) data_dir/jwt_secret.
pub fn load_or_generate_jwt_secret(
    configured: Option<&str>,
    data_dir: &str,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if let Some(secret) = configured.filter(|s| !s.is_empty()) {
        tracing::info!("Using configured JWT secret");
        return Ok(secret.as_bytes().to_vec());
    }

    std::fs::create_dir_all(data_dir)?;
    let key_path = Path::new(data_dir).join("jwt_secret");

    if key_path.exists() {
        let key = std::fs::read(&key_path)?;
        if key.len() == 32 {
            tracing::info!("JWT signing key loaded from {}", key_path.display());
            return Ok(key);
        }
        tracing::warn!("JWT key file has wrong size ({}), regenerating", key.len());
    }

    let key: [u8; 32] = rand::rng().random();
    std::fs::write(&key_path, key)?;
    tracing::info!("JWT signing key generated at {}", key_path.display());
    Ok(key.to_vec())
}
