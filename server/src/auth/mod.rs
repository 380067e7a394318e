pub mod jwt;
pub mod middleware;

pub use jwt::{AuthError, CredentialVerifier, JwtVerifier};
