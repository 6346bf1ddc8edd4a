//! OAuth 2.0 token lifecycle
//!
//! Obtains access tokens from an identity provider and keeps them usable
//! across requests and process invocations.
//!
//! - Client credentials and resource owner password grants
//! - On-disk token cache with owner-only permissions
//! - Expiry tracking with a one-minute safety margin

mod manager;
mod provider;
mod storage;

pub use manager::TokenManager;
pub use provider::{
    Credentials, DEFAULT_LIFETIME_SECS, EXPIRY_MARGIN_SECS, Grant, OAuthProvider, TokenSource,
    expires_at,
};
pub use storage::{TokenRecord, TokenStore};
