//! Token provider
//!
//! Exchanges client (and optionally user) credentials for an access token at
//! the identity provider's token endpoint.

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info};

use super::storage::{TokenRecord, unix_now};
use crate::config::{ClientAuth, IdentityConfig};
use crate::{Error, Result};

/// Seconds subtracted from the advertised lifetime
pub const EXPIRY_MARGIN_SECS: u64 = 60;

/// Lifetime assumed when the token response carries no `expires_in`
pub const DEFAULT_LIFETIME_SECS: u64 = 3600;

/// Something that can mint a fresh access token
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Obtain a new token record
    async fn obtain(&self) -> Result<TokenRecord>;
}

/// OAuth2 grant used for the token exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// App-only client credentials grant
    ClientCredentials,
    /// Resource owner password credentials grant
    ResourceOwnerPassword {
        /// Resource owner
        username: String,
        /// Resource owner's password
        password: String,
    },
}

impl Grant {
    /// Configuration name of the grant
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClientCredentials => "client_credentials",
            Self::ResourceOwnerPassword { .. } => "resource_owner",
        }
    }
}

/// Identity settings checked for completeness
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Token endpoint URL
    pub token_url: String,
    /// OAuth2 client identifier
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: String,
    /// Requested scope
    pub scope: String,
    /// Grant to perform
    pub grant: Grant,
    /// Client authentication method
    pub client_auth: ClientAuth,
}

impl Credentials {
    /// Check the identity settings and select the grant.
    ///
    /// Every missing common setting is reported at once. Username and
    /// password are only required by the `resource_owner` grant.
    pub fn resolve(identity: &IdentityConfig) -> Result<Self> {
        let mut missing = Vec::new();
        let token_url = required(identity.token_url.as_ref(), "token_url", &mut missing);
        let client_id = required(identity.client_id.as_ref(), "client_id", &mut missing);
        let client_secret = required(identity.client_secret.as_ref(), "client_secret", &mut missing);
        let scope = required(identity.scope.as_ref(), "scope", &mut missing);
        let grant_type = required(identity.grant_type.as_ref(), "grant_type", &mut missing);

        if !missing.is_empty() {
            return Err(Error::MissingConfig(missing));
        }

        let grant = match grant_type.as_str() {
            "client_credentials" => Grant::ClientCredentials,
            "resource_owner" => {
                let username = required(identity.username.as_ref(), "username", &mut missing);
                let password = required(identity.password.as_ref(), "password", &mut missing);
                if !missing.is_empty() {
                    return Err(Error::MissingConfig(missing));
                }
                Grant::ResourceOwnerPassword { username, password }
            }
            other => return Err(Error::UnsupportedGrant(other.to_string())),
        };

        Ok(Self {
            token_url,
            client_id,
            client_secret,
            scope,
            grant,
            client_auth: identity.client_auth,
        })
    }
}

fn required(
    value: Option<&String>,
    name: &'static str,
    missing: &mut Vec<&'static str>,
) -> String {
    match value {
        Some(v) if !v.is_empty() => v.clone(),
        _ => {
            missing.push(name);
            String::new()
        }
    }
}

/// OAuth token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    token_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    expires_in: Option<u64>,
}

/// Accept `expires_in` as a number or a numeric string.
///
/// Zero, negative, fractional or unparseable values read as absent.
fn lenient_seconds<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(secs.filter(|s| *s > 0))
}

/// Compute the recorded expiry for a token issued at `now`
pub fn expires_at(now: u64, expires_in: Option<u64>) -> u64 {
    let lifetime = expires_in
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_LIFETIME_SECS);
    now.saturating_add(lifetime.saturating_sub(EXPIRY_MARGIN_SECS))
}

/// Token provider talking to an OAuth2 token endpoint
pub struct OAuthProvider {
    /// HTTP client for token requests
    http_client: Client,

    /// Identity settings, validated on each exchange
    identity: IdentityConfig,
}

impl OAuthProvider {
    /// Create a provider for the given identity settings
    #[must_use]
    pub fn new(http_client: Client, identity: IdentityConfig) -> Self {
        Self {
            http_client,
            identity,
        }
    }

    async fn exchange(&self, credentials: &Credentials) -> Result<TokenRecord> {
        let mut params: Vec<(&str, &str)> = match &credentials.grant {
            Grant::ClientCredentials => vec![("grant_type", "client_credentials")],
            Grant::ResourceOwnerPassword { username, password } => vec![
                ("grant_type", "password"),
                ("username", username.as_str()),
                ("password", password.as_str()),
            ],
        };
        params.push(("scope", credentials.scope.as_str()));

        let mut request = self
            .http_client
            .post(&credentials.token_url)
            .header(header::ACCEPT, "application/json");

        match credentials.client_auth {
            ClientAuth::Basic => {
                request = request.basic_auth(&credentials.client_id, Some(&credentials.client_secret));
            }
            ClientAuth::Post => {
                params.push(("client_id", credentials.client_id.as_str()));
                params.push(("client_secret", credentials.client_secret.as_str()));
            }
        }

        debug!(url = %credentials.token_url, grant = credentials.grant.name(), "Requesting access token");

        let issued_at = unix_now();
        let response = request
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::TokenExchange(format!("Token request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::TokenExchange(format!("Failed to read token response: {e}")))?;

        if !status.is_success() {
            return Err(Error::TokenExchange(format!("HTTP {status} - {body}")));
        }

        let token_response: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::TokenExchange(format!("Failed to parse token response: {e}")))?;

        if token_response.access_token.is_empty() {
            return Err(Error::TokenExchange(
                "Server response missing access_token".to_string(),
            ));
        }

        if let Some(secs) = token_response
            .expires_in
            .filter(|secs| *secs <= EXPIRY_MARGIN_SECS)
        {
            return Err(Error::TokenExchange(format!(
                "token lifetime of {secs}s is shorter than the {EXPIRY_MARGIN_SECS}s safety margin"
            )));
        }

        if let Some(kind) = token_response
            .token_type
            .as_deref()
            .filter(|t| !t.eq_ignore_ascii_case("bearer"))
        {
            debug!(token_type = %kind, "Token endpoint returned a non-bearer token type");
        }

        let record = TokenRecord::new(
            token_response.access_token,
            expires_at(issued_at, token_response.expires_in),
        );

        info!(
            grant = credentials.grant.name(),
            expires_in = record.remaining_secs(),
            "Obtained access token"
        );
        Ok(record)
    }
}

#[async_trait]
impl TokenSource for OAuthProvider {
    async fn obtain(&self) -> Result<TokenRecord> {
        let credentials = Credentials::resolve(&self.identity)?;
        self.exchange(&credentials).await
    }
}
