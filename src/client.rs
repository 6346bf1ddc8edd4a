//! Authenticated REST client
//!
//! Sends one request to the OAC instance with a bearer token. A 401 response
//! invalidates the token and the request is sent once more with a new one.

use std::path::Path;

use reqwest::{Client, Method, Response, StatusCode, header};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::format::format_body;
use crate::oauth::{OAuthProvider, TokenManager, TokenSource, TokenStore};
use crate::{Error, Result};

/// REST client for the OAC instance
pub struct RestClient<S = OAuthProvider> {
    /// HTTP client for API requests
    http_client: Client,

    /// Instance base URL
    base_url: Option<String>,

    /// Token lifecycle
    tokens: TokenManager<S>,
}

impl RestClient<OAuthProvider> {
    /// Build a client, token provider and token cache from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        let store = match &config.cache_file {
            Some(path) => TokenStore::new(path),
            None => TokenStore::default_location()?,
        };
        debug!(cache = %store.path().display(), "Using token cache");

        let provider = OAuthProvider::new(http_client.clone(), config.identity.clone());
        Ok(Self::new(
            http_client,
            config.instance_url.clone(),
            TokenManager::new(provider, store),
        ))
    }
}

impl<S: TokenSource> RestClient<S> {
    /// Create a client from its parts
    pub fn new(http_client: Client, base_url: Option<String>, tokens: TokenManager<S>) -> Self {
        Self {
            http_client,
            base_url,
            tokens,
        }
    }

    /// Token manager backing this client
    pub fn tokens(&self) -> &TokenManager<S> {
        &self.tokens
    }

    /// Execute a REST call and return the formatted response body
    ///
    /// `body` is either a path to an existing file, whose contents are sent,
    /// or the payload text itself.
    ///
    /// # Errors
    ///
    /// Fails when no token can be obtained, the request cannot be sent, the
    /// final status is outside 2xx, or a JSON-looking body does not parse.
    pub async fn execute(&mut self, method: Method, path: &str, body: Option<&str>) -> Result<String> {
        let base_url = self
            .base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::MissingConfig(vec!["instance_url"]))?;
        let url = join_url(base_url, path);
        Url::parse(&url).map_err(|e| Error::Config(format!("Invalid request URL {url}: {e}")))?;

        let payload = resolve_body(body).await?;

        let token = self.tokens.get_token().await?;
        let mut response = self.send(&method, &url, &payload, &token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(%method, %url, "Request unauthorized, retrying once with a new token");
            self.tokens.invalidate();
            let token = self.tokens.get_token().await?;
            response = self.send(&method, &url, &payload, &token).await?;
        }

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read response from {url}: {e}")))?;

        if !status.is_success() {
            return Err(Error::Request {
                status: status.as_u16(),
                body: text,
            });
        }

        info!(%method, %url, status = status.as_u16(), "Request succeeded");
        format_body(&text)
    }

    async fn send(&self, method: &Method, url: &str, payload: &[u8], token: &str) -> Result<Response> {
        debug!(%method, %url, bytes = payload.len(), "Sending request");

        self.http_client
            .request(method.clone(), url)
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{method} {url} failed: {e}")))
    }
}

/// Join base URL and path with exactly one `/` between them
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Turn the body argument into the request payload.
///
/// An existing file is read; any other value is sent as-is.
pub async fn resolve_body(body: Option<&str>) -> Result<Vec<u8>> {
    match body {
        None => Ok(Vec::new()),
        Some(arg) if Path::new(arg).is_file() => {
            debug!(file = %arg, "Reading request body from file");
            Ok(tokio::fs::read(arg).await?)
        }
        Some(arg) => Ok(arg.as_bytes().to_vec()),
    }
}
