//! OAC Client Library
//!
//! REST client for Oracle Analytics Cloud authenticated through an OAuth2
//! identity provider.
//!
//! # Features
//!
//! - **Grants**: client credentials and resource owner password
//! - **Token cache**: tokens persist across invocations until one minute before expiry
//! - **Single retry**: a 401 triggers one re-authentication and one resend
//! - **Readable output**: JSON responses are pretty-printed

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod oauth;

pub use client::RestClient;
pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging on stderr
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        _ => subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    installed.map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))
}
