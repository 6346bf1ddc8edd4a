//! Configuration management

use std::{path::Path, path::PathBuf, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Variables understood for compatibility with existing `.env` files, and
/// the configuration key each one sets.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("IDCS_TOKEN_URL", "identity.token_url"),
    ("IDCS_OAC_CLIENT_ID", "identity.client_id"),
    ("IDCS_OAC_CLIENT_SECRET", "identity.client_secret"),
    ("IDCS_OAC_SCOPE", "identity.scope"),
    ("IDCS_GRANT_TYPE", "identity.grant_type"),
    ("OAC_USERNAME", "identity.username"),
    ("OAC_PASSWORD", "identity.password"),
    ("OAC_INSTANCE", "instance_url"),
];

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before reading variables.
    /// Paths support ~ expansion. Variables already set are not overridden.
    pub env_files: Vec<String>,
    /// Identity provider settings
    pub identity: IdentityConfig,
    /// Base URL of the OAC instance
    pub instance_url: Option<String>,
    /// Token cache file (defaults to the per-user cache directory)
    pub cache_file: Option<PathBuf>,
    /// Timeout applied to every HTTP call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env_files: Vec::new(),
            identity: IdentityConfig::default(),
            instance_url: None,
            cache_file: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// OAuth2 identity provider settings.
///
/// Values are kept as supplied; the token provider decides which are required
/// for the selected grant type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Token endpoint URL
    pub token_url: Option<String>,
    /// OAuth2 client identifier
    pub client_id: Option<String>,
    /// OAuth2 client secret
    pub client_secret: Option<String>,
    /// Requested scope
    pub scope: Option<String>,
    /// `client_credentials` or `resource_owner`
    pub grant_type: Option<String>,
    /// Username for the password grant
    pub username: Option<String>,
    /// Password for the password grant
    pub password: Option<String>,
    /// How client credentials are presented to the token endpoint
    pub client_auth: ClientAuth,
}

/// Client authentication method at the token endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientAuth {
    /// HTTP Basic `Authorization` header
    #[default]
    Basic,
    /// `client_id` and `client_secret` form fields
    Post,
}

impl Config {
    /// Load configuration from an optional YAML file and the environment
    ///
    /// Precedence, lowest first: defaults, YAML file, `OAC_CLIENT_*`
    /// variables, then the legacy `IDCS_*`/`OAC_*` variables. `.env` is not
    /// read here; call [`load_dotenv`] first.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>, extra_env_files: &[String]) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Env files must be in the process environment before it is read
        let listed: Vec<String> = figment.extract_inner("env_files").unwrap_or_default();
        load_env_files(listed.iter().chain(extra_env_files));

        figment = figment.merge(Env::prefixed("OAC_CLIENT_").split("__"));
        figment = merge_legacy_env(figment, |name| std::env::var(name).ok());

        Self::from_figment(&figment)
    }

    /// Extract configuration from an assembled figment
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        if let Some(url) = config.identity.token_url.as_mut() {
            let trimmed = url.trim_end_matches('/').len();
            url.truncate(trimmed);
        }

        Ok(config)
    }
}

/// Merge the legacy variables over `figment`, reading each through `lookup`.
/// Empty values are treated as unset.
fn merge_legacy_env<F>(mut figment: Figment, lookup: F) -> Figment
where
    F: Fn(&str) -> Option<String>,
{
    for &(var, key) in LEGACY_ENV {
        if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
            figment = figment.merge(Serialized::default(key, value));
        }
    }
    figment
}

/// Outcome of loading `.env`, kept until logging is set up
pub type DotenvStatus = std::result::Result<PathBuf, dotenvy::Error>;

/// Load `.env` from the working directory into the process environment.
///
/// Runs before the command line is parsed so `.env` can also supply the
/// `OAC_CLIENT_*` fallbacks of global options. Existing variables win.
pub fn load_dotenv() -> DotenvStatus {
    dotenvy::dotenv()
}

/// Log the outcome of [`load_dotenv`]
pub fn log_dotenv(status: &DotenvStatus) {
    match status {
        Ok(path) => tracing::debug!("Loaded env file: {}", path.display()),
        Err(e) if e.not_found() => {
            tracing::warn!("No .env file found in the current directory");
        }
        Err(e) => tracing::warn!("Failed to load .env: {e}"),
    }
}

/// Load environment files into the process environment.
/// Supports ~ expansion. Files that don't exist are skipped.
fn load_env_files<'a>(paths: impl IntoIterator<Item = &'a String>) {
    for path_str in paths {
        let expanded = match (path_str.strip_prefix('~'), dirs::home_dir()) {
            (Some(rest), Some(home)) => format!("{}{rest}", home.display()),
            _ => path_str.clone(),
        };

        let path = Path::new(&expanded);
        if path.exists() {
            match dotenvy::from_path(path) {
                Ok(()) => tracing::debug!("Loaded env file: {expanded}"),
                Err(e) => tracing::warn!("Failed to load env file {expanded}: {e}"),
            }
        } else {
            tracing::debug!("Env file not found (skipped): {expanded}");
        }
    }
}

/// Parse a human-readable duration (`"30s"`, `"5m"`, `"100ms"`, bare seconds)
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    let parsed = if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().map(Duration::from_secs)
    };
    parsed.map_err(|e| format!("invalid duration {s:?}: {e}"))
}

/// Serde adapter for human-readable durations
pub mod humantime_serde {
    use std::fmt;
    use std::time::Duration;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    /// Serialize Duration to a string such as `"30s"`
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    /// Deserialize a duration string, or a bare number of seconds
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the value is not a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(DurationVisitor)
    }

    struct DurationVisitor;

    impl Visitor<'_> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a duration such as \"30s\" or a number of seconds")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
            super::parse_duration(v).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
            u64::try_from(v)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("duration must not be negative"))
        }
    }
}
