//! Command-line interface

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use reqwest::Method;

use crate::config::parse_duration;
use crate::{Error, Result};

const EXAMPLES: &str = "\
Examples:
  # GET a report
  oac-client GET /reports/123

  # POST a new report with JSON payload
  oac-client POST /reports payload.json

  # Update an existing report
  oac-client PUT /reports/123 update.json

Notes:
  - The body argument is mandatory for POST and PUT requests.
  - A body that is not an existing file is sent as inline text.";

/// OAC REST API client utility
#[derive(Parser, Debug)]
#[command(name = "oac-client")]
#[command(version, about, long_about = None, after_help = EXAMPLES)]
pub struct Cli {
    /// HTTP method (GET, POST, PUT, DELETE, ...)
    pub method: String,

    /// API path, relative to the instance URL
    pub path: String,

    /// Request body: path to a JSON file, or inline JSON text
    pub body: Option<String>,

    /// Path to configuration file (YAML)
    #[arg(short, long, env = "OAC_CLIENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Extra env file to load (repeatable or comma-separated)
    #[arg(long = "env-file", env = "OAC_CLIENT_ENV_FILE", value_delimiter = ',')]
    pub env_files: Vec<String>,

    /// Token cache file
    #[arg(long, env = "OAC_CLIENT_CACHE_FILE")]
    pub cache_file: Option<PathBuf>,

    /// HTTP timeout (e.g. 30s, 2m)
    #[arg(long, env = "OAC_CLIENT_TIMEOUT", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "OAC_CLIENT_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "OAC_CLIENT_LOG_FORMAT")]
    pub log_format: Option<String>,
}

impl Cli {
    /// Parsed, upper-cased HTTP method
    pub fn http_method(&self) -> Result<Method> {
        Method::from_bytes(self.method.to_uppercase().as_bytes())
            .map_err(|_| Error::Config(format!("Invalid HTTP method: {}", self.method)))
    }

    /// Body argument, rejecting POST and PUT without one
    pub fn request_body(&self, method: &Method) -> Result<Option<&str>> {
        match self.body.as_deref() {
            None if requires_body(method) => {
                Err(Error::Config(format!("{method} requires a body file")))
            }
            body => Ok(body),
        }
    }
}

/// Whether the method must carry a body
pub fn requires_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT
}
