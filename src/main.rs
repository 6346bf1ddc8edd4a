//! OAC Client - REST calls against Oracle Analytics Cloud
//!
//! Authenticates through the configured identity provider, caching the
//! access token between runs.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use oac_client::{RestClient, cli::Cli, config, config::Config, setup_tracing};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // .env may carry OAC_CLIENT_* fallbacks for the options parsed below
    let dotenv = config::load_dotenv();
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }
    config::log_dotenv(&dotenv);

    match run(&cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<String> {
    let method = cli.http_method()?;
    let body = cli.request_body(&method)?;

    let mut config =
        Config::load(cli.config.as_deref(), &cli.env_files).context("failed to load configuration")?;
    if let Some(timeout) = cli.timeout {
        config.timeout = timeout;
    }
    if let Some(path) = &cli.cache_file {
        config.cache_file = Some(path.clone());
    }

    debug!(%method, path = %cli.path, "Executing REST call");

    let mut client = RestClient::from_config(&config).context("failed to create OAC client")?;
    client
        .execute(method, &cli.path, body)
        .await
        .context("error executing REST call")
}
