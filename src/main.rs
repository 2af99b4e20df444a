use std::time::Duration;

use anyhow::Context;
use chrono_tz::Tz;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use options_chain::api::{self, state::AppState};
use options_chain::chain::{ChainService, table::StrikeScale};
use options_chain::cli::{Cli, Command};
use options_chain::upstream::UpstreamClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            host,
            port,
            upstream,
            cache_ttl_ms,
            upstream_timeout_secs,
            max_pages,
            tz,
            partial_policy,
        } => {
            let tz: Tz = tz
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown timezone `{tz}`"))?;

            let client = UpstreamClient::new(
                &upstream,
                Duration::from_millis(cache_ttl_ms),
                Duration::from_secs(upstream_timeout_secs),
                max_pages,
            )
            .context("building upstream client")?;

            let service = ChainService::new(client, partial_policy, StrikeScale::default());
            api::serve(&host, port, AppState::new(service, tz)).await
        }
    }
}
