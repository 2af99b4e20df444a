use clap::{Parser, Subcommand};

use crate::chain::PartialPolicy;

/// Options-chain aggregation service — proxies a local quote-provider
/// terminal and serves merged per-strike chain tables.
#[derive(Parser)]
#[command(name = "options-chain", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the options-chain HTTP API
    Serve {
        #[arg(long, env = "HOST", default_value = "127.0.0.1")]
        host: String,

        #[arg(long, env = "PORT", default_value_t = 3001)]
        port: u16,

        /// Base URL of the upstream quote provider's REST API
        #[arg(
            long,
            env = "THETA_BASE_URL",
            default_value = "http://127.0.0.1:25510/v3"
        )]
        upstream: String,

        /// Upstream response cache TTL, milliseconds
        #[arg(long, env = "CACHE_TTL_MS", default_value_t = 15_000)]
        cache_ttl_ms: u64,

        /// Per-request timeout against the upstream, seconds
        #[arg(long, default_value_t = 30)]
        upstream_timeout_secs: u64,

        /// Hard cap on pages followed in one pagination walk
        #[arg(long, default_value_t = 64)]
        max_pages: usize,

        /// Timezone for the expiration "today or later" cutoff
        #[arg(long, env = "TZ", default_value = "America/New_York")]
        tz: String,

        /// What to do when an auxiliary snapshot source fails
        #[arg(long, value_enum, default_value = "fail-fast")]
        partial_policy: PartialPolicy,
    },
}
