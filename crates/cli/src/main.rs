// ABOUTME: CLI for looking up link preview metadata with urlist-preview.
// ABOUTME: `lookup` prints JSON for one or more URLs; `serve` runs the HTTP metadata endpoint.

mod lookup;
mod server;

use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use urlist_preview::MetadataService;

use crate::lookup::LookupArgs;
use crate::server::ServeArgs;

const DEFAULT_LOG_FILTER: &str = "urlist=info,urlist_preview=info,tower_http=info";

/// Fetch title, description and image for links.
#[derive(Parser, Debug)]
#[command(name = "urlist")]
#[command(about = "Fetch link preview metadata and print JSON", long_about = None)]
struct Cli {
    #[command(flatten)]
    fetch: FetchArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up metadata for one or more URLs
    Lookup(LookupArgs),
    /// Serve GET /api/metadata?url=<url>
    Serve(ServeArgs),
}

/// Fetch budget shared by both subcommands.
#[derive(Args, Debug, Clone)]
struct FetchArgs {
    /// Per-attempt timeout in milliseconds
    #[arg(long, global = true, env = "URLIST_TIMEOUT_MS", default_value_t = 10_000)]
    timeout_ms: u64,

    /// Retries after the first attempt
    #[arg(long, global = true, env = "URLIST_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Redirect hops to follow before giving up
    #[arg(long, global = true, env = "URLIST_MAX_REDIRECTS", default_value_t = 10)]
    max_redirects: usize,

    /// Allow fetching from private/local networks
    #[arg(long, global = true, env = "URLIST_ALLOW_PRIVATE_NETWORKS")]
    allow_private_networks: bool,
}

impl FetchArgs {
    fn service(&self) -> Result<MetadataService> {
        let service = MetadataService::builder()
            .timeout(Duration::from_millis(self.timeout_ms))
            .max_retries(self.max_retries)
            .max_redirects(self.max_redirects)
            .allow_private_networks(self.allow_private_networks)
            .build()?;
        Ok(service)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // stdout carries JSON output only
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let service = cli.fetch.service()?;

    match cli.command {
        Command::Lookup(args) => lookup::run(&service, &args).await,
        Command::Serve(args) => server::run(service, &args).await,
    }
}
