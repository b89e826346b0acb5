mod cache_adapter;

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;
use fronting_domain::{CliOverrides, Config, Masquerade};
use tracing::info;

use cache_adapter::JsonFileCache;

#[derive(Parser)]
#[command(name = "fronting")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Domain-fronted HTTP transport backed by a vetted masquerade pool")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Number of masquerades to vet on startup
    #[arg(long)]
    vet_initially: Option<usize>,

    /// Maximum attempts per request before giving up
    #[arg(long)]
    max_tries: Option<u32>,

    /// Path to the persisted masquerade cache (JSON)
    #[arg(long)]
    cache_path: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// URL to fetch once through the pool as a smoke test
    #[arg(long)]
    demo_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let overrides = CliOverrides {
        vet_initially: cli.vet_initially,
        max_tries: cli.max_tries,
        cache_path: cli.cache_path.clone(),
        log_level: cli.log_level.clone(),
    };

    let config = Config::load(cli.config.as_deref(), overrides)?;
    config.validate()?;

    let log_level = config.logging.level.parse().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true)
        .with_max_level(log_level)
        .with_ansi(true)
        .init();

    info!("starting fronting transport v{}", env!("CARGO_PKG_VERSION"));
    info!(
        vet_initially = config.vet_initially,
        max_tries = config.max_tries,
        "configuration loaded"
    );

    let cache = config
        .cache
        .path
        .as_ref()
        .map(|path| JsonFileCache::new(path.clone()) as std::sync::Arc<dyn fronting_application::MasqueradeCachePort>);

    let candidates = demo_candidates();

    let Some(fronting) = fronting_infrastructure::configure(config, candidates, cache).await else {
        anyhow::bail!("configure produced no masquerades to vet, nothing to run");
    };

    if let Some(demo_url) = cli.demo_url {
        let uri: http::Uri = demo_url.parse()?;
        let host = uri.host().unwrap_or_default().to_string();
        let request = http::Request::builder()
            .method(http::Method::GET)
            .uri(uri)
            .header("Host", host)
            .body(Bytes::new())?;

        match fronting.round_trip(&request).await {
            Ok(response) => info!(status = %response.status(), "demo request completed"),
            Err(e) => tracing::error!(error = %e, "demo request failed"),
        }
    } else {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    Ok(())
}

/// Stand-in candidate source for the demo binary. A real deployment would
/// load these per-provider lists from config or a discovery service; the
/// pool itself is agnostic to where candidates come from.
fn demo_candidates() -> HashMap<String, Vec<Masquerade>> {
    let mut by_provider = HashMap::new();
    by_provider.insert(
        "example-cdn".to_string(),
        vec![Masquerade::new(
            "d111111abcdef8.cloudfront.net",
            IpAddr::V4(Ipv4Addr::new(13, 32, 0, 1)),
        )],
    );
    by_provider
}
