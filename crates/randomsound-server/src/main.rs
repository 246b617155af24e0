mod http;
mod index;
mod plays;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use randomsound_proto::config::Config;

use crate::index::LibraryIndex;
use crate::plays::LivePlays;

/// Serves random picks from a music library, and their audio.
#[derive(Debug, Parser)]
#[command(name = "randomsound-server", version, about)]
struct Args {
    /// Config file (default: ~/.config/randomsound/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory to index, overriding `server.library_dir`.
    #[arg(long)]
    library: Option<PathBuf>,

    #[arg(long)]
    bind: Option<String>,

    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,randomsound_server=debug")
            }),
        )
        .init();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let mut server = config.server;
    if let Some(dir) = args.library {
        server.library_dir = dir;
    }
    if let Some(bind) = args.bind {
        server.bind_address = bind;
    }
    if let Some(port) = args.port {
        server.port = port;
    }

    let index = LibraryIndex::build(&server).await?;
    info!(
        "Library indexed at {}: {} files",
        index.built_at.format("%Y-%m-%d %H:%M:%S"),
        index.len()
    );
    let plays = LivePlays::new(server.max_live_plays);

    let app = http::router(Arc::new(index), Arc::new(plays));
    let addr = format!("{}:{}", server.bind_address, server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    http::serve(listener, app).await
}
