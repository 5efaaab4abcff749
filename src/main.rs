use clap::Parser;
use httpprobe::{AppState, Config};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// HTTP request inspection and response synthesis service.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration file.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "httpprobe=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_address = bind;
        config.validate()?;
    }

    tracing::info!(
        bind_address = %config.bind_address,
        compression_level = config.compression_level,
        max_byte_count = config.max_byte_count,
        "Configuration loaded"
    );

    let bind_address = config.bind_address.clone();
    let state = AppState::new(config)?;
    let listener = TcpListener::bind(&bind_address).await?;
    httpprobe::run(listener, state).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
