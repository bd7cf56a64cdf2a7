use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use http_framer::{serve, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::from_args().context("parse arguments")?;
    let addr = cfg.listen_addr();

    info!(%addr, "starting server");
    let listener = TcpListener::bind(addr).await.context("bind TCP listener")?;

    serve(listener, cfg).await
}
