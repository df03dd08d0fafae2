use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use issue_tracker::config::ServerConfig;
use issue_tracker::{server, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(config.log.into()))
        .with_target(false)
        .init();

    let backend = config.backend()?;
    let listener = TcpListener::bind(&config.addr).await?;

    server::run(listener, backend, signal::ctrl_c()).await;

    Ok(())
}
