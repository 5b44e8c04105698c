//! Portico extension host process.
//!
//! Spawned by the supervisor with the bridge on stdin/stdout; everything
//! diagnostic goes to stderr so the wire stays clean.

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the bridge protocol; logs must go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    tracing::debug!(version = portico::VERSION, "host starting");
    portico::host::run(tokio::io::stdin(), tokio::io::stdout()).await
}
