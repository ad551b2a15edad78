//! # Fieldlink Node Runtime
//!
//! Runs one node of a multi-hop device-management network. Whether the
//! node acts as management system, relay or device is decided by its
//! configuration.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`FL_LOG`, falling back to `RUST_LOG`)
//! 2. Load configuration (from file/env)
//! 3. Assemble the adapter and start the WebSocket endpoint
//! 4. Run until Ctrl+C, then shut down

use anyhow::Result;
use node_runtime::{load_config, NodeRuntime};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_env("FL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration
    let config = load_config()?;

    let runtime = NodeRuntime::new(config)?;
    runtime.start().await?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;

    Ok(())
}
