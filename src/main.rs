//! tcp-protocols: small independent TCP protocol servers
//!
//! Each service listens on its own port:
//! - Echo: bytes written back unchanged
//! - Prime: newline-delimited JSON primality checks
//! - Means: binary price inserts and range-average queries
//!
//! Features:
//! - One task per connection, no state shared between connections
//! - Concurrent connection cap
//! - Configuration via CLI arguments or TOML file

mod config;
mod protocols;
mod server;

use config::Config;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        echo = %config.echo,
        prime = %config.prime,
        means = %config.means,
        max_connections = config.max_connections,
        "Starting tcp-protocols server"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let server = Server::bind(&config)?;
        server.run().await
    })?;

    info!("Server stopped");
    Ok(())
}
