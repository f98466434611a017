//! Chat Daemon - line-oriented multi-client chat server
//!
//! Clients connect over TCP, negotiate a unique screen name, and then chat:
//! plain lines are broadcast, `PM <name> <text>` is delivered privately,
//! `GET_USERS` lists who is connected and `GOODBYE` leaves.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address (0.0.0.0:9001)
//! chatd
//!
//! # Load settings from a file, then override the listen address
//! chatd --config chatd.toml --bind 127.0.0.1:7000
//!
//! # Same override through the environment
//! CHAT_BIND=127.0.0.1:7000 chatd
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chatd::config::ServerConfig;
use chatd::registry::spawn_registry;
use chatd::server::ChatServer;

/// simplechat server
#[derive(Parser, Debug)]
#[command(name = "chatd", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration file
    #[arg(short, long, value_name = "ADDR", env = "CHAT_BIND")]
    bind: Option<String>,
}

impl Args {
    /// Resolves configuration: defaults, then file, then env/flag override.
    fn server_config(&self) -> Result<ServerConfig> {
        let mut config = ServerConfig::load(self.config.as_deref())
            .context("Failed to load configuration")?;
        if let Some(bind) = &self.bind {
            config = config.with_bind(bind).context("Failed to apply --bind")?;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.server_config()?;
    run_server(config)
}

#[tokio::main]
async fn run_server(config: ServerConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("chatd=info".parse()?)
                .add_directive("chat_core=info".parse()?)
                .add_directive("chat_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Chat daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let registry = spawn_registry();
    info!("Name registry started");

    let server = match ChatServer::bind(&config, registry, cancel_token).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Server error");
            return Err(e.into());
        }
    };

    info!(
        addr = %server.local_addr(),
        overflow = ?config.overflow,
        outbound_capacity = config.outbound_capacity,
        "Starting server"
    );
    server.run().await;

    info!("Chat daemon stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
