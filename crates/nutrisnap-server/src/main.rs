//! `nutrisnapd` - Mock nutrisnap backend
//!
//! Serves the account and sync routes from memory until interrupted.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use nutrisnap::logging::{init_logging_for, Verbosity};
use tokio::net::TcpListener;
use tracing::info;

/// Command-line arguments for `nutrisnapd`.
#[derive(Debug, Parser)]
#[command(name = "nutrisnapd", version, about = "Mock nutrisnap backend")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "NUTRISNAPD_BIND", default_value = "127.0.0.1:8787")]
    bind: SocketAddr,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging_for(
        &["nutrisnap_server", "nutrisnapd"],
        Verbosity::from_flags(args.quiet, args.verbose),
    );

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;

    tokio::select! {
        result = nutrisnap_server::serve(listener) => result.context("serving")?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }
    Ok(())
}
