//! deckhand: inspect and rehearse deployment plans.
//!
//! # Usage
//!
//! ```text
//! deckhand validate deckhand.toml --format json
//! deckhand simulate deckhand.toml --fail hello-0-server
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "deckhand",
    about = "Deckhand: deployment plans for long-running services",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the deployment plan for a service file and print it
    Validate {
        /// Path to deckhand.toml
        path: PathBuf,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Deploy a service against a simulated cluster and report the outcome.
    ///
    /// Every launched task reports success unless named with --fail, in
    /// which case its first launch fails and the step is redeployed.
    Simulate {
        /// Path to deckhand.toml
        path: PathBuf,
        /// Full task name (e.g. hello-0-server) whose first launch fails.
        #[arg(long)]
        fail: Vec<String>,
        /// Give up after this many seconds.
        #[arg(long, default_value = "30")]
        timeout_secs: u64,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,deckhand=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path, format } => commands::validate::validate(&path, &format),
        Commands::Simulate {
            path,
            fail,
            timeout_secs,
            format,
        } => commands::simulate::simulate(&path, &fail, timeout_secs, &format).await,
    }
}
