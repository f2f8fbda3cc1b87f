//! The operator CLI.
//!
//! Initializes a data directory, starts a single in-process replica against
//! the in-memory reference `LocalStorage`/`CoordinationClient` doubles (no
//! networked ensemble or remote storage adapter exists in this workspace —
//! those are out-of-scope external collaborators per `spec.md` §3), and
//! inspects the effective configuration.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dogma")]
#[command(author, version, about = "The dogma replicated configuration repository", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Initialize a new data directory with a default dogma.toml.
    Init {
        /// Path to the data directory to create.
        path: String,
    },

    /// Start a single in-process replica against this data directory.
    Start {
        /// Path to the data directory.
        path: String,

        /// This replica's numeric identity, unique within the cluster.
        #[arg(long, default_value = "1")]
        replica_id: u64,
    },

    /// Print the effective configuration for this data directory.
    Config {
        /// Path to the data directory.
        path: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Init { path } => commands::init::run(&path),
        Commands::Start { path, replica_id } => commands::start::run(&path, replica_id),
        Commands::Config { path } => commands::config::run(&path),
    }
}
