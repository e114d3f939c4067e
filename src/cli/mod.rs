//! Command line interface for the ingest server.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{config, repository, server};

#[derive(Parser)]
#[command(name = "xray")]
#[command(about = "Decision-reasoning observability for multi-step pipelines")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to auto-discovered xray.config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Start the ingest server
    Serve {
        /// Host to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to bind
        #[arg(long, default_value_t = 8000)]
        port: u16,
        /// Database URL (overrides the config file)
        #[arg(long, env = "XRAY_DATABASE_URL")]
        database_url: Option<String>,
    },
    /// Apply pending database migrations and exit
    Migrate {
        /// Database URL (overrides the config file)
        #[arg(long, env = "XRAY_DATABASE_URL")]
        database_url: Option<String>,
    },
}

/// Parse arguments and dispatch the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            host,
            port,
            database_url,
        } => {
            let mut server_config = config.server;
            if let Some(url) = database_url {
                server_config.database_url = url;
            }
            server::serve(&server_config, &host, port).await
        }
        Commands::Migrate { database_url } => {
            let url = database_url.unwrap_or(config.server.database_url);
            repository::run_migrations(&url).await?;
            tracing::info!("Database ready at {}", url);
            Ok(())
        }
    }
}
