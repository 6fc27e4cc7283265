//! rollcache CLI - incremental bundling front end

use anyhow::Result;
use clap::{Parser, Subcommand};
use rollcache_cli::cmd;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// rollcache - Incremental bundling with a persistent cache directory
#[derive(Parser)]
#[command(name = "rollcache")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an input directory into an output directory
    Build {
        /// Node configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Source directory handed to the bundler
        #[arg(short, long)]
        input: PathBuf,

        /// Directory the generated files are written to
        #[arg(short, long)]
        output: PathBuf,

        /// Cache directory (default: <output>/../.rollcache-cache/<name>)
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Keep rebuilding whenever the input changes
        #[arg(short, long)]
        watch: bool,

        /// Polling interval in watch mode
        #[arg(long, default_value = "500")]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs on stderr, change report on stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            config,
            input,
            output,
            cache_dir,
            watch,
            interval_ms,
        } => {
            cmd::build::run(cmd::build::BuildArgs {
                config,
                input,
                output,
                cache_dir,
                watch,
                interval_ms,
            })
            .await
        }
    }
}
