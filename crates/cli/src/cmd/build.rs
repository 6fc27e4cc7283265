//! Run one build, or keep rebuilding in watch mode

use crate::{config, report};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use rollcache_node::{BuildNode, Bundler, ProcessBundler};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

pub struct BuildArgs {
    pub config: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    pub cache_dir: Option<PathBuf>,
    pub watch: bool,
    pub interval_ms: u64,
}

pub async fn run(args: BuildArgs) -> Result<()> {
    // 1. Load configuration
    let config_path = config::absolutize(&args.config)?;
    let options = config::load(&config_path)?;
    let process = options
        .bundler
        .as_ref()
        .context("Config has no [bundler] command")?;

    // 2. The bundler runs from the config file's directory
    let mut bundler = ProcessBundler::new(process)?;
    if let Some(dir) = config_path.parent() {
        bundler = bundler.with_working_dir(dir);
    }

    // 3. Create the node
    let input = config::absolutize(&args.input)?;
    let output = config::absolutize(&args.output)?;
    let cache_dir = match args.cache_dir {
        Some(dir) => config::absolutize(&dir)?,
        None => config::default_cache_dir(&output, options.label()),
    };
    let mut node = BuildNode::new(&input, &output, &cache_dir, options, bundler)
        .context("Failed to create build node")?;

    if !args.watch {
        let outcome = node.run_cycle().await?;
        report::print(&outcome);
        return Ok(());
    }

    // 4. Watch until interrupted
    info!(input = %input.display(), interval_ms = args.interval_ms, "watching");
    watch(&mut node, Duration::from_millis(args.interval_ms), tokio::signal::ctrl_c()).await;
    Ok(())
}

/// Run one cycle per tick until `shutdown` resolves
///
/// Failures are reported and retried on the next tick. A shutdown that
/// arrives mid-cycle stops the loop once that cycle finishes.
pub async fn watch<B, F>(node: &mut BuildNode<B>, interval: Duration, shutdown: F)
where
    B: Bundler,
    F: Future,
{
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("interrupted, stopping");
                break;
            }
            _ = ticker.tick() => match node.run_cycle().await {
                Ok(outcome) => {
                    if !outcome.changes().is_empty() {
                        report::print(&outcome);
                    }
                }
                Err(err) => {
                    error!(error = %err, "build failed");
                    eprintln!("{} {}", "error:".red().bold(), err);
                }
            },
        }
    }
}
