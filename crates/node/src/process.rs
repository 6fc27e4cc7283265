//! Bundler backed by an external process
//!
//! The request is written to the child's stdin as JSON and a
//! [`BundleResult`] is read back from its stdout. Anything the child prints
//! to stderr before exiting non-zero becomes the error message.

use crate::bundler::{BundleRequest, BundleResult, Bundler};
use crate::error::ConfigError;
use crate::options::ProcessConfig;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ProcessBundler {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl ProcessBundler {
    pub fn new(config: &ProcessConfig) -> Result<Self, ConfigError> {
        let (program, args) = config.command.split_first().ok_or(ConfigError::EmptyCommand)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            working_dir: None,
        })
    }

    /// Run the command from `dir` instead of the current directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl Bundler for ProcessBundler {
    type State = serde_json::Value;

    async fn bundle(
        &self,
        request: BundleRequest<'_, serde_json::Value>,
    ) -> anyhow::Result<BundleResult<serde_json::Value>> {
        let payload = serde_json::to_vec(&request).context("failed to encode bundle request")?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn bundler `{}`", self.program))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("bundler stdin was not captured"))?;

        // Feed stdin while draining stdout so a chatty child cannot block on
        // a full pipe.
        let feed = async move {
            let written = stdin.write_all(&payload).await;
            drop(stdin);
            match written {
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };
        let (_, output) = tokio::try_join!(feed, child.wait_with_output())
            .with_context(|| format!("failed to run bundler `{}`", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if stderr.is_empty() {
                return Err(anyhow!("bundler `{}` exited with {}", self.program, output.status));
            }
            return Err(anyhow!("{stderr}"));
        }

        debug!(bytes = output.stdout.len(), "bundler process finished");
        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("bundler `{}` produced an invalid result", self.program))
    }
}
