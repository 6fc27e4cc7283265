//! The build node and its cycle

use crate::bundler::{BundleRequest, BundleResult, Bundler, Generated};
use crate::error::BuildError;
use crate::options::{NodeOptions, OutputTarget};
use crate::targets;
use rollcache_core::{PatchOp, TreeSnapshot};
use rollcache_materialize::CacheDir;
use rollcache_output::OutputPatcher;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};

/// What a node remembers between cycles
#[derive(Debug)]
pub struct NodeState<S> {
    /// Input snapshot whose patch was last applied to the cache directory
    pub last_snapshot: TreeSnapshot,
    /// State returned by the last bundle whose output was committed
    /// (caching only)
    pub bundle_state: Option<S>,
    /// The last cycle failed while writing output; the next one must
    /// bundle even if the input is unchanged
    pub output_stale: bool,
}

impl<S> Default for NodeState<S> {
    fn default() -> Self {
        Self {
            last_snapshot: TreeSnapshot::empty(),
            bundle_state: None,
            output_stale: false,
        }
    }
}

/// Result of one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Input unchanged and a bundle state exists; nothing was done
    Skipped,
    /// The bundler ran; `changes` are the operations applied to the output
    Built { changes: Vec<PatchOp> },
}

impl CycleOutcome {
    pub fn changes(&self) -> &[PatchOp] {
        match self {
            CycleOutcome::Skipped => &[],
            CycleOutcome::Built { changes } => changes,
        }
    }

    /// File-level output changes keyed by path (`create`, `change`, `unlink`)
    pub fn file_changes(&self) -> BTreeMap<&Path, &'static str> {
        self.changes()
            .iter()
            .filter(|op| op.is_file_op())
            .map(|op| (op.path(), op.name()))
            .collect()
    }
}

/// One incremental bundling node
///
/// Owns a persistent cache directory and output directory for its lifetime.
/// Cycles run one at a time.
pub struct BuildNode<B: Bundler> {
    label: String,
    input_dir: PathBuf,
    options: NodeOptions,
    dependency_roots: Vec<PathBuf>,
    bundler: B,
    cache_dir: CacheDir,
    output: OutputPatcher,
    state: NodeState<B::State>,
}

impl<B: Bundler> BuildNode<B> {
    /// Create a node; fails on invalid options before touching the input
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
        options: NodeOptions,
        bundler: B,
    ) -> Result<Self, BuildError> {
        options.validate()?;
        let dependency_roots = options.dependency_roots()?;
        let cache_dir = CacheDir::new(cache_dir)?;

        Ok(Self {
            label: options.label().to_string(),
            input_dir: input_dir.into(),
            options,
            dependency_roots,
            bundler,
            cache_dir,
            output: OutputPatcher::new(output_dir),
            state: NodeState::default(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn options(&self) -> &NodeOptions {
        &self.options
    }

    pub fn dependency_roots(&self) -> &[PathBuf] {
        &self.dependency_roots
    }

    /// Innermost cache directory, once the first cycle has mounted it
    pub fn build_dir(&self) -> Option<&Path> {
        self.cache_dir.build_dir()
    }

    pub fn output_dir(&self) -> &Path {
        self.output.output_dir()
    }

    pub fn state(&self) -> &NodeState<B::State> {
        &self.state
    }

    pub fn bundler(&self) -> &B {
        &self.bundler
    }

    /// Run one build cycle
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, BuildError> {
        let span = info_span!("cycle", node = %self.label);
        self.cycle().instrument(span).await
    }

    async fn cycle(&mut self) -> Result<CycleOutcome, BuildError> {
        let build_dir = self.cache_dir.ensure_initialized(&self.dependency_roots)?;

        let current = TreeSnapshot::scan(&self.input_dir, self.options.fingerprint)?;
        let patch = self.state.last_snapshot.diff(&current);
        debug!(ops = patch.len(), entries = current.len(), "input scanned");

        if patch.is_empty() && self.state.bundle_state.is_some() && !self.state.output_stale {
            info!("input unchanged, skipping bundle");
            return Ok(CycleOutcome::Skipped);
        }

        // Only advance once the cache directory matches `current`.
        self.cache_dir.apply(&self.input_dir, &patch)?;
        self.state.last_snapshot = current;

        let targets = self.prepare_targets(&build_dir);
        let request = BundleRequest {
            input: self.options.rollup.input.rebase(&build_dir),
            output: &targets,
            options: &self.options.rollup.extra,
            cache: if self.options.cache {
                self.state.bundle_state.as_ref()
            } else {
                None
            },
        };

        let started = Instant::now();
        let BundleResult { outputs, cache } = self.bundler.bundle(request).await.map_err(BuildError::Bundle)?;
        info!(
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            outputs = outputs.len(),
            "bundle finished"
        );

        let changes = match self.write_output(&targets, outputs) {
            Ok(changes) => changes,
            Err(err) => {
                self.state.output_stale = true;
                return Err(err);
            }
        };
        self.state.output_stale = false;
        if self.options.cache {
            self.state.bundle_state = cache;
        }
        info!(changes = changes.len(), "cycle complete");

        Ok(CycleOutcome::Built { changes })
    }

    /// Buffer and commit one bundle's files; nothing is kept on failure
    fn write_output(&mut self, targets: &[OutputTarget], outputs: Vec<Generated>) -> Result<Vec<PatchOp>, BuildError> {
        if let Err(err) = targets::emit(&mut self.output, targets, outputs) {
            self.output.discard();
            return Err(err);
        }
        Ok(self.output.commit()?)
    }

    /// Targets as the bundler sees them
    ///
    /// Source map `file` fields are resolved inside the build directory so
    /// the map's paths are relative to where the sources actually live.
    fn prepare_targets(&self, build_dir: &Path) -> Vec<OutputTarget> {
        self.options
            .rollup
            .targets()
            .iter()
            .map(|target| {
                let mut target = target.clone();
                if let Some(file) = target.sourcemap_file.as_ref().or(target.file.as_ref()) {
                    target.sourcemap_file = Some(build_dir.join(file));
                }
                target
            })
            .collect()
    }
}
