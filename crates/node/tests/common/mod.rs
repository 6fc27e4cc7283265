//! Test bundler that links ES-style modules through the cache directory
//!
//! Supports a tiny subset of module syntax, one statement per `;`:
//! - `import name from "./relative"` or `import name from "bare"`
//! - `export default <expr>`
//! - anything else is kept verbatim
//!
//! Relative imports resolve next to the importer; bare imports walk up the
//! importer's ancestors looking in `node_modules`, exactly the way the
//! mounted dependency roots are meant to be found.

#![allow(dead_code)]

use anyhow::{bail, Context};
use async_trait::async_trait;
use rollcache_core::fingerprint_bytes;
use rollcache_node::{
    Artifact, BundleRequest, BundleResult, Bundler, BundlerOptions, EntryPoints, Generated, NodeOptions,
    OutputTarget, SourceMap,
};
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Write `files` under `root`, creating parent directories
pub fn write_tree(root: &Path, files: &[(&str, &str)]) -> std::io::Result<()> {
    for (path, content) in files {
        let path = root.join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
    }
    Ok(())
}

/// Options for a single-entry build into `out.js`
pub fn single_entry(entry: &str, target: OutputTarget) -> NodeOptions {
    NodeOptions::new(BundlerOptions::new(EntryPoints::Single(entry.into()), vec![target]))
}

/// Bundler state: modules linked by the last build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkState {
    pub build: usize,
    pub modules: Vec<PathBuf>,
}

#[derive(Default)]
pub struct LinkBundler {
    calls: AtomicUsize,
    received: Mutex<Vec<Option<usize>>>,
}

impl LinkBundler {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Build number of the state passed in by each invocation
    pub fn received_states(&self) -> Vec<Option<usize>> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl Bundler for LinkBundler {
    type State = LinkState;

    async fn bundle(&self, request: BundleRequest<'_, LinkState>) -> anyhow::Result<BundleResult<LinkState>> {
        let build = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.received
            .lock()
            .unwrap()
            .push(request.cache.map(|state| state.build));

        let entries: Vec<PathBuf> = request.input.paths().into_iter().map(Path::to_path_buf).collect();
        let graph = Graph::load(&entries)?;

        let mut outputs = Vec::new();
        for target in request.output {
            let generated = if target.dir.is_some() {
                Generated::Chunks(graph.render_chunks(&entries))
            } else {
                let [entry] = entries.as_slice() else {
                    bail!("multiple inputs need an output `dir`");
                };
                let code = graph.render_bundle(entry);
                let file = target
                    .file
                    .as_deref()
                    .and_then(Path::file_name)
                    .map(|name| name.to_string_lossy().into_owned());
                let map = graph.source_map(entry, file, &code);
                Generated::Single(Artifact::new(code).with_map(map))
            };
            outputs.push(generated);
        }

        Ok(BundleResult {
            outputs,
            cache: Some(LinkState {
                build,
                modules: graph.modules.keys().cloned().collect(),
            }),
        })
    }
}

struct Module {
    source: String,
    /// (local binding, resolved module)
    imports: Vec<(String, PathBuf)>,
    statements: Vec<String>,
}

struct Graph {
    modules: BTreeMap<PathBuf, Module>,
}

impl Graph {
    fn load(entries: &[PathBuf]) -> anyhow::Result<Self> {
        let mut graph = Graph {
            modules: BTreeMap::new(),
        };
        for entry in entries {
            graph.visit(entry, None)?;
        }
        Ok(graph)
    }

    fn visit(&mut self, path: &Path, importer: Option<&Path>) -> anyhow::Result<()> {
        if self.modules.contains_key(path) {
            return Ok(());
        }
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(_) => match importer {
                Some(importer) => bail!(
                    "Could not load {} (imported by {})",
                    path.display(),
                    importer.display()
                ),
                None => bail!("Could not load {}", path.display()),
            },
        };

        let mut imports = Vec::new();
        let mut statements = Vec::new();
        for statement in source.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            match parse_import(statement) {
                Some((binding, specifier)) => {
                    let resolved = resolve(path, specifier).with_context(|| {
                        format!("Could not load {} (imported by {})", specifier, path.display())
                    })?;
                    imports.push((binding.to_string(), resolved));
                }
                None => statements.push(statement.to_string()),
            }
        }

        let dependencies: Vec<PathBuf> = imports.iter().map(|(_, dep)| dep.clone()).collect();
        self.modules.insert(
            path.to_path_buf(),
            Module {
                source,
                imports,
                statements,
            },
        );
        for dependency in dependencies {
            self.visit(&dependency, Some(path))?;
        }
        Ok(())
    }

    /// Dependencies first, each module once
    fn order(&self, entry: &Path, order: &mut Vec<PathBuf>) {
        if order.iter().any(|seen| seen == entry) {
            return;
        }
        if let Some(module) = self.modules.get(entry) {
            for (_, dependency) in &module.imports {
                self.order(dependency, order);
            }
        }
        order.push(entry.to_path_buf());
    }

    /// Local name each importer gave a module; first importer wins
    fn bindings(&self) -> BTreeMap<&Path, &str> {
        let mut bindings = BTreeMap::new();
        for module in self.modules.values() {
            for (binding, dependency) in &module.imports {
                bindings.entry(dependency.as_path()).or_insert(binding.as_str());
            }
        }
        bindings
    }

    fn render_module(&self, path: &Path, binding: Option<&str>, out: &mut String) {
        let Some(module) = self.modules.get(path) else {
            return;
        };
        for statement in &module.statements {
            match (statement.strip_prefix("export default "), binding) {
                (Some(expr), Some(binding)) => out.push_str(&format!("var {binding} = {expr};\n")),
                _ => out.push_str(&format!("{statement};\n")),
            }
        }
    }

    fn render_bundle(&self, entry: &Path) -> String {
        let bindings = self.bindings();
        let mut order = Vec::new();
        self.order(entry, &mut order);

        let mut code = String::new();
        for path in &order {
            let binding = if path == entry {
                None
            } else {
                bindings.get(path.as_path()).copied()
            };
            self.render_module(path, binding, &mut code);
        }
        code
    }

    /// One chunk per entry plus one shared chunk for modules reachable from
    /// more than one entry
    fn render_chunks(&self, entries: &[PathBuf]) -> BTreeMap<String, Artifact> {
        let bindings = self.bindings();
        let reach: Vec<Vec<PathBuf>> = entries
            .iter()
            .map(|entry| {
                let mut order = Vec::new();
                self.order(entry, &mut order);
                order
            })
            .collect();

        let mut shared = BTreeSet::new();
        for (i, order) in reach.iter().enumerate() {
            for path in order {
                let elsewhere = reach
                    .iter()
                    .enumerate()
                    .any(|(j, other)| j != i && other.contains(path));
                if elsewhere && !entries.contains(path) {
                    shared.insert(path.clone());
                }
            }
        }

        let mut chunks = BTreeMap::new();
        let shared_name = if shared.is_empty() {
            None
        } else {
            let key: String = shared.iter().map(|p| p.display().to_string()).collect();
            let hash = fingerprint_bytes(key.as_bytes()).to_hex();
            Some(format!("chunk-{}.js", &hash[..8]))
        };

        if let Some(name) = &shared_name {
            let mut code = String::new();
            let mut exported = Vec::new();
            // Keep dependency order inside the shared chunk.
            for path in reach.iter().flatten().filter(|p| shared.contains(*p)) {
                if exported.iter().any(|(p, _): &(PathBuf, &str)| p == path) {
                    continue;
                }
                let binding = bindings.get(path.as_path()).copied().unwrap_or("shared");
                self.render_module(path, Some(binding), &mut code);
                exported.push((path.clone(), binding));
            }
            let names: Vec<&str> = exported.iter().map(|(_, binding)| *binding).collect();
            code.push_str(&format!("export {{ {} }};\n", names.join(", ")));
            chunks.insert(name.clone(), Artifact::new(code));
        }

        for (entry, order) in entries.iter().zip(&reach) {
            let mut code = String::new();
            if let Some(name) = &shared_name {
                let used: BTreeSet<&str> = order
                    .iter()
                    .filter_map(|path| self.modules.get(path))
                    .flat_map(|module| &module.imports)
                    .filter(|(_, dependency)| shared.contains(dependency))
                    .map(|(binding, _)| binding.as_str())
                    .collect();
                if !used.is_empty() {
                    let used: Vec<&str> = used.into_iter().collect();
                    code.push_str(&format!("import {{ {} }} from './{}';\n", used.join(", "), name));
                }
            }
            for path in order.iter().filter(|p| !shared.contains(*p)) {
                let binding = if path == entry {
                    None
                } else {
                    bindings.get(path.as_path()).copied()
                };
                self.render_module(path, binding, &mut code);
            }
            let chunk_name = entry
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            chunks.insert(chunk_name, Artifact::new(code));
        }
        chunks
    }

    fn source_map(&self, entry: &Path, file: Option<String>, code: &str) -> SourceMap {
        let base = entry.parent().unwrap_or(Path::new("/"));
        let mut order = Vec::new();
        self.order(entry, &mut order);

        SourceMap {
            version: 3,
            file,
            sources: order
                .iter()
                .map(|path| {
                    path.strip_prefix(base)
                        .unwrap_or(path)
                        .display()
                        .to_string()
                })
                .collect(),
            sources_content: order
                .iter()
                .map(|path| self.modules.get(path).map(|module| module.source.clone()))
                .collect(),
            names: vec![],
            mappings: ";".repeat(code.lines().count().saturating_sub(1)),
        }
    }
}

fn parse_import(statement: &str) -> Option<(&str, &str)> {
    let rest = statement.strip_prefix("import ")?;
    let (binding, specifier) = rest.split_once(" from ")?;
    let specifier = specifier.trim().trim_matches(|c| c == '"' || c == '\'');
    Some((binding.trim(), specifier))
}

fn resolve(importer: &Path, specifier: &str) -> Option<PathBuf> {
    let dir = importer.parent()?;
    if specifier.starts_with("./") || specifier.starts_with("../") {
        return candidates(&normalize(&dir.join(specifier)));
    }
    dir.ancestors()
        .find_map(|ancestor| candidates(&ancestor.join("node_modules").join(specifier)))
}

fn candidates(base: &Path) -> Option<PathBuf> {
    let mut with_ext = OsString::from(base.as_os_str());
    with_ext.push(".js");
    [base.to_path_buf(), PathBuf::from(with_ext), base.join("index.js")]
        .into_iter()
        .find(|candidate| candidate.is_file())
}

/// Lexical normalization; symlinked dependency roots must keep their
/// mounted path so nested lookups keep walking the cache hierarchy
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}
