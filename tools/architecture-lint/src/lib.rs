//! Hexagon guardrail for the `dashboard` crate.
//!
//! Every file under `dashboard/src/domain` and `dashboard/src/outbound` is
//! parsed with `syn`. Each multi-segment path it mentions is resolved,
//! relative to the file's own module, to either a module of the dashboard
//! crate or an external crate, and checked against the rules of the file's
//! layer:
//!
//! - `domain` reaches neither `config` nor `outbound`, and uses no HTTP,
//!   settings or binary-only crate.
//! - `outbound` implements the ports. It never drives the domain's
//!   services, session or live collections, and uses no binary-only crate.
//!
//! Single-segment paths (locals, generics, prelude names) are ignored.
//!
//! Run it with `cargo run -p architecture-lint`, optionally passing the
//! crate directory to lint.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use syn::visit::Visit;

/// Top-level modules of the dashboard crate. A bare path starting with one
/// of these is read as a crate-relative path.
const CRATE_MODULES: [&str; 4] = ["config", "domain", "outbound", "test_support"];

/// A rule broken by one file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Violation {
    /// File path relative to `dashboard/src`.
    pub file: PathBuf,
    /// The broken rule.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file.display(), self.message)
    }
}

/// Why a lint run did not pass.
#[derive(Debug)]
pub enum ArchitectureLintError {
    /// A source directory or file could not be read.
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying failure.
        source: io::Error,
    },
    /// A file is not valid Rust, or sits outside the linted layers.
    Parse {
        /// File path relative to `dashboard/src`.
        file: PathBuf,
        /// Parser or layout message.
        message: String,
    },
    /// At least one rule was broken.
    Violations(Vec<Violation>),
}

impl fmt::Display for ArchitectureLintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read {}: {source}", path.display()),
            Self::Parse { file, message } => {
                write!(f, "cannot lint {}: {message}", file.display())
            }
            Self::Violations(violations) => {
                writeln!(f, "{} hexagon violation(s):", violations.len())?;
                violations
                    .iter()
                    .try_for_each(|violation| writeln!(f, "  {violation}"))
            }
        }
    }
}

impl std::error::Error for ArchitectureLintError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { .. } | Self::Violations(_) => None,
        }
    }
}

/// One file handed to [`lint_sources`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintSource {
    /// Path relative to `dashboard/src`, e.g. `domain/session.rs`.
    pub file: PathBuf,
    /// Rust source text.
    pub contents: String,
}

/// Lint the `domain` and `outbound` trees of the crate at `crate_dir`.
///
/// A layer directory that does not exist is skipped.
///
/// # Errors
///
/// Returns [`ArchitectureLintError`] when a file cannot be read or parsed,
/// or when any rule is broken.
pub fn lint_crate_sources(crate_dir: &Path) -> Result<(), ArchitectureLintError> {
    let src = crate_dir.join("src");
    let mut sources = Vec::new();
    for layer in Layer::ALL {
        let root = src.join(layer.name());
        if root.is_dir() {
            sources.extend(read_tree(&src, &root)?);
        }
    }
    lint_sources(&sources)
}

/// Lint in-memory sources.
///
/// # Errors
///
/// Returns [`ArchitectureLintError::Parse`] for a file outside `domain` or
/// `outbound` or one `syn` rejects, otherwise
/// [`ArchitectureLintError::Violations`] when any rule is broken.
pub fn lint_sources(sources: &[LintSource]) -> Result<(), ArchitectureLintError> {
    let mut found: BTreeMap<&Path, BTreeSet<String>> = BTreeMap::new();
    for source in sources {
        let layer = Layer::of(&source.file).ok_or_else(|| ArchitectureLintError::Parse {
            file: source.file.clone(),
            message: "file is not under domain/ or outbound/".to_owned(),
        })?;
        let syntax = syn::parse_file(&source.contents).map_err(|err| {
            ArchitectureLintError::Parse {
                file: source.file.clone(),
                message: err.to_string(),
            }
        })?;
        let here = module_path(&source.file);
        let mut paths = PathCollector::default();
        paths.visit_file(&syntax);
        let broken = paths
            .paths
            .iter()
            .filter_map(|segments| Target::resolve(segments, &here))
            .filter_map(|target| layer.check(&target));
        found.entry(&source.file).or_default().extend(broken);
    }

    let violations: Vec<Violation> = found
        .into_iter()
        .flat_map(|(file, messages)| {
            messages.into_iter().map(move |message| Violation {
                file: file.to_path_buf(),
                message,
            })
        })
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ArchitectureLintError::Violations(violations))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    Domain,
    Outbound,
}

impl Layer {
    const ALL: [Self; 2] = [Self::Domain, Self::Outbound];

    fn of(file: &Path) -> Option<Self> {
        let top = file.iter().next()?.to_str()?;
        Self::ALL.into_iter().find(|layer| layer.name() == top)
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Outbound => "outbound",
        }
    }

    /// Crate-relative module prefixes the layer must not reach.
    const fn forbidden_modules(self) -> &'static [&'static [&'static str]] {
        match self {
            Self::Domain => &[&["config"], &["outbound"]],
            Self::Outbound => &[
                &["domain", "live"],
                &["domain", "services"],
                &["domain", "session"],
            ],
        }
    }

    const fn forbidden_crates(self) -> &'static [&'static str] {
        match self {
            Self::Domain => &[
                "clap",
                "color_eyre",
                "ortho_config",
                "reqwest",
                "tracing_subscriber",
                "url",
            ],
            Self::Outbound => &["clap", "color_eyre", "tracing_subscriber"],
        }
    }

    fn check(self, target: &Target) -> Option<String> {
        match target {
            Target::Module(path) => self
                .forbidden_modules()
                .iter()
                .find(|prefix| {
                    path.len() >= prefix.len()
                        && path.iter().zip(prefix.iter()).all(|(seg, want)| seg == want)
                })
                .map(|prefix| {
                    format!(
                        "{} must not depend on crate::{}",
                        self.name(),
                        prefix.join("::")
                    )
                }),
            Target::Crate(name) => self
                .forbidden_crates()
                .contains(&name.as_str())
                .then(|| format!("{} must not depend on external crate `{name}`", self.name())),
        }
    }
}

/// What a path in a source file points at.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    /// A module path from the crate root.
    Module(Vec<String>),
    /// An external crate.
    Crate(String),
}

impl Target {
    /// Resolve `segments`, written in module `here`. `None` for paths too
    /// short to name anything outside the current scope.
    fn resolve(segments: &[String], here: &[String]) -> Option<Self> {
        let (first, rest) = segments.split_first()?;
        if rest.is_empty() {
            return None;
        }
        match first.as_str() {
            "crate" | "dashboard" => Some(Self::Module(rest.to_vec())),
            "self" => Some(Self::Module(here.iter().chain(rest).cloned().collect())),
            "super" => {
                let ups = segments.iter().take_while(|s| *s == "super").count();
                let base = here.get(..here.len().saturating_sub(ups)).unwrap_or_default();
                let tail = segments.get(ups..).unwrap_or_default();
                Some(Self::Module(base.iter().chain(tail).cloned().collect()))
            }
            name if CRATE_MODULES.contains(&name) => Some(Self::Module(segments.to_vec())),
            name => Some(Self::Crate(name.to_owned())),
        }
    }
}

/// Module path of a file: `domain/live/mod.rs` is `domain::live`,
/// `domain/session.rs` is `domain::session`.
fn module_path(file: &Path) -> Vec<String> {
    let mut segments: Vec<String> = file
        .with_extension("")
        .iter()
        .map(|part| part.to_string_lossy().into_owned())
        .collect();
    if segments.last().is_some_and(|last| last == "mod") {
        segments.pop();
    }
    segments
}

#[derive(Default)]
struct PathCollector {
    paths: BTreeSet<Vec<String>>,
}

impl PathCollector {
    fn flatten_use(&mut self, tree: &syn::UseTree, prefix: &mut Vec<String>) {
        match tree {
            syn::UseTree::Path(step) => {
                prefix.push(step.ident.to_string());
                self.flatten_use(&step.tree, prefix);
                prefix.pop();
            }
            syn::UseTree::Name(leaf) => self.push_with(prefix, leaf.ident.to_string()),
            syn::UseTree::Rename(leaf) => self.push_with(prefix, leaf.ident.to_string()),
            syn::UseTree::Glob(_) => self.push_with(prefix, "*".to_owned()),
            syn::UseTree::Group(group) => {
                for item in &group.items {
                    self.flatten_use(item, prefix);
                }
            }
        }
    }

    fn push_with(&mut self, prefix: &[String], last: String) {
        let mut path = prefix.to_vec();
        path.push(last);
        self.paths.insert(path);
    }
}

impl<'ast> Visit<'ast> for PathCollector {
    fn visit_path(&mut self, node: &'ast syn::Path) {
        self.paths.insert(
            node.segments
                .iter()
                .map(|segment| segment.ident.to_string())
                .collect(),
        );
        syn::visit::visit_path(self, node);
    }

    fn visit_item_use(&mut self, node: &'ast syn::ItemUse) {
        self.flatten_use(&node.tree, &mut Vec::new());
    }
}

/// Every `.rs` file under `root`, with paths relative to `src`, in a
/// stable order.
fn read_tree(src: &Path, root: &Path) -> Result<Vec<LintSource>, ArchitectureLintError> {
    let io_error = |at: &Path| {
        let path = at.to_path_buf();
        move |source| ArchitectureLintError::Io { path, source }
    };
    let mut pending = vec![root.to_path_buf()];
    let mut sources = Vec::new();
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir).map_err(io_error(&dir))? {
            let path = entry.map_err(io_error(&dir))?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                let contents = fs::read_to_string(&path).map_err(io_error(&path))?;
                let file = path.strip_prefix(src).unwrap_or(&path).to_path_buf();
                sources.push(LintSource { file, contents });
            }
        }
    }
    sources.sort_by(|a, b| a.file.cmp(&b.file));
    Ok(sources)
}
