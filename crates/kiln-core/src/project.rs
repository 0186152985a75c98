//! Project context
//!
//! A resolved view of one project's configuration. It is built once by the
//! caller and passed by reference to every component that needs project
//! identity or layout; there is no process-wide registry.

use std::path::{Path, PathBuf};
use crate::config::{Config, ProjectConfig};
use crate::options::CompileOption;

/// Resolved project layout with absolute-or-root-relative paths
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectContext {
    /// Project name
    pub name: String,

    /// Project root directory
    pub root: PathBuf,

    /// Directory scanned for sources
    pub source_dir: PathBuf,

    /// Output directory for compiled artifacts
    pub output_dir: PathBuf,

    /// Persisted graph snapshot path
    pub snapshot_path: PathBuf,

    /// Classpath entries, resolved against the root
    pub classpath: Vec<PathBuf>,

    /// Options passed to every compile
    pub options: Vec<CompileOption>,

    /// Include / exclude source selection
    pub selection: ProjectConfig,
}

impl ProjectContext {
    /// Resolve a configuration against its project root
    pub fn from_config(config: &Config) -> Self {
        let root = config.project_root.clone();
        let project = &config.project;

        Self {
            name: project.name.clone(),
            source_dir: resolve(&root, &project.sources),
            output_dir: resolve(&root, &project.output),
            snapshot_path: resolve(&root, &project.snapshot),
            classpath: project.classpath.iter().map(|p| resolve(&root, p)).collect(),
            options: config.compiler.options.clone(),
            selection: project.clone(),
            root,
        }
    }

    /// Classpath as a single platform-separated string
    pub fn classpath_string(&self) -> String {
        let separator = if cfg!(windows) { ";" } else { ":" };
        let mut entries = vec![self.output_dir.display().to_string()];
        entries.extend(self.classpath.iter().map(|p| p.display().to_string()));
        entries.join(separator)
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
