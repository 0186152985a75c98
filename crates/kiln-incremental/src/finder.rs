//! Source discovery

use std::collections::BTreeSet;
use std::path::PathBuf;
use walkdir::WalkDir;

use kiln_core::{BuildError, BuildResult, ProjectConfig, ProjectContext};
use kiln_graph::Source;

/// Supplies the set of sources currently on disk
pub trait SourceFinder {
    fn find(&self) -> BuildResult<BTreeSet<Source>>;
}

/// Walks a directory tree and keeps files selected by include/exclude patterns
#[derive(Debug, Clone)]
pub struct PatternFinder {
    /// Directory to scan
    root: PathBuf,

    /// Include / exclude patterns (matched against file names)
    selection: ProjectConfig,
}

impl PatternFinder {
    pub fn new(root: impl Into<PathBuf>, selection: ProjectConfig) -> Self {
        Self {
            root: root.into(),
            selection,
        }
    }

    pub fn from_context(ctx: &ProjectContext) -> Self {
        Self::new(ctx.source_dir.clone(), ctx.selection.clone())
    }
}

impl SourceFinder for PatternFinder {
    fn find(&self) -> BuildResult<BTreeSet<Source>> {
        if !self.root.is_dir() {
            tracing::warn!(root = %self.root.display(), "source directory does not exist");
            return Ok(BTreeSet::new());
        }

        // Sources are identified by resolved path
        let root = self.root.canonicalize().map_err(|e| {
            BuildError::InvalidInput(format!("Cannot resolve {}: {}", self.root.display(), e))
        })?;

        let mut sources = BTreeSet::new();
        for entry in WalkDir::new(&root).follow_links(true) {
            let entry = entry.map_err(|e| {
                BuildError::InvalidInput(format!("Failed to scan {}: {}", root.display(), e))
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let selected = entry
                .file_name()
                .to_str()
                .map(|name| self.selection.is_source(name))
                .unwrap_or(false);

            if selected {
                sources.insert(Source::new(entry.into_path()));
            }
        }

        tracing::debug!(root = %root.display(), count = sources.len(), "found sources");
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_matching_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("Main.scala"), "").unwrap();
        fs::write(dir.path().join("a/b/Util.java"), "").unwrap();
        fs::write(dir.path().join("a/MainSpec.scala"), "").unwrap();
        fs::write(dir.path().join("a/notes.txt"), "").unwrap();

        let mut selection = ProjectConfig::default();
        selection.exclude = vec!["*Spec.scala".to_string()];
        let sources = PatternFinder::new(dir.path(), selection).find().unwrap();

        let root = dir.path().canonicalize().unwrap();
        let expected: BTreeSet<Source> = [root.join("Main.scala"), root.join("a/b/Util.java")]
            .into_iter()
            .map(Source::new)
            .collect();
        assert_eq!(sources, expected);
    }

    #[test]
    fn missing_root_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let finder = PatternFinder::new(dir.path().join("src"), ProjectConfig::default());
        assert!(finder.find().unwrap().is_empty());
    }
}
