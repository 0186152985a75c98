//! Change detection by modification time

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use kiln_core::{BuildError, BuildResult};
use kiln_graph::{GraphStore, Source};

/// How a source relates to its last successful compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Change {
    /// No record, or a record without outputs
    New,

    /// An output is missing or older than the source
    Modified,

    /// Every output exists and is at least as new as the source
    Unchanged,
}

impl Change {
    pub fn is_modified(self) -> bool {
        self != Self::Unchanged
    }
}

/// Compares source timestamps against the outputs recorded in the graph
pub struct ChangeDetector<'a> {
    store: &'a GraphStore,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self { store }
    }

    /// Classify one source
    ///
    /// Fails with `InvalidInput` if the source is not on disk; callers must
    /// only probe sources the finder reported.
    pub fn classify(&self, source: &Source) -> BuildResult<Change> {
        let source_time = modified_time(source.path()).ok_or_else(|| {
            BuildError::InvalidInput(format!("Source file does not exist: {}", source))
        })?;

        let outputs = match self.store.outputs(source) {
            Some(outputs) if !outputs.is_empty() => outputs,
            _ => return Ok(Change::New),
        };

        // Equal timestamps count as up to date
        let stale = outputs.iter().any(|output| match modified_time(output) {
            Some(output_time) => output_time < source_time,
            None => true,
        });

        Ok(if stale { Change::Modified } else { Change::Unchanged })
    }

    /// True if the source needs recompiling
    pub fn is_modified(&self, source: &Source) -> BuildResult<bool> {
        self.classify(source).map(Change::is_modified)
    }
}

/// Modification time of an existing file; `None` if it is missing
fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path)
        .ok()
        .filter(|m| m.is_file())
        .and_then(|m| m.modified().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs::File;
    use std::path::PathBuf;
    use std::time::Duration;

    fn touch(path: &Path, time: SystemTime) {
        fs::write(path, b"x").unwrap();
        File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
    }

    fn base() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        source: Source,
        output: PathBuf,
        store: GraphStore,
    }

    fn fixture(source_time: SystemTime, output_time: Option<SystemTime>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let source = Source::new(dir.path().join("A.scala"));
        let output = dir.path().join("A.class");
        touch(source.path(), source_time);
        if let Some(time) = output_time {
            touch(&output, time);
        }

        let mut store = GraphStore::new(dir.path().join("graph.json"));
        store.update(source.clone(), BTreeSet::from([output.clone()]), BTreeSet::new());

        Fixture { _dir: dir, source, output, store }
    }

    #[test]
    fn missing_source_is_invalid_input() {
        let store = GraphStore::new("unused.json");
        let detector = ChangeDetector::new(&store);

        let result = detector.is_modified(&Source::from("/definitely/not/here.scala"));
        assert!(matches!(result, Err(BuildError::InvalidInput(_))));
    }

    #[test]
    fn untracked_source_is_new() {
        let f = fixture(base(), Some(base()));
        let mut store = f.store.clone();
        store.remove_source(&f.source);

        assert_eq!(ChangeDetector::new(&store).classify(&f.source).unwrap(), Change::New);
    }

    #[test]
    fn record_without_outputs_is_new() {
        let f = fixture(base(), Some(base()));
        let mut store = f.store.clone();
        store.update(f.source.clone(), BTreeSet::new(), BTreeSet::new());

        assert!(ChangeDetector::new(&store).is_modified(&f.source).unwrap());
    }

    #[test]
    fn newer_output_is_unchanged() {
        let f = fixture(base(), Some(base() + Duration::from_secs(5)));
        assert_eq!(ChangeDetector::new(&f.store).classify(&f.source).unwrap(), Change::Unchanged);
    }

    #[test]
    fn equal_timestamps_are_unchanged() {
        let f = fixture(base(), Some(base()));
        assert!(!ChangeDetector::new(&f.store).is_modified(&f.source).unwrap());
    }

    #[test]
    fn older_output_is_modified() {
        let f = fixture(base() + Duration::from_secs(5), Some(base()));
        assert_eq!(ChangeDetector::new(&f.store).classify(&f.source).unwrap(), Change::Modified);
    }

    #[test]
    fn missing_output_is_modified() {
        let f = fixture(base(), None);
        assert!(!f.output.exists());
        assert_eq!(ChangeDetector::new(&f.store).classify(&f.source).unwrap(), Change::Modified);
    }
}
