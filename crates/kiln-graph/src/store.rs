//! In-memory dependency graph with snapshot persistence
//!
//! Forward edges (source -> dependencies) are the only stored edges. The
//! reverse direction is derived by [`GraphStore::reverse_index`] whenever it
//! is needed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::reverse::ReverseIndex;
use crate::snapshot::{self, SnapshotError, StagedSnapshot, SNAPSHOT_VERSION};
use crate::source::Source;

/// Facts from the last successful compilation of one source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationRecord {
    /// Artifacts produced for the source
    #[serde(default)]
    pub outputs: BTreeSet<PathBuf>,

    /// Sources this source was found to depend on
    #[serde(default)]
    pub dependencies: BTreeSet<Source>,
}

impl CompilationRecord {
    pub fn new(outputs: BTreeSet<PathBuf>, dependencies: BTreeSet<Source>) -> Self {
        Self { outputs, dependencies }
    }
}

/// Dependency graph store
///
/// Owns the source -> record mapping for one project. Mutations are only
/// durable after [`GraphStore::save`]; [`GraphStore::load`] throws away any
/// unsaved change.
#[derive(Debug, Clone)]
pub struct GraphStore {
    /// Snapshot location
    snapshot_path: PathBuf,

    /// Record per tracked source
    records: BTreeMap<Source, CompilationRecord>,
}

impl GraphStore {
    /// Create an empty store backed by `snapshot_path` (nothing is read)
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            records: BTreeMap::new(),
        }
    }

    /// Create a store and load its snapshot
    pub fn open(snapshot_path: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let mut store = Self::new(snapshot_path);
        store.load()?;
        Ok(store)
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Recorded outputs; `None` if the source has no record
    pub fn outputs(&self, source: &Source) -> Option<&BTreeSet<PathBuf>> {
        self.records.get(source).map(|r| &r.outputs)
    }

    /// Recorded dependencies; `None` if the source has no record
    pub fn dependencies(&self, source: &Source) -> Option<&BTreeSet<Source>> {
        self.records.get(source).map(|r| &r.dependencies)
    }

    pub fn record(&self, source: &Source) -> Option<&CompilationRecord> {
        self.records.get(source)
    }

    pub fn contains(&self, source: &Source) -> bool {
        self.records.contains_key(source)
    }

    /// Delete a record. Dependents are not touched; the caller must
    /// invalidate them.
    pub fn remove_source(&mut self, source: &Source) -> Option<CompilationRecord> {
        let removed = self.records.remove(source);
        if removed.is_some() {
            tracing::debug!(source = %source, "removed graph record");
        }
        removed
    }

    /// Every source with a live record
    pub fn all_sources(&self) -> BTreeSet<Source> {
        self.records.keys().cloned().collect()
    }

    /// Union of all recorded outputs
    pub fn all_outputs(&self) -> BTreeSet<PathBuf> {
        self.records
            .values()
            .flat_map(|r| r.outputs.iter().cloned())
            .collect()
    }

    /// Replace the record for `source`
    pub fn update(
        &mut self,
        source: Source,
        outputs: BTreeSet<PathBuf>,
        dependencies: BTreeSet<Source>,
    ) {
        tracing::debug!(
            source = %source,
            outputs = outputs.len(),
            dependencies = dependencies.len(),
            "updated graph record"
        );
        self.records.insert(source, CompilationRecord::new(outputs, dependencies));
    }

    /// Empty the in-memory graph
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Derive the dependents index from the current forward edges
    pub fn reverse_index(&self) -> ReverseIndex {
        ReverseIndex::build(
            self.records
                .iter()
                .map(|(source, record)| (source, &record.dependencies)),
        )
    }

    /// All sources `source` depends on, directly or transitively
    pub fn upstream(&self, source: &Source) -> BTreeSet<Source> {
        let mut visited = BTreeSet::new();
        let mut queue: VecDeque<&Source> = VecDeque::new();

        if let Some(deps) = self.dependencies(source) {
            queue.extend(deps.iter());
        }

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(deps) = self.dependencies(current) {
                queue.extend(deps.iter().filter(|d| !visited.contains(*d)));
            }
        }

        visited.remove(source);
        visited
    }

    /// Write the snapshot to a temp file without making it visible
    pub fn stage(&self) -> Result<StagedSnapshot, SnapshotError> {
        snapshot::stage(&self.snapshot_path, &self.records)
    }

    /// Persist the full graph, atomically replacing the previous snapshot
    pub fn save(&self) -> Result<(), SnapshotError> {
        self.stage()?.commit()?;
        tracing::debug!(
            path = %self.snapshot_path.display(),
            sources = self.records.len(),
            "saved graph snapshot"
        );
        Ok(())
    }

    /// Replace the in-memory graph with the persisted snapshot
    ///
    /// A missing snapshot yields an empty graph. A snapshot written by an
    /// incompatible format version is ignored, which forces a full rebuild.
    /// On error the in-memory graph is left untouched.
    pub fn load(&mut self) -> Result<(), SnapshotError> {
        match snapshot::read(&self.snapshot_path)? {
            None => {
                tracing::debug!(path = %self.snapshot_path.display(), "no graph snapshot, starting empty");
                self.records.clear();
            }
            Some(file) if file.version != SNAPSHOT_VERSION => {
                tracing::warn!(
                    path = %self.snapshot_path.display(),
                    found = file.version,
                    expected = SNAPSHOT_VERSION,
                    "ignoring graph snapshot with unsupported version"
                );
                self.records.clear();
            }
            Some(file) => {
                self.records = file.records;
            }
        }
        Ok(())
    }
}
