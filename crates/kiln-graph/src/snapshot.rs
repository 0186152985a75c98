//! Graph snapshot persistence
//!
//! The snapshot is written with the write-fsync-rename pattern:
//! 1. Serialize into a sibling temp file
//! 2. fsync the temp file
//! 3. Rename it over the snapshot path
//! 4. fsync the parent directory (best effort)
//!
//! Steps 1-2 are [`stage`], steps 3-4 are [`StagedSnapshot::commit`]. Until a
//! commit succeeds the previous snapshot is the one a reader sees.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::source::Source;
use crate::store::CompilationRecord;

/// Snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk snapshot layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    /// Format version
    pub version: u32,

    /// Compilation record per source
    #[serde(default)]
    pub records: BTreeMap<Source, CompilationRecord>,
}

/// Snapshot error types
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("IO error on {0}: {1}")]
    IoError(String, String),

    #[error("Parse error in {0}: {1}")]
    ParseError(String, String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

impl SnapshotError {
    fn io(path: &Path, err: std::io::Error) -> Self {
        Self::IoError(path.display().to_string(), err.to_string())
    }
}

impl From<SnapshotError> for kiln_core::BuildError {
    fn from(err: SnapshotError) -> Self {
        kiln_core::BuildError::PersistenceFailure(err.to_string())
    }
}

/// Temp file path used while staging a snapshot
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read a snapshot; `Ok(None)` if the file does not exist
pub fn read(path: &Path) -> Result<Option<SnapshotFile>, SnapshotError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SnapshotError::io(path, e)),
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| SnapshotError::ParseError(path.display().to_string(), e.to_string()))
}

/// A fully written snapshot waiting to be moved into place
#[derive(Debug)]
#[must_use = "a staged snapshot is not visible until committed"]
pub struct StagedSnapshot {
    temp_path: PathBuf,
    target: PathBuf,
}

impl StagedSnapshot {
    /// Path of the staged temp file
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Atomically replace the snapshot with the staged file
    pub fn commit(self) -> Result<(), SnapshotError> {
        fs::rename(&self.temp_path, &self.target)
            .map_err(|e| SnapshotError::io(&self.target, e))?;

        // Make the directory entry durable; some filesystems don't support this
        if let Some(parent) = self.target.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }

    /// Remove the staged file without touching the snapshot
    pub fn discard(self) {
        let _ = fs::remove_file(&self.temp_path);
    }
}

/// Serialize records into the temp file next to `path` and fsync it
pub fn stage(
    path: &Path,
    records: &BTreeMap<Source, CompilationRecord>,
) -> Result<StagedSnapshot, SnapshotError> {
    let snapshot = SnapshotFileRef {
        version: SNAPSHOT_VERSION,
        records,
    };
    let json = serde_json::to_vec_pretty(&snapshot)
        .map_err(|e| SnapshotError::SerializeError(e.to_string()))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| SnapshotError::io(parent, e))?;
        }
    }

    let temp_path = temp_path(path);
    let mut file = File::create(&temp_path).map_err(|e| SnapshotError::io(&temp_path, e))?;
    file.write_all(&json).map_err(|e| SnapshotError::io(&temp_path, e))?;
    file.sync_all().map_err(|e| SnapshotError::io(&temp_path, e))?;

    Ok(StagedSnapshot {
        temp_path,
        target: path.to_path_buf(),
    })
}

/// Borrowed form of [`SnapshotFile`] so saving does not clone the graph
#[derive(Serialize)]
struct SnapshotFileRef<'a> {
    version: u32,
    records: &'a BTreeMap<Source, CompilationRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn records() -> BTreeMap<Source, CompilationRecord> {
        let mut records = BTreeMap::new();
        records.insert(
            Source::from("src/B.scala"),
            CompilationRecord {
                outputs: BTreeSet::from([PathBuf::from("out/B.class")]),
                dependencies: BTreeSet::from([Source::from("src/A.scala")]),
            },
        );
        records
    }

    #[test]
    fn temp_path_is_sibling() {
        assert_eq!(
            temp_path(Path::new("target/kiln-graph.json")),
            PathBuf::from("target/kiln-graph.json.tmp")
        );
    }

    #[test]
    fn missing_snapshot_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read(&dir.path().join("absent.json")).unwrap().is_none());
    }

    #[test]
    fn stage_then_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/graph.json");

        let staged = stage(&path, &records()).unwrap();
        assert!(staged.temp_path().exists());
        assert!(!path.exists());

        staged.commit().unwrap();
        assert!(!temp_path(&path).exists());

        let snapshot = read(&path).unwrap().unwrap();
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.records, records());
    }

    #[test]
    fn discard_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");

        stage(&path, &records()).unwrap().discard();
        assert!(!temp_path(&path).exists());
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_snapshot_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        fs::write(&path, "{ \"version\": 1, \"records\": ").unwrap();

        assert!(matches!(read(&path), Err(SnapshotError::ParseError(_, _))));
    }
}
