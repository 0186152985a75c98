//! Dependency graph store
//!
//! This crate handles:
//! - Per-source compilation records (outputs and dependencies)
//! - Reverse dependency lookup (dependents), derived on demand
//! - Atomic persistence of the graph snapshot

pub mod source;
pub mod store;
pub mod reverse;
pub mod snapshot;

pub use source::Source;
pub use store::{CompilationRecord, GraphStore};
pub use reverse::ReverseIndex;
pub use snapshot::{SnapshotError, StagedSnapshot, SNAPSHOT_VERSION};
