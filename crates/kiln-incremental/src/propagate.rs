//! Invalidation propagation
//!
//! Given the sources currently on disk, works out which of them must be
//! recompiled: the ones that changed themselves plus everything that
//! transitively depends on a changed or removed source.

use std::collections::BTreeSet;
use std::path::PathBuf;

use kiln_core::BuildResult;
use kiln_graph::{GraphStore, Source};

use crate::detect::ChangeDetector;

/// Outcome of one propagation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    /// Sources that are new or newer than their outputs
    pub directly_modified: BTreeSet<Source>,

    /// Unmodified sources dirtied through a dependency
    pub indirectly_invalidated: BTreeSet<Source>,

    /// Tracked sources no longer on disk
    pub removed: BTreeSet<Source>,

    /// Outputs recorded for dirty and removed sources before their records
    /// were dropped
    pub stale_outputs: BTreeSet<PathBuf>,
}

impl Invalidation {
    /// Sources to hand to the compiler (never includes removed sources)
    pub fn dirty(&self) -> BTreeSet<Source> {
        self.directly_modified
            .union(&self.indirectly_invalidated)
            .cloned()
            .collect()
    }

    /// True if nothing needs recompiling
    pub fn is_empty(&self) -> bool {
        self.directly_modified.is_empty() && self.indirectly_invalidated.is_empty()
    }
}

/// Runs propagation against a graph store, mutating it
pub struct Propagator<'a> {
    store: &'a mut GraphStore,
}

impl<'a> Propagator<'a> {
    pub fn new(store: &'a mut GraphStore) -> Self {
        Self { store }
    }

    /// Compute the dirty set for `current` and drop every stale record
    ///
    /// On return the store holds records only for unmodified sources. If
    /// detection fails the store may already be partially pruned; callers
    /// restore it with `load()`.
    pub fn propagate(self, current: &BTreeSet<Source>) -> BuildResult<Invalidation> {
        // Dependents must be looked up before any record disappears
        let reverse = self.store.reverse_index();

        let mut invalidation = Invalidation {
            removed: self.store.all_sources().difference(current).cloned().collect(),
            ..Invalidation::default()
        };

        for source in &invalidation.removed {
            tracing::debug!(source = %source, "source removed");
            if let Some(record) = self.store.remove_source(source) {
                invalidation.stale_outputs.extend(record.outputs);
            }
        }

        let mut unmodified = BTreeSet::new();
        {
            let detector = ChangeDetector::new(self.store);
            for source in current {
                let change = detector.classify(source)?;
                if change.is_modified() {
                    tracing::debug!(source = %source, ?change, "source modified");
                    invalidation.directly_modified.insert(source.clone());
                } else {
                    unmodified.insert(source.clone());
                }
            }
        }

        let mut frontier: Vec<Source> = invalidation
            .directly_modified
            .iter()
            .chain(invalidation.removed.iter())
            .cloned()
            .collect();

        // Each source can leave `unmodified` only once, so this terminates
        // even when the dependency graph has cycles.
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for source in &frontier {
                for dependent in reverse.dependents(source) {
                    if unmodified.remove(dependent) {
                        tracing::debug!(
                            source = %dependent,
                            cause = %source,
                            "source invalidated by dependency"
                        );
                        invalidation.indirectly_invalidated.insert(dependent.clone());
                        next.push(dependent.clone());
                    }
                }
            }
            frontier = next;
        }

        for source in invalidation.dirty() {
            if let Some(record) = self.store.remove_source(&source) {
                invalidation.stale_outputs.extend(record.outputs);
            }
        }

        Ok(invalidation)
    }
}
