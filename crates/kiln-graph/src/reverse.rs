//! Reverse dependency index
//!
//! Built from the forward edges for a single pass and then dropped. It is
//! never updated in place, so it cannot drift from the store.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::source::Source;

/// Dependency -> sources that depend on it
#[derive(Debug, Clone, Default)]
pub struct ReverseIndex {
    dependents: HashMap<Source, BTreeSet<Source>>,
}

impl ReverseIndex {
    /// Build from `(source, dependencies)` pairs
    pub fn build<'a, I>(forward: I) -> Self
    where
        I: IntoIterator<Item = (&'a Source, &'a BTreeSet<Source>)>,
    {
        let mut dependents: HashMap<Source, BTreeSet<Source>> = HashMap::new();

        for (source, dependencies) in forward {
            for dependency in dependencies {
                dependents
                    .entry(dependency.clone())
                    .or_default()
                    .insert(source.clone());
            }
        }

        Self { dependents }
    }

    /// Immediate dependents of `source`
    pub fn dependents(&self, source: &Source) -> impl Iterator<Item = &Source> {
        self.dependents.get(source).into_iter().flatten()
    }

    /// All sources affected if `source` changes (transitive dependents)
    pub fn downstream(&self, source: &Source) -> BTreeSet<Source> {
        let mut visited = BTreeSet::new();
        let mut queue: VecDeque<&Source> = self.dependents(source).collect();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            queue.extend(self.dependents(current).filter(|d| !visited.contains(*d)));
        }

        visited.remove(source);
        visited
    }

    /// Number of sources that have at least one dependent
    pub fn len(&self) -> usize {
        self.dependents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }
}
