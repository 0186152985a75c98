//! Incremental build driver
//!
//! One `build` call walks `Idle -> Scanning -> Propagating -> Invoking ->
//! Merging | Reverting -> Idle`. The graph snapshot on disk is only replaced
//! by a fully successful build; every failure path reloads it instead.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use kiln_core::{BuildError, BuildReport, BuildResult, BuildSummary, ProjectContext};
use kiln_graph::{GraphStore, Source};

use crate::compiler::{CompileRequest, Compiler, SourceFacts};
use crate::finder::SourceFinder;
use crate::propagate::{Invalidation, Propagator};

/// Driver state within one build invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Idle,
    Scanning,
    Propagating,
    Invoking,
    Merging,
    Reverting,
}

/// Orchestrates one project's incremental builds
///
/// Borrows the project's graph store for its own lifetime; at most one
/// driver may exist per store.
pub struct BuildDriver<'a> {
    ctx: &'a ProjectContext,
    store: &'a mut GraphStore,
    phase: BuildPhase,
}

impl<'a> BuildDriver<'a> {
    pub fn new(ctx: &'a ProjectContext, store: &'a mut GraphStore) -> Self {
        Self {
            ctx,
            store,
            phase: BuildPhase::Idle,
        }
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    pub fn store(&self) -> &GraphStore {
        &*self.store
    }

    /// Run one incremental build
    ///
    /// Never panics on build failures: the returned report carries the
    /// failure message, and `None` means success.
    pub fn build(&mut self, finder: &dyn SourceFinder, compiler: &mut dyn Compiler) -> BuildReport {
        let mut summary = BuildSummary::default();
        let result = self.run(finder, compiler, &mut summary);
        self.transition(BuildPhase::Idle);

        match result {
            Ok(()) => {
                tracing::info!(project = %self.ctx.name, compiled = summary.compiled, "build succeeded");
                BuildReport::success(&self.ctx.name, summary)
            }
            Err(err) => {
                tracing::error!(project = %self.ctx.name, kind = err.kind(), "build failed: {}", err);
                let message = match err {
                    BuildError::CompilationFailure(message) => message,
                    other => other.to_string(),
                };
                BuildReport::failure(&self.ctx.name, summary, message)
            }
        }
    }

    /// Work out what the next build would recompile without changing anything
    pub fn plan(&self, finder: &dyn SourceFinder) -> BuildResult<Invalidation> {
        let current = finder.find()?;
        let mut scratch = self.store.clone();
        Propagator::new(&mut scratch).propagate(&current)
    }

    /// Delete every recorded output and persist an empty graph
    ///
    /// Returns the number of output files removed.
    pub fn clean(&mut self) -> BuildResult<usize> {
        let removed = remove_outputs(&self.store.all_outputs());
        self.store.clear();
        self.save()?;
        tracing::info!(project = %self.ctx.name, removed, "cleaned outputs");
        Ok(removed)
    }

    fn run(
        &mut self,
        finder: &dyn SourceFinder,
        compiler: &mut dyn Compiler,
        summary: &mut BuildSummary,
    ) -> BuildResult<()> {
        let ctx = self.ctx;

        self.transition(BuildPhase::Scanning);
        let current = finder.find()?;
        summary.sources = current.len();

        self.transition(BuildPhase::Propagating);
        let invalidation = match Propagator::new(&mut *self.store).propagate(&current) {
            Ok(invalidation) => invalidation,
            Err(err) => {
                self.revert();
                return Err(err);
            }
        };

        summary.directly_modified = invalidation.directly_modified.len();
        summary.indirectly_invalidated = invalidation.indirectly_invalidated.len();
        summary.removed = invalidation.removed.len();
        tracing::info!(
            project = %ctx.name,
            modified = summary.directly_modified,
            invalidated = summary.indirectly_invalidated,
            removed = summary.removed,
            "invalidation complete"
        );

        let stale = remove_outputs(&invalidation.stale_outputs);
        if stale > 0 {
            tracing::debug!(count = stale, "removed stale outputs");
        }

        let dirty = invalidation.dirty();
        if !dirty.is_empty() {
            self.transition(BuildPhase::Invoking);
            summary.compiled = dirty.len();

            let request = CompileRequest {
                sources: &dirty,
                classpath: ctx.classpath_string(),
                output_dir: &ctx.output_dir,
                options: &ctx.options,
            };

            tracing::info!(count = dirty.len(), "compiling sources");
            let facts = compiler
                .compile(&request)
                .and_then(|()| compiler.facts(&dirty));

            let facts = match facts {
                Ok(facts) => facts,
                Err(message) => {
                    self.abandon(&invalidation);
                    return Err(BuildError::CompilationFailure(message));
                }
            };

            self.transition(BuildPhase::Merging);
            self.merge(&current, &dirty, facts);
        }

        if let Err(err) = self.store.save() {
            self.abandon(&invalidation);
            return Err(err.into());
        }
        summary.outputs = self.store.all_outputs().len();
        tracing::info!(outputs = summary.outputs, "graph saved");
        Ok(())
    }

    /// Write fresh records for every compiled source
    fn merge(
        &mut self,
        current: &BTreeSet<Source>,
        dirty: &BTreeSet<Source>,
        mut facts: BTreeMap<Source, SourceFacts>,
    ) {
        let ctx = self.ctx;
        let output_dir = &ctx.output_dir;

        for source in dirty {
            let SourceFacts { outputs, dependencies } = facts.remove(source).unwrap_or_else(|| {
                tracing::debug!(source = %source, "compiler reported no facts");
                SourceFacts::default()
            });

            let outputs: BTreeSet<PathBuf> = outputs
                .into_iter()
                .map(|o| resolve_output(output_dir, o))
                .collect();

            // Only edges to tracked sources are kept
            let dependencies: BTreeSet<Source> = dependencies
                .into_iter()
                .filter(|d| d != source && current.contains(d))
                .collect();

            self.store.update(source.clone(), outputs, dependencies);
        }
    }

    /// Persist the graph; on failure restore the last durable snapshot
    fn save(&mut self) -> BuildResult<()> {
        if let Err(err) = self.store.save() {
            self.revert();
            return Err(err.into());
        }
        Ok(())
    }

    /// Revert after a failure that may have left fresh artifacts on disk
    ///
    /// The reloaded records may list outputs the failed run rewrote; those
    /// would look newer than their sources, so every output of a dirty
    /// source is deleted and the next build classifies it as modified.
    fn abandon(&mut self, invalidation: &Invalidation) {
        self.revert();

        let mut outputs = invalidation.stale_outputs.clone();
        for source in invalidation.dirty() {
            if let Some(recorded) = self.store.outputs(&source) {
                outputs.extend(recorded.iter().cloned());
            }
        }

        let removed = remove_outputs(&outputs);
        if removed > 0 {
            tracing::debug!(count = removed, "removed outputs of failed build");
        }
    }

    /// Discard in-memory changes by reloading the last snapshot
    fn revert(&mut self) {
        self.transition(BuildPhase::Reverting);
        if let Err(err) = self.store.load() {
            // An empty graph only costs a full rebuild
            tracing::error!("failed to reload graph snapshot: {}", err);
            self.store.clear();
        }
    }

    fn transition(&mut self, phase: BuildPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "build phase");
        self.phase = phase;
    }
}

fn resolve_output(output_dir: &Path, output: PathBuf) -> PathBuf {
    if output.is_relative() {
        output_dir.join(output)
    } else {
        output
    }
}

/// Delete output files, returning how many were actually removed
fn remove_outputs(outputs: &BTreeSet<PathBuf>) -> usize {
    let mut removed = 0;
    for output in outputs {
        match fs::remove_file(output) {
            Ok(()) => {
                tracing::debug!(output = %output.display(), "deleted output");
                removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(output = %output.display(), "failed to delete output: {}", e),
        }
    }
    removed
}
