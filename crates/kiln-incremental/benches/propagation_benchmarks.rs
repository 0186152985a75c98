//! Benchmarks for invalidation propagation
//!
//! These benchmarks measure how propagation scales with long dependency
//! chains, where a change to the root dirties every source.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kiln_graph::{GraphStore, Source};
use kiln_incremental::Propagator;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, SystemTime};

fn stamp(path: &Path, time: SystemTime) {
    fs::write(path, "x").unwrap();
    File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
}

/// Create N sources where source i depends on sources i-1 and i-2
fn generate_chain(dir: &Path, num_sources: usize) -> (GraphStore, BTreeSet<Source>) {
    let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    let mut store = GraphStore::new(dir.join("graph.json"));
    let mut current = BTreeSet::new();

    for i in 0..num_sources {
        let source = Source::new(dir.join(format!("S{}.scala", i)));
        let output = dir.join(format!("S{}.class", i));
        stamp(source.path(), base);
        stamp(&output, base + Duration::from_secs(1));

        let dependencies = (i.saturating_sub(2)..i)
            .map(|j| Source::new(dir.join(format!("S{}.scala", j))))
            .collect();
        store.update(source.clone(), BTreeSet::from([output]), dependencies);
        current.insert(source);
    }

    // Edit the root so the whole chain is invalidated
    stamp(&dir.join("S0.scala"), base + Duration::from_secs(10));
    (store, current)
}

fn bench_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation");

    for size in [100, 1_000] {
        let dir = tempfile::tempdir().unwrap();
        let (store, current) = generate_chain(dir.path(), size);

        group.bench_with_input(BenchmarkId::new("chain", size), &size, |b, _| {
            b.iter(|| {
                let mut scratch = store.clone();
                let invalidation = Propagator::new(&mut scratch)
                    .propagate(black_box(&current))
                    .unwrap();
                assert_eq!(invalidation.dirty().len(), size);
            })
        });
    }

    group.finish();
}

fn bench_reverse_index(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let (store, _) = generate_chain(dir.path(), 1_000);

    c.bench_function("reverse_index_1000", |b| {
        b.iter(|| black_box(store.reverse_index()))
    });
}

criterion_group!(benches, bench_propagation, bench_reverse_index);
criterion_main!(benches);
