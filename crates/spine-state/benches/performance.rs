//! Performance benchmarks for spine-state operations.
//!
//! Run with: cargo bench --package spine-state

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use spine_state::{apply_at_path, deep_clone, produce, Path, Record, Seg, Value};

// ============================================================================
// Helper functions to generate test data
// ============================================================================

/// Generate a flat record with N fields
fn generate_flat_doc(num_fields: usize) -> Value {
    let mut record = Record::new();
    for i in 0..num_fields {
        record.insert(format!("field_{}", i), Value::from(i));
    }
    Value::from(record)
}

/// Generate a deeply nested record
fn generate_nested_doc(depth: usize) -> Value {
    let mut current = Value::record([("value", Value::from(42))]);
    for i in (0..depth).rev() {
        current = Value::record([(format!("level_{}", i), current)]);
    }
    current
}

/// Path to the innermost value of a nested doc
fn nested_path(depth: usize) -> Path {
    let mut path: Path = (0..depth).map(|i| Seg::Key(format!("level_{}", i))).collect();
    path.push(Seg::key("value"));
    path
}

/// Generate a wide tree: N branches, each a small record
fn generate_wide_doc(num_branches: usize) -> Value {
    Value::record((0..num_branches).map(|i| {
        (
            format!("branch_{}", i),
            Value::record([("id", Value::from(i)), ("tags", Value::list([Value::from("x")]))]),
        )
    }))
}

// ============================================================================
// Benchmark: produce on flat records
// ============================================================================

fn bench_produce_flat(c: &mut Criterion) {
    let mut group = c.benchmark_group("produce_flat_doc");

    for num_fields in [10, 100, 1000, 10000] {
        group.throughput(Throughput::Elements(num_fields as u64));
        let doc = generate_flat_doc(num_fields);
        let edits = num_fields / 10; // 10% of fields modified

        group.bench_with_input(BenchmarkId::from_parameter(num_fields), &edits, |b, &edits| {
            b.iter(|| {
                let result = produce(black_box(&doc), |draft| {
                    for i in 0..edits {
                        draft.set(format!("field_{}", i), i * 2);
                    }
                });
                black_box(result)
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: produce on deep paths
// ============================================================================

fn bench_produce_nested(c: &mut Criterion) {
    let mut group = c.benchmark_group("produce_nested_doc");

    for depth in [1, 5, 10, 20, 50] {
        let doc = generate_nested_doc(depth);
        let path = nested_path(depth);

        group.bench_with_input(BenchmarkId::from_parameter(depth), &path, |b, path| {
            b.iter(|| {
                let mut root = black_box(&doc).clone();
                black_box(apply_at_path(&mut root, path, Value::from(100), false));
                black_box(root)
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: one write in a wide tree vs a full deep copy
// ============================================================================

fn bench_wide_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("wide_doc_single_write");

    for branches in [100, 1000, 10000] {
        let doc = generate_wide_doc(branches);

        group.bench_with_input(BenchmarkId::new("produce", branches), &doc, |b, doc| {
            b.iter(|| {
                let result = produce(black_box(doc), |draft| {
                    draft.at("branch_0").at("tags").push("y").ok();
                });
                black_box(result)
            });
        });

        group.bench_with_input(BenchmarkId::new("deep_clone", branches), &doc, |b, doc| {
            b.iter(|| black_box(deep_clone(black_box(doc))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_produce_flat, bench_produce_nested, bench_wide_tree);
criterion_main!(benches);
