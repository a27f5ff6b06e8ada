//! Performance benchmarks for tirea-form-state operations.
//!
//! Run with: cargo bench --package tirea-form-state

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};
use tirea_form_state::{apply_array_op, path, ArrayOp, MetaTrees, Path, Tree};

// ============================================================================
// Helper functions to generate test data
// ============================================================================

/// Generate a flat document with N fields
fn generate_flat_doc(num_fields: usize) -> Tree {
    let mut obj = serde_json::Map::new();
    for i in 0..num_fields {
        obj.insert(format!("field_{}", i), json!(i));
    }
    Tree::from(Value::Object(obj))
}

/// Generate a deeply nested document
fn generate_nested_doc(depth: usize) -> (Tree, Path) {
    let mut current = json!({"value": 42});
    let mut path = Path::root();
    for i in (0..depth).rev() {
        let mut obj = serde_json::Map::new();
        obj.insert(format!("level_{}", i), current);
        current = Value::Object(obj);
    }
    for i in 0..depth {
        path.push(format!("level_{}", i).into());
    }
    path.push("value".into());
    (Tree::from(current), path)
}

/// Generate a list of N row objects
fn generate_rows(len: usize) -> Tree {
    let rows: Vec<Value> = (0..len)
        .map(|i| json!({"name": format!("row {i}"), "qty": i}))
        .collect();
    Tree::from(json!({ "rows": rows }))
}

// ============================================================================
// Benchmarks
// ============================================================================

/// Copy-on-write set in a wide flat map
fn bench_set_flat(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_flat");

    for num_fields in [10, 100, 1000] {
        let doc = generate_flat_doc(num_fields);
        let target = path!(format!("field_{}", num_fields / 2));
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_fields),
            &num_fields,
            |b, _| b.iter(|| black_box(&doc).set(black_box(&target), Tree::from(7i64))),
        );
    }

    group.finish();
}

/// Get and set along deep paths
fn bench_nested(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested");

    for depth in [5, 20, 50] {
        let (doc, path) = generate_nested_doc(depth);
        group.bench_with_input(BenchmarkId::new("get", depth), &depth, |b, _| {
            b.iter(|| black_box(&doc).get(black_box(&path)).is_some())
        });
        group.bench_with_input(BenchmarkId::new("set", depth), &depth, |b, _| {
            b.iter(|| black_box(&doc).set(black_box(&path), Tree::from(1i64)))
        });
    }

    group.finish();
}

/// Path parsing in both notations
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    group.bench_function("dotted", |b| {
        b.iter(|| Path::parse(black_box("orders.12.lines.3.product.sku")))
    });
    group.bench_function("bracketed", |b| {
        b.iter(|| Path::parse(black_box("orders[12].lines[3].product.sku")))
    });

    group.finish();
}

/// Structural list edits with metadata remapping
fn bench_array_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_ops");

    for len in [10, 100, 1000] {
        let doc = generate_rows(len);
        let mut meta = MetaTrees::new();
        for i in (0..len).step_by(3) {
            meta.set_error(&path!("rows", i, "name"), "bad");
        }
        let ops = [
            ArrayOp::append(json!({"name": "new"})),
            ArrayOp::insert(0, json!({"name": "first"})),
            ArrayOp::remove(len / 2),
            ArrayOp::move_item(0, len - 1),
            ArrayOp::swap(0, len - 1),
        ];

        group.throughput(Throughput::Elements(len as u64));
        for op in &ops {
            group.bench_with_input(BenchmarkId::new(op.name(), len), &len, |b, _| {
                b.iter(|| {
                    let edit = apply_array_op(&doc, &path!("rows"), black_box(op))
                        .expect("rows is a list");
                    let mut meta = meta.clone();
                    if let Some(remap) = &edit.remap {
                        meta.remap(&path!("rows"), remap);
                    }
                    black_box((edit.tree, meta))
                })
            });
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_set_flat,
    bench_nested,
    bench_parse,
    bench_array_ops
);
criterion_main!(benches);
