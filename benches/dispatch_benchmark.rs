//! Dispatch Performance Benchmarks for lazyinit
//!
//! This benchmark suite covers:
//!
//! 1. CLASSIFICATION:
//!    - Lookup of eligible, ignored and unknown names
//!
//! 2. ARGUMENT TRANSLATION:
//!    - Splitting raw argument strings
//!    - Namespacing and applying pairs to a parameter table
//!
//! 3. DISPATCH:
//!    - Requests for already-run components
//!    - A full boot, registration through the completion barrier
//!
//! Run with: cargo bench --bench dispatch_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use lazyinit::dispatch::LazyInit;
use lazyinit::params::{split_args, translate, ParamKind, ParamTable};
use lazyinit::policy::PolicyTables;
use lazyinit::registry::Registrar;

// ============================================================================
// TEST DATA GENERATORS
// ============================================================================

fn component_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("component_{:04}", i)).collect()
}

fn policy(names: &[String]) -> PolicyTables {
    PolicyTables::builder()
        .eligible(names.iter().cloned())
        .ignored(["zram", "zsmalloc"])
        .build()
}

fn boot(names: &[String]) -> LazyInit {
    let registrar = Registrar::new(policy(names));
    for name in names {
        registrar.register(name.clone(), || 0);
    }
    LazyInit::builder(registrar).reporter_enabled(false).build()
}

// ============================================================================
// BENCHMARKS
// ============================================================================

fn bench_classification(c: &mut Criterion) {
    let names = component_names(512);
    let tables = policy(&names);

    let mut group = c.benchmark_group("classification");
    group.bench_function("eligible", |b| {
        b.iter(|| tables.classify(black_box("component_0256")))
    });
    group.bench_function("ignored", |b| b.iter(|| tables.classify(black_box("zram"))));
    group.bench_function("unknown", |b| {
        b.iter(|| tables.classify(black_box("not_a_component")))
    });
    group.finish();
}

fn bench_arguments(c: &mut Criterion) {
    let table = ParamTable::new()
        .with("camera", "debug", ParamKind::Int)
        .with("camera", "mode", ParamKind::Str)
        .with("camera", "enable", ParamKind::Bool);

    let mut group = c.benchmark_group("arguments");
    for raw in [
        "debug=1",
        "debug=1,mode=fast enable",
        r#"debug=3 mode="a b c" enable=off unknown-flag=1"#,
    ] {
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::new("split", raw.len()), raw, |b, raw| {
            b.iter(|| split_args(black_box(raw)))
        });
        group.bench_with_input(BenchmarkId::new("translate", raw.len()), raw, |b, raw| {
            b.iter(|| translate("camera", black_box(raw), &table))
        });
    }
    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    let names = component_names(64);
    let core = boot(&names);
    core.dispatch(&names[0], None);
    group.bench_function("already_run", |b| {
        b.iter(|| core.dispatch(black_box(&names[0]), None))
    });

    for count in [16usize, 128, 512] {
        let names = component_names(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("full_boot", count), &names, |b, names| {
            b.iter(|| {
                let core = boot(names);
                for name in names {
                    core.dispatch(name, Some("debug=1"));
                }
                assert!(core.is_completed());
            })
        });
    }
    group.finish();
}

criterion_group!(
    dispatch_benches,
    bench_classification,
    bench_arguments,
    bench_dispatch
);
criterion_main!(dispatch_benches);
