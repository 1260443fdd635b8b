//! Benchmarks for the probing hot paths.
//!
//! - Display-name parsing and canonicalization
//! - Identity diff between requested and resolved names
//! - Uncached probes (fresh prober per iteration) against cached lookups

#[path = "../tests/common/mod.rs"]
mod common;

use criterion::{criterion_group, criterion_main, Criterion};
use dotprobe::{
    metadata::identity::AssemblyName,
    probe::{identity_difference, ModuleProber, ProberConfig},
};
use std::hint::black_box;

const REQUESTED: &str =
    "System.Runtime, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b03f5f7f11d50a3a";
const RESOLVED: &str =
    "System.Runtime, Version=8.0.0.0, Culture=neutral, PublicKeyToken=b03f5f7f11d50a3a";

fn bench_identity(c: &mut Criterion) {
    c.bench_function("assembly_name_parse", |b| {
        b.iter(|| AssemblyName::parse(black_box(REQUESTED)).unwrap());
    });

    c.bench_function("assembly_name_display", |b| {
        let name = AssemblyName::parse(REQUESTED).unwrap();
        b.iter(|| black_box(&name).display_name());
    });

    c.bench_function("identity_difference", |b| {
        b.iter(|| identity_difference(black_box(REQUESTED), black_box(RESOLVED)));
    });
}

fn bench_probe(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    for index in 0..8 {
        common::Assembly::new(&format!("Dep{index}")).write_to(dir.path(), &format!("Dep{index}.dll"));
    }
    let mut app = common::Assembly::new("App");
    for index in 0..8 {
        app = app.reference(&format!(
            "Dep{index}, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null"
        ));
    }
    let path = app.write_to(dir.path(), "App.exe");
    let path = path.to_string_lossy().into_owned();

    c.bench_function("probe_uncached", |b| {
        b.iter(|| {
            let prober = ModuleProber::new(ProberConfig::new());
            black_box(prober.probe(black_box(&path)))
        });
    });

    let prober = ModuleProber::new(ProberConfig::new());
    prober.probe(&path);
    c.bench_function("probe_cached", |b| {
        b.iter(|| black_box(prober.probe(black_box(&path))));
    });
}

criterion_group!(benches, bench_identity, bench_probe);
criterion_main!(benches);
