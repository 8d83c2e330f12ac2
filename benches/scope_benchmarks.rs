//! Benchmarks for the scope module: parsing, ancestor comparison, and
//! chain-building with and without the resolver's cache.

use authz_core::scope::{Scope, ScopeResolver};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::thread;

fn bench_scope_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("scope_parsing");

    let cases = vec![
        ("shallow", "acme"),
        ("medium", "acme.corp.eng.platform"),
        ("deep", "a.b.c.d.e.f.g.h.i.j"),
    ];

    for (name, raw) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), &raw, |b, &s| {
            b.iter(|| Scope::parse(black_box(s)).unwrap());
        });
    }

    group.finish();
}

fn bench_ancestor_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("ancestor_comparison");

    let parent = Scope::parse("acme.corp").unwrap();
    let descendant = Scope::parse("acme.corp.eng.platform.team1").unwrap();
    let sibling = Scope::parse("acme.sales").unwrap();

    group.bench_function("ancestor_match", |b| {
        b.iter(|| parent.is_ancestor_or_equal(black_box(&descendant)));
    });

    group.bench_function("ancestor_miss", |b| {
        b.iter(|| parent.is_ancestor_or_equal(black_box(&sibling)));
    });

    group.finish();
}

fn bench_chain_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_building");

    let cases = vec![
        ("depth_2", "acme.corp"),
        ("depth_4", "acme.corp.eng.platform"),
        ("depth_8", "a.b.c.d.e.f.g.h"),
        ("depth_16", "a.b.c.d.e.f.g.h.i.j.k.l.m.n.o.p"),
    ];

    for (name, raw) in cases {
        let scope = Scope::parse(raw).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &scope, |b, s| {
            b.iter(|| black_box(s).ancestor_chain());
        });
    }

    group.finish();
}

fn bench_resolver_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolver_cache");

    let resolver = ScopeResolver::new();
    let scope = Scope::parse("acme.corp.eng.platform").unwrap();
    resolver.ancestor_chain(&scope);

    group.bench_function("chain_cache_hit", |b| {
        b.iter(|| resolver.ancestor_chain(black_box(&scope)));
    });

    group.bench_function("chain_cache_miss", |b| {
        let mut counter = 0usize;
        b.iter(|| {
            let s = Scope::parse(&format!("acme.corp.dept{counter}")).unwrap();
            counter += 1;
            resolver.ancestor_chain(black_box(&s))
        });
    });

    group.finish();
}

fn bench_concurrent_chain_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_access");

    group.bench_function("parallel_chain_building", |b| {
        let resolver = Arc::new(ScopeResolver::new());
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let resolver = Arc::clone(&resolver);
                    thread::spawn(move || {
                        let scope = Scope::parse(&format!("acme.corp.dept{i}")).unwrap();
                        resolver.ancestor_chain(&scope);
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_scope_parsing,
    bench_ancestor_comparison,
    bench_chain_building,
    bench_resolver_cache,
    bench_concurrent_chain_building,
);
criterion_main!(benches);
