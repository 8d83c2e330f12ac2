//! Decision engine benchmarks: cold vs. warm cache, and catalog size
//! sensitivity.

use authz_core::catalog::PolicyCatalog;
use authz_core::engine::{DecisionEngine, EngineConfig};
use authz_core::expr::Engine as ExprEngine;
use authz_core::policy::parse_document;
use authz_core::types::{Attributes, CheckRequest, Principal, Resource};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn policy_document(index: usize) -> String {
    let effect = if index % 2 == 0 { "allow" } else { "deny" };
    format!(
        "apiVersion: authz/v1\nkind: ResourcePolicy\nmetadata:\n  name: policy-{index}\nspec:\n  resource: document-{bucket}\n  rules:\n    - actions: [\"read\"]\n      effect: {effect}\n",
        index = index,
        bucket = index % 100,
        effect = effect,
    )
}

fn build_engine(policy_count: usize, enable_cache: bool) -> DecisionEngine {
    let catalog = Arc::new(PolicyCatalog::new());
    let expr_engine = ExprEngine::new();
    let docs: Vec<_> = (0..policy_count)
        .map(|i| parse_document(&policy_document(i)).unwrap())
        .collect();
    catalog.replace_all(&docs, &expr_engine).unwrap();

    DecisionEngine::new(
        EngineConfig {
            enable_cache,
            ..EngineConfig::default()
        },
        catalog,
    )
}

fn sample_request() -> CheckRequest {
    CheckRequest {
        request_id: "bench".to_string(),
        principal: Principal::new("user:alice"),
        resource: Resource::new("document-0", "sensitive-123"),
        actions: vec!["read".to_string()],
        aux_data: Attributes::new(),
    }
}

fn bench_check_cold_cache(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("check_cold_cache");

    for policy_count in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("policies", policy_count), &policy_count, |b, &count| {
            let engine = build_engine(count, false);
            let request = sample_request();

            b.to_async(&rt).iter(|| async {
                let response = engine.check(black_box(&request)).await.unwrap();
                black_box(response);
            });
        });
    }

    group.finish();
}

fn bench_check_warm_cache(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("check_warm_cache");

    for policy_count in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("policies", policy_count), &policy_count, |b, &count| {
            let engine = build_engine(count, true);
            let request = sample_request();

            rt.block_on(async {
                engine.check(&request).await.unwrap();
            });

            b.to_async(&rt).iter(|| async {
                let response = engine.check(black_box(&request)).await.unwrap();
                black_box(response);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_check_cold_cache, bench_check_warm_cache);
criterion_main!(benches);
