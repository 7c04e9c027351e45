//! Benchmark for the member registry and the lifecycle engine on top of it

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use redfish_emulator::registry::builtin;
use redfish_emulator::{EngineContext, LifecycleEngine, MemberRegistry, MemoryStore};
use std::sync::Arc;

fn bench_register_members(c: &mut Criterion) {
    let mut group = c.benchmark_group("member_registry");
    group.throughput(Throughput::Elements(1));

    group.bench_function("register_single_member", |b| {
        let registry = MemberRegistry::new();
        let mut counter = 0u64;

        b.iter(|| {
            counter += 1;
            let member = format!("/redfish/v1/Storage/S1/Volumes/V{}", counter);
            let _ = registry.register("Volume", black_box(member));
        });
    });

    group.finish();
}

fn bench_contains(c: &mut Criterion) {
    let mut group = c.benchmark_group("member_registry");
    group.throughput(Throughput::Elements(1));

    // Pre-register members
    let registry = MemberRegistry::new();
    for i in 0..1000 {
        let _ = registry.register("Volume", format!("/redfish/v1/Storage/S1/Volumes/V{:04}", i));
    }

    group.bench_function("contains", |b| {
        let mut counter = 0u64;
        b.iter(|| {
            counter += 1;
            let member = format!("/redfish/v1/Storage/S1/Volumes/V{:04}", counter % 1000);
            black_box(registry.contains("Volume", &member));
        });
    });

    group.finish();
}

fn bench_concurrent_creates(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");
    group.throughput(Throughput::Elements(100));

    let rt = tokio::runtime::Runtime::new().unwrap();
    let kind = Arc::new(builtin::volume().unwrap());

    group.bench_function("concurrent_100_creates", |b| {
        b.iter(|| {
            rt.block_on(async {
                let ctx = EngineContext::new(Arc::new(MemoryStore::new()), "/redfish/v1/");
                let engine = Arc::new(LifecycleEngine::new(kind.clone(), ctx));

                let mut handles = Vec::new();
                for i in 0..100 {
                    let engine = engine.clone();
                    handles.push(tokio::spawn(async move {
                        let parent = vec![format!("S{}", i % 4)];
                        let _ = engine.create_in_collection(&parent, None).await;
                    }));
                }
                for handle in handles {
                    let _ = handle.await;
                }
            });
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_register_members,
    bench_contains,
    bench_concurrent_creates,
);
criterion_main!(benches);
