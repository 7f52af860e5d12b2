use std::sync::mpsc;

use bridge_host::{
    method_table_fingerprint, ArgSpec, BridgeConfig, CapabilityRecord, Generation, GenerationTag,
};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use serde_json::json;

const BATCH: usize = 256;

fn generation() -> Generation {
    let generation = Generation::new(
        GenerationTag::new("bench").expect("tag"),
        &BridgeConfig::default(),
    )
    .expect("generation");
    let record = CapabilityRecord::builder("Echo")
        .sync_method("echo", [ArgSpec::any()], |args| {
            Ok(args.get(0).cloned().unwrap_or_default())
        })
        .promise_method("defer", [ArgSpec::integer()], |args, promise| {
            promise.resolve(args.get(0).cloned().unwrap_or_default())
        })
        .build()
        .expect("record");
    generation.register(record).expect("register");
    generation
}

fn run_batch(generation: &Generation, method: &str) {
    let (sender, receiver) = mpsc::channel();
    for idx in 0..BATCH {
        let resolved = sender.clone();
        let rejected = sender.clone();
        generation.invoke_with(
            "Echo",
            method,
            vec![json!(idx)],
            move |_| {
                let _ = resolved.send(true);
            },
            move |_| {
                let _ = rejected.send(false);
            },
        );
    }
    for _ in 0..BATCH {
        assert!(receiver.recv().expect("settled"));
    }
}

fn bench_dispatch(c: &mut Criterion) {
    let generation = generation();
    c.bench_function("dispatch_sync_batch", |b| {
        b.iter(|| run_batch(&generation, "echo"));
    });
    c.bench_function("dispatch_promise_batch", |b| {
        b.iter(|| run_batch(&generation, "defer"));
    });
    c.bench_function("dispatch_rejected_lookup", |b| {
        b.iter(|| {
            let (sender, receiver) = mpsc::channel();
            let rejected = sender.clone();
            generation.invoke_with(
                "Missing",
                "echo",
                vec![],
                move |_| {
                    let _ = sender.send(());
                },
                move |_| {
                    let _ = rejected.send(());
                },
            );
            receiver.recv().expect("settled");
        });
    });
}

fn bench_fingerprint(c: &mut Criterion) {
    let generation = generation();
    c.bench_function("method_table_fingerprint", |b| {
        b.iter_batched(
            || generation.method_table("Echo").expect("table"),
            |table| method_table_fingerprint(&table).expect("fingerprint"),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_dispatch, bench_fingerprint);
criterion_main!(benches);
