//! # Secure Bridge Benchmarks
//!
//! | Path | Target |
//! |------|--------|
//! | Envelope creation | < 50µs |
//! | Envelope verification (MAC + replay insert) | < 50µs |
//! | Guarded call through the in-memory transport | < 100µs |
//! | Replay set pruning at capacity | < 1ms |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use ipc_security::{
    handler_fn, FrameCaller, HandlerRegistry, HandlerResult, InMemoryTransport, ManualClock,
    Nonce, ReplayGuard, ReplayGuardConfig, SecureChannelApi, SecurityConfig, SecurityGateway,
};

const T0: u64 = 1_700_000_000_000;

fn payload(fields: usize) -> Value {
    let map = (0..fields)
        .map(|i| (format!("field_{i}"), json!({"n": i, "s": "x".repeat(16)})))
        .collect();
    Value::Object(map)
}

fn gateway() -> (SecurityGateway, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let gateway = SecurityGateway::with_clock(SecurityConfig::default(), clock.clone())
        .expect("default config is valid");
    (gateway, clock)
}

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");
    group.measurement_time(Duration::from_secs(5));

    for fields in [1usize, 16, 128] {
        let (gateway, _clock) = gateway();
        let body = payload(fields);

        group.bench_with_input(BenchmarkId::new("create", fields), &body, |b, body| {
            b.iter(|| black_box(gateway.create_secure_message(body.clone())))
        });

        group.bench_with_input(BenchmarkId::new("verify", fields), &body, |b, body| {
            b.iter_batched(
                || gateway.create_secure_message(body.clone()).expect("live key"),
                |message| black_box(gateway.verify_message(message)),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_guarded_call(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let (gateway, _clock) = gateway();
    let transport = Arc::new(InMemoryTransport::new());
    let registry = gateway.secure_registry(transport.clone());
    registry.register_handler(
        "db:save-record",
        handler_fn(|args| async move { HandlerResult::Ok(args.into_iter().next().unwrap_or(Value::Null)) }),
    );
    registry.register_handler(
        "app:get-theme",
        handler_fn(|_| async { HandlerResult::Ok(json!("dark")) }),
    );
    let caller = FrameCaller::new("app://./index.html");

    let mut group = c.benchmark_group("guarded_call");

    group.bench_function("policed", |b| {
        b.iter_batched(
            || {
                gateway
                    .prepare_args("db:save-record", vec![payload(4)])
                    .expect("live key")
            },
            |args| {
                runtime.block_on(async {
                    black_box(transport.invoke(&caller, "db:save-record", args).await)
                })
            },
            criterion::BatchSize::SmallInput,
        )
    });

    group.bench_function("origin_only", |b| {
        b.iter(|| {
            runtime.block_on(async {
                black_box(transport.invoke(&caller, "app:get-theme", vec![]).await)
            })
        })
    });

    group.finish();
}

fn bench_replay_guard(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay_guard");

    for size in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("fill_and_prune", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let guard = ReplayGuard::new(ReplayGuardConfig {
                        max_entries: size,
                        ..ReplayGuardConfig::default()
                    });
                    for _ in 0..size {
                        guard
                            .check_and_record(T0, Nonce::random(), T0)
                            .expect("fresh nonce");
                    }
                    guard
                },
                |guard| black_box(guard.sweep(T0 + 60_000)),
                criterion::BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_envelope, bench_guarded_call, bench_replay_guard);
criterion_main!(benches);
