//! Benchmarks for payload validation and envelope parsing.
//!
//! Validation runs once per typed action on the dispatch path, so a full
//! message with several actions should stay well under a millisecond.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};

use herald_action::{envelope, validate, TypedAction};

/// Generate a valid typed action. The kind varies by index.
fn generate_action(index: usize) -> Value {
    match index % 4 {
        0 => json!({
            "type": "message",
            "payload": {
                "text": format!("Deployment {} finished without errors", index),
                "scope": "local",
                "privacy": "private",
                "target": {"chat_id": 1000 + index as i64, "message_id": index as i64}
            }
        }),
        1 => json!({
            "type": "event",
            "payload": {"name": "deploy", "parameters": {"env": "prod", "build": index}}
        }),
        2 => json!({
            "type": "command",
            "payload": {"name": "restart", "args": ["api", index]}
        }),
        _ => json!({
            "type": "memory",
            "payload": {"content": format!("Release notes for build {}", index), "tags": ["ops", "release"]}
        }),
    }
}

/// Generate an action with several problems, all of which are collected.
fn generate_invalid_action(index: usize) -> Value {
    json!({
        "type": "message",
        "payload": {
            "text": "",
            "scope": "galaxy",
            "privacy": index,
            "target": {"chat_id": "abc", "message_id": 1.5}
        }
    })
}

fn generate_envelope(actions: usize) -> String {
    let items: Vec<Value> = (0..actions)
        .map(|i| json!({"action": "message", "params": {"text": format!("line {}", i), "chat_id": i}}))
        .collect();
    json!({ "actions": items }).to_string()
}

fn bench_validation(c: &mut Criterion) {
    // Pre-generate inputs to exclude construction time from measurements.
    let valid: Vec<Value> = (0..1000).map(generate_action).collect();
    let invalid: Vec<Value> = (0..1000).map(generate_invalid_action).collect();

    let mut group = c.benchmark_group("schema_validation");
    group.sample_size(200);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("valid_single_action", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let report = validate(&valid[idx % valid.len()]);
            idx += 1;
            report
        });
    });

    group.bench_function("invalid_single_action", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let report = validate(&invalid[idx % invalid.len()]);
            idx += 1;
            report
        });
    });

    group.bench_function("typed_parse_single_action", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let parsed = TypedAction::parse(&valid[idx % valid.len()]);
            idx += 1;
            parsed
        });
    });

    group.finish();
}

fn bench_envelope(c: &mut Criterion) {
    let small = generate_envelope(5);
    let large = generate_envelope(100);

    let mut group = c.benchmark_group("envelope_parse");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("envelope_5_actions", |b| b.iter(|| envelope::parse(&small)));
    group.bench_function("envelope_100_actions", |b| b.iter(|| envelope::parse(&large)));

    group.finish();
}

criterion_group!(benches, bench_validation, bench_envelope);
criterion_main!(benches);
