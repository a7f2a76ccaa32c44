// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks for response decoding and token estimation.
//!
//! These cover the CPU-bound parts of an assessment:
//! - Decoding `tools/list` bodies (plain JSON and SSE)
//! - Measuring and estimating schema size
//! - Masking and truncating diagnostics
//!
//! Run with: `cargo bench --bench estimator`

use std::collections::HashMap;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};

use mcp_assess::mcp::diagnostics::{mask_headers, truncate_body};
use mcp_assess::mcp::estimator::{estimate_tokens, schema_chars};
use mcp_assess::mcp::protocol::{decode_tools, RpcMessage};

fn tools(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "name": format!("tool_{}", i),
                "description": "Search the workspace for files matching a pattern and return their paths",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "pattern": {"type": "string", "description": "Glob pattern"},
                        "limit": {"type": "integer", "minimum": 1}
                    },
                    "required": ["pattern"]
                }
            })
        })
        .collect()
}

fn json_body(count: usize) -> String {
    json!({"jsonrpc": "2.0", "id": 2, "result": {"tools": tools(count)}}).to_string()
}

fn sse_body(count: usize) -> String {
    format!(
        "event: message\ndata: {}\n\nevent: message\ndata: {}\n\n",
        json!({"jsonrpc": "2.0", "method": "notifications/progress", "params": {"progress": 1}}),
        json_body(count)
    )
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_tools");

    for count in [5, 50, 500] {
        let plain = json_body(count);
        let sse = sse_body(count);
        group.throughput(Throughput::Bytes(plain.len() as u64));

        group.bench_with_input(BenchmarkId::new("json", count), &plain, |b, body| {
            b.iter(|| black_box(decode_tools(body)));
        });
        group.bench_with_input(BenchmarkId::new("sse", count), &sse, |b, body| {
            b.iter(|| black_box(decode_tools(body)));
        });
    }

    group.bench_function("parse_initialize", |b| {
        let line = r#"{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","serverInfo":{"name":"bench"}}}"#;
        b.iter(|| black_box(RpcMessage::parse(line)));
    });

    group.finish();
}

fn bench_estimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimate");

    for count in [5, 50, 500] {
        let tools = tools(count);
        group.bench_with_input(BenchmarkId::new("schema_chars", count), &tools, |b, tools| {
            b.iter(|| black_box(estimate_tokens(schema_chars(tools))));
        });
    }

    group.finish();
}

fn bench_diagnostics(c: &mut Criterion) {
    let mut group = c.benchmark_group("diagnostics");

    let mut headers = HashMap::new();
    headers.insert("authorization".to_string(), "Bearer sk-0123456789abcdef".to_string());
    headers.insert("x-api-key".to_string(), "short".to_string());
    headers.insert("content-type".to_string(), "application/json".to_string());
    headers.insert("accept".to_string(), "application/json, text/event-stream".to_string());

    group.bench_function("mask_headers", |b| {
        b.iter(|| black_box(mask_headers(&headers)));
    });

    let body = "x".repeat(10_000);
    group.bench_function("truncate_body", |b| {
        b.iter(|| black_box(truncate_body(&body)));
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_estimate, bench_diagnostics);
criterion_main!(benches);
