//! Benchmarks for log redaction.
//!
//! Every API exchange is redacted and serialized before it reaches a sink, so
//! these paths run once per request and once per response.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;

use rustore_client::redact::{DEFAULT_MAX_LEN, format_for_log, format_response_text, redact};

/// A typical auth response body
fn auth_response_json() -> serde_json::Value {
    json!({
        "code": "OK",
        "message": null,
        "body": {
            "jwe": "eyJhbGciOiJSU0EtT0FFUC0yNTYiLCJlbmMiOiJBMjU2R0NNIn0.".repeat(8),
            "ttl": 900
        },
        "timestamp": "2024-01-15T10:30:00.123+03:00"
    })
}

/// A list response with `items` entries
fn list_response_json(items: usize) -> serde_json::Value {
    let content: Vec<_> = (0..items)
        .map(|i| {
            json!({
                "commentId": i,
                "userName": format!("user_{i}"),
                "commentText": "Works fine on my phone, thanks for the update",
                "commentStatus": "PUBLISHED",
                "appVersionName": "1.2.3",
            })
        })
        .collect();

    json!({ "code": "OK", "body": { "content": content, "pageSize": items } })
}

fn bench_redact_auth_response(c: &mut Criterion) {
    let value = auth_response_json();

    c.bench_function("redact_auth_response", |b| {
        b.iter(|| black_box(redact(black_box(&value))));
    });
}

fn bench_format_list_responses(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_response_text");

    for items in &[1, 10, 100] {
        #[allow(clippy::unwrap_used)]
        let body = serde_json::to_string(&list_response_json(*items)).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(items), items, |b, _| {
            b.iter(|| black_box(format_response_text(black_box(&body), DEFAULT_MAX_LEN)));
        });
    }

    group.finish();
}

fn bench_format_request_payload(c: &mut Criterion) {
    let body = json!({
        "appName": "Example",
        "appType": "MAIN",
        "categories": ["tools", "productivity"],
        "publicToken": "should-not-matter",
        "token": "hidden"
    });

    c.bench_function("format_for_log_request_body", |b| {
        b.iter(|| black_box(format_for_log(black_box(&body), DEFAULT_MAX_LEN)));
    });
}

criterion_group!(
    benches,
    bench_redact_auth_response,
    bench_format_list_responses,
    bench_format_request_payload
);
criterion_main!(benches);
