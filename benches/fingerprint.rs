use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::collections::HashMap;
use tubeproxy::fingerprint::fingerprint;
use tubeproxy::request::SearchRequest;

fn typical_search() -> HashMap<String, String> {
    [
        ("part", "snippet"),
        ("q", "  Rust   Async  Runtime Internals "),
        ("type", "video"),
        ("order", "viewCount"),
        ("maxResults", "25"),
        ("regionCode", "IT"),
        ("relevanceLanguage", "en"),
        ("videoDuration", "medium"),
        ("key", "not-part-of-the-key"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn bench_fingerprint(c: &mut Criterion) {
    let params = SearchRequest::from_query(typical_search()).params();

    c.bench_function("fingerprint_search_params", |b| {
        b.iter(|| fingerprint(black_box(&params)))
    });

    c.bench_function("request_then_fingerprint", |b| {
        b.iter(|| {
            let request = SearchRequest::from_query(black_box(typical_search()));
            fingerprint(request.params())
        })
    });
}

criterion_group!(benches, bench_fingerprint);
criterion_main!(benches);
