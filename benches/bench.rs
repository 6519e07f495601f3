//! Criterion benchmarks for the Satchel write and read paths.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use satchel::analysis::analyzer::Analyzer;
use satchel::analysis::analyzer::standard::StandardAnalyzer;
use satchel::config::IndexConfig;
use satchel::document::Document;
use satchel::index::Index;
use satchel::storage::memory::MemoryStorage;

const WORDS: [&str; 24] = [
    "water", "filter", "pump", "tablet", "purify", "boil", "stove", "fuel", "tent", "stake",
    "rope", "knot", "compass", "map", "north", "trail", "lantern", "battery", "shelter", "tarp",
    "blanket", "signal", "mirror", "whistle",
];

/// Generate deterministic documents of varying length.
fn generate_documents(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            let length = 30 + (i % 70);
            let content: Vec<&str> = (0..length)
                .map(|j| WORDS[(i * 7 + j * 13 + j / 3) % WORDS.len()])
                .collect();
            Document::builder(format!("doc{i:05}"))
                .title(format!("{} {}", WORDS[i % WORDS.len()], WORDS[(i / 3) % WORDS.len()]))
                .category(if i % 2 == 0 { "gear" } else { "skills" })
                .priority((i % 3) as u8)
                .content(content.join(" "))
                .build()
        })
        .collect()
}

fn memory_index() -> Index {
    Index::open_with_storage(
        Arc::new(MemoryStorage::new()),
        IndexConfig::default().with_sync_writes(false),
    )
    .unwrap()
}

fn bench_analysis(c: &mut Criterion) {
    let docs = generate_documents(100);
    let analyzer = StandardAnalyzer::new();

    let mut group = c.benchmark_group("analysis");
    group.throughput(Throughput::Elements(docs.len() as u64));
    group.bench_function("standard_analyzer_batch", |b| {
        b.iter(|| {
            for doc in &docs {
                black_box(analyzer.analyze_to_vec(&doc.content).unwrap());
            }
        })
    });
    group.finish();
}

fn bench_commit(c: &mut Criterion) {
    let docs = generate_documents(1_000);

    let mut group = c.benchmark_group("commit");
    group.sample_size(20);
    group.throughput(Throughput::Elements(docs.len() as u64));
    group.bench_function("add_and_commit_1000", |b| {
        b.iter(|| {
            let index = memory_index();
            for doc in &docs {
                index.add(doc.clone()).unwrap();
            }
            black_box(index.commit().unwrap());
        })
    });
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let index = memory_index();
    for chunk in generate_documents(5_000).chunks(1_000) {
        for doc in chunk {
            index.add(doc.clone()).unwrap();
        }
        index.commit().unwrap();
    }
    let searcher = index.searcher();

    let mut group = c.benchmark_group("search");
    for (name, query) in [
        ("term", "water"),
        ("and", "water AND filter"),
        ("or_not", "(compass OR map) NOT battery"),
        ("phrase", "\"filter pump\""),
        ("fielded", "category:gear priority:>=1 tent"),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(searcher.search(query, 10, 0).unwrap()))
        });
    }
    group.finish();

    let mut group = c.benchmark_group("merge");
    group.sample_size(10);
    group.bench_function("merge_5_segments", |b| {
        b.iter_batched(
            || {
                let index = memory_index();
                for chunk in generate_documents(2_500).chunks(500) {
                    for doc in chunk {
                        index.add(doc.clone()).unwrap();
                    }
                    index.commit().unwrap();
                }
                index
            },
            |index| black_box(index.merge_segments().unwrap()),
            criterion::BatchSize::LargeInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_analysis, bench_commit, bench_search);
criterion_main!(benches);
