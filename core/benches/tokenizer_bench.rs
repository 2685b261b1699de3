use criterion::{criterion_group, criterion_main, Criterion};
use linkrank_core::tokenizer::analyze;

const TEXT: &str = "Crawlers fetch pages breadth-first, respecting robots.txt and crawl delays. \
    The indexer turns each page into postings and document frequencies, while PageRank \
    walks the link graph until the summed change falls below the tolerance. Visit \
    https://example.com/docs?page=2 for the ranking notes on BM25 and score fusion.";

fn bench_analyze(c: &mut Criterion) {
    let text = TEXT.repeat(50);
    c.bench_function("analyze_paragraphs", |b| b.iter(|| analyze(&text)));
}

criterion_group!(benches, bench_analyze);
criterion_main!(benches);
