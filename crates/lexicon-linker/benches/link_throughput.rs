//! Link Throughput Benchmark
//!
//! Measures the cost of the cross-linking pass as the corpus grows.
//!
//! This benchmark tests:
//! - cross_link_corpus() for a new entry against corpora of 100 to 2,000 entries
//! - format() on a generated article
//! - linkify() of a single title into one body

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use lexicon_core::{Entry, Slug};
use lexicon_linker::{CorpusSnapshot, cross_link_corpus, format, linkify};
use rand::Rng;
use rand::seq::SliceRandom;

/// Words combined into entry titles
const WORDS: &[&str] = &[
    "container",
    "kernel",
    "scheduler",
    "network",
    "cache",
    "compiler",
    "parser",
    "index",
    "queue",
    "stream",
    "socket",
    "thread",
    "memory",
    "storage",
    "cluster",
    "proxy",
    "router",
    "codec",
    "lexer",
    "driver",
];

/// Sentence templates; `{}` is replaced by another entry's title
const SENTENCES: &[&str] = &[
    "The {} is often paired with other components.",
    "Most deployments configure the {} early on.",
    "A slow {} shows up quickly in latency graphs.",
    "Unlike the {}, this part keeps no state.",
    "Tuning the {} rarely pays off before profiling.",
];

fn title_for(i: usize) -> String {
    let first = WORDS[i % WORDS.len()];
    let second = WORDS[(i / WORDS.len()) % WORDS.len()];
    format!("{first} {second} {i}")
}

/// Generates an HTML body mentioning a few other titles
fn generate_body(rng: &mut impl Rng, titles: &[String]) -> String {
    let mut body = String::from("<h3>Overview</h3><p>");
    for _ in 0..rng.gen_range(3..8) {
        let sentence = SENTENCES.choose(rng).copied().unwrap_or("{}");
        let mention = titles.choose(rng).map(String::as_str).unwrap_or("nothing");
        body.push_str(&sentence.replace("{}", mention));
        body.push(' ');
    }
    body.push_str("</p>");
    body
}

fn setup_corpus(size: usize) -> (CorpusSnapshot, Entry) {
    let mut rng = rand::thread_rng();
    let titles: Vec<String> = (0..size).map(title_for).collect();

    let entries: Vec<Entry> = titles
        .iter()
        .map(|title| Entry::new(title, generate_body(&mut rng, &titles)).unwrap())
        .collect();
    let new_entry = entries[size / 2].clone();

    (CorpusSnapshot::new(entries), new_entry)
}

/// Benchmarks the full pass at various corpus sizes
fn corpus_pass_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("corpus_pass");
    group.sample_size(20);

    for size in [100, 500, 2000] {
        let (snapshot, new_entry) = setup_corpus(size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("entries", size), &size, |b, _| {
            b.iter(|| black_box(cross_link_corpus(&new_entry, &snapshot)))
        });
    }

    group.finish();
}

/// Benchmarks formatting of a generated article
fn format_benchmark(c: &mut Criterion) {
    let mut raw = String::from("Sure, here is the article.\n\n");
    for section in 1..=8 {
        raw.push_str(&format!("## {section}. Section {section}\n"));
        raw.push_str("Some **important** text with a [link](https://example.com).\n");
        raw.push_str("- first point\n- second point\n\n");
    }

    c.bench_function("format_article", |b| b.iter(|| black_box(format(&raw))));
}

/// Benchmarks linking one title into one long body
fn linkify_benchmark(c: &mut Criterion) {
    let body = "<p>The cache sits in front of storage. </p>".repeat(200);
    let slug = Slug::parse("cache").unwrap();

    c.bench_function("linkify_long_body", |b| {
        b.iter(|| black_box(linkify(&body, "cache", &slug).unwrap()))
    });
}

criterion_group!(
    benches,
    corpus_pass_benchmark,
    format_benchmark,
    linkify_benchmark
);
criterion_main!(benches);
