//! Benchmark: exhaustive vs MaxScore vs WAND query processing
//!
//! Synthetic Zipf-like corpus; queries mix a few rare terms with common ones,
//! which is where score-bounded pruning pays off.
//!
//! Run: cargo bench --bench processing_models

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use hermes_retrieval::{
    MemoryIndex, PostingList, ProcessingModel, QueryNode, ResultLimit, Retrieval, RetrievalConfig,
    ScoringFunction,
};

const NUM_DOCS: u32 = 100_000;
const VOCAB_SIZE: usize = 2_000;

/// Simple LCG pseudo-random number generator (deterministic, no deps).
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }
    fn next_f64(&mut self) -> f64 {
        (self.next_u32() % 10000) as f64 / 10000.0
    }
}

/// Term `t` appears in roughly `NUM_DOCS / (t + 1)` documents
fn build_corpus(seed: u64) -> MemoryIndex {
    let mut rng = Rng::new(seed);
    let lengths: Vec<u32> = (0..NUM_DOCS).map(|_| 20 + rng.next_u32() % 400).collect();
    let mut lists: Vec<PostingList> = (0..VOCAB_SIZE).map(|_| PostingList::new()).collect();

    for doc in 0..NUM_DOCS {
        let num_terms = 10 + rng.next_u32() % 40;
        let mut terms: Vec<usize> = (0..num_terms)
            .map(|_| {
                let raw = rng.next_f64();
                ((raw * raw * raw) * VOCAB_SIZE as f64) as usize
            })
            .collect();
        terms.sort_unstable();
        terms.dedup();
        for term in terms {
            lists[term.min(VOCAB_SIZE - 1)].push(doc, 1 + rng.next_u32() % 6);
        }
    }

    let mut builder = MemoryIndex::builder().lengths(lengths);
    for (term, list) in lists.into_iter().enumerate() {
        builder = builder.postings(format!("w{term}"), list);
    }
    builder.build()
}

fn generate_queries(count: usize, seed: u64, function: ScoringFunction) -> Vec<QueryNode> {
    let mut rng = Rng::new(seed);
    (0..count)
        .map(|_| {
            let num_terms = 2 + rng.next_u32() % 5;
            QueryNode::combine((0..num_terms).map(|_| {
                let term = (rng.next_f64() * rng.next_f64() * VOCAB_SIZE as f64) as usize;
                QueryNode::scored_term(format!("w{term}"), function)
            }))
        })
        .collect()
}

fn bench_processing_models(c: &mut Criterion) {
    let index = build_corpus(42);
    let models = [
        ("exhaustive", ProcessingModel::Exhaustive),
        ("maxscore", ProcessingModel::MaxScore),
        ("wand", ProcessingModel::Wand),
    ];

    for (name, function) in [
        ("bm25", ScoringFunction::bm25()),
        ("dirichlet", ScoringFunction::dirichlet()),
    ] {
        let queries = generate_queries(20, 7, function);
        let mut group = c.benchmark_group(format!("processing_{name}"));
        group.sample_size(20);

        for k in [10usize, 100] {
            for (model_name, model) in models {
                let config = RetrievalConfig::default()
                    .with_processing_model(model)
                    .with_requested(ResultLimit::Bounded(k));
                let retrieval = Retrieval::new(&index, config).unwrap();
                group.bench_with_input(BenchmarkId::new(model_name, k), &queries, |b, queries| {
                    b.iter(|| {
                        for query in queries {
                            black_box(retrieval.execute(query).unwrap());
                        }
                    })
                });
            }
        }
        group.finish();
    }
}

criterion_group!(benches, bench_processing_models);
criterion_main!(benches);
