//! Score-bounded top-k query processing
//!
//! - `scoring`: BM25 / Dirichlet term scoring and static bounds
//! - `cursor`: delta-scoring cursors over postings or precomputed impacts
//! - `tree`: query tree, capability pass and flattened score plan
//! - `collector`: bounded top-k heap
//! - `maxscore`, `wand`, `exhaustive`: processing models
//! - `driver`: configuration-driven entry point

mod collector;
mod context;
mod cursor;
mod driver;
mod exhaustive;
mod maxscore;
mod scoring;
mod tree;
mod wand;

pub use collector::{BoundedHeap, Contribution, ScoredDocument, TopKHeap, ranking_order};
pub use context::{CancellationToken, Execution, ExecutionStats};
pub use cursor::{ImpactCursor, ScoringCursor, TermScoringCursor};
pub use driver::Retrieval;
pub use scoring::{
    BM25_B, BM25_K1, DIRICHLET_MU, ScoringFunction, TermScorer, bm25_idf, bm25_score,
    dirichlet_score,
};
pub use tree::{LeafPlan, QueryNode, ScorePlan, ScoringCapability, WeightedChild, flatten};
