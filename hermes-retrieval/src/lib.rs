//! Hermes Retrieval - score-bounded top-k document retrieval
//!
//! Given a weighted query over posting cursors, this library returns the K
//! highest-scoring documents without fully scoring every candidate:
//! - Delta-scoring cursors reporting per-document contributions and static bounds
//! - Flattened score aggregation with weight normalisation and node sharing
//! - Bounded top-k heap whose minimum drives the pruning threshold
//! - MaxScore processing with sentinel (quorum) partitioning
//! - WAND processing with pivot selection and single-cursor advancement
//! - An exhaustive document-at-a-time baseline
//!
//! The on-disk index is outside this crate; [`index::MemoryIndex`] is a small
//! in-memory implementation of the [`index::PostingSource`] boundary.

pub mod config;
pub mod error;
pub mod index;
pub mod query;
pub mod structures;

pub use config::{ProcessingModel, ResultLimit, RetrievalConfig};
pub use error::{Error, Result};
pub use index::{
    CollectionStatistics, MemoryIndex, MemoryIndexBuilder, PostingSource, TermStatistics,
};
pub use query::{
    CancellationToken, Execution, ExecutionStats, ImpactCursor, QueryNode, Retrieval, ScorePlan,
    ScoredDocument, ScoringCursor, ScoringFunction, TermScoringCursor, TopKHeap,
};
pub use structures::{DocumentLengths, Posting, PostingIterator, PostingList, TERMINATED};

pub type DocId = u32;
pub type Score = f64;
