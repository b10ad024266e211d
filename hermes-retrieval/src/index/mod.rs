//! Index boundary consumed by the scoring core
//!
//! The retrieval core never reads an index format directly. It asks a
//! [`PostingSource`] for collection/term statistics (used once, when cursor
//! bounds are computed), for posting iterators, and for document lengths.
//! Implementations must tolerate concurrent readers: independent queries
//! share one source without locking.

mod memory;

pub use memory::{MemoryIndex, MemoryIndexBuilder};

use crate::Result;
use crate::structures::{DocumentLengths, PostingIterator};

/// Name of the document length part
pub const LENGTHS_PART: &str = "lengths";
/// Name of the postings part
pub const POSTINGS_PART: &str = "postings";

/// Collection-wide statistics used to derive static score bounds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollectionStatistics {
    pub document_count: u64,
    pub collection_length: u64,
    pub min_document_length: u32,
    pub max_document_length: u32,
}

impl CollectionStatistics {
    pub fn from_lengths(lengths: &DocumentLengths) -> Self {
        Self {
            document_count: lengths.len() as u64,
            collection_length: lengths.total(),
            min_document_length: lengths.min(),
            max_document_length: lengths.max(),
        }
    }

    pub fn average_document_length(&self) -> f64 {
        if self.document_count == 0 {
            0.0
        } else {
            self.collection_length as f64 / self.document_count as f64
        }
    }
}

/// Per-term statistics. Absent terms have all-zero statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TermStatistics {
    /// Number of documents containing the term
    pub document_frequency: u64,
    /// Total occurrences across the collection
    pub collection_frequency: u64,
    /// Largest count in any single document
    pub maximum_count: u32,
}

/// Read-only source of postings, statistics and lengths
pub trait PostingSource: Send + Sync {
    /// Collection statistics; fails with `MissingIndexPart` if lengths are absent.
    fn collection_statistics(&self) -> Result<CollectionStatistics>;

    /// Statistics for `term` (zeroed when the term does not occur).
    fn term_statistics(&self, term: &str) -> Result<TermStatistics>;

    /// Open a fresh iterator over `term`'s postings, `None` if the term does not occur.
    fn open_postings(&self, term: &str) -> Result<Option<Box<dyn PostingIterator>>>;

    /// Document lengths part.
    fn document_lengths(&self) -> Result<&DocumentLengths>;
}
