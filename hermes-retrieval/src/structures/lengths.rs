//! Per-document lengths
//!
//! Scoring functions normalise by document length, so every candidate's
//! length is looked up once and passed explicitly into each cursor.

use crate::DocId;
use crate::error::{Error, Result};

/// Dense document lengths indexed by doc id
#[derive(Debug, Clone, Default)]
pub struct DocumentLengths {
    lengths: Vec<u32>,
    total: u64,
    min: u32,
    max: u32,
}

impl DocumentLengths {
    pub fn new(lengths: Vec<u32>) -> Self {
        let total = lengths.iter().map(|&l| l as u64).sum();
        let min = lengths.iter().copied().min().unwrap_or(0);
        let max = lengths.iter().copied().max().unwrap_or(0);
        Self {
            lengths,
            total,
            min,
            max,
        }
    }

    /// Length of `doc`. Documents outside the recorded range are a storage fault.
    #[inline]
    pub fn length(&self, doc: DocId) -> Result<u32> {
        self.lengths.get(doc as usize).copied().ok_or_else(|| {
            Error::Storage(format!(
                "no length recorded for document {doc} ({} documents)",
                self.lengths.len()
            ))
        })
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Sum of all lengths (collection length)
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn average(&self) -> f64 {
        if self.lengths.is_empty() {
            0.0
        } else {
            self.total as f64 / self.lengths.len() as f64
        }
    }
}
