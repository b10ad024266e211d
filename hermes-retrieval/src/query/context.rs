//! Per-execution state shared by the processing models

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::trace;
use serde::{Deserialize, Serialize};

use crate::config::ResultLimit;
use crate::error::{Error, Result};
use crate::structures::DocumentLengths;
use crate::{DocId, Score};

use super::collector::{ScoredDocument, TopKHeap};
use super::tree::SlotScores;

/// Cooperative cancellation flag, cheap to clone across threads
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters describing how much work one execution did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Documents considered as candidates
    pub candidates: u64,
    /// Candidates with every cursor scored
    pub fully_scored: u64,
    /// Candidates abandoned once their bound fell to the threshold
    pub truncated: u64,
    /// Times the sentinel index was recomputed to a smaller value
    pub sentinel_changes: u64,
    pub final_sentinel_index: usize,
    /// Single-cursor advances issued by pivoting
    pub cursor_moves: u64,
}

/// Results and counters of one execution
#[derive(Debug, Clone, Default)]
pub struct Execution {
    pub results: Vec<ScoredDocument>,
    pub stats: ExecutionStats,
}

/// Read-only inputs of one execution
pub(crate) struct ExecutionContext<'a> {
    pub lengths: &'a DocumentLengths,
    pub limit: ResultLimit,
    pub annotate: bool,
    pub threshold_factor: f64,
    pub cancellation: Option<&'a CancellationToken>,
    pub cancel_check_interval: u32,
}

impl ExecutionContext<'_> {
    /// Fails with `Cancelled` on every `cancel_check_interval`-th step once
    /// the token is set.
    #[inline]
    pub fn checkpoint(&self, step: u64, candidates: u64) -> Result<()> {
        let interval = u64::from(self.cancel_check_interval);
        if interval == 0 || step % interval != 0 {
            return Ok(());
        }
        match self.cancellation {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled { candidates }),
            _ => Ok(()),
        }
    }

    /// Heap threshold scaled by `threshold_factor`.
    ///
    /// The factor scales the threshold's magnitude away from zero, so a factor
    /// above 1 always prunes harder, also for negative (log-probability)
    /// scores. Infinite thresholds pass through.
    #[inline]
    pub fn pruning_threshold(&self, heap_threshold: Score) -> Score {
        if !heap_threshold.is_finite() || self.threshold_factor == 1.0 {
            return heap_threshold;
        }
        heap_threshold + (self.threshold_factor - 1.0) * heap_threshold.abs()
    }

    #[inline]
    pub fn document_length(&self, doc: DocId) -> Result<u32> {
        self.lengths.length(doc)
    }

    /// Offer a fully scored document, attaching contributions when asked.
    pub fn admit(&self, heap: &mut TopKHeap, doc: DocId, slots: &SlotScores) -> bool {
        let score: Score = slots.total();
        if !heap.would_admit(doc, score) {
            trace!("Doc {doc}: score={score:.6} rejected");
            return false;
        }
        let mut document = ScoredDocument::new(doc, score);
        if self.annotate {
            document.annotation = Some(slots.contributions());
        }
        trace!("Doc {doc}: score={score:.6} admitted");
        heap.offer(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token_shared_between_clones() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_checkpoint_interval() {
        let lengths = DocumentLengths::new(vec![1]);
        let token = CancellationToken::new();
        token.cancel();
        let ctx = ExecutionContext {
            lengths: &lengths,
            limit: ResultLimit::Bounded(10),
            annotate: false,
            threshold_factor: 1.0,
            cancellation: Some(&token),
            cancel_check_interval: 4,
        };
        assert!(ctx.checkpoint(3, 3).is_ok());
        assert!(matches!(
            ctx.checkpoint(8, 5),
            Err(Error::Cancelled { candidates: 5 })
        ));

        let disabled = ExecutionContext {
            cancel_check_interval: 0,
            ..ctx
        };
        assert!(disabled.checkpoint(8, 8).is_ok());
    }

    #[test]
    fn test_pruning_threshold_scales_magnitude() {
        let lengths = DocumentLengths::new(vec![1]);
        let ctx = ExecutionContext {
            lengths: &lengths,
            limit: ResultLimit::Bounded(10),
            annotate: false,
            threshold_factor: 1.5,
            cancellation: None,
            cancel_check_interval: 0,
        };
        assert_eq!(ctx.pruning_threshold(2.0), 3.0);
        assert_eq!(ctx.pruning_threshold(-4.0), -2.0);
        assert_eq!(ctx.pruning_threshold(Score::NEG_INFINITY), Score::NEG_INFINITY);
        assert_eq!(ctx.pruning_threshold(Score::INFINITY), Score::INFINITY);
    }
}
