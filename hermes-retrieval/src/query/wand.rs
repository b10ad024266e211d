//! WAND (Weak AND) processing with pivot selection
//!
//! Cursors are kept sorted by current candidate. Any document before the
//! pivot's candidate is matched only by cursors in front of the pivot, so
//! its score is bounded by their maxima plus everyone else's best
//! non-match contribution. The pivot is the first position where that bound
//! beats the threshold.
//!
//! Each iteration moves at most one cursor, then restores the ordering by
//! shifting only that cursor forward, so a step costs O(distance moved).
//!
//! Reference: Broder et al., "Efficient Query Evaluation using a Two-Level
//! Retrieval Process" (CIKM 2003)

use log::{debug, trace};

use crate::error::Result;
use crate::{DocId, Score};

use super::collector::TopKHeap;
use super::context::{Execution, ExecutionContext, ExecutionStats};
use super::tree::{ScorePlan, Slot, SlotScores};

/// WAND executor over one query's cursors
pub(crate) struct WandExecutor {
    /// Sorted by current candidate, ascending
    slots: Vec<Slot>,
    scores: SlotScores,
    /// Sum of every cursor's best non-match contribution
    unmatched_potential: Score,
}

impl WandExecutor {
    pub fn new(plan: ScorePlan) -> Self {
        let scores = SlotScores::new(plan.labels());
        let mut slots = plan.into_slots();
        slots.sort_by_key(|s| (s.cursor.current_candidate(), s.index));
        let unmatched_potential = slots
            .iter()
            .map(|s| s.cursor.maximum_unmatched_score())
            .sum();

        debug!(
            "Creating WandExecutor: num_cursors={}, unmatched_potential={:.4}",
            slots.len(),
            unmatched_potential
        );

        Self {
            slots,
            scores,
            unmatched_potential,
        }
    }

    pub fn execute(mut self, ctx: &ExecutionContext<'_>) -> Result<Execution> {
        let mut heap = TopKHeap::new(ctx.limit);
        let mut stats = ExecutionStats::default();
        let mut threshold = ctx.pruning_threshold(heap.threshold());
        let mut last_scored: Option<DocId> = None;
        let mut steps = 0u64;

        while let Some(pivot) = self.find_pivot(threshold) {
            steps += 1;
            ctx.checkpoint(steps, stats.candidates)?;

            let pivot_doc = self.slots[pivot].cursor.current_candidate();

            match last_scored.filter(|&last| pivot_doc <= last) {
                Some(last) => {
                    // Everything up to the pivot sits on an already scored doc
                    let advancing = self.pick_advancing(pivot + 1, |_| true);
                    self.slots[advancing].cursor.move_past(last)?;
                    stats.cursor_moves += 1;
                    self.shuffle_down(advancing);
                }
                None if self.slots[0].cursor.current_candidate() == pivot_doc => {
                    stats.candidates += 1;
                    stats.fully_scored += 1;
                    let doc_len = ctx.document_length(pivot_doc)?;
                    for slot in &mut self.slots {
                        slot.cursor.sync_to(pivot_doc)?;
                        let contribution = slot.cursor.delta_score(pivot_doc, doc_len);
                        self.scores.set(slot.index, contribution);
                    }
                    ctx.admit(&mut heap, pivot_doc, &self.scores);
                    last_scored = Some(pivot_doc);

                    let raised = ctx.pruning_threshold(heap.threshold());
                    debug_assert!(raised >= threshold, "threshold decreased");
                    if raised > threshold {
                        trace!("Doc {pivot_doc}: threshold {threshold:.6} -> {raised:.6}");
                        threshold = raised;
                    }
                }
                None => {
                    // Some cursor in front of the pivot lags behind pivot_doc
                    let advancing =
                        self.pick_advancing(pivot, |candidate| candidate < pivot_doc);
                    self.slots[advancing].cursor.sync_to(pivot_doc)?;
                    stats.cursor_moves += 1;
                    self.shuffle_down(advancing);
                }
            }
        }

        stats.final_sentinel_index = self.slots.len();
        debug!(
            "WandExecutor completed: scored={}, cursor_moves={}, steps={}, returned={}",
            stats.fully_scored,
            stats.cursor_moves,
            steps,
            heap.len()
        );

        Ok(Execution {
            results: heap.drain(),
            stats,
        })
    }

    /// First sorted position where the bound on documents before its
    /// candidate beats `threshold`; `None` once no document can qualify.
    fn find_pivot(&self, threshold: Score) -> Option<usize> {
        let mut bound = self.unmatched_potential;
        for (pos, slot) in self.slots.iter().enumerate() {
            if slot.cursor.is_done() {
                // sorted: everything from here on is exhausted
                return None;
            }
            bound += slot.cursor.maximum_difference();
            if bound > threshold {
                return Some(pos);
            }
        }
        None
    }

    /// Position in `slots[..end]` with the fewest entries among cursors whose
    /// candidate passes `eligible`. Ties go to the earlier position.
    fn pick_advancing(&self, end: usize, eligible: impl Fn(DocId) -> bool) -> usize {
        let mut best = 0;
        let mut best_entries = u64::MAX;
        for (pos, slot) in self.slots[..end].iter().enumerate() {
            let entries = slot.cursor.total_entries();
            if eligible(slot.cursor.current_candidate()) && entries < best_entries {
                best = pos;
                best_entries = entries;
            }
        }
        best
    }

    /// Move the cursor at `pos` right until the candidate order holds again
    fn shuffle_down(&mut self, mut pos: usize) {
        while pos + 1 < self.slots.len()
            && self.slots[pos].cursor.current_candidate()
                > self.slots[pos + 1].cursor.current_candidate()
        {
            self.slots.swap(pos, pos + 1);
            pos += 1;
        }
    }
}
