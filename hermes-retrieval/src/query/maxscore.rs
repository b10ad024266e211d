//! MaxScore processing with sentinel partitioning
//!
//! Cursors are ordered once by descending maximum difference. The first
//! `sentinel_index` of them (the sentinels) drive candidate discovery and are
//! always scored; the rest are scored only while the candidate's bound can
//! still beat the threshold. A document matched by no sentinel cannot beat
//! the threshold, so it is never visited.
//!
//! Reference: Turtle & Flood, "Query Evaluation: Strategies and
//! Optimizations" (IP&M 1995)

use std::cmp::Ordering;

use log::{debug, trace};

use crate::error::Result;
use crate::structures::TERMINATED;
use crate::{DocId, Score};

use super::collector::TopKHeap;
use super::context::{Execution, ExecutionContext, ExecutionStats};
use super::tree::{ScorePlan, Slot, SlotScores};

/// Split of the sorted cursor list into always-scored sentinels and the
/// score-while-promising tail.
#[derive(Debug, Clone)]
pub(crate) struct SentinelPartition {
    /// Maximum differences in descending order
    differences: Vec<Score>,
    /// Aggregate maximum bound
    starting_potential: Score,
    sentinel_index: usize,
}

impl SentinelPartition {
    pub fn new(differences: Vec<Score>, starting_potential: Score) -> Self {
        debug_assert!(differences.windows(2).all(|w| w[0] >= w[1]));
        let sentinel_index = differences.len();
        Self {
            differences,
            starting_potential,
            sentinel_index,
        }
    }

    #[inline]
    pub fn sentinel_index(&self) -> usize {
        self.sentinel_index
    }

    /// Shrink the sentinel set for a raised threshold.
    ///
    /// Walks the cursors from the largest difference down, removing each one's
    /// difference from the starting potential while the rest can still beat
    /// `threshold`. Returns whether the index changed.
    pub fn update(&mut self, threshold: Score) -> bool {
        let mut potential = self.starting_potential;
        let mut index = 0;
        while index < self.differences.len() && potential > threshold {
            potential -= self.differences[index];
            index += 1;
        }
        debug_assert!(
            index <= self.sentinel_index,
            "sentinel index grew from {} to {}",
            self.sentinel_index,
            index
        );
        let changed = index != self.sentinel_index;
        self.sentinel_index = index;
        changed
    }
}

/// MaxScore executor over one query's cursors
pub(crate) struct MaxScoreExecutor {
    /// Sorted by maximum difference, descending
    slots: Vec<Slot>,
    /// `suffix_max[i]` is the sum of the maximum scores of `slots[i..]`
    suffix_max: Vec<Score>,
    scores: SlotScores,
    partition: SentinelPartition,
}

impl MaxScoreExecutor {
    pub fn new(plan: ScorePlan) -> Self {
        let scores = SlotScores::new(plan.labels());
        let starting_potential = plan.aggregate_max_bound();

        let mut slots = plan.into_slots();
        slots.sort_by(|a, b| {
            b.cursor
                .maximum_difference()
                .partial_cmp(&a.cursor.maximum_difference())
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.index.cmp(&b.index))
        });

        let mut suffix_max = vec![0.0; slots.len() + 1];
        for i in (0..slots.len()).rev() {
            suffix_max[i] = suffix_max[i + 1] + slots[i].cursor.maximum_weighted_score();
        }

        let differences = slots
            .iter()
            .map(|s| s.cursor.maximum_difference())
            .collect();

        debug!(
            "Creating MaxScoreExecutor: num_cursors={}, starting_potential={:.4}",
            slots.len(),
            starting_potential
        );

        Self {
            slots,
            suffix_max,
            scores,
            partition: SentinelPartition::new(differences, starting_potential),
        }
    }

    /// Cursor-driven pass over the whole collection
    pub fn execute(mut self, ctx: &ExecutionContext<'_>) -> Result<Execution> {
        let num_cursors = self.slots.len();
        let mut heap = TopKHeap::new(ctx.limit);
        let mut stats = ExecutionStats::default();

        let mut threshold = heap.threshold();
        if threshold > Score::NEG_INFINITY {
            self.partition.update(threshold);
        }

        loop {
            let sentinels = self.partition.sentinel_index();
            let candidate = self.slots[..sentinels]
                .iter()
                .map(|s| s.cursor.current_candidate())
                .min()
                .unwrap_or(TERMINATED);
            if candidate == TERMINATED {
                break;
            }

            stats.candidates += 1;
            ctx.checkpoint(stats.candidates, stats.candidates)?;
            let doc_len = ctx.document_length(candidate)?;

            let mut accumulated = 0.0;
            for slot in &mut self.slots[..sentinels] {
                slot.cursor.sync_to(candidate)?;
                let contribution = slot.cursor.delta_score(candidate, doc_len);
                accumulated += contribution;
                self.scores.set(slot.index, contribution);
            }

            let complete = self.score_tail(sentinels, candidate, doc_len, accumulated, threshold)?;

            if complete {
                stats.fully_scored += 1;
                ctx.admit(&mut heap, candidate, &self.scores);
                let raised = heap.threshold();
                debug_assert!(raised >= threshold, "threshold decreased");
                if raised > threshold {
                    threshold = raised;
                    if self.partition.update(threshold) {
                        stats.sentinel_changes += 1;
                        trace!(
                            "Threshold {:.6}: sentinel index {} -> {}",
                            threshold,
                            sentinels,
                            self.partition.sentinel_index()
                        );
                    }
                }
            } else {
                stats.truncated += 1;
            }

            for slot in &mut self.slots[..sentinels] {
                slot.cursor.move_past(candidate)?;
            }
        }

        stats.final_sentinel_index = self.partition.sentinel_index();
        debug!(
            "MaxScoreExecutor completed: candidates={}, fully_scored={}, truncated={}, sentinel_changes={}, sentinel_index={}/{}",
            stats.candidates,
            stats.fully_scored,
            stats.truncated,
            stats.sentinel_changes,
            stats.final_sentinel_index,
            num_cursors
        );

        Ok(Execution {
            results: heap.drain(),
            stats,
        })
    }

    /// Score an externally supplied, ascending list of documents.
    ///
    /// Every listed document is a candidate; cursors are synced to it
    /// explicitly and scoring stops once the bound can no longer beat the
    /// threshold.
    pub fn execute_working_set(
        mut self,
        ctx: &ExecutionContext<'_>,
        working_set: &[DocId],
    ) -> Result<Execution> {
        debug_assert!(working_set.windows(2).all(|w| w[0] < w[1]));
        let mut heap = TopKHeap::new(ctx.limit);
        let mut stats = ExecutionStats::default();
        let mut threshold = heap.threshold();

        for &candidate in working_set {
            stats.candidates += 1;
            ctx.checkpoint(stats.candidates, stats.candidates)?;
            let doc_len = ctx.document_length(candidate)?;

            if self.score_tail(0, candidate, doc_len, 0.0, threshold)? {
                stats.fully_scored += 1;
                ctx.admit(&mut heap, candidate, &self.scores);
                let raised = heap.threshold();
                debug_assert!(raised >= threshold, "threshold decreased");
                threshold = raised;
            } else {
                stats.truncated += 1;
            }
        }

        stats.final_sentinel_index = self.partition.sentinel_index();
        debug!(
            "MaxScoreExecutor completed working set: size={}, fully_scored={}, truncated={}",
            working_set.len(),
            stats.fully_scored,
            stats.truncated
        );

        Ok(Execution {
            results: heap.drain(),
            stats,
        })
    }

    /// Score `slots[from..]` at `candidate` while the bound beats `threshold`.
    /// Returns whether every slot was scored.
    fn score_tail(
        &mut self,
        from: usize,
        candidate: DocId,
        doc_len: u32,
        mut accumulated: Score,
        threshold: Score,
    ) -> Result<bool> {
        for i in from..self.slots.len() {
            if accumulated + self.suffix_max[i] <= threshold {
                trace!(
                    "Doc {}: truncated at cursor {}/{}, bound={:.6}, threshold={:.6}",
                    candidate,
                    i,
                    self.slots.len(),
                    accumulated + self.suffix_max[i],
                    threshold
                );
                return Ok(false);
            }
            let slot = &mut self.slots[i];
            slot.cursor.sync_to(candidate)?;
            let contribution = slot.cursor.delta_score(candidate, doc_len);
            accumulated += contribution;
            self.scores.set(slot.index, contribution);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_starts_with_everything() {
        let partition = SentinelPartition::new(vec![0.5, 0.3, 0.2], 1.0);
        assert_eq!(partition.sentinel_index(), 3);
    }

    #[test]
    fn test_partition_shrinks_as_threshold_rises() {
        let mut partition = SentinelPartition::new(vec![0.5, 0.3, 0.2], 1.0);
        assert!(partition.update(0.3));
        assert_eq!(partition.sentinel_index(), 2);
        assert!(!partition.update(0.35));
        assert_eq!(partition.sentinel_index(), 2);
        assert!(partition.update(0.8));
        assert_eq!(partition.sentinel_index(), 1);
        assert!(partition.update(1.0));
        assert_eq!(partition.sentinel_index(), 0);
    }

    #[test]
    fn test_partition_infinite_threshold_has_no_sentinels() {
        let mut partition = SentinelPartition::new(vec![2.0, 1.0], 3.0);
        partition.update(Score::INFINITY);
        assert_eq!(partition.sentinel_index(), 0);
    }

    #[test]
    fn test_partition_with_negative_scores() {
        // log-probability style: bound starts below zero
        let mut partition = SentinelPartition::new(vec![3.0, 1.0], -10.0);
        assert!(!partition.update(-20.0));
        assert_eq!(partition.sentinel_index(), 2);
        partition.update(-12.0);
        assert_eq!(partition.sentinel_index(), 1);
    }
}
