//! Exhaustive document-at-a-time scoring
//!
//! Scores every document in the union of the cursors with no pruning. Slow,
//! but it is the reference every pruning model must agree with.

use log::debug;

use crate::DocId;
use crate::error::Result;
use crate::structures::TERMINATED;

use super::collector::TopKHeap;
use super::context::{Execution, ExecutionContext, ExecutionStats};
use super::tree::{ScorePlan, Slot, SlotScores};

pub(crate) struct ExhaustiveExecutor {
    slots: Vec<Slot>,
    scores: SlotScores,
}

impl ExhaustiveExecutor {
    pub fn new(plan: ScorePlan) -> Self {
        debug!("Creating ExhaustiveExecutor: num_cursors={}", plan.len());
        Self {
            scores: SlotScores::new(plan.labels()),
            slots: plan.into_slots(),
        }
    }

    pub fn execute(mut self, ctx: &ExecutionContext<'_>) -> Result<Execution> {
        let mut heap = TopKHeap::new(ctx.limit);
        let mut stats = ExecutionStats::default();

        loop {
            let candidate = self
                .slots
                .iter()
                .map(|s| s.cursor.current_candidate())
                .min()
                .unwrap_or(TERMINATED);
            if candidate == TERMINATED {
                break;
            }
            stats.candidates += 1;
            ctx.checkpoint(stats.candidates, stats.candidates)?;

            self.score(ctx, &mut heap, candidate)?;
            for slot in &mut self.slots {
                slot.cursor.move_past(candidate)?;
            }
        }

        Ok(self.finish(heap, stats))
    }

    pub fn execute_working_set(
        mut self,
        ctx: &ExecutionContext<'_>,
        working_set: &[DocId],
    ) -> Result<Execution> {
        let mut heap = TopKHeap::new(ctx.limit);
        let mut stats = ExecutionStats::default();

        for &candidate in working_set {
            stats.candidates += 1;
            ctx.checkpoint(stats.candidates, stats.candidates)?;
            self.score(ctx, &mut heap, candidate)?;
        }

        Ok(self.finish(heap, stats))
    }

    fn score(
        &mut self,
        ctx: &ExecutionContext<'_>,
        heap: &mut TopKHeap,
        candidate: DocId,
    ) -> Result<()> {
        let doc_len = ctx.document_length(candidate)?;
        for slot in &mut self.slots {
            slot.cursor.sync_to(candidate)?;
            let contribution = slot.cursor.delta_score(candidate, doc_len);
            self.scores.set(slot.index, contribution);
        }
        ctx.admit(heap, candidate, &self.scores);
        Ok(())
    }

    fn finish(self, heap: TopKHeap, mut stats: ExecutionStats) -> Execution {
        stats.fully_scored = stats.candidates;
        stats.final_sentinel_index = self.slots.len();
        debug!(
            "ExhaustiveExecutor completed: candidates={}, returned={}",
            stats.candidates,
            heap.len()
        );
        Execution {
            results: heap.drain(),
            stats,
        }
    }
}
