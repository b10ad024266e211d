//! Retrieval driver
//!
//! Turns a query tree into a [`ScorePlan`], picks the processing model from
//! the configuration, runs it to exhaustion and returns the ranked results.
//! One execution is strictly sequential; independent queries run in
//! parallel through [`Retrieval::execute_batch`].

use log::{debug, warn};
use rayon::prelude::*;

use crate::config::{ProcessingModel, RetrievalConfig};
use crate::error::Result;
use crate::index::PostingSource;
use crate::DocId;

use super::collector::ScoredDocument;
use super::context::{CancellationToken, Execution, ExecutionContext};
use super::exhaustive::ExhaustiveExecutor;
use super::maxscore::MaxScoreExecutor;
use super::tree::{QueryNode, ScorePlan};
use super::wand::WandExecutor;

/// Query executor bound to one posting source and configuration
pub struct Retrieval<'a, S: PostingSource + ?Sized> {
    source: &'a S,
    config: RetrievalConfig,
    cancellation: Option<CancellationToken>,
}

impl<'a, S: PostingSource + ?Sized> Retrieval<'a, S> {
    pub fn new(source: &'a S, config: RetrievalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            cancellation: None,
        })
    }

    /// Abort executions with `Error::Cancelled` once `token` is set
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Top results for `query` over the whole collection
    pub fn execute(&self, query: &QueryNode) -> Result<Vec<ScoredDocument>> {
        Ok(self.execute_with_stats(query)?.results)
    }

    pub fn execute_with_stats(&self, query: &QueryNode) -> Result<Execution> {
        let plan = ScorePlan::build(self.source, query, self.config.share_nodes)?;
        self.execute_plan(plan)
    }

    /// Top results for `query` restricted to `working_set`.
    ///
    /// The set may be unsorted and contain duplicates; ids outside the
    /// collection are ignored.
    pub fn execute_working_set(
        &self,
        query: &QueryNode,
        working_set: &[DocId],
    ) -> Result<Vec<ScoredDocument>> {
        let plan = ScorePlan::build(self.source, query, self.config.share_nodes)?;
        Ok(self.execute_plan_working_set(plan, working_set)?.results)
    }

    /// Run a plan built elsewhere (e.g. over impact cursors)
    pub fn execute_plan(&self, plan: ScorePlan) -> Result<Execution> {
        self.run(plan, None)
    }

    pub fn execute_plan_working_set(
        &self,
        plan: ScorePlan,
        working_set: &[DocId],
    ) -> Result<Execution> {
        self.run(plan, Some(working_set))
    }

    /// Run independent queries in parallel, one task per query.
    ///
    /// Results are in query order; a failing query does not affect the others.
    pub fn execute_batch(&self, queries: &[QueryNode]) -> Vec<Result<Vec<ScoredDocument>>> {
        debug!("Executing batch: queries={}", queries.len());
        queries.par_iter().map(|query| self.execute(query)).collect()
    }

    fn run(&self, plan: ScorePlan, working_set: Option<&[DocId]>) -> Result<Execution> {
        let lengths = self.source.document_lengths()?;
        let model = self.config.processing_model;

        debug!(
            "Executing query: model={:?}, num_cursors={}, requested={:?}, max_bound={:.4}, working_set={:?}",
            model,
            plan.len(),
            self.config.requested,
            plan.aggregate_max_bound(),
            working_set.map(|w| w.len())
        );

        if plan.is_empty() {
            return Ok(Execution::default());
        }

        let ctx = ExecutionContext {
            lengths,
            limit: self.config.requested,
            annotate: self.config.annotate,
            threshold_factor: self.config.threshold_factor,
            cancellation: self.cancellation.as_ref(),
            cancel_check_interval: self.config.cancel_check_interval,
        };

        let execution = match working_set {
            None => match model {
                ProcessingModel::Exhaustive => ExhaustiveExecutor::new(plan).execute(&ctx)?,
                ProcessingModel::MaxScore => MaxScoreExecutor::new(plan).execute(&ctx)?,
                ProcessingModel::Wand => WandExecutor::new(plan).execute(&ctx)?,
            },
            Some(working_set) => {
                let working_set = normalize_working_set(working_set, lengths.len());
                match model {
                    ProcessingModel::Exhaustive => {
                        ExhaustiveExecutor::new(plan).execute_working_set(&ctx, &working_set)?
                    }
                    // Pivoting needs cursor-driven candidates; the working set
                    // already names them, so WAND uses the bounded loop too.
                    ProcessingModel::MaxScore | ProcessingModel::Wand => {
                        MaxScoreExecutor::new(plan).execute_working_set(&ctx, &working_set)?
                    }
                }
            }
        };

        debug!(
            "Query completed: returned={}, top_score={:?}, stats={:?}",
            execution.results.len(),
            execution.results.first().map(|d| d.score),
            execution.stats
        );
        Ok(execution)
    }
}

/// Sort, deduplicate and drop ids past the end of the collection
fn normalize_working_set(working_set: &[DocId], num_docs: usize) -> Vec<DocId> {
    let mut docs = working_set.to_vec();
    docs.sort_unstable();
    docs.dedup();
    let in_range = docs.partition_point(|&doc| (doc as usize) < num_docs);
    if in_range < docs.len() {
        warn!(
            "Ignoring {} working set ids outside the collection of {} documents",
            docs.len() - in_range,
            num_docs
        );
        docs.truncate(in_range);
    }
    docs
}
