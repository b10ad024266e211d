//! Delta-scoring cursors
//!
//! A [`ScoringCursor`] walks one leaf's candidates in ascending doc order and
//! reports a weighted score contribution for whatever document it is asked
//! about. Static bounds let processing models decide when a cursor can be
//! skipped without changing the top-k.
//!
//! Contribution policy: a cursor asked about a document it does not match
//! contributes its zero-count score for that document's length. For BM25 and
//! impact cursors that is 0; for Dirichlet it is the smoothed background.

use crate::error::{Error, Result};
use crate::index::{CollectionStatistics, TermStatistics};
use crate::structures::{PostingIterator, TERMINATED};
use crate::{DocId, Score};

use super::TermScorer;

/// Common interface for delta-scoring cursors
pub trait ScoringCursor: Send {
    /// Next potential match, or [`TERMINATED`] once exhausted
    fn current_candidate(&self) -> DocId;

    fn is_done(&self) -> bool {
        self.current_candidate() == TERMINATED
    }

    /// Advance until `current_candidate() >= target`. Never rewinds.
    fn sync_to(&mut self, target: DocId) -> Result<()>;

    /// Advance until `current_candidate() > target`.
    fn move_past(&mut self, target: DocId) -> Result<()> {
        self.sync_to(target.saturating_add(1))
    }

    /// Whether the cursor is positioned exactly on `doc`
    fn has_match(&self, doc: DocId) -> bool {
        doc != TERMINATED && self.current_candidate() == doc
    }

    /// Weighted contribution for `doc`, which must be the document the
    /// cursor was last synced to.
    fn delta_score(&self, doc: DocId, doc_len: u32) -> Score;

    /// Lowest weighted contribution over any document
    fn minimum_weighted_score(&self) -> Score;

    /// Highest weighted contribution over any document
    fn maximum_weighted_score(&self) -> Score;

    /// Highest weighted contribution over documents the cursor does not match
    fn maximum_unmatched_score(&self) -> Score;

    /// Largest amount a match can add over the best non-match contribution.
    ///
    /// Constant for stateless scorers; stateful scorers may shrink it as they
    /// advance but must never grow it.
    fn maximum_difference(&self) -> Score {
        self.maximum_weighted_score() - self.maximum_unmatched_score()
    }

    /// Number of postings, used to pick which cursor to advance
    fn total_entries(&self) -> u64;

    /// Human-readable name used in annotations and logs
    fn label(&self) -> &str;
}

impl std::fmt::Debug for dyn ScoringCursor + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringCursor")
            .field("label", &self.label())
            .field("candidate", &self.current_candidate())
            .field("max", &self.maximum_weighted_score())
            .finish()
    }
}

fn weighted_bounds(weight: f64, min: Score, max: Score) -> (Score, Score) {
    let (a, b) = (weight * min, weight * max);
    (a.min(b), a.max(b))
}

/// Cursor over a term's postings scored with a resolved [`TermScorer`]
pub struct TermScoringCursor {
    label: String,
    /// `None` when the term does not occur in the collection
    postings: Option<Box<dyn PostingIterator>>,
    scorer: TermScorer,
    weight: f64,
    min_weighted: Score,
    max_weighted: Score,
    max_unmatched: Score,
    total_entries: u64,
}

impl TermScoringCursor {
    pub fn new(
        label: impl Into<String>,
        postings: Option<Box<dyn PostingIterator>>,
        scorer: TermScorer,
        term: &TermStatistics,
        collection: &CollectionStatistics,
        weight: f64,
    ) -> Self {
        let (min, max) = scorer.bounds(term.maximum_count, collection);
        let (min_weighted, max_weighted) = weighted_bounds(weight, min, max);
        let (_, max_unmatched) = weighted_bounds(
            weight,
            scorer.score(0, collection.max_document_length),
            scorer.score(0, collection.min_document_length),
        );
        let total_entries = postings
            .as_ref()
            .map(|p| p.doc_count() as u64)
            .unwrap_or(0);

        Self {
            label: label.into(),
            postings,
            scorer,
            weight,
            min_weighted,
            max_weighted,
            max_unmatched,
            total_entries,
        }
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

impl ScoringCursor for TermScoringCursor {
    #[inline]
    fn current_candidate(&self) -> DocId {
        self.postings.as_ref().map(|p| p.doc()).unwrap_or(TERMINATED)
    }

    fn sync_to(&mut self, target: DocId) -> Result<()> {
        if let Some(postings) = self.postings.as_mut() {
            let before = postings.doc();
            if before < target {
                let after = postings.seek(target)?;
                debug_assert!(after >= target, "cursor {} stopped short", self.label);
            }
        }
        Ok(())
    }

    #[inline]
    fn delta_score(&self, doc: DocId, doc_len: u32) -> Score {
        let count = match self.postings.as_ref() {
            Some(p) if p.doc() == doc && doc != TERMINATED => p.count(),
            _ => 0,
        };
        self.weight * self.scorer.score(count, doc_len)
    }

    #[inline]
    fn minimum_weighted_score(&self) -> Score {
        self.min_weighted
    }

    #[inline]
    fn maximum_weighted_score(&self) -> Score {
        self.max_weighted
    }

    #[inline]
    fn maximum_unmatched_score(&self) -> Score {
        self.max_unmatched
    }

    fn total_entries(&self) -> u64 {
        self.total_entries
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Cursor over precomputed per-document impacts
///
/// Impact-ordered indexes store a ready score per posting; documents without
/// an entry contribute 0.
pub struct ImpactCursor {
    label: String,
    entries: Vec<(DocId, Score)>,
    position: usize,
    weight: f64,
    min_weighted: Score,
    max_weighted: Score,
}

impl ImpactCursor {
    /// Entries must be sorted by strictly increasing doc id with finite impacts
    pub fn new(label: impl Into<String>, entries: Vec<(DocId, Score)>, weight: f64) -> Result<Self> {
        let label = label.into();
        if entries.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(Error::Configuration(format!(
                "impact cursor {label}: doc ids must be strictly increasing"
            )));
        }
        if entries
            .iter()
            .any(|&(doc, impact)| doc == TERMINATED || !impact.is_finite())
        {
            return Err(Error::Configuration(format!(
                "impact cursor {label}: invalid entry"
            )));
        }

        let min = entries.iter().map(|e| e.1).fold(0.0, Score::min);
        let max = entries.iter().map(|e| e.1).fold(0.0, Score::max);
        let (min_weighted, max_weighted) = weighted_bounds(weight, min, max);

        Ok(Self {
            label,
            entries,
            position: 0,
            weight,
            min_weighted,
            max_weighted,
        })
    }

    /// Declare a looser unweighted maximum than the largest stored impact,
    /// e.g. a bound precomputed at indexing time.
    pub fn with_maximum(mut self, maximum: Score) -> Result<Self> {
        let largest = self.entries.iter().map(|e| e.1).fold(0.0, Score::max);
        if !maximum.is_finite() || maximum < largest {
            return Err(Error::Configuration(format!(
                "impact cursor {}: declared maximum {maximum} below largest impact {largest}",
                self.label
            )));
        }
        let smallest = self.entries.iter().map(|e| e.1).fold(0.0, Score::min);
        (self.min_weighted, self.max_weighted) = weighted_bounds(self.weight, smallest, maximum);
        Ok(self)
    }
}

impl ScoringCursor for ImpactCursor {
    #[inline]
    fn current_candidate(&self) -> DocId {
        self.entries
            .get(self.position)
            .map(|e| e.0)
            .unwrap_or(TERMINATED)
    }

    fn sync_to(&mut self, target: DocId) -> Result<()> {
        let remaining = &self.entries[self.position.min(self.entries.len())..];
        self.position += remaining.partition_point(|e| e.0 < target);
        Ok(())
    }

    #[inline]
    fn delta_score(&self, doc: DocId, _doc_len: u32) -> Score {
        match self.entries.get(self.position) {
            Some(&(current, impact)) if current == doc => self.weight * impact,
            _ => 0.0,
        }
    }

    fn minimum_weighted_score(&self) -> Score {
        self.min_weighted
    }

    fn maximum_weighted_score(&self) -> Score {
        self.max_weighted
    }

    fn maximum_unmatched_score(&self) -> Score {
        0.0
    }

    fn total_entries(&self) -> u64 {
        self.entries.len() as u64
    }

    fn label(&self) -> &str {
        &self.label
    }
}
