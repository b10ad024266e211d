//! Term scoring functions and their static bounds
//!
//! A [`ScoringFunction`] is what the query asks for (BM25 or Dirichlet with
//! its parameters). Resolving it against term and collection statistics
//! yields a [`TermScorer`] with the statistics folded in, ready to turn an
//! occurrence count and a document length into a score.

use serde::{Deserialize, Serialize};

use crate::Score;
use crate::error::{Error, Result};
use crate::index::{CollectionStatistics, TermStatistics};

/// BM25 k1 parameter - controls term frequency saturation
pub const BM25_K1: f64 = 1.2;

/// BM25 b parameter - controls length normalization
/// 0 = no length normalization, 1 = full normalization
pub const BM25_B: f64 = 0.75;

/// Dirichlet smoothing prior
pub const DIRICHLET_MU: f64 = 1500.0;

/// Collection frequency assumed for terms that never occur, so the
/// background probability stays positive.
const ABSENT_TERM_FREQUENCY: f64 = 0.5;

/// Compute IDF (Inverse Document Frequency) using BM25 variant
///
/// # Arguments
/// * `doc_freq` - Number of documents containing the term
/// * `total_docs` - Total number of documents in collection
#[inline]
pub fn bm25_idf(doc_freq: f64, total_docs: f64) -> f64 {
    ((total_docs - doc_freq + 0.5) / (doc_freq + 0.5) + 1.0).ln()
}

/// Compute BM25 score for a term occurrence
///
/// # Arguments
/// * `tf` - Term frequency in document
/// * `idf` - Inverse document frequency
/// * `doc_len` - Document length
/// * `avg_doc_len` - Average document length
#[inline]
pub fn bm25_score(tf: f64, idf: f64, doc_len: f64, avg_doc_len: f64, k1: f64, b: f64) -> f64 {
    if tf <= 0.0 {
        return 0.0;
    }
    let length_norm = 1.0 - b + b * (doc_len / avg_doc_len.max(1.0));
    let tf_norm = (tf * (k1 + 1.0)) / (tf + k1 * length_norm);
    idf * tf_norm
}

/// Dirichlet-smoothed query likelihood for a term occurrence
///
/// `background` is `mu * P(term | collection)`.
#[inline]
pub fn dirichlet_score(tf: f64, doc_len: f64, mu: f64, background: f64) -> f64 {
    ((tf + background) / (doc_len + mu)).ln()
}

/// Scoring function requested for a query term
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScoringFunction {
    Bm25 {
        #[serde(default = "default_k1")]
        k1: f64,
        #[serde(default = "default_b")]
        b: f64,
    },
    Dirichlet {
        #[serde(default = "default_mu")]
        mu: f64,
    },
}

fn default_k1() -> f64 {
    BM25_K1
}

fn default_b() -> f64 {
    BM25_B
}

fn default_mu() -> f64 {
    DIRICHLET_MU
}

impl Default for ScoringFunction {
    fn default() -> Self {
        Self::bm25()
    }
}

impl ScoringFunction {
    pub fn bm25() -> Self {
        ScoringFunction::Bm25 {
            k1: BM25_K1,
            b: BM25_B,
        }
    }

    pub fn dirichlet() -> Self {
        ScoringFunction::Dirichlet { mu: DIRICHLET_MU }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            ScoringFunction::Bm25 { k1, b } => {
                if !(k1.is_finite() && k1 >= 0.0) || !(0.0..=1.0).contains(&b) {
                    return Err(Error::Configuration(format!(
                        "invalid bm25 parameters k1={k1}, b={b}"
                    )));
                }
            }
            ScoringFunction::Dirichlet { mu } => {
                if !(mu.is_finite() && mu > 0.0) {
                    return Err(Error::Configuration(format!(
                        "invalid dirichlet parameter mu={mu}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Bit-exact identity used to detect shareable leaves
    pub(crate) fn share_key(&self) -> (u8, u64, u64) {
        match *self {
            ScoringFunction::Bm25 { k1, b } => (0, k1.to_bits(), b.to_bits()),
            ScoringFunction::Dirichlet { mu } => (1, mu.to_bits(), 0),
        }
    }

    /// Fold term and collection statistics into a ready-to-use scorer
    pub fn resolve(&self, term: &TermStatistics, collection: &CollectionStatistics) -> TermScorer {
        match *self {
            ScoringFunction::Bm25 { k1, b } => TermScorer::Bm25 {
                idf: bm25_idf(
                    term.document_frequency as f64,
                    collection.document_count as f64,
                ),
                k1,
                b,
                avg_doc_len: collection.average_document_length(),
            },
            ScoringFunction::Dirichlet { mu } => {
                let frequency = (term.collection_frequency as f64).max(ABSENT_TERM_FREQUENCY);
                let probability = frequency / (collection.collection_length.max(1) as f64);
                TermScorer::Dirichlet {
                    mu,
                    background: mu * probability,
                }
            }
        }
    }
}

/// Scoring function with term/collection statistics resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TermScorer {
    Bm25 {
        idf: f64,
        k1: f64,
        b: f64,
        avg_doc_len: f64,
    },
    Dirichlet {
        mu: f64,
        background: f64,
    },
}

impl TermScorer {
    /// Unweighted score for `count` occurrences in a document of `doc_len`
    #[inline]
    pub fn score(&self, count: u32, doc_len: u32) -> Score {
        match *self {
            TermScorer::Bm25 {
                idf,
                k1,
                b,
                avg_doc_len,
            } => bm25_score(count as f64, idf, doc_len as f64, avg_doc_len, k1, b),
            TermScorer::Dirichlet { mu, background } => {
                dirichlet_score(count as f64, doc_len as f64, mu, background)
            }
        }
    }

    /// Unweighted `(minimum, maximum)` score over every document.
    ///
    /// Both functions are monotone in count and in length, so the extremes
    /// lie on the corners of `[0, maximum_count] x [min_len, max_len]`.
    pub fn bounds(&self, maximum_count: u32, collection: &CollectionStatistics) -> (Score, Score) {
        let mut min = Score::INFINITY;
        let mut max = Score::NEG_INFINITY;
        for count in [0, maximum_count] {
            for len in [
                collection.min_document_length,
                collection.max_document_length,
            ] {
                let score = self.score(count, len);
                min = min.min(score);
                max = max.max(score);
            }
        }
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection() -> CollectionStatistics {
        CollectionStatistics {
            document_count: 100,
            collection_length: 1000,
            min_document_length: 2,
            max_document_length: 40,
        }
    }

    fn term(df: u64, cf: u64, max: u32) -> TermStatistics {
        TermStatistics {
            document_frequency: df,
            collection_frequency: cf,
            maximum_count: max,
        }
    }

    #[test]
    fn test_bm25_zero_count_scores_zero() {
        let scorer = ScoringFunction::bm25().resolve(&term(10, 30, 5), &collection());
        assert_eq!(scorer.score(0, 12), 0.0);
        assert!(scorer.score(3, 12) > scorer.score(1, 12));
        assert!(scorer.score(2, 5) > scorer.score(2, 30));
    }

    #[test]
    fn test_bm25_idf_is_positive() {
        assert!(bm25_idf(99.0, 100.0) > 0.0);
        assert!(bm25_idf(1.0, 100.0) > bm25_idf(50.0, 100.0));
    }

    #[test]
    fn test_bounds_enclose_all_scores() {
        let coll = collection();
        for function in [ScoringFunction::bm25(), ScoringFunction::dirichlet()] {
            let scorer = function.resolve(&term(10, 30, 5), &coll);
            let (min, max) = scorer.bounds(5, &coll);
            for count in 0..=5 {
                for len in coll.min_document_length..=coll.max_document_length {
                    let score = scorer.score(count, len);
                    assert!(score >= min && score <= max, "{function:?} {count} {len}");
                }
            }
        }
    }

    #[test]
    fn test_dirichlet_absent_term_is_finite() {
        let scorer = ScoringFunction::dirichlet().resolve(&term(0, 0, 0), &collection());
        let score = scorer.score(0, 10);
        assert!(score.is_finite());
        assert!(score < 0.0);
    }

    #[test]
    fn test_validate() {
        assert!(ScoringFunction::bm25().validate().is_ok());
        assert!(ScoringFunction::Bm25 { k1: 1.2, b: 1.5 }.validate().is_err());
        assert!(ScoringFunction::Dirichlet { mu: 0.0 }.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let function: ScoringFunction = serde_json::from_str(r#"{"type": "bm25"}"#).unwrap();
        assert_eq!(function, ScoringFunction::bm25());
        let function: ScoringFunction =
            serde_json::from_str(r#"{"type": "dirichlet", "mu": 2000.0}"#).unwrap();
        assert_eq!(function, ScoringFunction::Dirichlet { mu: 2000.0 });
    }
}
