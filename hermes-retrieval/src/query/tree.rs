//! Query tree, capability pass and flattened score plan
//!
//! The query layer hands over a small tree of weighted `combine` nodes over
//! term leaves. Before any posting is read the tree is checked for
//! delta-scoring capability and flattened into a list of leaves with their
//! effective weights; each leaf then becomes one [`ScoringCursor`].

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::index::PostingSource;
use crate::{DocId, Score};

use super::{Contribution, ScoringCursor, ScoringFunction, TermScoringCursor};

fn default_weight() -> f64 {
    1.0
}

fn default_norm() -> bool {
    true
}

/// Operator tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "lowercase")]
pub enum QueryNode {
    /// Scored term leaf
    Term {
        term: String,
        #[serde(default)]
        function: ScoringFunction,
    },
    /// Weighted sum of children
    Combine {
        children: Vec<WeightedChild>,
        /// Normalise child weights to sum to 1
        #[serde(default = "default_norm")]
        norm: bool,
    },
    /// Raw occurrence counts, not scoreable
    Count { term: String },
    /// Boolean presence, not scoreable
    Match { term: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedChild {
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub node: QueryNode,
}

/// What a leaf node can provide to the scoring loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoringCapability<'a> {
    Delta {
        term: &'a str,
        function: ScoringFunction,
    },
    Count {
        term: &'a str,
    },
    Boolean {
        term: &'a str,
    },
}

impl QueryNode {
    /// BM25-scored term
    pub fn term(term: impl Into<String>) -> Self {
        Self::scored_term(term, ScoringFunction::default())
    }

    pub fn scored_term(term: impl Into<String>, function: ScoringFunction) -> Self {
        QueryNode::Term {
            term: term.into(),
            function,
        }
    }

    /// Equally weighted, normalised combine
    pub fn combine(children: impl IntoIterator<Item = QueryNode>) -> Self {
        Self::weighted(children.into_iter().map(|node| (1.0, node)))
    }

    /// Normalised combine with explicit weights
    pub fn weighted(children: impl IntoIterator<Item = (f64, QueryNode)>) -> Self {
        QueryNode::Combine {
            children: children
                .into_iter()
                .map(|(weight, node)| WeightedChild { weight, node })
                .collect(),
            norm: true,
        }
    }

    /// Set the normalisation flag of a combine node (no-op on leaves)
    pub fn with_norm(mut self, value: bool) -> Self {
        if let QueryNode::Combine { norm, .. } = &mut self {
            *norm = value;
        }
        self
    }

    /// Capability of a leaf; `None` for combine nodes
    pub fn capability(&self) -> Option<ScoringCapability<'_>> {
        match self {
            QueryNode::Term { term, function } => Some(ScoringCapability::Delta {
                term,
                function: *function,
            }),
            QueryNode::Count { term } => Some(ScoringCapability::Count { term }),
            QueryNode::Match { term } => Some(ScoringCapability::Boolean { term }),
            QueryNode::Combine { .. } => None,
        }
    }
}

/// One flattened leaf with its effective weight
#[derive(Debug, Clone, PartialEq)]
pub struct LeafPlan {
    pub term: String,
    pub function: ScoringFunction,
    pub weight: f64,
}

/// Check capabilities and flatten `query` into weighted leaves.
///
/// With `share_nodes`, leaves with the same term and scoring function are
/// merged into the first occurrence, summing their weights.
pub fn flatten(query: &QueryNode, share_nodes: bool) -> Result<Vec<LeafPlan>> {
    let mut leaves = Vec::new();
    collect_leaves(query, 1.0, &mut leaves)?;

    if !share_nodes {
        return Ok(leaves);
    }

    let mut merged: Vec<LeafPlan> = Vec::with_capacity(leaves.len());
    let mut seen: FxHashMap<(String, (u8, u64, u64)), usize> = FxHashMap::default();
    for leaf in leaves {
        let key = (leaf.term.clone(), leaf.function.share_key());
        match seen.get(&key) {
            Some(&slot) => merged[slot].weight += leaf.weight,
            None => {
                seen.insert(key, merged.len());
                merged.push(leaf);
            }
        }
    }
    Ok(merged)
}

fn collect_leaves(node: &QueryNode, weight: f64, out: &mut Vec<LeafPlan>) -> Result<()> {
    match node {
        QueryNode::Combine { children, norm } => {
            if let Some(bad) = children.iter().find(|c| !c.weight.is_finite()) {
                return Err(Error::Configuration(format!(
                    "combine weight must be finite, got {}",
                    bad.weight
                )));
            }
            let total: f64 = children.iter().map(|c| c.weight).sum();
            if *norm && !children.is_empty() && total == 0.0 {
                return Err(Error::Configuration(
                    "normalised combine weights sum to zero".to_string(),
                ));
            }
            for child in children {
                let child_weight = if *norm {
                    weight * child.weight / total
                } else {
                    weight * child.weight
                };
                collect_leaves(&child.node, child_weight, out)?;
            }
            Ok(())
        }
        QueryNode::Term { term, function } => {
            function.validate()?;
            out.push(LeafPlan {
                term: term.clone(),
                function: *function,
                weight,
            });
            Ok(())
        }
        QueryNode::Count { term } => Err(Error::Configuration(format!(
            "count node '{term}' does not support delta scoring"
        ))),
        QueryNode::Match { term } => Err(Error::Configuration(format!(
            "match node '{term}' does not support delta scoring"
        ))),
    }
}

/// A cursor tagged with its position in the plan
pub(crate) struct Slot {
    pub index: usize,
    pub cursor: Box<dyn ScoringCursor>,
}

/// Flattened, immutable list of weighted cursors for one query execution
pub struct ScorePlan {
    cursors: Vec<Box<dyn ScoringCursor>>,
}

impl ScorePlan {
    /// Plan over already-weighted cursors
    pub fn new(cursors: Vec<Box<dyn ScoringCursor>>) -> Self {
        Self { cursors }
    }

    /// Resolve `query` against `source`: capability check and flattening
    /// first, then one cursor per leaf.
    pub fn build<S>(source: &S, query: &QueryNode, share_nodes: bool) -> Result<Self>
    where
        S: PostingSource + ?Sized,
    {
        let leaves = flatten(query, share_nodes)?;
        if leaves.is_empty() {
            return Ok(Self::new(Vec::new()));
        }

        let collection = source.collection_statistics()?;
        let mut cursors: Vec<Box<dyn ScoringCursor>> = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            let stats = source.term_statistics(&leaf.term)?;
            let postings = source.open_postings(&leaf.term)?;
            let scorer = leaf.function.resolve(&stats, &collection);
            cursors.push(Box::new(TermScoringCursor::new(
                leaf.term,
                postings,
                scorer,
                &stats,
                &collection,
                leaf.weight,
            )));
        }
        Ok(Self::new(cursors))
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    pub fn cursors(&self) -> &[Box<dyn ScoringCursor>] {
        &self.cursors
    }

    pub fn labels(&self) -> Vec<String> {
        self.cursors.iter().map(|c| c.label().to_string()).collect()
    }

    /// Largest score any document can reach
    pub fn aggregate_max_bound(&self) -> Score {
        self.cursors.iter().map(|c| c.maximum_weighted_score()).sum()
    }

    /// Smallest score any document can reach
    pub fn aggregate_min_bound(&self) -> Score {
        self.cursors.iter().map(|c| c.minimum_weighted_score()).sum()
    }

    /// Sync every cursor to `doc` and sum their contributions in plan order
    pub fn aggregate_at(&mut self, doc: DocId, doc_len: u32) -> Result<Score> {
        let mut total = 0.0;
        for cursor in self.cursors.iter_mut() {
            cursor.sync_to(doc)?;
            total += cursor.delta_score(doc, doc_len);
        }
        Ok(total)
    }

    pub(crate) fn into_slots(self) -> Vec<Slot> {
        self.cursors
            .into_iter()
            .enumerate()
            .map(|(index, cursor)| Slot { index, cursor })
            .collect()
    }
}

/// Per-slot contributions of the document being scored.
///
/// The total is always summed in slot order so every processing model
/// produces bit-identical scores for the same document.
pub(crate) struct SlotScores {
    values: Vec<Score>,
    labels: Vec<String>,
}

impl SlotScores {
    pub fn new(labels: Vec<String>) -> Self {
        Self {
            values: vec![0.0; labels.len()],
            labels,
        }
    }

    #[inline]
    pub fn set(&mut self, slot: usize, value: Score) {
        self.values[slot] = value;
    }

    /// Only meaningful once every slot was set for the current document
    #[inline]
    pub fn total(&self) -> Score {
        self.values.iter().sum()
    }

    pub fn contributions(&self) -> Vec<Contribution> {
        self.labels
            .iter()
            .zip(&self.values)
            .map(|(label, &score)| Contribution {
                label: label.clone(),
                score,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;
    use crate::structures::PostingList;

    fn index() -> MemoryIndex {
        let a: PostingList = [(0, 2), (3, 1)].into_iter().collect();
        let b: PostingList = [(1, 1), (3, 4)].into_iter().collect();
        MemoryIndex::builder()
            .lengths(vec![10, 12, 8, 20])
            .postings("a", a)
            .postings("b", b)
            .build()
    }

    #[test]
    fn test_flatten_normalises_weights() {
        let query = QueryNode::weighted([
            (3.0, QueryNode::term("a")),
            (1.0, QueryNode::combine([QueryNode::term("b"), QueryNode::term("c")])),
        ]);
        let leaves = flatten(&query, false).unwrap();
        let weights: Vec<f64> = leaves.iter().map(|l| l.weight).collect();
        assert_eq!(weights, vec![0.75, 0.125, 0.125]);
    }

    #[test]
    fn test_flatten_raw_weights() {
        let query = QueryNode::weighted([(2.0, QueryNode::term("a")), (0.5, QueryNode::term("b"))])
            .with_norm(false);
        let leaves = flatten(&query, false).unwrap();
        assert_eq!(leaves[0].weight, 2.0);
        assert_eq!(leaves[1].weight, 0.5);
    }

    #[test]
    fn test_share_nodes_merges_duplicates() {
        let query = QueryNode::weighted([
            (1.0, QueryNode::term("a")),
            (1.0, QueryNode::term("b")),
            (2.0, QueryNode::term("a")),
            (1.0, QueryNode::scored_term("a", ScoringFunction::dirichlet())),
        ])
        .with_norm(false);

        let shared = flatten(&query, true).unwrap();
        assert_eq!(shared.len(), 3);
        assert_eq!(shared[0].term, "a");
        assert_eq!(shared[0].weight, 3.0);
        assert_eq!(shared[2].function, ScoringFunction::dirichlet());

        assert_eq!(flatten(&query, false).unwrap().len(), 4);
    }

    #[test]
    fn test_capability_rejects_count_and_match() {
        let query = QueryNode::combine([
            QueryNode::term("a"),
            QueryNode::Count {
                term: "b".to_string(),
            },
        ]);
        match flatten(&query, true) {
            Err(Error::Configuration(message)) => assert!(message.contains("'b'"), "{message}"),
            other => panic!("expected configuration error, got {other:?}"),
        }

        let query = QueryNode::Match {
            term: "a".to_string(),
        };
        assert!(matches!(flatten(&query, true), Err(Error::Configuration(_))));
        assert_eq!(
            query.capability(),
            Some(ScoringCapability::Boolean { term: "a" })
        );
    }

    #[test]
    fn test_single_term_query_flattens() {
        let query = QueryNode::scored_term("a", ScoringFunction::dirichlet());
        assert_eq!(
            flatten(&query, false).unwrap(),
            vec![LeafPlan {
                term: "a".to_string(),
                function: ScoringFunction::dirichlet(),
                weight: 1.0,
            }]
        );

        let invalid = QueryNode::scored_term("a", ScoringFunction::Dirichlet { mu: -1.0 });
        assert!(matches!(flatten(&invalid, true), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_zero_weight_normalised_combine() {
        let query = QueryNode::weighted([(0.0, QueryNode::term("a"))]);
        assert!(matches!(flatten(&query, true), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_query_node_from_json() {
        let json = r#"{
            "operator": "combine",
            "children": [
                {"weight": 2.0, "node": {"operator": "term", "term": "a"}},
                {"node": {"operator": "term", "term": "b", "function": {"type": "dirichlet"}}}
            ]
        }"#;
        let query: QueryNode = serde_json::from_str(json).unwrap();
        let leaves = flatten(&query, true).unwrap();
        assert_eq!(leaves.len(), 2);
        assert!((leaves[0].weight - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(leaves[1].function, ScoringFunction::dirichlet());
    }

    #[test]
    fn test_plan_aggregation() {
        let index = index();
        let query = QueryNode::combine([QueryNode::term("a"), QueryNode::term("b")]);
        let mut plan = ScorePlan::build(&index, &query, true).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.labels(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(plan.aggregate_min_bound(), 0.0);

        let max = plan.aggregate_max_bound();
        let at_three = plan.aggregate_at(3, 20).unwrap();
        assert!(at_three > 0.0 && at_three <= max);

        // doc 2 matches nothing
        let mut plan = ScorePlan::build(&index, &query, true).unwrap();
        assert_eq!(plan.aggregate_at(2, 8).unwrap(), 0.0);
    }

    #[test]
    fn test_empty_query_builds_empty_plan() {
        let index = MemoryIndex::builder().build();
        let plan = ScorePlan::build(&index, &QueryNode::combine([]), true).unwrap();
        assert!(plan.is_empty());
    }
}
