//! Top-k collection
//!
//! [`BoundedHeap`] is a min-heap parameterised by a comparator closure: the
//! element the comparator ranks lowest sits at the root and is the eviction
//! candidate. [`TopKHeap`] specialises it for [`ScoredDocument`]s and exposes
//! the pruning threshold.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::config::ResultLimit;
use crate::{DocId, Score};

/// One cursor's share of a document score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub label: String,
    pub score: Score,
}

/// Scored result handed back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: DocId,
    pub score: Score,
    /// 1-based position in the final ranking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Vec<Contribution>>,
}

impl ScoredDocument {
    pub fn new(document: DocId, score: Score) -> Self {
        Self {
            document,
            score,
            rank: None,
            annotation: None,
        }
    }
}

/// Ranking order: higher score first, lower doc id first on ties
pub fn ranking_order(a: &ScoredDocument, b: &ScoredDocument) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.document.cmp(&b.document))
}

/// Heap order: `Less` means "worse", i.e. evicted first
fn worse_first(a: &ScoredDocument, b: &ScoredDocument) -> Ordering {
    ranking_order(b, a)
}

/// Min-heap with optional capacity and a caller-supplied ordering.
///
/// `compare(a, b) == Less` means `a` ranks below `b`.
pub struct BoundedHeap<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    items: Vec<T>,
    /// `None` never evicts
    capacity: Option<usize>,
    compare: C,
}

impl<T, C> BoundedHeap<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    pub fn new(limit: ResultLimit, compare: C) -> Self {
        let capacity = match limit {
            ResultLimit::Bounded(k) => Some(k),
            ResultLimit::Unbounded => None,
        };
        // Cap initial allocation for very large k
        let initial = capacity.unwrap_or(64).saturating_add(1).min(1 << 16);
        Self {
            items: Vec::with_capacity(initial),
            capacity,
            compare,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Whether the next admission has to evict
    #[inline]
    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|k| self.items.len() >= k)
    }

    /// Lowest-ranked element
    #[inline]
    pub fn peek_min(&self) -> Option<&T> {
        self.items.first()
    }

    /// Whether `item` would be admitted by [`offer`](Self::offer)
    pub fn would_admit(&self, item: &T) -> bool {
        match self.capacity {
            None => true,
            Some(0) => false,
            Some(k) if self.items.len() < k => true,
            Some(_) => self
                .items
                .first()
                .is_some_and(|min| (self.compare)(item, min) == Ordering::Greater),
        }
    }

    /// Insert if there is room or `item` outranks the current minimum.
    /// Returns whether it was admitted.
    pub fn offer(&mut self, item: T) -> bool {
        if !self.would_admit(&item) {
            return false;
        }
        if self.is_full() {
            self.items[0] = item;
            self.sift_down(0);
        } else {
            self.items.push(item);
            self.sift_up(self.items.len() - 1);
        }
        true
    }

    /// Elements ordered best first
    pub fn into_sorted_vec(self) -> Vec<T> {
        let compare = self.compare;
        let mut items = self.items;
        items.sort_by(|a, b| compare(b, a));
        items
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if (self.compare)(&self.items[pos], &self.items[parent]) == Ordering::Less {
                self.items.swap(pos, parent);
                pos = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut smallest = left;
            if right < len
                && (self.compare)(&self.items[right], &self.items[left]) == Ordering::Less
            {
                smallest = right;
            }
            if (self.compare)(&self.items[smallest], &self.items[pos]) == Ordering::Less {
                self.items.swap(pos, smallest);
                pos = smallest;
            } else {
                break;
            }
        }
    }
}

type DocumentOrder = fn(&ScoredDocument, &ScoredDocument) -> Ordering;

/// Top-k heap of scored documents
pub struct TopKHeap {
    heap: BoundedHeap<ScoredDocument, DocumentOrder>,
}

impl TopKHeap {
    pub fn new(limit: ResultLimit) -> Self {
        Self {
            heap: BoundedHeap::new(limit, worse_first as DocumentOrder),
        }
    }

    /// Score a candidate must beat to be admitted.
    ///
    /// `+inf` when nothing can ever be admitted (K = 0), the minimum score
    /// once K documents are held, `-inf` otherwise (including unbounded).
    #[inline]
    pub fn threshold(&self) -> Score {
        match self.heap.capacity() {
            Some(0) => Score::INFINITY,
            Some(_) if self.heap.is_full() => self
                .heap
                .peek_min()
                .map(|d| d.score)
                .unwrap_or(Score::NEG_INFINITY),
            _ => Score::NEG_INFINITY,
        }
    }

    /// Cheap pre-check before building an annotated document
    #[inline]
    pub fn would_admit(&self, document: DocId, score: Score) -> bool {
        self.heap.would_admit(&ScoredDocument::new(document, score))
    }

    pub fn offer(&mut self, document: ScoredDocument) -> bool {
        self.heap.offer(document)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Results best first with 1-based ranks assigned
    pub fn drain(self) -> Vec<ScoredDocument> {
        let mut results = self.heap.into_sorted_vec();
        for (i, doc) in results.iter_mut().enumerate() {
            doc.rank = Some(i as u32 + 1);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_top_k() {
        let mut heap = TopKHeap::new(ResultLimit::Bounded(3));
        for (doc, score) in [(0, 1.0), (1, 5.0), (2, 3.0), (3, 4.0), (4, 2.0)] {
            heap.offer(ScoredDocument::new(doc, score));
        }
        let results = heap.drain();
        let docs: Vec<DocId> = results.iter().map(|d| d.document).collect();
        assert_eq!(docs, vec![1, 3, 2]);
        let ranks: Vec<Option<u32>> = results.iter().map(|d| d.rank).collect();
        assert_eq!(ranks, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_threshold_progression() {
        let mut heap = TopKHeap::new(ResultLimit::Bounded(2));
        assert_eq!(heap.threshold(), Score::NEG_INFINITY);
        heap.offer(ScoredDocument::new(0, 1.0));
        assert_eq!(heap.threshold(), Score::NEG_INFINITY);
        heap.offer(ScoredDocument::new(1, 2.0));
        assert_eq!(heap.threshold(), 1.0);
        heap.offer(ScoredDocument::new(2, 3.0));
        assert_eq!(heap.threshold(), 2.0);
        // ties with the minimum are rejected in doc order
        assert!(!heap.offer(ScoredDocument::new(3, 2.0)));
        assert_eq!(heap.threshold(), 2.0);
    }

    #[test]
    fn test_k_zero_rejects_everything() {
        let mut heap = TopKHeap::new(ResultLimit::Bounded(0));
        assert_eq!(heap.threshold(), Score::INFINITY);
        assert!(!heap.offer(ScoredDocument::new(0, 100.0)));
        assert!(heap.drain().is_empty());
    }

    #[test]
    fn test_unbounded_never_evicts() {
        let mut heap = TopKHeap::new(ResultLimit::Unbounded);
        for doc in 0..500 {
            assert!(heap.offer(ScoredDocument::new(doc, (doc % 7) as f64)));
            assert_eq!(heap.threshold(), Score::NEG_INFINITY);
        }
        assert_eq!(heap.len(), 500);
    }

    #[test]
    fn test_drain_breaks_ties_by_doc_id() {
        let mut heap = TopKHeap::new(ResultLimit::Unbounded);
        for doc in [9, 3, 7, 1] {
            heap.offer(ScoredDocument::new(doc, 1.5));
        }
        heap.offer(ScoredDocument::new(5, 2.0));
        let docs: Vec<DocId> = heap.drain().iter().map(|d| d.document).collect();
        assert_eq!(docs, vec![5, 1, 3, 7, 9]);
    }

    #[test]
    fn test_generic_heap_with_custom_order() {
        // keep the three shortest strings
        let mut heap = BoundedHeap::new(ResultLimit::Bounded(3), |a: &&str, b: &&str| {
            b.len().cmp(&a.len())
        });
        for word in ["aaaa", "b", "cc", "ddddd", "eee"] {
            heap.offer(word);
        }
        assert_eq!(heap.peek_min(), Some(&"eee"));
        assert_eq!(heap.into_sorted_vec(), vec!["b", "cc", "eee"]);
    }

    #[test]
    fn test_heap_property_under_random_offers() {
        use rand::{Rng, SeedableRng, rngs::StdRng};

        let mut rng = StdRng::seed_from_u64(7);
        let mut heap = TopKHeap::new(ResultLimit::Bounded(10));
        let mut all = Vec::new();
        let mut last_threshold = Score::NEG_INFINITY;
        for doc in 0..1000 {
            let score: f64 = rng.gen_range(0.0..100.0);
            all.push(ScoredDocument::new(doc, score));
            heap.offer(ScoredDocument::new(doc, score));
            assert!(heap.threshold() >= last_threshold);
            last_threshold = heap.threshold();
        }
        all.sort_by(ranking_order);
        let expected: Vec<DocId> = all.iter().take(10).map(|d| d.document).collect();
        let actual: Vec<DocId> = heap.drain().iter().map(|d| d.document).collect();
        assert_eq!(actual, expected);
    }
}
