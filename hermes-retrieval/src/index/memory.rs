//! In-memory [`PostingSource`]
//!
//! Holds each term either as a decoded [`PostingList`] or as its encoded byte
//! form (decoded lazily by [`EncodedPostingIterator`]).

use std::sync::Arc;

use log::debug;
use rustc_hash::FxHashMap;

use super::{CollectionStatistics, LENGTHS_PART, POSTINGS_PART, PostingSource, TermStatistics};
use crate::error::{Error, Result};
use crate::structures::{
    DocumentLengths, EncodedPostingIterator, PostingIterator, PostingList, PostingListIterator,
};

enum StoredPostings {
    Decoded(Arc<PostingList>),
    Encoded {
        data: Arc<[u8]>,
        stats: TermStatistics,
    },
}

impl StoredPostings {
    fn statistics(&self) -> TermStatistics {
        match self {
            StoredPostings::Decoded(list) => term_statistics_of(list),
            StoredPostings::Encoded { stats, .. } => *stats,
        }
    }
}

fn term_statistics_of(list: &PostingList) -> TermStatistics {
    TermStatistics {
        document_frequency: list.doc_count() as u64,
        collection_frequency: list.collection_frequency(),
        maximum_count: list.maximum_count(),
    }
}

/// Term dictionary plus optional lengths part, all held in memory
pub struct MemoryIndex {
    terms: Option<FxHashMap<String, StoredPostings>>,
    lengths: Option<DocumentLengths>,
}

impl MemoryIndex {
    pub fn builder() -> MemoryIndexBuilder {
        MemoryIndexBuilder::default()
    }

    pub fn num_terms(&self) -> usize {
        self.terms.as_ref().map(|t| t.len()).unwrap_or(0)
    }

    fn terms(&self) -> Result<&FxHashMap<String, StoredPostings>> {
        self.terms
            .as_ref()
            .ok_or_else(|| Error::MissingIndexPart(POSTINGS_PART.to_string()))
    }
}

impl PostingSource for MemoryIndex {
    fn collection_statistics(&self) -> Result<CollectionStatistics> {
        Ok(CollectionStatistics::from_lengths(self.document_lengths()?))
    }

    fn term_statistics(&self, term: &str) -> Result<TermStatistics> {
        Ok(self
            .terms()?
            .get(term)
            .map(StoredPostings::statistics)
            .unwrap_or_default())
    }

    fn open_postings(&self, term: &str) -> Result<Option<Box<dyn PostingIterator>>> {
        let iter: Box<dyn PostingIterator> = match self.terms()?.get(term) {
            None => return Ok(None),
            Some(StoredPostings::Decoded(list)) => {
                Box::new(PostingListIterator::new(Arc::clone(list)))
            }
            Some(StoredPostings::Encoded { data, .. }) => {
                Box::new(EncodedPostingIterator::new(Arc::clone(data))?)
            }
        };
        Ok(Some(iter))
    }

    fn document_lengths(&self) -> Result<&DocumentLengths> {
        self.lengths
            .as_ref()
            .ok_or_else(|| Error::MissingIndexPart(LENGTHS_PART.to_string()))
    }
}

/// Builder for [`MemoryIndex`]
#[derive(Default)]
pub struct MemoryIndexBuilder {
    terms: Option<FxHashMap<String, StoredPostings>>,
    lengths: Option<DocumentLengths>,
}

impl MemoryIndexBuilder {
    /// Set the document lengths part (one entry per doc id, starting at 0)
    pub fn lengths(mut self, lengths: Vec<u32>) -> Self {
        self.lengths = Some(DocumentLengths::new(lengths));
        self
    }

    /// Add a decoded posting list for `term`
    pub fn postings(mut self, term: impl Into<String>, list: PostingList) -> Self {
        self.term_map()
            .insert(term.into(), StoredPostings::Decoded(Arc::new(list)));
        self
    }

    /// Add `list` for `term` in encoded form
    pub fn encoded_postings(mut self, term: impl Into<String>, list: &PostingList) -> Result<Self> {
        let mut buffer = Vec::new();
        list.serialize(&mut buffer)?;
        let stats = term_statistics_of(list);
        self.term_map().insert(
            term.into(),
            StoredPostings::Encoded {
                data: buffer.into(),
                stats,
            },
        );
        Ok(self)
    }

    /// Add already-encoded bytes for `term` with externally supplied statistics
    pub fn raw_postings(
        mut self,
        term: impl Into<String>,
        data: Arc<[u8]>,
        stats: TermStatistics,
    ) -> Self {
        self.term_map()
            .insert(term.into(), StoredPostings::Encoded { data, stats });
        self
    }

    fn term_map(&mut self) -> &mut FxHashMap<String, StoredPostings> {
        self.terms.get_or_insert_with(FxHashMap::default)
    }

    pub fn build(self) -> MemoryIndex {
        let index = MemoryIndex {
            terms: self.terms,
            lengths: self.lengths,
        };
        debug!(
            "Built MemoryIndex: terms={}, documents={}",
            index.num_terms(),
            index.lengths.as_ref().map(|l| l.len()).unwrap_or(0)
        );
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::TERMINATED;

    fn build_index() -> MemoryIndex {
        let rust: PostingList = [(0, 1), (2, 3)].into_iter().collect();
        let code: PostingList = [(1, 2), (2, 1)].into_iter().collect();
        MemoryIndex::builder()
            .lengths(vec![4, 6, 8])
            .postings("rust", rust)
            .encoded_postings("code", &code)
            .unwrap()
            .build()
    }

    #[test]
    fn test_statistics() {
        let index = build_index();
        let collection = index.collection_statistics().unwrap();
        assert_eq!(collection.document_count, 3);
        assert_eq!(collection.collection_length, 18);
        assert_eq!(collection.average_document_length(), 6.0);

        let rust = index.term_statistics("rust").unwrap();
        assert_eq!(rust.document_frequency, 2);
        assert_eq!(rust.collection_frequency, 4);
        assert_eq!(rust.maximum_count, 3);

        let code = index.term_statistics("code").unwrap();
        assert_eq!(code.maximum_count, 2);

        assert_eq!(
            index.term_statistics("absent").unwrap(),
            TermStatistics::default()
        );
    }

    #[test]
    fn test_open_postings() {
        let index = build_index();
        let mut code = index.open_postings("code").unwrap().unwrap();
        assert_eq!(code.doc(), 1);
        assert_eq!(code.advance().unwrap(), 2);
        assert_eq!(code.advance().unwrap(), TERMINATED);
        assert!(index.open_postings("absent").unwrap().is_none());
    }

    #[test]
    fn test_missing_parts() {
        let index = MemoryIndex::builder().build();
        assert!(matches!(
            index.document_lengths(),
            Err(Error::MissingIndexPart(part)) if part == LENGTHS_PART
        ));
        assert!(matches!(
            index.open_postings("rust"),
            Err(Error::MissingIndexPart(part)) if part == POSTINGS_PART
        ));
        assert!(index.collection_statistics().is_err());
    }
}
