//! Posting lists and forward-only posting iterators
//!
//! A posting list is a sorted run of `(doc_id, count)` pairs. Lists can be
//! held decoded in memory or as a delta/varint encoded byte buffer that is
//! decoded lazily while the iterator advances.

use std::io::{self, Read, Write};
use std::sync::Arc;

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::DocId;
use crate::error::{Error, Result};

/// Sentinel value indicating an iterator is exhausted
pub const TERMINATED: DocId = DocId::MAX;

/// A posting entry containing doc_id and occurrence count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub count: u32,
}

/// Sorted list of postings for one term
#[derive(Debug, Clone, Default)]
pub struct PostingList {
    postings: Vec<Posting>,
}

impl PostingList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a posting (must be added in doc_id order)
    pub fn push(&mut self, doc_id: DocId, count: u32) {
        debug_assert!(
            self.postings.last().is_none_or(|p| p.doc_id < doc_id),
            "Postings must be added in sorted order"
        );
        debug_assert!(doc_id != TERMINATED, "doc id {TERMINATED} is reserved");
        self.postings.push(Posting { doc_id, count });
    }

    /// Number of documents in the list (document frequency)
    pub fn doc_count(&self) -> u32 {
        self.postings.len() as u32
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Posting> {
        self.postings.iter()
    }

    /// Sum of counts over all postings (collection frequency)
    pub fn collection_frequency(&self) -> u64 {
        self.postings.iter().map(|p| p.count as u64).sum()
    }

    /// Largest per-document count
    pub fn maximum_count(&self) -> u32 {
        self.postings.iter().map(|p| p.count).max().unwrap_or(0)
    }

    /// Serialize to bytes using delta encoding and varint
    pub fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_vint(writer, self.postings.len() as u64)?;

        let mut prev_doc_id = 0u32;
        for posting in &self.postings {
            let delta = posting.doc_id - prev_doc_id;
            write_vint(writer, delta as u64)?;
            write_vint(writer, posting.count as u64)?;
            prev_doc_id = posting.doc_id;
        }

        Ok(())
    }

    /// Deserialize from bytes. Values that do not fit a doc id or count
    /// fail with `InvalidData`.
    pub fn deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
        let count = read_vint_u32(reader)? as usize;
        let mut postings = Vec::with_capacity(count.min(1 << 20));

        let mut prev_doc_id = 0u32;
        for _ in 0..count {
            let delta = read_vint_u32(reader)?;
            let count = read_vint_u32(reader)?;
            let doc_id = prev_doc_id
                .checked_add(delta)
                .filter(|&doc| doc != TERMINATED)
                .ok_or_else(|| invalid_data("doc id overflow"))?;
            postings.push(Posting { doc_id, count });
            prev_doc_id = doc_id;
        }

        Ok(Self { postings })
    }
}

impl FromIterator<(DocId, u32)> for PostingList {
    fn from_iter<T: IntoIterator<Item = (DocId, u32)>>(iter: T) -> Self {
        let mut list = PostingList::new();
        for (doc_id, count) in iter {
            list.push(doc_id, count);
        }
        list
    }
}

/// Forward-only cursor over one term's postings.
///
/// Advancement is fallible because the postings may be decoded from storage
/// while iterating.
pub trait PostingIterator: Send {
    /// Current document ID, or [`TERMINATED`] if exhausted.
    fn doc(&self) -> DocId;

    /// Occurrence count at the current document (0 if exhausted).
    fn count(&self) -> u32;

    /// Advance to the next posting. Returns the new doc ID or [`TERMINATED`].
    fn advance(&mut self) -> Result<DocId>;

    /// Seek to the first posting with doc ID >= `target`.
    fn seek(&mut self, target: DocId) -> Result<DocId> {
        let mut doc = self.doc();
        while doc < target {
            doc = self.advance()?;
        }
        Ok(doc)
    }

    /// Total number of postings in the list, independent of position.
    fn doc_count(&self) -> u32;
}

/// Iterator over a decoded, shared posting list. Binary search for seek.
pub struct PostingListIterator {
    list: Arc<PostingList>,
    position: usize,
}

impl PostingListIterator {
    pub fn new(list: Arc<PostingList>) -> Self {
        Self { list, position: 0 }
    }
}

impl PostingIterator for PostingListIterator {
    #[inline]
    fn doc(&self) -> DocId {
        self.list
            .postings
            .get(self.position)
            .map(|p| p.doc_id)
            .unwrap_or(TERMINATED)
    }

    #[inline]
    fn count(&self) -> u32 {
        self.list
            .postings
            .get(self.position)
            .map(|p| p.count)
            .unwrap_or(0)
    }

    #[inline]
    fn advance(&mut self) -> Result<DocId> {
        if self.position < self.list.postings.len() {
            self.position += 1;
        }
        Ok(self.doc())
    }

    fn seek(&mut self, target: DocId) -> Result<DocId> {
        let remaining = &self.list.postings[self.position.min(self.list.postings.len())..];
        let offset = remaining.partition_point(|p| p.doc_id < target);
        self.position += offset;
        Ok(self.doc())
    }

    fn doc_count(&self) -> u32 {
        self.list.doc_count()
    }
}

/// Iterator that decodes a serialized [`PostingList`] on the fly.
///
/// Truncated or malformed buffers surface as [`Error::Storage`] from
/// `advance`/`seek` rather than at construction.
pub struct EncodedPostingIterator {
    data: Arc<[u8]>,
    offset: usize,
    remaining: u32,
    doc_count: u32,
    doc: DocId,
    count: u32,
}

impl EncodedPostingIterator {
    /// Open an encoded list and decode its first posting
    pub fn new(data: Arc<[u8]>) -> Result<Self> {
        let mut reader = &data[..];
        let doc_count = read_vint_u32(&mut reader).map_err(|e| decode_error(e, 0))?;
        let offset = data.len() - reader.len();

        let mut iter = Self {
            data,
            offset,
            remaining: doc_count,
            doc_count,
            doc: 0,
            count: 0,
        };
        iter.decode_next(0)?;
        Ok(iter)
    }

    fn decode_next(&mut self, prev_doc: DocId) -> Result<DocId> {
        if self.remaining == 0 {
            self.doc = TERMINATED;
            self.count = 0;
            return Ok(TERMINATED);
        }

        let mut reader = &self.data[self.offset..];
        let delta = read_vint_u32(&mut reader).map_err(|e| decode_error(e, self.offset))?;
        let count = read_vint_u32(&mut reader).map_err(|e| decode_error(e, self.offset))?;
        self.offset = self.data.len() - reader.len();
        self.remaining -= 1;

        self.doc = prev_doc
            .checked_add(delta)
            .filter(|&doc| doc != TERMINATED)
            .ok_or_else(|| {
                Error::Storage(format!("doc id overflow in posting data at byte {}", self.offset))
            })?;
        self.count = count;
        Ok(self.doc)
    }
}

impl PostingIterator for EncodedPostingIterator {
    #[inline]
    fn doc(&self) -> DocId {
        self.doc
    }

    #[inline]
    fn count(&self) -> u32 {
        self.count
    }

    fn advance(&mut self) -> Result<DocId> {
        if self.doc == TERMINATED {
            return Ok(TERMINATED);
        }
        self.decode_next(self.doc)
    }

    fn doc_count(&self) -> u32 {
        self.doc_count
    }
}

fn decode_error(err: io::Error, offset: usize) -> Error {
    Error::Storage(format!("corrupt posting data at byte {offset}: {err}"))
}

/// Write variable-length integer (1-9 bytes)
fn write_vint<W: Write>(writer: &mut W, mut value: u64) -> io::Result<()> {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            writer.write_u8(byte)?;
            return Ok(());
        } else {
            writer.write_u8(byte | 0x80)?;
        }
    }
}

/// Read variable-length integer
fn read_vint<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut result = 0u64;
    let mut shift = 0;

    loop {
        let byte = reader.read_u8()?;
        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 64 {
            return Err(invalid_data("varint too long"));
        }
    }
}

/// Read a varint that must fit in 32 bits
fn read_vint_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let value = read_vint(reader)?;
    u32::try_from(value).map_err(|_| invalid_data("varint exceeds 32 bits"))
}

fn invalid_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}
