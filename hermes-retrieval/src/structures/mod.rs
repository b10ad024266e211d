//! Posting and length structures read by scoring cursors

mod lengths;
mod posting;

pub use lengths::DocumentLengths;
pub use posting::{
    EncodedPostingIterator, Posting, PostingIterator, PostingList, PostingListIterator, TERMINATED,
};
