//! Byte access abstraction (spec §9/§5): everything above this layer reads
//! a document through a `Backend` so the same parser works whether the
//! bytes come from a memory-mapped file or an in-memory `Vec<u8>` (freshly
//! built documents, or files too small/volatile to be worth mapping).
//!
//! Adapted from the teacher's `backend.rs`; the xref-location and trailer
//! walk that used to live on the trait have moved to [`crate::xref`], since
//! this layer should only know about byte ranges.

use crate::error::Result;
use memmap2::Mmap;
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

pub trait Backend: Sized {
    fn read<T: IndexRange>(&self, range: T) -> Result<&[u8]>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Backend for Mmap {
    fn read<T: IndexRange>(&self, range: T) -> Result<&[u8]> {
        let r = range.to_range(self.len());
        Ok(&self[r])
    }
    fn len(&self) -> usize {
        Mmap::len(self)
    }
}

impl Backend for Vec<u8> {
    fn read<T: IndexRange>(&self, range: T) -> Result<&[u8]> {
        let r = range.to_range(self.len());
        Ok(&self[r])
    }
    fn len(&self) -> usize {
        Vec::len(self)
    }
}

/// Implemented by Rust's built-in range types so `Backend::read` can take
/// `..`, `a..`, `..b` or `c..d` directly.
pub trait IndexRange {
    fn start(&self) -> Option<usize> {
        None
    }
    fn end(&self) -> Option<usize> {
        None
    }
    fn to_range(&self, len: usize) -> Range<usize> {
        self.start().unwrap_or(0)..self.end().unwrap_or(len)
    }
}

impl IndexRange for RangeFull {}

impl IndexRange for RangeFrom<usize> {
    fn start(&self) -> Option<usize> {
        Some(self.start)
    }
}

impl IndexRange for RangeTo<usize> {
    fn end(&self) -> Option<usize> {
        Some(self.end)
    }
}

impl IndexRange for Range<usize> {
    fn start(&self) -> Option<usize> {
        Some(self.start)
    }
    fn end(&self) -> Option<usize> {
        Some(self.end)
    }
}
