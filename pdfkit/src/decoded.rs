//! The decoded IR (C3): filter-decoded stream bytes, cached per object so
//! repeated access (tracing a page's content stream, then editing it, then
//! re-reading it for the optimizer) doesn't re-run the filter chain.

use crate::enc::{self, DecodeParms, Filter};
use crate::error::Result;
use crate::object::{NoResolve, ObjNr, PdfStream, Resolve};
use std::cell::RefCell;
use std::collections::HashMap;

/// A stream's filter-decoded bytes plus the chain that produced them, kept
/// so the optimizer (C10) can choose to keep, drop or replace individual
/// stages when recompressing.
#[derive(Clone)]
pub struct DecodedStream {
    pub chain: Vec<(Filter, DecodeParms)>,
    pub data: Vec<u8>,
}

/// Decodes one stream's bytes through its `/Filter` chain, honoring
/// `max_size` at every stage (spec §4.1 I2).
pub fn decode(stream: &PdfStream, resolve: &dyn Resolve, max_size: usize) -> Result<DecodedStream> {
    let chain = enc::filter_chain(stream.info.get("Filter"), stream.info.get("DecodeParms"), resolve)?;
    let data = enc::decode_stream(&stream.data, &chain, max_size)?;
    Ok(DecodedStream { chain, data })
}

/// Per-document decode cache, keyed by object number. A document only ever
/// has one generation of a given indirect object alive in memory at once,
/// so the object number alone is a sufficient cache key here.
#[derive(Default)]
pub struct DecodedCache {
    entries: RefCell<HashMap<ObjNr, DecodedStream>>,
    max_size: usize,
}

impl DecodedCache {
    pub fn new(max_size: usize) -> DecodedCache {
        DecodedCache {
            entries: RefCell::new(HashMap::new()),
            max_size,
        }
    }

    /// Returns the decoded bytes for the stream stored at `id`, decoding
    /// and caching them on first access.
    pub fn get_or_decode(&self, id: ObjNr, stream: &PdfStream, resolve: &dyn Resolve) -> Result<Vec<u8>> {
        if let Some(cached) = self.entries.borrow().get(&id) {
            return Ok(cached.data.clone());
        }
        let decoded = decode(stream, resolve, self.max_size)?;
        let data = decoded.data.clone();
        self.entries.borrow_mut().insert(id, decoded);
        Ok(data)
    }

    pub fn invalidate(&self, id: ObjNr) {
        self.entries.borrow_mut().remove(&id);
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// Decodes without caching and without following references in
/// `/DecodeParms` — used for the xref stream itself, which is decoded
/// before any document-wide resolver exists.
pub fn decode_standalone(stream: &PdfStream, max_size: usize) -> Result<Vec<u8>> {
    decode(stream, &NoResolve, max_size).map(|d| d.data)
}
