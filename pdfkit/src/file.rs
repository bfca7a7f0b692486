//! Ties a byte [`Backend`] to the xref chain and the parser to produce a
//! fully materialized [`RawDocument`] (spec §3 C1). Mirrors the teacher's
//! `File<B>`, but where the teacher keeps bytes lazily parsed behind a
//! `RefCell` object cache, pdfkit resolves every reachable object once at
//! open time into `RawDocument`'s `BTreeMap` — every later layer (C3-C10)
//! assumes that table already exists in memory.

use crate::backend::Backend;
use crate::error::{self, Result};
use crate::object::{Dictionary, GenNr, NoResolve, Object, ObjNr, PlainRef, Primitive, RawDocument, Resolve, Trailer};
use crate::parser::lexer::Lexer;
use crate::parser::{self, parse_xref};
use crate::xref::{XRef, XRefTable};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

/// Opens a PDF file, memory-mapping it when possible (falling back to a
/// `Vec<u8>` read for backends that don't support mapping, e.g. files on
/// filesystems that refuse `mmap`), and materializes every xref-reachable
/// object into a [`RawDocument`].
pub fn open(path: impl AsRef<Path>) -> Result<RawDocument> {
    let file = std::fs::File::open(path)?;
    match unsafe { memmap2::Mmap::map(&file) } {
        Ok(mmap) => from_backend(&mmap),
        Err(_) => {
            use std::io::Read;
            let mut buf = Vec::new();
            (&file).read_to_end(&mut buf)?;
            from_backend(&buf)
        }
    }
}

/// Reads a document already fully in memory (tests, embedded-file
/// extraction, anything that isn't a bare filesystem path).
pub fn from_bytes(data: &[u8]) -> Result<RawDocument> {
    from_backend(&data.to_vec())
}

fn from_backend<B: Backend>(backend: &B) -> Result<RawDocument> {
    let data = backend.read(..)?;
    let (table, trailer_dict) = parse_xref::read_full_xref_chain(data)?;
    let resolver = LazyResolver { backend, table: &table, cache: RefCell::new(HashMap::new()) };

    let trailer = Trailer::from_primitive(Primitive::Dictionary(trailer_dict), &resolver)?;
    let mut raw = RawDocument::new(trailer);
    for (id, entry) in table.iter() {
        if matches!(entry, XRef::Free { .. }) {
            continue;
        }
        match resolver.get(id) {
            Ok(p) => raw.set(id, resolver.gen_of(id), p),
            Err(_) => continue, // a dangling or malformed entry; skip rather than abort the whole open
        }
    }
    Ok(raw)
}

/// Resolves objects on demand while a document is still being materialized,
/// following `Prev`-chained xref sections and both classic (`Raw`) and
/// object-stream (`Stream`) entries. Caches everything it resolves so a
/// reference cycle (an object stream's own dictionary referencing another
/// compressed object, say) terminates rather than looping.
struct LazyResolver<'a, B: Backend> {
    backend: &'a B,
    table: &'a XRefTable,
    cache: RefCell<HashMap<ObjNr, Primitive>>,
}

impl<'a, B: Backend> LazyResolver<'a, B> {
    fn gen_of(&self, id: ObjNr) -> GenNr {
        match self.table.get(id) {
            Some(XRef::Raw { gen_nr, .. }) | Some(XRef::Free { gen_nr, .. }) => gen_nr,
            _ => 0,
        }
    }

    fn get(&self, id: ObjNr) -> Result<Primitive> {
        if let Some(p) = self.cache.borrow().get(&id) {
            return Ok(p.clone());
        }
        let entry = self
            .table
            .get(id)
            .ok_or_else(|| error::MissingObjectSnafu { num: id, gen: 0u16 }.build())?;
        let value = match entry {
            XRef::Free { .. } => return error::FreeObjectSnafu { obj_nr: id }.fail(),
            XRef::Raw { pos, .. } => {
                let slice = self.backend.read(pos..)?;
                let mut lexer = Lexer::new(slice);
                let (_, _, obj) = parser::parse_indirect_object(&mut lexer, self)?;
                obj
            }
            XRef::Stream { stream_id, index } => self.object_from_stream(stream_id, index)?,
        };
        self.cache.borrow_mut().insert(id, value.clone());
        Ok(value)
    }

    /// Decodes the object-stream container named by `stream_id` and pulls
    /// the `index`-th compressed object out of it (ISO 32000-1 §7.5.7).
    fn object_from_stream(&self, stream_id: ObjNr, index: usize) -> Result<Primitive> {
        let container = self.get(stream_id)?.into_stream()?;
        let chain = crate::enc::filter_chain(container.info.get("Filter"), container.info.get("DecodeParms"), &NoResolve)?;
        let decoded = crate::enc::decode_stream(&container.data, &chain, crate::enc::DEFAULT_MAX_DECOMPRESSED_SIZE)?;

        let n = field_usize(&container.info, "N")?;
        let first = field_usize(&container.info, "First")?;
        let mut header = Lexer::new(&decoded[..first.min(decoded.len())]);
        let mut offsets = Vec::with_capacity(n);
        for _ in 0..n {
            let _obj_nr = header.next_as::<ObjNr>()?;
            let offset = header.next_as::<usize>()?;
            offsets.push(offset);
        }
        let offset = *offsets
            .get(index)
            .ok_or_else(|| error::InternalSnafu { reason: format!("object stream {stream_id} has no slot {index}") }.build())?;
        parser::parse(&decoded[first + offset..], &NoResolve)
    }
}

fn field_usize(dict: &Dictionary, key: &'static str) -> Result<usize> {
    Ok(dict
        .get(key)
        .ok_or_else(|| error::MissingEntrySnafu { typ: "ObjStm", field: key }.build())?
        .clone()
        .as_integer()? as usize)
}

impl<'a, B: Backend> Resolve for LazyResolver<'a, B> {
    fn resolve(&self, r: PlainRef) -> Result<Primitive> {
        self.get(r.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Primitive;

    fn minimal_pdf() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.7\n");
        let obj1 = b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n";
        let obj2 = b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n";
        let off1 = out.len();
        out.extend_from_slice(obj1);
        let off2 = out.len();
        out.extend_from_slice(obj2);
        let xref_pos = out.len();
        out.extend_from_slice(b"xref\n0 3\n");
        out.extend_from_slice(b"0000000000 65535 f \n");
        out.extend_from_slice(format!("{:010} 00000 n \n", off1).as_bytes());
        out.extend_from_slice(format!("{:010} 00000 n \n", off2).as_bytes());
        out.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>\n");
        out.extend_from_slice(format!("startxref\n{}\n%%EOF", xref_pos).as_bytes());
        out
    }

    #[test]
    fn opens_a_minimal_document_and_resolves_the_catalog() {
        let data = minimal_pdf();
        let raw = from_bytes(&data).unwrap();
        assert_eq!(raw.trailer.root, PlainRef { id: 1, gen: 0 });
        let catalog = raw.get(1).unwrap();
        match catalog {
            Primitive::Dictionary(d) => assert_eq!(d.get("Type").unwrap().as_name().unwrap(), "Catalog"),
            _ => panic!("expected dictionary"),
        }
        assert!(raw.contains(2));
    }
}
