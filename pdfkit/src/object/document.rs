//! The indirect object table and trailer (spec §3, "Raw object model (C1)").
//!
//! [`RawDocument`] is the thing [`Resolve`] actually resolves against: a
//! cross-reference-table-backed map from `(ObjNr, GenNr)` to [`Primitive`],
//! plus the trailer dictionary. It corresponds to the teacher's `File<B>`
//! minus the backend/lazy-parsing machinery (that lives in [`crate::file`]);
//! this module only owns the in-memory table once everything has been
//! parsed or constructed.

use crate::error::{self, Result};
use crate::object::{Dictionary, GenNr, ObjNr, PdfString, PlainRef, Primitive, Ref, Resolve};
use pdfkit_derive::Object;
use std::collections::BTreeMap;

/// The document trailer: everything needed to find the root and to chain
/// back through incremental updates via `Prev`.
#[derive(Object, Clone, Debug)]
pub struct Trailer {
    #[pdf(key = "Size")]
    pub size: i32,
    #[pdf(key = "Root")]
    pub root: PlainRef,
    #[pdf(key = "Info", default = "None")]
    pub info: Option<PlainRef>,
    #[pdf(key = "ID", default = "None")]
    pub id: Option<Vec<PdfString>>,
    #[pdf(key = "Encrypt", default = "None")]
    pub encrypt: Option<Dictionary>,
    #[pdf(key = "Prev", default = "None")]
    pub prev: Option<i32>,
    #[pdf(key = "XRefStm", default = "None")]
    pub xref_stream: Option<i32>,
}

impl Default for Trailer {
    fn default() -> Trailer {
        Trailer {
            size: 0,
            root: PlainRef { id: 0, gen: 0 },
            info: None,
            id: None,
            encrypt: None,
            prev: None,
            xref_stream: None,
        }
    }
}

/// One slot of the cross-reference table (spec §3, invariant I1: every
/// reference resolves to exactly one object or is explicitly free).
#[derive(Clone, Debug)]
pub enum XrefEntry {
    Free,
    InUse { offset: usize, gen: GenNr },
    /// Object stored inside an object stream (cross-reference *stream*
    /// type 2 entries); `stream_id` names the container, `index` the slot.
    Compressed { stream_id: ObjNr, index: u32 },
    /// Not read from a file at all; built or edited in memory.
    Live(Primitive),
}

/// The in-memory indirect object table plus trailer. Implements [`Resolve`]
/// so any `Object::from_primitive` call can dereference transparently.
#[derive(Default)]
pub struct RawDocument {
    objects: BTreeMap<ObjNr, (GenNr, Primitive)>,
    pub trailer: Trailer,
    next_id: ObjNr,
}

impl RawDocument {
    pub fn new(trailer: Trailer) -> RawDocument {
        RawDocument {
            objects: BTreeMap::new(),
            trailer,
            next_id: 1,
        }
    }

    pub fn get(&self, id: ObjNr) -> Option<&Primitive> {
        self.objects.get(&id).map(|(_, p)| p)
    }

    pub fn contains(&self, id: ObjNr) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn gen_of(&self, id: ObjNr) -> Option<GenNr> {
        self.objects.get(&id).map(|(gen, _)| *gen)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjNr, GenNr, &Primitive)> {
        self.objects.iter().map(|(&id, (gen, p))| (id, *gen, p))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Allocates a fresh object number, one past the highest currently used
    /// (mirrors the teacher's `File::add_object` bump-allocation strategy).
    pub fn alloc_id(&mut self) -> ObjNr {
        while self.objects.contains_key(&self.next_id) {
            self.next_id += 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn set(&mut self, id: ObjNr, gen: GenNr, value: Primitive) {
        self.objects.insert(id, (gen, value));
    }

    /// Adds a new indirect object and returns a typed reference to it.
    pub fn add<T>(&mut self, value: Primitive) -> Ref<T> {
        let id = self.alloc_id();
        self.set(id, 0, value);
        Ref::from_id(id, 0)
    }

    pub fn remove(&mut self, id: ObjNr) -> Option<Primitive> {
        self.objects.remove(&id).map(|(_, p)| p)
    }

    /// Drops every object whose id is not in `keep`; used by the optimizer's
    /// reachability sweep (C10, §4.7).
    pub fn retain(&mut self, keep: &std::collections::HashSet<ObjNr>) {
        self.objects.retain(|id, _| keep.contains(id));
    }
}

impl Resolve for RawDocument {
    fn resolve(&self, r: PlainRef) -> Result<Primitive> {
        match self.objects.get(&r.id) {
            Some((gen, p)) if *gen == r.gen => Ok(p.clone()),
            Some(_) | None => error::MissingObjectSnafu { num: r.id, gen: r.gen }.fail(),
        }
    }
}
