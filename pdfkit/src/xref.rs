//! The cross-reference table (spec §3 I1: every reference resolves to
//! exactly one object, or is explicitly free) assembled from one or more
//! xref sections read from a file, oldest (`Prev`) first.

use crate::object::{GenNr, ObjNr};

#[derive(Copy, Clone, Debug)]
pub enum XRef {
    Free { next_obj_nr: ObjNr, gen_nr: GenNr },
    Raw { pos: usize, gen_nr: GenNr },
    Stream { stream_id: ObjNr, index: usize },
}

/// One subsection of an xref table/stream: a contiguous run of object
/// numbers starting at `first_id`.
pub struct XRefSection {
    pub first_id: ObjNr,
    pub entries: Vec<XRef>,
}

impl XRefSection {
    pub fn new(first_id: ObjNr) -> XRefSection {
        XRefSection {
            first_id,
            entries: Vec::new(),
        }
    }

    pub fn add_free_entry(&mut self, next_obj_nr: ObjNr, gen_nr: GenNr) {
        self.entries.push(XRef::Free { next_obj_nr, gen_nr });
    }

    pub fn add_inuse_entry(&mut self, pos: usize, gen_nr: GenNr) {
        self.entries.push(XRef::Raw { pos, gen_nr });
    }
}

#[derive(Default)]
pub struct XRefTable {
    entries: Vec<Option<XRef>>,
}

impl XRefTable {
    pub fn new(highest_id: ObjNr) -> XRefTable {
        XRefTable {
            entries: vec![None; highest_id as usize + 1],
        }
    }

    /// Merges one section in. Earlier (more recent, since sections are read
    /// newest-first) entries for an id win — this is how incremental
    /// updates and appended xref streams are meant to shadow older ones.
    pub fn add_entries_from(&mut self, section: XRefSection) {
        for (i, entry) in section.entries.into_iter().enumerate() {
            let id = section.first_id as usize + i;
            if id >= self.entries.len() {
                self.entries.resize(id + 1, None);
            }
            if self.entries[id].is_none() {
                self.entries[id] = Some(entry);
            }
        }
    }

    pub fn get(&self, id: ObjNr) -> Option<XRef> {
        self.entries.get(id as usize).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjNr, XRef)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(id, e)| e.map(|e| (id as ObjNr, e)))
    }
}
