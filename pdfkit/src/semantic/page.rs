//! The document and its pages (spec §3 C4 "Document"/"Page"), grounded on
//! the teacher's `Catalog`/`PageTree`/`Page` in `object/types.rs` but built
//! eagerly: page-tree inheritance (spec §4.2 step 2, invariant I1) is
//! resolved once at build time instead of walked lazily on every accessor
//! call the way the teacher's `Page::media_box`/`crop_box`/`resources` do.

use crate::object::{ObjNr, PlainRef};
use crate::semantic::annotation::Annotation;
use crate::semantic::field::AcroForm;
use crate::semantic::outline::OutlineItem;
use crate::semantic::resources::{Rect, Resources};
use crate::semantic::struct_tree::StructureTree;
use std::collections::BTreeMap;

pub const LETTER: Rect = Rect { left: 0.0, bottom: 0.0, right: 612.0, top: 792.0 };

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Rotation {
    None,
    Clockwise90,
    UpsideDown,
    CounterClockwise90,
}

impl Rotation {
    pub fn from_degrees(deg: i32) -> Rotation {
        match deg.rem_euclid(360) {
            90 => Rotation::Clockwise90,
            180 => Rotation::UpsideDown,
            270 => Rotation::CounterClockwise90,
            _ => Rotation::None,
        }
    }
}

/// One raw content stream attached to a page, either as `/Contents` (a
/// single stream) or `/Contents` (an array of streams concatenated with an
/// inserted whitespace separator, per ISO 32000-1 §7.8.2).
///
/// Carries raw bytes for passthrough, plus a lazily-parsed, lazily-written
/// `operations` cache for build/edit (spec §3 "ContentStream"): the editor
/// (C9) parses once via [`Self::operations`], mutates the vector, and
/// commits it back to `data` via [`Self::set_operations`].
#[derive(Clone, Debug)]
pub struct ContentStream {
    pub original_ref: Option<PlainRef>,
    pub data: Vec<u8>,
    pub dirty: bool,
    operations: Option<Vec<crate::content::Operation>>,
}

impl ContentStream {
    pub fn new(original_ref: Option<PlainRef>, data: Vec<u8>) -> ContentStream {
        ContentStream { original_ref, data, dirty: false, operations: None }
    }

    /// Parses `data` into operations on first access and caches the result.
    pub fn operations(&mut self) -> crate::error::Result<&[crate::content::Operation]> {
        if self.operations.is_none() {
            self.operations = Some(crate::content::parse_content_stream(&self.data)?);
        }
        Ok(self.operations.as_ref().expect("just populated"))
    }

    /// Replaces the operation list and re-serializes it into `data`,
    /// marking the stream dirty for the writer (C10/write.rs).
    pub fn set_operations(&mut self, ops: Vec<crate::content::Operation>) {
        self.data = crate::content::operand::serialize_operations(&ops);
        self.operations = Some(ops);
        self.dirty = true;
    }
}

#[derive(Clone, Debug)]
pub struct Page {
    pub original_ref: Option<PlainRef>,
    pub dirty: bool,
    pub media_box: Rect,
    pub crop_box: Rect,
    pub trim_box: Rect,
    pub bleed_box: Rect,
    pub art_box: Rect,
    pub rotate: Rotation,
    pub resources: Resources,
    pub contents: Vec<ContentStream>,
    pub annotations: Vec<Annotation>,
    pub user_unit: f64,
}

/// Numbering style for a page-label range (ISO 32000-1 §12.4.2), mirroring
/// the teacher's `Counter`.
#[derive(Copy, Clone, Debug)]
pub enum NumberingStyle {
    Decimal,
    RomanUpper,
    RomanLower,
    AlphaUpper,
    AlphaLower,
    None,
}

#[derive(Clone, Debug)]
pub struct PageLabelRange {
    pub start_page_index: usize,
    pub style: NumberingStyle,
    pub prefix: Option<String>,
    pub start: i32,
}

#[derive(Clone, Debug, Default)]
pub struct Info {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<chrono::DateTime<chrono::FixedOffset>>,
    pub mod_date: Option<chrono::DateTime<chrono::FixedOffset>>,
}

#[derive(Clone, Debug, Default)]
pub struct Document {
    pub pages: Vec<Page>,
    pub info: Option<Info>,
    pub lang: Option<String>,
    pub marked: bool,
    pub page_labels: Vec<PageLabelRange>,
    pub outlines: Vec<OutlineItem>,
    pub acro_form: Option<AcroForm>,
    pub struct_tree: Option<StructureTree>,
    pub embedded_files: Vec<crate::semantic::embedded_file::EmbeddedFile>,
    /// Indirect-object identity of every page, in document order, so
    /// builder-time reference resolution (outline destinations, structure
    /// `/Pg`, `AcroForm` field `/P`) can map a raw `PlainRef` to a page index.
    pub(crate) page_index_by_ref: BTreeMap<ObjNr, usize>,
}

impl Document {
    pub fn resolve_page_index(&self, r: PlainRef) -> Option<usize> {
        self.page_index_by_ref.get(&r.id).copied()
    }
}
