//! Geometry and per-page resource dictionaries (spec §3, semantic IR C4).

use crate::error::Result;
use crate::object::{Dictionary, Object, Primitive, Resolve};
use crate::semantic::font::Font;
use crate::semantic::xobject::XObject;
use std::collections::BTreeMap;
use std::io::Write;

/// A rectangle in default user space, `[left bottom right top]` (ISO
/// 32000-1 §7.9.5). Kept as a manual `Object` impl, same as the teacher's
/// `Rect`, since it round-trips through a PDF array rather than a dict.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl Rect {
    pub fn width(&self) -> f64 {
        (self.right - self.left).abs()
    }
    pub fn height(&self) -> f64 {
        (self.top - self.bottom).abs()
    }

    /// Intersects `self` with `other`, used by the CropBox/TrimBox/BleedBox/
    /// ArtBox defaulting chain (SPEC_FULL SUPPLEMENTED FEATURES).
    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.max(other.left),
            bottom: self.bottom.max(other.bottom),
            right: self.right.min(other.right),
            top: self.top.min(other.top),
        }
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.left.min(self.right)
            && x <= self.left.max(self.right)
            && y >= self.bottom.min(self.top)
            && y <= self.bottom.max(self.top)
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.left.min(self.right) <= other.left.max(other.right)
            && self.right.max(self.left) >= other.left.min(other.right)
            && self.bottom.min(self.top) <= other.bottom.max(other.top)
            && self.top.max(self.bottom) >= other.bottom.min(other.top)
    }
}

impl Object for Rect {
    fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        write!(out, "[{} {} {} {}]", self.left, self.bottom, self.right, self.top)?;
        Ok(())
    }
    fn from_primitive(p: Primitive, resolve: &dyn Resolve) -> Result<Self> {
        let arr = p.resolve(resolve)?.into_array()?;
        if arr.len() != 4 {
            return crate::error::ParseSnafu {
                pos: 0usize,
                reason: "rectangle array must have exactly 4 entries".to_string(),
            }
            .fail();
        }
        Ok(Rect {
            left: arr[0].clone().resolve(resolve)?.as_number()?,
            bottom: arr[1].clone().resolve(resolve)?.as_number()?,
            right: arr[2].clone().resolve(resolve)?.as_number()?,
            top: arr[3].clone().resolve(resolve)?.as_number()?,
        })
    }
}

/// A page's (or its inherited ancestor's) `/Resources` dictionary, fully
/// resolved: every `XObject`/`Font` referenced is materialized rather than
/// kept as an indirect reference, since C4 is a fully-built tree (see
/// DESIGN.md on why this layer drops the teacher's lazy `Ref<T>` model).
#[derive(Debug, Default, Clone)]
pub struct Resources {
    pub fonts: BTreeMap<String, Font>,
    pub xobjects: BTreeMap<String, XObject>,
    /// Other resource categories (`ColorSpace`, `Pattern`, `Shading`,
    /// `ExtGState`, `Properties`) are kept as raw dictionaries: the content
    /// processor (C6) only needs to know a name was declared, not interpret
    /// every category's contents.
    pub other: BTreeMap<String, Dictionary>,
}

impl Resources {
    pub fn merge_missing_from(&mut self, parent: &Resources) {
        for (k, v) in &parent.fonts {
            self.fonts.entry(k.clone()).or_insert_with(|| v.clone());
        }
        for (k, v) in &parent.xobjects {
            self.xobjects.entry(k.clone()).or_insert_with(|| v.clone());
        }
        for (k, v) in &parent.other {
            self.other.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
}
