//! C1 — the raw object model: [`Primitive`] values, the indirect object
//! table and trailer ([`document::RawDocument`]), and the [`Object`] trait
//! that `#[derive(Object)]` (in `pdfkit_derive`) implements for every typed
//! struct built on top of it.

pub mod document;
pub mod primitive;

pub use document::{RawDocument, Trailer};
pub use primitive::{Dictionary, GenNr, NoResolve, ObjNr, PdfStream, PlainRef, Primitive, Ref, Resolve};

use crate::error::Result;
use std::io::Write;

/// Bidirectional bridge between a typed Rust value and the [`Primitive`]
/// tree. Implemented by hand for scalar/collection types below and derived
/// for dictionaries/streams/name-enums via `#[derive(Object)]`.
pub trait Object: Sized {
    fn serialize<W: Write>(&self, out: &mut W) -> Result<()>;
    fn from_primitive(p: Primitive, resolve: &dyn Resolve) -> Result<Self>;
}

impl Object for Primitive {
    fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        Primitive::serialize(self, out)
    }
    fn from_primitive(p: Primitive, resolve: &dyn Resolve) -> Result<Self> {
        p.resolve(resolve)
    }
}

impl Object for i32 {
    fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        write!(out, "{}", self)?;
        Ok(())
    }
    fn from_primitive(p: Primitive, resolve: &dyn Resolve) -> Result<Self> {
        Ok(p.resolve(resolve)?.as_integer()? as i32)
    }
}

impl Object for i64 {
    fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        write!(out, "{}", self)?;
        Ok(())
    }
    fn from_primitive(p: Primitive, resolve: &dyn Resolve) -> Result<Self> {
        p.resolve(resolve)?.as_integer()
    }
}

impl Object for usize {
    fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        write!(out, "{}", self)?;
        Ok(())
    }
    fn from_primitive(p: Primitive, resolve: &dyn Resolve) -> Result<Self> {
        Ok(p.resolve(resolve)?.as_integer()? as usize)
    }
}

impl Object for f32 {
    fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        write!(out, "{}", self)?;
        Ok(())
    }
    fn from_primitive(p: Primitive, resolve: &dyn Resolve) -> Result<Self> {
        Ok(p.resolve(resolve)?.as_number()? as f32)
    }
}

impl Object for f64 {
    fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        write!(out, "{}", self)?;
        Ok(())
    }
    fn from_primitive(p: Primitive, resolve: &dyn Resolve) -> Result<Self> {
        p.resolve(resolve)?.as_number()
    }
}

impl Object for bool {
    fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        write!(out, "{}", self)?;
        Ok(())
    }
    fn from_primitive(p: Primitive, resolve: &dyn Resolve) -> Result<Self> {
        p.resolve(resolve)?.as_bool()
    }
}

impl Object for String {
    fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        write!(out, "/{}", self)?;
        Ok(())
    }
    fn from_primitive(p: Primitive, resolve: &dyn Resolve) -> Result<Self> {
        match p.resolve(resolve)? {
            Primitive::Name(n) => Ok(n),
            Primitive::String(s) => Ok(String::from_utf8_lossy(&s).into_owned()),
            other => crate::error::UnexpectedPrimitiveSnafu {
                expected: "Name or String",
                found: other.kind_name(),
            }
            .fail(),
        }
    }
}

/// A PDF literal/hex string kept as raw bytes (text strings may be encoded
/// as PDFDocEncoding or UTF-16BE; decoding that is a semantic-layer (C4)
/// concern, not this layer's).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PdfString(pub Vec<u8>);

impl PdfString {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl Object for PdfString {
    fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        Primitive::String(self.0.clone()).serialize(out)
    }
    fn from_primitive(p: Primitive, resolve: &dyn Resolve) -> Result<Self> {
        Ok(PdfString(p.resolve(resolve)?.as_string()?.to_vec()))
    }
}

impl<T: Object> Object for Option<T> {
    fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        match self {
            Some(v) => v.serialize(out),
            None => {
                write!(out, "null")?;
                Ok(())
            }
        }
    }
    fn from_primitive(p: Primitive, resolve: &dyn Resolve) -> Result<Self> {
        match p {
            Primitive::Null => Ok(None),
            other => Ok(Some(T::from_primitive(other, resolve)?)),
        }
    }
}

impl<T: Object> Object for Vec<T> {
    fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        write!(out, "[")?;
        for (i, item) in self.iter().enumerate() {
            if i > 0 {
                write!(out, " ")?;
            }
            item.serialize(out)?;
        }
        write!(out, "]")?;
        Ok(())
    }
    fn from_primitive(p: Primitive, resolve: &dyn Resolve) -> Result<Self> {
        match p {
            Primitive::Null => Ok(Vec::new()),
            other => other
                .into_array()?
                .into_iter()
                .map(|item| T::from_primitive(item, resolve))
                .collect(),
        }
    }
}

impl Object for PlainRef {
    fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        write!(out, "{}", self)?;
        Ok(())
    }
    fn from_primitive(p: Primitive, _resolve: &dyn Resolve) -> Result<Self> {
        p.as_reference()
    }
}

impl<T> Object for Ref<T> {
    fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        write!(out, "{}", self.get_inner())?;
        Ok(())
    }
    fn from_primitive(p: Primitive, _resolve: &dyn Resolve) -> Result<Self> {
        Ok(Ref::new(p.as_reference()?))
    }
}

impl Object for Dictionary {
    fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        Primitive::Dictionary(self.clone()).serialize(out)
    }
    fn from_primitive(p: Primitive, resolve: &dyn Resolve) -> Result<Self> {
        p.resolve(resolve)?.into_dictionary()
    }
}
