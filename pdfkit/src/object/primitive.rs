//! The raw object model (C1): every PDF value boils down to a [`Primitive`].
//!
//! This mirrors the teacher crate's `primitive` module (declared in its
//! `lib.rs` but not shipped in the retrieved source), rebuilt from the shape
//! `#[derive(Object)]`-generated code and the lexer/parser expect: a
//! dictionary that preserves key insertion order, a stream that keeps its
//! still-encoded bytes alongside its info dictionary, and indirect references
//! identified by an object number plus a generation number.

use crate::error::{self, Result};
use std::fmt;

/// Object number: the `12` in `12 0 R`.
pub type ObjNr = u32;
/// Generation number: the `0` in `12 0 R`.
pub type GenNr = u16;

/// Identifies one indirect object slot in a document's cross-reference table.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PlainRef {
    pub id: ObjNr,
    pub gen: GenNr,
}

impl fmt::Display for PlainRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

/// A typed handle to an indirect object: a [`PlainRef`] with a phantom type
/// so that `Ref<Page>` and `Ref<Font>` cannot be confused at compile time.
pub struct Ref<T> {
    inner: PlainRef,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> Ref<T> {
    pub fn new(inner: PlainRef) -> Ref<T> {
        Ref {
            inner,
            _marker: std::marker::PhantomData,
        }
    }
    pub fn from_id(id: ObjNr, gen: GenNr) -> Ref<T> {
        Ref::new(PlainRef { id, gen })
    }
    pub fn get_inner(&self) -> PlainRef {
        self.inner
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Ref<T> {}
impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Ref({})", self.inner)
    }
}
impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}
impl<T> Eq for Ref<T> {}

/// Anything that can turn a [`PlainRef`] back into the [`Primitive`] it
/// names. Implemented by the raw document store (C1) and threaded through
/// every `Object::from_primitive` so typed structs can follow references
/// lazily, the same role `File<B>` plays in the teacher crate.
pub trait Resolve {
    fn resolve(&self, r: PlainRef) -> Result<Primitive>;
}

/// A `Resolve` that refuses to follow any reference; useful for parsing
/// primitives in isolation (tests, the lexer's own unit tests).
pub struct NoResolve;
impl Resolve for NoResolve {
    fn resolve(&self, r: PlainRef) -> Result<Primitive> {
        error::MissingObjectSnafu { num: r.id, gen: r.gen }.fail()
    }
}

/// An order-preserving string-keyed map. PDF dictionaries are unordered by
/// spec, but preserving the order they were written in keeps re-serialized
/// output close to the input, which both the editor (C9, §8 P6) and the
/// optimizer (C10) rely on for stable diffs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dictionary {
    entries: Vec<(String, Primitive)>,
}

impl Dictionary {
    pub fn new() -> Dictionary {
        Dictionary { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Primitive> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<Primitive> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Insert, replacing any existing value but keeping its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: Primitive) -> Option<Primitive> {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.entries.push((key, value));
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Primitive)> {
        self.entries.iter()
    }

    /// Mutable entry iteration; used by the optimizer (C10) to rewrite
    /// references and promote duplicated direct values in place.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut (String, Primitive)> {
        self.entries.iter_mut()
    }

    /// Checks that `key` holds the name `expected`. When `required` is
    /// `false`, a missing key is not an error (used for `Type = "Foo?"`).
    pub fn expect(&self, key: &'static str, expected: &'static str, required: bool) -> Result<()> {
        match self.get(key) {
            Some(Primitive::Name(found)) if found == expected => Ok(()),
            Some(Primitive::Name(found)) => error::KeyValueMismatchSnafu {
                key,
                expected: expected.to_string(),
                found: found.clone(),
            }
            .fail(),
            Some(other) => error::UnexpectedPrimitiveSnafu {
                expected: "Name",
                found: other.kind_name(),
            }
            .fail(),
            None if required => error::MissingEntrySnafu { typ: expected, field: key }.fail(),
            None => Ok(()),
        }
    }
}

impl FromIterator<(String, Primitive)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (String, Primitive)>>(iter: I) -> Self {
        let mut dict = Dictionary::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

/// A stream object: a dictionary of metadata plus a raw (possibly
/// filter-encoded) byte payload. Decoding lives in [`crate::enc`] (C2); this
/// struct only carries the still-encoded bytes the parser saw.
#[derive(Clone, Debug, PartialEq)]
pub struct PdfStream {
    pub info: Dictionary,
    pub data: Vec<u8>,
}

impl PdfStream {
    /// Mirrors `Primitive::into_stream`; exists as an inherent constructor so
    /// generated `#[derive(Object)]` code for `#[pdf(is_stream)]` enums can
    /// call it without forcing every variant's inner type through `Object`.
    pub fn from_primitive(p: Primitive, _resolve: &dyn Resolve) -> Result<PdfStream> {
        p.into_stream()
    }
}

/// Every syntactic value a PDF file can contain (ISO 32000-1 §7.3), i.e. the
/// raw IR named by spec §3 ("Raw object model (C1)").
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Name(String),
    String(Vec<u8>),
    Array(Vec<Primitive>),
    Dictionary(Dictionary),
    Stream(PdfStream),
    Reference(PlainRef),
}

impl Primitive {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Primitive::Null => "Null",
            Primitive::Bool(_) => "Bool",
            Primitive::Integer(_) => "Integer",
            Primitive::Number(_) => "Number",
            Primitive::Name(_) => "Name",
            Primitive::String(_) => "String",
            Primitive::Array(_) => "Array",
            Primitive::Dictionary(_) => "Dictionary",
            Primitive::Stream(_) => "Stream",
            Primitive::Reference(_) => "Reference",
        }
    }

    pub fn as_integer(&self) -> Result<i64> {
        match self {
            Primitive::Integer(i) => Ok(*i),
            Primitive::Number(n) => Ok(*n as i64),
            other => error::UnexpectedPrimitiveSnafu { expected: "Integer", found: other.kind_name() }.fail(),
        }
    }

    pub fn as_number(&self) -> Result<f64> {
        match self {
            Primitive::Integer(i) => Ok(*i as f64),
            Primitive::Number(n) => Ok(*n),
            other => error::UnexpectedPrimitiveSnafu { expected: "Number", found: other.kind_name() }.fail(),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Primitive::Bool(b) => Ok(*b),
            other => error::UnexpectedPrimitiveSnafu { expected: "Bool", found: other.kind_name() }.fail(),
        }
    }

    pub fn as_name(&self) -> Result<&str> {
        match self {
            Primitive::Name(n) => Ok(n.as_str()),
            other => error::UnexpectedPrimitiveSnafu { expected: "Name", found: other.kind_name() }.fail(),
        }
    }

    pub fn into_name(self) -> Result<String> {
        match self {
            Primitive::Name(n) => Ok(n),
            other => error::UnexpectedPrimitiveSnafu { expected: "Name", found: other.kind_name() }.fail(),
        }
    }

    pub fn as_string(&self) -> Result<&[u8]> {
        match self {
            Primitive::String(s) => Ok(s.as_slice()),
            other => error::UnexpectedPrimitiveSnafu { expected: "String", found: other.kind_name() }.fail(),
        }
    }

    pub fn into_array(self) -> Result<Vec<Primitive>> {
        match self {
            Primitive::Array(a) => Ok(a),
            // a singleton is often written bare where an array was expected
            other @ (Primitive::Integer(_) | Primitive::Number(_) | Primitive::Name(_) | Primitive::Reference(_)) => {
                Ok(vec![other])
            }
            other => error::UnexpectedPrimitiveSnafu { expected: "Array", found: other.kind_name() }.fail(),
        }
    }

    pub fn into_dictionary(self) -> Result<Dictionary> {
        match self {
            Primitive::Dictionary(d) => Ok(d),
            Primitive::Stream(s) => Ok(s.info),
            other => error::UnexpectedPrimitiveSnafu { expected: "Dictionary", found: other.kind_name() }.fail(),
        }
    }

    pub fn into_stream(self) -> Result<PdfStream> {
        match self {
            Primitive::Stream(s) => Ok(s),
            other => error::UnexpectedPrimitiveSnafu { expected: "Stream", found: other.kind_name() }.fail(),
        }
    }

    pub fn as_reference(&self) -> Result<PlainRef> {
        match self {
            Primitive::Reference(r) => Ok(*r),
            other => error::UnexpectedPrimitiveSnafu { expected: "Reference", found: other.kind_name() }.fail(),
        }
    }

    pub fn resolve(self, resolve: &dyn Resolve) -> Result<Primitive> {
        match self {
            Primitive::Reference(r) => resolve.resolve(r),
            other => Ok(other),
        }
    }

    /// Writes the PDF-syntax representation of this value (no indirect
    /// object header/trailer — [`crate::writer`] owns that).
    pub fn serialize<W: std::io::Write>(&self, out: &mut W) -> Result<()> {
        match self {
            Primitive::Null => write!(out, "null")?,
            Primitive::Bool(b) => write!(out, "{}", b)?,
            Primitive::Integer(i) => write!(out, "{}", i)?,
            Primitive::Number(n) => write!(out, "{}", n)?,
            Primitive::Name(n) => write!(out, "/{}", n)?,
            Primitive::String(s) => {
                write!(out, "(")?;
                for &b in s {
                    match b {
                        b'(' | b')' | b'\\' => write!(out, "\\{}", b as char)?,
                        _ => out.write_all(&[b])?,
                    }
                }
                write!(out, ")")?;
            }
            Primitive::Array(items) => {
                write!(out, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(out, " ")?;
                    }
                    item.serialize(out)?;
                }
                write!(out, "]")?;
            }
            Primitive::Dictionary(dict) => {
                writeln!(out, "<<")?;
                for (k, v) in dict.iter() {
                    write!(out, "/{} ", k)?;
                    v.serialize(out)?;
                    writeln!(out)?;
                }
                write!(out, ">>")?;
            }
            Primitive::Stream(s) => {
                Primitive::Dictionary(s.info.clone()).serialize(out)?;
                writeln!(out, "\nstream")?;
                out.write_all(&s.data)?;
                writeln!(out, "\nendstream")?;
            }
            Primitive::Reference(r) => write!(out, "{}", r)?,
        }
        Ok(())
    }
}
