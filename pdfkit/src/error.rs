//! The error taxonomy for every layer of `pdfkit` (raw IR through optimizer).
//!
//! One flat `PdfError` enum, derived with `snafu`, rather than a nested
//! per-module hierarchy: callers usually want to `match` on the *kind* of
//! failure (parse vs. filter vs. structural) regardless of which component
//! raised it, which is how the teacher crate's own `error.rs` is shaped.

use crate::object::{GenNr, ObjNr};
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PdfError {
    // ---- Raw IR / parsing (C1, C6 tokenizing) ----
    #[snafu(display("unexpected end of input"))]
    Eof,

    #[snafu(display("parse error at byte {pos}: {reason}"))]
    Parse { pos: usize, reason: String },

    #[snafu(display("unexpected lexeme '{lexeme}' at {pos} (expected {expected})"))]
    UnexpectedLexeme {
        pos: usize,
        lexeme: String,
        expected: &'static str,
    },

    #[snafu(display("unknown object syntax at {pos}: '{first_lexeme}'"))]
    UnknownType { pos: usize, first_lexeme: String },

    #[snafu(display("unknown variant '{name}' for enum {id}"))]
    UnknownVariant { id: &'static str, name: String },

    #[snafu(display("expected primitive {expected}, found {found}"))]
    UnexpectedPrimitive {
        expected: &'static str,
        found: &'static str,
    },

    #[snafu(display("field {field} is missing in dictionary for type {typ}"))]
    MissingEntry { typ: &'static str, field: &'static str },

    #[snafu(display("expected /{key} = /{expected}, found /{found}"))]
    KeyValueMismatch {
        key: &'static str,
        expected: String,
        found: String,
    },

    #[snafu(display("could not parse field `{field}` of `{typ}`: {source}"))]
    FromPrimitive {
        typ: &'static str,
        field: &'static str,
        source: Box<PdfError>,
    },

    // ---- Reference resolution ----
    #[snafu(display("reference {num} {gen} R does not resolve to an object"))]
    MissingObject { num: ObjNr, gen: GenNr },

    #[snafu(display("tried to dereference free object {obj_nr}"))]
    FreeObject { obj_nr: ObjNr },

    // ---- Filter pipeline (C2) ----
    #[snafu(display("unsupported filter '{name}'"))]
    UnsupportedFilter { name: String },

    #[snafu(display("filter stage {stage} failed to decode: {reason}"))]
    FilterDecode { stage: &'static str, reason: String },

    #[snafu(display("decompressed stream exceeds the configured size ceiling"))]
    DecompressionLimit,

    // ---- Semantic builder (C5) ----
    #[snafu(display("invalid page tree: {reason}"))]
    InvalidPageTree { reason: String },

    #[snafu(display("invalid resources dictionary: {reason}"))]
    InvalidResources { reason: String },

    #[snafu(display("page {page_nr} is out of bounds (have {max})"))]
    PageOutOfBounds { page_nr: usize, max: usize },

    // ---- Content-stream processor (C6) ----
    #[snafu(display("unbalanced graphics/text state: {op} with no matching push"))]
    UnbalancedState { op: &'static str },

    #[snafu(display("unknown operator '{name}'"))]
    UnknownOperator { name: String, recoverable: bool },

    #[snafu(display("resource '/{name}' not found in {category}"))]
    MissingResource { category: &'static str, name: String },

    // ---- Tracer (C7) ----
    #[snafu(display("trace failed at operation {op_index}: {reason}"))]
    TraceError { op_index: usize, reason: String },

    // ---- Editor (C9) ----
    #[snafu(display("structure tree became inconsistent: {reason}"))]
    StructTreeInconsistency { reason: String },

    #[snafu(display("text not found on page"))]
    NotFound,

    #[snafu(display("replacement text spans more than one font"))]
    UnsupportedCrossFont,

    // ---- Cross-cutting ----
    #[snafu(display("operation canceled"))]
    Canceled,

    #[snafu(display("internal error: {reason}"))]
    Internal { reason: String },

    #[snafu(display("I/O error: {source}"))]
    Io { source: std::io::Error },

    #[snafu(display("{reason}"))]
    Other { reason: String },
}

pub type Result<T> = std::result::Result<T, PdfError>;

impl From<std::io::Error> for PdfError {
    fn from(source: std::io::Error) -> PdfError {
        PdfError::Io { source }
    }
}

impl From<String> for PdfError {
    fn from(reason: String) -> PdfError {
        PdfError::Other { reason }
    }
}

impl From<&str> for PdfError {
    fn from(reason: &str) -> PdfError {
        PdfError::Other {
            reason: reason.to_string(),
        }
    }
}

impl From<std::str::Utf8Error> for PdfError {
    fn from(source: std::str::Utf8Error) -> PdfError {
        PdfError::Parse {
            pos: 0,
            reason: source.to_string(),
        }
    }
}

impl From<std::num::ParseIntError> for PdfError {
    fn from(source: std::num::ParseIntError) -> PdfError {
        PdfError::Parse {
            pos: 0,
            reason: source.to_string(),
        }
    }
}

impl From<std::num::ParseFloatError> for PdfError {
    fn from(source: std::num::ParseFloatError) -> PdfError {
        PdfError::Parse {
            pos: 0,
            reason: source.to_string(),
        }
    }
}

/// Mirrors the teacher's `bail!`/`err!` macros: build an [`PdfError::Other`]
/// from a format string without naming a dedicated variant.
macro_rules! bail {
    ($($t:tt)*) => {
        return Err(crate::error::PdfError::Other { reason: format!($($t)*) })
    }
}
pub(crate) use bail;
