//! `pdfkit` — construct, transform, optimize and serialize PDF documents
//! through a layered object model, content-stream processor and optimizer.
//!
//! The crate is organized as the stack it implements:
//!
//! - [`object`] / [`parser`] / [`xref`] — the raw object model (C1) and the
//!   tokenizer that reads it from bytes.
//! - [`enc`] — the filter pipeline (C2).
//! - [`decoded`] — the decoded IR (C3): per-stream decode cache.
//! - [`semantic`] — the semantic IR (C4) and its builder (C5).
//! - [`content`] — the content-stream processor (C6).
//! - [`trace`] — the tracer (C7), producing per-operation bounding boxes.
//! - [`spatial`] — the quadtree spatial index (C8).
//! - [`editor`] — region removal / text replacement / structure repair (C9).
//! - [`optimizer`] — object dedup, reachability sweep, recompression (C10).
//!
//! [`file::open`] ties the raw layer to a byte backend; [`write::write`]
//! serializes a [`object::RawDocument`] back to PDF syntax.

pub mod backend;
pub mod cancel;
pub mod content;
pub mod crypt;
pub mod decoded;
pub mod diagnostic;
pub mod editor;
pub mod enc;
pub mod error;
pub mod file;
pub mod object;
pub mod optimizer;
pub mod parser;
pub mod semantic;
pub mod spatial;
pub mod trace;
pub mod write;
pub mod xref;

pub use cancel::CancelToken;
pub use error::{PdfError, Result};
pub use semantic::Document;
