//! `pdfkit` command-line front end: `optimize` runs the C10 optimizer over
//! a document and writes the result back out; `redact` removes everything
//! drawn inside a page rectangle (C9) before writing.
//!
//! Exit codes follow the library's error taxonomy rather than inventing a
//! CLI-specific one: 0 success, 1 a raw/parse-layer error, 2 anything past
//! the raw layer (filter, semantic, content, editor), 3 canceled, 4 bad
//! arguments. Nothing here owns a [`pdfkit::CancelToken`] long enough for
//! cancellation to matter yet; it's threaded through because every library
//! entry point expects one.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pdfkit::diagnostic::LogSink;
use pdfkit::semantic::Rect;
use pdfkit::{cancel, decoded, editor, enc, file, optimizer, semantic, write, PdfError};

#[derive(Parser)]
#[command(name = "pdfkit", about = "Construct, transform, optimize and serialize PDF documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the optimizer (object dedup, unused-resource sweep, stream and
    /// image recompression) over a document.
    Optimize {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        quality: Option<u8>,
        #[arg(long)]
        ppi: Option<f64>,
        #[arg(long)]
        clean_unused: bool,
        #[arg(long)]
        compress_streams: bool,
    },
    /// Remove everything drawn inside a page rectangle.
    Redact {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        page: usize,
        /// `left,bottom,width,height` in default user space units.
        #[arg(long)]
        rect: String,
    },
}

const MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024;

fn main() -> ExitCode {
    env_logger::init();
    match Cli::parse().command {
        Command::Optimize { input, output, quality, ppi, clean_unused, compress_streams } => {
            run_optimize(&input, &output, quality, ppi, clean_unused, compress_streams)
        }
        Command::Redact { input, output, page, rect } => run_redact(&input, &output, page, &rect),
    }
}

fn run_optimize(input: &PathBuf, output: &PathBuf, quality: Option<u8>, ppi: Option<f64>, clean_unused: bool, compress_streams: bool) -> ExitCode {
    let sink = LogSink;
    let cancel = cancel::never();

    let mut raw = match file::open(input) {
        Ok(raw) => raw,
        Err(err) => return report(&err),
    };
    let doc = match build_document(&raw, &sink, &cancel) {
        Ok(doc) => doc,
        Err(err) => return report(&err),
    };

    let config = optimizer::OptimizerConfig {
        combine_identical_indirect_objects: true,
        combine_duplicate_streams: true,
        combine_duplicate_direct_objects: true,
        compress_streams,
        clean_unused_resources: clean_unused,
        image_quality: quality.unwrap_or(0),
        image_upper_ppi: ppi.unwrap_or(0.0),
    };
    if let Err(err) = optimizer::optimize(&mut raw, &doc, &config, &sink, &cancel) {
        return report(&err);
    }

    write_out(&mut raw, &doc, output)
}

fn run_redact(input: &PathBuf, output: &PathBuf, page: usize, rect: &str) -> ExitCode {
    let rect = match parse_rect(rect) {
        Ok(r) => r,
        Err(message) => {
            eprintln!("pdfkit: {message}");
            return ExitCode::from(4);
        }
    };
    if page == 0 {
        eprintln!("pdfkit: --page is 1-based; 0 is not a valid page number");
        return ExitCode::from(4);
    }

    let sink = LogSink;
    let cancel = cancel::never();

    let mut raw = match file::open(input) {
        Ok(raw) => raw,
        Err(err) => return report(&err),
    };
    let mut doc = match build_document(&raw, &sink, &cancel) {
        Ok(doc) => doc,
        Err(err) => return report(&err),
    };

    if let Err(err) = editor::remove_rect(&mut doc, page - 1, rect, &sink, &cancel) {
        return report(&err);
    }

    write_out(&mut raw, &doc, output)
}

fn build_document(raw: &pdfkit::object::RawDocument, sink: &dyn pdfkit::diagnostic::DiagnosticSink, cancel: &pdfkit::CancelToken) -> pdfkit::Result<semantic::Document> {
    let cache = decoded::DecodedCache::new(MAX_DECOMPRESSED_SIZE);
    semantic::builder::build(raw, &cache, MAX_DECOMPRESSED_SIZE, cancel, sink)
}

fn write_out(raw: &mut pdfkit::object::RawDocument, doc: &semantic::Document, output: &PathBuf) -> ExitCode {
    let config = write::WriteConfig {
        deterministic: true,
        linearize: false,
        content_filter: Some(enc::Filter::FlateDecode),
    };
    let mut out = match std::fs::File::create(output) {
        Ok(f) => f,
        Err(err) => return report(&PdfError::from(err)),
    };
    match write::write(raw, doc, &mut out, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

/// `left,bottom,width,height` -> a [`Rect`]. Kept separate from the
/// library so a malformed `--rect` is a usage error (exit 4), not a
/// document error.
fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts: Vec<&str> = s.split(',').collect();
    let [left, bottom, width, height] = parts[..] else {
        return Err(format!("--rect expects 4 comma-separated numbers, got '{s}'"));
    };
    let parse = |field: &str, v: &str| v.trim().parse::<f64>().map_err(|_| format!("--rect {field} '{v}' is not a number"));
    let left = parse("left", left)?;
    let bottom = parse("bottom", bottom)?;
    let width = parse("width", width)?;
    let height = parse("height", height)?;
    Ok(Rect { left, bottom, right: left + width, top: bottom + height })
}

fn report(err: &PdfError) -> ExitCode {
    eprintln!("pdfkit: {err}");
    ExitCode::from(exit_code(err))
}

fn exit_code(err: &PdfError) -> u8 {
    match err {
        PdfError::Canceled => 3,
        PdfError::Eof
        | PdfError::Parse { .. }
        | PdfError::UnexpectedLexeme { .. }
        | PdfError::UnknownType { .. }
        | PdfError::UnknownVariant { .. }
        | PdfError::UnexpectedPrimitive { .. }
        | PdfError::MissingEntry { .. }
        | PdfError::KeyValueMismatch { .. }
        | PdfError::FromPrimitive { .. }
        | PdfError::MissingObject { .. }
        | PdfError::FreeObject { .. } => 1,
        _ => 2,
    }
}
