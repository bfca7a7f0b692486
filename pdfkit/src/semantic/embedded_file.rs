//! Embedded files (spec §3 C4 "Document: embeddedFiles[]"), reached via the
//! catalog's `/Names /EmbeddedFiles` name tree. Grounded on the teacher's
//! `FileSpec`/`Files`/`EmbeddedFile`/`EmbeddedFileParamDict` in
//! `object/types.rs`, flattened out of its unfinished `NameTree<T>` and
//! read eagerly instead, consistent with the rest of C4.

use crate::decoded::DecodedCache;
use crate::error::Result;
use crate::object::{Dictionary, ObjNr, PdfString, Resolve};

#[derive(Clone, Debug)]
pub struct EmbeddedFile {
    pub name: String,
    pub description: Option<String>,
    pub mime_subtype: Option<String>,
    pub size: Option<i64>,
    pub data: Vec<u8>,
}

fn text_field(dict: &Dictionary, key: &'static str, resolve: &dyn Resolve) -> Result<Option<String>> {
    match dict.get(key) {
        Some(p) => Ok(Some(PdfString(p.clone().resolve(resolve)?.as_string()?.to_vec()).to_string_lossy())),
        None => Ok(None),
    }
}

impl EmbeddedFile {
    /// Builds one embedded file from a `/Names /EmbeddedFiles` name-tree
    /// leaf pair: `name` is the tree key, `spec` is the file specification
    /// dictionary it maps to.
    pub fn build(name: String, spec: &Dictionary, resolve: &dyn Resolve, cache: &DecodedCache) -> Result<EmbeddedFile> {
        let description = text_field(spec, "Desc", resolve)?;

        let ef = spec
            .get("EF")
            .ok_or_else(|| crate::error::MissingEntrySnafu { typ: "FileSpec", field: "EF" }.build())?
            .clone()
            .resolve(resolve)?
            .into_dictionary()?;

        // prefer /F, falling back to the platform-specific keys the
        // teacher's `Files<T>` keeps around for pre-PDF-1.7 files
        let stream_ref = ["F", "UF", "DOS", "Mac", "Unix"]
            .iter()
            .find_map(|key| ef.get(key))
            .ok_or_else(|| crate::error::MissingEntrySnafu { typ: "FileSpec", field: "EF/F" }.build())?
            .clone();

        let id = match &stream_ref {
            crate::object::Primitive::Reference(r) => r.id,
            _ => 0,
        };
        let stream = stream_ref.resolve(resolve)?.into_stream()?;
        let mime_subtype = match stream.info.get("Subtype") {
            Some(p) => Some(p.clone().resolve(resolve)?.into_name()?),
            None => None,
        };
        let size = match stream.info.get("Params") {
            Some(p) => {
                let params = p.clone().resolve(resolve)?.into_dictionary()?;
                match params.get("Size") {
                    Some(s) => Some(s.clone().resolve(resolve)?.as_integer()?),
                    None => None,
                }
            }
            None => None,
        };
        let data = cache.get_or_decode(id as ObjNr, &stream, resolve)?;

        Ok(EmbeddedFile { name, description, mime_subtype, size, data })
    }
}
