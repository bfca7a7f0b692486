//! The semantic builder (C5, spec §4.2): turns a [`RawDocument`] plus its
//! [`DecodedCache`] into a [`Document`]. Grounded on the teacher's
//! `inherit()` walk in `object/types.rs` (generalized from a lazy,
//! per-accessor walk into a single eager pass) and its `Catalog`/`PageTree`
//! field layout.

use crate::cancel::CancelToken;
use crate::decoded::DecodedCache;
use crate::diagnostic::{diag_warn, DiagnosticSink};
use crate::error::{self, Result};
use crate::object::{Dictionary, ObjNr, PdfString, PlainRef, Primitive, RawDocument, Resolve};
use crate::semantic::annotation::Annotation;
use crate::semantic::field::AcroForm;
use crate::semantic::font::Font;
use crate::semantic::outline::OutlineItem;
use crate::semantic::page::{ContentStream, Document, Info, Page, PageLabelRange, Rotation, LETTER};
use crate::semantic::resources::{Rect, Resources};
use crate::semantic::struct_tree::StructureTree;
use crate::semantic::xobject::XObject;
use std::collections::{BTreeMap, HashSet};

#[derive(Clone, Default)]
struct Inherited {
    media_box: Option<Rect>,
    crop_box: Option<Rect>,
    rotate: Option<i32>,
    resources: Option<Dictionary>,
}

struct PendingPage {
    page_ref: PlainRef,
    dict: Dictionary,
    inherited: Inherited,
}

fn overlay(dict: &Dictionary, resolve: &dyn Resolve, parent: &Inherited) -> Result<Inherited> {
    let media_box = match dict.get("MediaBox") {
        Some(p) => Some(<Rect as crate::object::Object>::from_primitive(p.clone(), resolve)?),
        None => parent.media_box,
    };
    let crop_box = match dict.get("CropBox") {
        Some(p) => Some(<Rect as crate::object::Object>::from_primitive(p.clone(), resolve)?),
        None => parent.crop_box,
    };
    let rotate = match dict.get("Rotate") {
        Some(p) => Some(p.clone().resolve(resolve)?.as_integer()? as i32),
        None => parent.rotate,
    };
    let resources = match dict.get("Resources") {
        Some(p) => Some(p.clone().resolve(resolve)?.into_dictionary()?),
        None => parent.resources.clone(),
    };
    Ok(Inherited { media_box, crop_box, rotate, resources })
}

/// Recursive descent of the page tree (spec §4.2 step 2), flattening to a
/// document-order list of leaf pages with their fully-overlaid inherited
/// attributes. Malformed subtrees are skipped with a diagnostic, not fatal
/// (spec §7 propagation policy).
fn walk_page_tree(
    node_ref: PlainRef,
    raw: &dyn Resolve,
    parent: &Inherited,
    visited: &mut HashSet<ObjNr>,
    out: &mut Vec<PendingPage>,
    cancel: &CancelToken,
    sink: &dyn DiagnosticSink,
) -> Result<()> {
    cancel.check()?;
    if !visited.insert(node_ref.id) {
        diag_warn!(sink, "cyclic page tree reference at object {}, skipping", node_ref.id);
        return Ok(());
    }

    let dict = match raw.resolve(node_ref).and_then(|p| p.into_dictionary()) {
        Ok(d) => d,
        Err(e) => {
            diag_warn!(sink, "skipping malformed page-tree node {}: {e}", node_ref.id);
            return Ok(());
        }
    };

    let effective = match overlay(&dict, raw, parent) {
        Ok(e) => e,
        Err(e) => {
            diag_warn!(sink, "skipping page-tree node {} with malformed inheritable attributes: {e}", node_ref.id);
            return Ok(());
        }
    };

    let type_name = dict.get("Type").and_then(|p| p.clone().resolve(raw).ok()).and_then(|p| p.into_name().ok());

    match type_name.as_deref() {
        Some("Pages") => {
            let kids = match dict.get("Kids") {
                Some(p) => p.clone().resolve(raw)?.into_array()?,
                None => {
                    diag_warn!(sink, "Pages node {} has no /Kids, skipping", node_ref.id);
                    return Ok(());
                }
            };
            for kid in kids {
                match kid.as_reference() {
                    Ok(r) => walk_page_tree(r, raw, &effective, visited, out, cancel, sink)?,
                    Err(_) => diag_warn!(sink, "non-reference /Kids entry under {}, skipping", node_ref.id),
                }
            }
        }
        // a bare leaf with no /Type (or an explicit /Page) is treated as a page
        _ => out.push(PendingPage { page_ref: node_ref, dict, inherited: effective }),
    }
    Ok(())
}

fn build_resources(dict: &Dictionary, resolve: &dyn Resolve, cache: &DecodedCache, sink: &dyn DiagnosticSink) -> Result<Resources> {
    let mut resources = Resources::default();

    if let Some(p) = dict.get("Font") {
        for (name, font_ref) in p.clone().resolve(resolve)?.into_dictionary()?.iter() {
            match font_ref.clone().resolve(resolve).and_then(|p| p.into_dictionary()).and_then(|d| Font::build(&d, resolve, cache)) {
                Ok(font) => {
                    resources.fonts.insert(name.clone(), font);
                }
                Err(e) => diag_warn!(sink, "skipping malformed font resource /{name}: {e}"),
            }
        }
    }

    if let Some(p) = dict.get("XObject") {
        for (name, xobj_ref) in p.clone().resolve(resolve)?.into_dictionary()?.iter() {
            let id = match xobj_ref {
                Primitive::Reference(r) => r.id,
                _ => 0,
            };
            match xobj_ref.clone().resolve(resolve).and_then(|p| p.into_stream()).and_then(|s| XObject::build(id, &s, resolve, cache)) {
                Ok(xobject) => {
                    resources.xobjects.insert(name.clone(), xobject);
                }
                Err(e) => diag_warn!(sink, "skipping malformed XObject resource /{name}: {e}"),
            }
        }
    }

    for category in ["ExtGState", "ColorSpace", "Pattern", "Shading", "Properties"] {
        if let Some(p) = dict.get(category) {
            if let Ok(cat_dict) = p.clone().resolve(resolve)?.into_dictionary() {
                for (name, entry) in cat_dict.iter() {
                    if let Ok(d) = entry.clone().resolve(resolve).and_then(|p| p.into_dictionary()) {
                        resources.other.insert(format!("{category}/{name}"), d);
                    }
                }
            }
        }
    }

    Ok(resources)
}

fn concat_contents(dict: &Dictionary, resolve: &dyn Resolve, cache: &DecodedCache, max_size: usize) -> Result<Vec<ContentStream>> {
    let entry = match dict.get("Contents") {
        Some(p) => p.clone(),
        None => return Ok(Vec::new()),
    };

    let refs: Vec<Primitive> = match entry.clone().resolve(resolve)? {
        Primitive::Array(a) => a,
        other @ Primitive::Stream(_) => vec![other],
        _ => vec![entry],
    };

    let mut streams = Vec::new();
    for item in refs {
        let original_ref = item.as_reference().ok();
        let id = original_ref.map(|r| r.id).unwrap_or(0);
        let stream = item.resolve(resolve)?.into_stream()?;
        let data = cache.get_or_decode(id as ObjNr, &stream, resolve).or_else(|_| crate::decoded::decode_standalone(&stream, max_size))?;
        streams.push(ContentStream::new(original_ref, data));
    }
    Ok(streams)
}

fn build_page(pending: PendingPage, resolve: &dyn Resolve, cache: &DecodedCache, max_size: usize, sink: &dyn DiagnosticSink) -> Result<Page> {
    let media_box = pending.inherited.media_box.unwrap_or(LETTER);
    let crop_box = pending.inherited.crop_box.map(|b| b.intersect(&media_box)).unwrap_or(media_box);

    let own_box = |key: &'static str| -> Result<Option<Rect>> {
        match pending.dict.get(key) {
            Some(p) => Ok(Some(<Rect as crate::object::Object>::from_primitive(p.clone(), resolve)?)),
            None => Ok(None),
        }
    };
    let trim_box = own_box("TrimBox")?.map(|b| b.intersect(&media_box)).unwrap_or(crop_box);
    let bleed_box = own_box("BleedBox")?.map(|b| b.intersect(&media_box)).unwrap_or(crop_box);
    let art_box = own_box("ArtBox")?.map(|b| b.intersect(&media_box)).unwrap_or(crop_box);

    let rotate = Rotation::from_degrees(pending.inherited.rotate.unwrap_or(0));

    let resources = match &pending.inherited.resources {
        Some(d) => build_resources(d, resolve, cache, sink)?,
        None => Resources::default(),
    };

    let contents = concat_contents(&pending.dict, resolve, cache, max_size)?;

    let user_unit = pending
        .dict
        .get("UserUnit")
        .map(|p| p.clone().resolve(resolve)?.as_number())
        .transpose()?
        .unwrap_or(1.0);

    Ok(Page {
        original_ref: Some(pending.page_ref),
        dirty: false,
        media_box,
        crop_box,
        trim_box,
        bleed_box,
        art_box,
        rotate,
        resources,
        contents,
        annotations: Vec::new(),
        user_unit,
    })
}

fn build_annotations(pending_dict: &Dictionary, resolve: &dyn Resolve, index_of: &dyn Fn(PlainRef) -> Option<usize>, sink: &dyn DiagnosticSink) -> Result<Vec<Annotation>> {
    let mut annotations = Vec::new();
    if let Some(p) = pending_dict.get("Annots") {
        for item in p.clone().resolve(resolve)?.into_array()? {
            let annot_dict = match item.resolve(resolve)?.into_dictionary() {
                Ok(d) => d,
                Err(e) => {
                    diag_warn!(sink, "skipping malformed annotation: {e}");
                    continue;
                }
            };
            match Annotation::build(&annot_dict, resolve, index_of) {
                Ok(a) => annotations.push(a),
                Err(e) => diag_warn!(sink, "skipping malformed annotation: {e}"),
            }
        }
    }
    Ok(annotations)
}

fn text_field(dict: &Dictionary, key: &'static str, resolve: &dyn Resolve) -> Result<Option<String>> {
    match dict.get(key) {
        Some(p) => Ok(Some(PdfString(p.clone().resolve(resolve)?.as_string()?.to_vec()).to_string_lossy())),
        None => Ok(None),
    }
}

fn parse_pdf_date(s: &str) -> Option<chrono::DateTime<chrono::FixedOffset>> {
    // "D:YYYYMMDDHHmmSSOHH'mm" (ISO 32000-1 §7.9.4); all components after
    // the year are optional, so this only commits to what's present.
    let s = s.strip_prefix("D:").unwrap_or(s);
    if s.len() < 4 {
        return None;
    }
    let digit_pairs = |s: &str, start: usize, default: u32| -> u32 {
        s.get(start..start + 2).and_then(|s| s.parse().ok()).unwrap_or(default)
    };
    let year: i32 = s.get(0..4)?.parse().ok()?;
    let month = if s.len() >= 6 { digit_pairs(s, 4, 1) } else { 1 };
    let day = if s.len() >= 8 { digit_pairs(s, 6, 1) } else { 1 };
    let hour = if s.len() >= 10 { digit_pairs(s, 8, 0) } else { 0 };
    let minute = if s.len() >= 12 { digit_pairs(s, 10, 0) } else { 0 };
    let second = if s.len() >= 14 { digit_pairs(s, 12, 0) } else { 0 };

    let offset = if s.len() > 14 {
        match s.as_bytes().get(14) {
            Some(b'Z') => Some(0),
            Some(b'+') | Some(b'-') => {
                let sign = if s.as_bytes()[14] == b'-' { -1 } else { 1 };
                let oh: i32 = s.get(15..17).and_then(|s| s.parse().ok()).unwrap_or(0);
                let om: i32 = s.get(18..20).and_then(|s| s.parse().ok()).unwrap_or(0);
                Some(sign * (oh * 3600 + om * 60))
            }
            _ => None,
        }
    } else {
        None
    }
    .unwrap_or(0);

    let tz = chrono::FixedOffset::east_opt(offset)?;
    let naive = chrono::NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    Some(chrono::DateTime::from_naive_utc_and_offset(naive - chrono::Duration::seconds(offset as i64), tz))
}

fn build_info(dict: &Dictionary, resolve: &dyn Resolve) -> Result<Info> {
    Ok(Info {
        title: text_field(dict, "Title", resolve)?,
        author: text_field(dict, "Author", resolve)?,
        subject: text_field(dict, "Subject", resolve)?,
        keywords: text_field(dict, "Keywords", resolve)?,
        creator: text_field(dict, "Creator", resolve)?,
        producer: text_field(dict, "Producer", resolve)?,
        creation_date: text_field(dict, "CreationDate", resolve)?.and_then(|s| parse_pdf_date(&s)),
        mod_date: text_field(dict, "ModDate", resolve)?.and_then(|s| parse_pdf_date(&s)),
    })
}

/// Flattens a `/Names` name tree (ISO 32000-1 §7.9.6) of `Kids`/`Names`
/// nodes into ordered `(key, value)` leaf pairs, guarding against cycles.
fn flatten_name_tree(node: &Dictionary, resolve: &dyn Resolve, out: &mut Vec<(String, Primitive)>, visited: &mut HashSet<ObjNr>, depth: usize) -> Result<()> {
    if depth > 64 {
        return Ok(());
    }
    if let Some(p) = node.get("Names") {
        let arr = p.clone().resolve(resolve)?.into_array()?;
        for pair in arr.chunks(2) {
            if pair.len() == 2 {
                let key = PdfString(pair[0].clone().resolve(resolve)?.as_string()?.to_vec()).to_string_lossy();
                out.push((key, pair[1].clone()));
            }
        }
    }
    if let Some(p) = node.get("Kids") {
        for kid in p.clone().resolve(resolve)?.into_array()? {
            let kid_ref = kid.as_reference().ok();
            if let Some(r) = kid_ref {
                if !visited.insert(r.id) {
                    continue;
                }
            }
            if let Ok(kid_dict) = kid.resolve(resolve)?.into_dictionary() {
                flatten_name_tree(&kid_dict, resolve, out, visited, depth + 1)?;
            }
        }
    }
    Ok(())
}

fn build_page_labels(dict: &Dictionary, resolve: &dyn Resolve) -> Result<Vec<PageLabelRange>> {
    // PageLabels is a *number* tree (ISO 32000-1 §7.9.7): `Nums` holds
    // `[index value index value ...]` pairs directly, unlike a name tree's
    // string-keyed `Names`, so it is walked by hand rather than reusing
    // `flatten_name_tree`.
    let mut ranges = Vec::new();
    let mut raw_pairs: Vec<(i64, Primitive)> = Vec::new();
    if let Some(p) = dict.get("Nums") {
        let arr = p.clone().resolve(resolve)?.into_array()?;
        for pair in arr.chunks(2) {
            if pair.len() == 2 {
                raw_pairs.push((pair[0].clone().resolve(resolve)?.as_integer()?, pair[1].clone()));
            }
        }
    } else if let Some(p) = dict.get("Kids") {
        for kid in p.clone().resolve(resolve)?.into_array()? {
            if let Ok(kid_dict) = kid.resolve(resolve)?.into_dictionary() {
                ranges.extend(build_page_labels(&kid_dict, resolve)?);
            }
        }
    }

    for (index, entry) in raw_pairs {
        let d = entry.resolve(resolve)?.into_dictionary()?;
        let style = match d.get("S") {
            Some(p) => match p.clone().resolve(resolve)?.into_name()?.as_str() {
                "D" => crate::semantic::page::NumberingStyle::Decimal,
                "r" => crate::semantic::page::NumberingStyle::RomanLower,
                "R" => crate::semantic::page::NumberingStyle::RomanUpper,
                "a" => crate::semantic::page::NumberingStyle::AlphaLower,
                "A" => crate::semantic::page::NumberingStyle::AlphaUpper,
                _ => crate::semantic::page::NumberingStyle::None,
            },
            None => crate::semantic::page::NumberingStyle::None,
        };
        let prefix = match d.get("P") {
            Some(p) => Some(PdfString(p.clone().resolve(resolve)?.as_string()?.to_vec()).to_string_lossy()),
            None => None,
        };
        let start = d.get("St").map(|p| p.clone().resolve(resolve)?.as_integer()).transpose()?.unwrap_or(1) as i32;
        ranges.push(PageLabelRange { start_page_index: index as usize, style, prefix, start });
    }
    ranges.sort_by_key(|r| r.start_page_index);
    Ok(ranges)
}

/// Builds the semantic document (C5, spec §4.2). Catalog-level failure
/// (missing/malformed `/Root`) aborts; every other failure is diagnosed and
/// the offending sub-tree is skipped (spec §7 propagation policy).
pub fn build(raw: &RawDocument, cache: &DecodedCache, max_size: usize, cancel: &CancelToken, sink: &dyn DiagnosticSink) -> Result<Document> {
    let catalog = raw
        .resolve(raw.trailer.root)
        .and_then(|p| p.into_dictionary())
        .map_err(|e| error::InvalidPageTreeSnafu { reason: format!("cannot resolve catalog: {e}") }.build())?;

    let pages_ref = catalog
        .get("Pages")
        .ok_or_else(|| error::InvalidPageTreeSnafu { reason: "catalog has no /Pages".to_string() }.build())?
        .as_reference()
        .map_err(|_| error::InvalidPageTreeSnafu { reason: "/Pages is not an indirect reference".to_string() }.build())?;

    let mut pending = Vec::new();
    let mut visited = HashSet::new();
    walk_page_tree(pages_ref, raw, &Inherited::default(), &mut visited, &mut pending, cancel, sink)?;

    let mut page_index_by_ref = BTreeMap::new();
    for (i, p) in pending.iter().enumerate() {
        page_index_by_ref.insert(p.page_ref.id, i);
    }
    let index_of = |r: PlainRef| page_index_by_ref.get(&r.id).copied();

    let mut pages = Vec::new();
    for p in pending {
        cancel.check()?;
        let annotations = build_annotations(&p.dict, raw, &index_of, sink).unwrap_or_default();
        match build_page(p, raw, cache, max_size, sink) {
            Ok(mut page) => {
                page.annotations = annotations;
                pages.push(page);
            }
            Err(e) => diag_warn!(sink, "skipping malformed page: {e}"),
        }
    }

    let info = raw
        .trailer
        .info
        .and_then(|r| raw.resolve(r).ok())
        .and_then(|p| p.into_dictionary().ok())
        .and_then(|d| build_info(&d, raw).ok());

    let lang = match catalog.get("Lang") {
        Some(p) => p.clone().resolve(raw).ok().and_then(|p| p.as_string().map(|s| String::from_utf8_lossy(s).into_owned()).ok()),
        None => None,
    };

    let marked = match catalog.get("MarkInfo") {
        Some(p) => p
            .clone()
            .resolve(raw)
            .and_then(|p| p.into_dictionary())
            .ok()
            .and_then(|d| d.get("Marked").and_then(|p| p.clone().resolve(raw).ok()).and_then(|p| p.as_bool().ok()))
            .unwrap_or(false),
        None => false,
    };

    let page_labels = match catalog.get("PageLabels") {
        Some(p) => p.clone().resolve(raw).and_then(|p| p.into_dictionary()).and_then(|d| build_page_labels(&d, raw)).unwrap_or_default(),
        None => Vec::new(),
    };

    let outlines = match catalog.get("Outlines") {
        Some(p) => p
            .clone()
            .resolve(raw)
            .and_then(|p| p.into_dictionary())
            .and_then(|d| OutlineItem::build_top_level(&d, raw, &index_of, sink))
            .unwrap_or_else(|e| {
                diag_warn!(sink, "skipping malformed outline tree: {e}");
                Vec::new()
            }),
        None => Vec::new(),
    };

    let acro_form = match catalog.get("AcroForm") {
        Some(p) => match p.clone().resolve(raw).and_then(|p| p.into_dictionary()).and_then(|d| AcroForm::build(&d, raw, &index_of, sink)) {
            Ok(f) => Some(f),
            Err(e) => {
                diag_warn!(sink, "skipping malformed AcroForm: {e}");
                None
            }
        },
        None => None,
    };

    let struct_tree = match catalog.get("StructTreeRoot") {
        Some(p) => match p.clone().resolve(raw).and_then(|p| p.into_dictionary()).and_then(|d| StructureTree::build(&d, raw, &index_of, sink)) {
            Ok(t) => Some(t),
            Err(e) => {
                diag_warn!(sink, "skipping malformed structure tree: {e}");
                None
            }
        },
        None => None,
    };

    let mut embedded_files = Vec::new();
    if let Some(names_dict) = catalog.get("Names").and_then(|p| p.clone().resolve(raw).ok()).and_then(|p| p.into_dictionary().ok()) {
        if let Some(ef_tree) = names_dict.get("EmbeddedFiles").and_then(|p| p.clone().resolve(raw).ok()).and_then(|p| p.into_dictionary().ok()) {
            let mut pairs = Vec::new();
            if flatten_name_tree(&ef_tree, raw, &mut pairs, &mut HashSet::new(), 0).is_ok() {
                for (name, spec) in pairs {
                    let spec_dict = match spec.resolve(raw).and_then(|p| p.into_dictionary()) {
                        Ok(d) => d,
                        Err(e) => {
                            diag_warn!(sink, "skipping malformed embedded file spec: {e}");
                            continue;
                        }
                    };
                    match crate::semantic::embedded_file::EmbeddedFile::build(name, &spec_dict, raw, cache) {
                        Ok(f) => embedded_files.push(f),
                        Err(e) => diag_warn!(sink, "skipping malformed embedded file: {e}"),
                    }
                }
            }
        }
    }

    Ok(Document {
        pages,
        info,
        lang,
        marked,
        page_labels,
        outlines,
        acro_form,
        struct_tree,
        embedded_files,
        page_index_by_ref,
    })
}
