//! The optimizer (spec §4.7, component C10): object dedup, an unused-object
//! reachability sweep, stream recompression and image downsampling, all
//! operating on the raw object table (C1) rather than the semantic IR.
//!
//! Every pass here is independently switchable via [`OptimizerConfig`] and
//! runs over a [`RawDocument`] in place; [`optimize`] is the entry point
//! that sequences them in the order the spec lists them.

use crate::cancel::CancelToken;
use crate::diagnostic::{diag_warn, DiagnosticSink};
use crate::error::{self, Result};
use crate::object::{Dictionary, ObjNr, PdfStream, PlainRef, Primitive, RawDocument};
use crate::semantic::{Document, ImageXObject, XObject};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    pub combine_identical_indirect_objects: bool,
    pub combine_duplicate_streams: bool,
    pub combine_duplicate_direct_objects: bool,
    pub compress_streams: bool,
    pub clean_unused_resources: bool,
    /// JPEG re-encode quality, `1..=100`. `0` disables image re-encoding.
    pub image_quality: u8,
    /// Target pixels-per-inch at the image's displayed size on the page.
    /// `0.0` disables downsampling.
    pub image_upper_ppi: f64,
}

impl Default for OptimizerConfig {
    fn default() -> OptimizerConfig {
        OptimizerConfig {
            combine_identical_indirect_objects: false,
            combine_duplicate_streams: false,
            combine_duplicate_direct_objects: false,
            compress_streams: false,
            clean_unused_resources: false,
            image_quality: 0,
            image_upper_ppi: 0.0,
        }
    }
}

/// Runs every pass `config` enables, in the order the spec lists them:
/// identical-object dedup, duplicate-direct-value promotion, the
/// reachability sweep, stream recompression, then image optimization.
pub fn optimize(
    raw: &mut RawDocument,
    doc: &Document,
    config: &OptimizerConfig,
    diag: &dyn DiagnosticSink,
    cancel: &CancelToken,
) -> Result<()> {
    if config.combine_identical_indirect_objects {
        combine_identical_indirect_objects(raw, false, cancel)?;
    } else if config.combine_duplicate_streams {
        combine_identical_indirect_objects(raw, true, cancel)?;
    }
    if config.combine_duplicate_direct_objects {
        combine_duplicate_direct_objects(raw, cancel)?;
    }
    if config.clean_unused_resources {
        clean_unused_resources(raw);
    }
    if config.compress_streams {
        compress_streams(raw, cancel)?;
    }
    if config.image_upper_ppi > 0.0 || config.image_quality > 0 {
        optimize_images(raw, doc, config, diag, cancel)?;
    }
    Ok(())
}

/// Canonical byte encoding of a primitive (spec §4.7 "structural hash"):
/// `Null` → `nil`, scalars → a tagged textual form, `Reference` → its
/// literal `num gen R` (never resolved — two documents with identical
/// graph shape but different numbering still hash equal), `Array`/
/// `Dictionary` → bracketed concatenation of their children (dictionary
/// keys sorted first, so key order never affects the hash), `Stream` →
/// its dictionary's encoding followed by its raw, still-filtered bytes.
fn canonical_bytes(p: &Primitive) -> Vec<u8> {
    match p {
        Primitive::Null => b"nil".to_vec(),
        Primitive::Bool(b) => format!("bool:{b}").into_bytes(),
        Primitive::Integer(i) => format!("int:{i}").into_bytes(),
        Primitive::Number(n) => format!("num:{n}").into_bytes(),
        Primitive::Name(n) => {
            let mut out = b"name:".to_vec();
            out.extend_from_slice(n.as_bytes());
            out
        }
        Primitive::String(s) => {
            let mut out = b"str:".to_vec();
            out.extend_from_slice(s);
            out
        }
        Primitive::Reference(r) => format!("{} {} R", r.id, r.gen).into_bytes(),
        Primitive::Array(items) => {
            let mut out = vec![b'['];
            for item in items {
                out.extend(canonical_bytes(item));
            }
            out.push(b']');
            out
        }
        Primitive::Dictionary(dict) => {
            let mut entries: Vec<(&str, &Primitive)> = dict.iter().map(|(k, v)| (k.as_str(), v)).collect();
            entries.sort_by_key(|(k, _)| *k);
            let mut out = vec![b'<', b'<'];
            for (k, v) in entries {
                out.extend_from_slice(k.as_bytes());
                out.push(b' ');
                out.extend(canonical_bytes(v));
            }
            out.extend_from_slice(b">>");
            out
        }
        Primitive::Stream(s) => {
            let mut out = canonical_bytes(&Primitive::Dictionary(s.info.clone()));
            out.push(b' ');
            out.extend_from_slice(&s.data);
            out
        }
    }
}

fn structural_hash(p: &Primitive) -> String {
    format!("{:x}", md5::compute(canonical_bytes(p)))
}

/// `combineIdenticalIndirectObjects` / `combineDuplicateStreams` (spec
/// §4.7): buckets every indirect object by structural hash and collapses
/// each bucket onto its first member, rewriting every reference to the
/// superseded objects. Runs to a fixed point, since collapsing one
/// duplicate can make its parent objects structurally identical too.
fn combine_identical_indirect_objects(raw: &mut RawDocument, streams_only: bool, cancel: &CancelToken) -> Result<()> {
    loop {
        cancel.check()?;
        let mut buckets: HashMap<String, Vec<PlainRef>> = HashMap::new();
        for (id, gen, p) in raw.iter() {
            if streams_only && !matches!(p, Primitive::Stream(_)) {
                continue;
            }
            buckets.entry(structural_hash(p)).or_default().push(PlainRef { id, gen });
        }

        let mut mapping: HashMap<PlainRef, PlainRef> = HashMap::new();
        for refs in buckets.into_values() {
            if refs.len() < 2 {
                continue;
            }
            let canonical = refs[0];
            for &dup in &refs[1..] {
                mapping.insert(dup, canonical);
            }
        }
        if mapping.is_empty() {
            return Ok(());
        }

        for dup in mapping.keys() {
            raw.remove(dup.id);
        }
        rewrite_references(raw, &mapping);
    }
}

fn rewrite_references(raw: &mut RawDocument, mapping: &HashMap<PlainRef, PlainRef>) {
    if let Some(&canonical) = mapping.get(&raw.trailer.root) {
        raw.trailer.root = canonical;
    }
    if let Some(info) = raw.trailer.info {
        if let Some(&canonical) = mapping.get(&info) {
            raw.trailer.info = Some(canonical);
        }
    }

    let ids: Vec<ObjNr> = raw.iter().map(|(id, _, _)| id).collect();
    for id in ids {
        let gen = raw.gen_of(id).unwrap_or(0);
        if let Some(mut p) = raw.get(id).cloned() {
            if rewrite_primitive(&mut p, mapping) {
                raw.set(id, gen, p);
            }
        }
    }
}

fn rewrite_primitive(p: &mut Primitive, mapping: &HashMap<PlainRef, PlainRef>) -> bool {
    let mut changed = false;
    match p {
        Primitive::Reference(r) => {
            if let Some(&canonical) = mapping.get(r) {
                *r = canonical;
                changed = true;
            }
        }
        Primitive::Array(items) => {
            for item in items.iter_mut() {
                changed |= rewrite_primitive(item, mapping);
            }
        }
        Primitive::Dictionary(dict) => {
            for (_, v) in dict.iter_mut() {
                changed |= rewrite_primitive(v, mapping);
            }
        }
        Primitive::Stream(s) => {
            for (_, v) in s.info.iter_mut() {
                changed |= rewrite_primitive(v, mapping);
            }
        }
        _ => {}
    }
    changed
}

/// `combineDuplicateDirectObjects` (spec §4.7): counts every direct
/// array/dictionary value nested inside an indirect object (excluding the
/// indirect objects themselves), and for every hash seen two or more
/// times, promotes one copy to a fresh indirect object and rewrites every
/// occurrence to reference it.
fn combine_duplicate_direct_objects(raw: &mut RawDocument, cancel: &CancelToken) -> Result<()> {
    cancel.check()?;
    let mut counts: HashMap<String, (usize, Primitive)> = HashMap::new();
    for (_, _, p) in raw.iter() {
        count_direct_children(p, &mut counts);
    }

    let mut promotions: HashMap<String, ObjNr> = HashMap::new();
    for (hash, (count, sample)) in counts {
        if count >= 2 {
            let id = raw.add::<()>(sample).get_inner().id;
            promotions.insert(hash, id);
        }
    }
    if promotions.is_empty() {
        return Ok(());
    }

    let promoted_ids: HashSet<ObjNr> = promotions.values().copied().collect();
    let ids: Vec<ObjNr> = raw.iter().map(|(id, _, _)| id).collect();
    for id in ids {
        if promoted_ids.contains(&id) {
            continue;
        }
        let gen = raw.gen_of(id).unwrap_or(0);
        if let Some(mut p) = raw.get(id).cloned() {
            if promote_direct_children(&mut p, &promotions) {
                raw.set(id, gen, p);
            }
        }
    }
    Ok(())
}

fn count_direct_children(p: &Primitive, counts: &mut HashMap<String, (usize, Primitive)>) {
    match p {
        Primitive::Array(items) => {
            for item in items {
                count_node(item, counts);
            }
        }
        Primitive::Dictionary(dict) => {
            for (_, v) in dict.iter() {
                count_node(v, counts);
            }
        }
        Primitive::Stream(s) => {
            for (_, v) in s.info.iter() {
                count_node(v, counts);
            }
        }
        _ => {}
    }
}

fn count_node(p: &Primitive, counts: &mut HashMap<String, (usize, Primitive)>) {
    if matches!(p, Primitive::Array(_) | Primitive::Dictionary(_)) {
        let entry = counts.entry(structural_hash(p)).or_insert_with(|| (0, p.clone()));
        entry.0 += 1;
    }
    count_direct_children(p, counts);
}

fn promote_direct_children(p: &mut Primitive, promotions: &HashMap<String, ObjNr>) -> bool {
    let mut changed = false;
    match p {
        Primitive::Array(items) => {
            for item in items.iter_mut() {
                changed |= promote_or_recurse(item, promotions);
            }
        }
        Primitive::Dictionary(dict) => {
            for (_, v) in dict.iter_mut() {
                changed |= promote_or_recurse(v, promotions);
            }
        }
        Primitive::Stream(s) => {
            for (_, v) in s.info.iter_mut() {
                changed |= promote_or_recurse(v, promotions);
            }
        }
        _ => {}
    }
    changed
}

fn promote_or_recurse(item: &mut Primitive, promotions: &HashMap<String, ObjNr>) -> bool {
    if matches!(item, Primitive::Array(_) | Primitive::Dictionary(_)) {
        if let Some(&id) = promotions.get(&structural_hash(item)) {
            *item = Primitive::Reference(PlainRef { id, gen: 0 });
            return true;
        }
    }
    promote_direct_children(item, promotions)
}

/// `cleanUnusedResources` (spec §4.7): a mark-and-sweep reachability pass
/// starting from the trailer's `/Root` and `/Info`, following every
/// `Reference` edge in the graph. Anything unreached is dropped.
fn clean_unused_resources(raw: &mut RawDocument) {
    let mut keep: HashSet<ObjNr> = HashSet::new();
    let mut stack = vec![raw.trailer.root.id];
    if let Some(info) = raw.trailer.info {
        stack.push(info.id);
    }
    while let Some(id) = stack.pop() {
        if !keep.insert(id) {
            continue;
        }
        if let Some(p) = raw.get(id) {
            collect_references(p, &mut stack);
        }
    }
    raw.retain(&keep);
}

fn collect_references(p: &Primitive, stack: &mut Vec<ObjNr>) {
    match p {
        Primitive::Reference(r) => stack.push(r.id),
        Primitive::Array(items) => {
            for item in items {
                collect_references(item, stack);
            }
        }
        Primitive::Dictionary(dict) => {
            for (_, v) in dict.iter() {
                collect_references(v, stack);
            }
        }
        Primitive::Stream(s) => {
            for (_, v) in s.info.iter() {
                collect_references(v, stack);
            }
        }
        _ => {}
    }
}

/// `compressStreams` (spec §4.7): decodes every stream through its current
/// filter chain and re-encodes with a single `FlateDecode` stage, keeping
/// the smaller result. Drops `/DecodeParms`, `/F` and `/FDecodeParms`
/// since the recompressed bytes no longer need them.
fn compress_streams(raw: &mut RawDocument, cancel: &CancelToken) -> Result<()> {
    let ids: Vec<ObjNr> = raw
        .iter()
        .filter(|(_, _, p)| matches!(p, Primitive::Stream(_)))
        .map(|(id, _, _)| id)
        .collect();

    for id in ids {
        cancel.check()?;
        let gen = raw.gen_of(id).unwrap_or(0);
        let Some(Primitive::Stream(stream)) = raw.get(id).cloned() else {
            continue;
        };
        let chain = crate::enc::filter_chain(stream.info.get("Filter"), stream.info.get("DecodeParms"), &*raw)?;
        if chain.iter().any(|(f, _)| !f.is_text_filter()) {
            continue;
        }
        let decoded = crate::enc::decode_stream(&stream.data, &chain, crate::enc::DEFAULT_MAX_DECOMPRESSED_SIZE)?;
        let flate_chain = vec![(crate::enc::Filter::FlateDecode, crate::enc::DecodeParms::default())];
        let recompressed = crate::enc::encode_stream(&decoded, &flate_chain)?;
        if recompressed.len() >= stream.data.len() {
            continue;
        }

        let mut info = stream.info.clone();
        info.remove("DecodeParms");
        info.remove("F");
        info.remove("FDecodeParms");
        info.insert("Filter", Primitive::Name("FlateDecode".to_string()));
        info.insert("Length", Primitive::Integer(recompressed.len() as i64));
        raw.set(id, gen, Primitive::Stream(PdfStream { info, data: recompressed }));
    }
    Ok(())
}

/// Displayed size (in points) of every image XObject, derived from the
/// largest bounding box any `Do` operator produces for it across all pages
/// (spec §4.7 image optimization: downsampling targets the size the image
/// is actually shown at, not its stored pixel dimensions).
fn collect_displayed_sizes(doc: &Document, diag: &dyn DiagnosticSink, cancel: &CancelToken) -> Result<HashMap<ObjNr, (f64, f64)>> {
    let mut sizes: HashMap<ObjNr, (f64, f64)> = HashMap::new();
    for page in &doc.pages {
        for stream in &page.contents {
            let ops = crate::content::parse_content_stream(&stream.data)?;
            let bboxes = crate::trace::trace(&ops, &page.resources, diag, cancel)?;
            for bbox in bboxes {
                let op = &ops[bbox.op_index];
                if op.operator != "Do" {
                    continue;
                }
                let Some(crate::content::Operand::Name(name)) = op.operands.first() else {
                    continue;
                };
                if let Some(XObject::Image(img)) = page.resources.xobjects.get(name) {
                    let entry = sizes.entry(img.id).or_insert((0.0, 0.0));
                    entry.0 = entry.0.max(bbox.rect.width());
                    entry.1 = entry.1.max(bbox.rect.height());
                }
            }
        }
    }
    Ok(sizes)
}

/// Image downsampling/re-encoding (spec §4.7): for every image XObject
/// decodable by the `image` crate, downsamples to `imageUpperPPI` at its
/// displayed size if it currently exceeds that by more than 20%, then
/// re-encodes as JPEG at `imageQuality`. Images the `image` crate cannot
/// decode directly (raw sample dumps the filter pipeline left opaque, per
/// [`crate::enc`]'s image-codec passthrough) are left untouched.
fn optimize_images(
    raw: &mut RawDocument,
    doc: &Document,
    config: &OptimizerConfig,
    diag: &dyn DiagnosticSink,
    cancel: &CancelToken,
) -> Result<()> {
    let sizes = collect_displayed_sizes(doc, diag, cancel)?;
    let mut seen: HashSet<ObjNr> = HashSet::new();
    for page in &doc.pages {
        cancel.check()?;
        for xobject in page.resources.xobjects.values() {
            if let XObject::Image(img) = xobject {
                if !seen.insert(img.id) {
                    continue;
                }
                optimize_one_image(raw, img, sizes.get(&img.id).copied(), config, diag)?;
            }
        }
    }
    Ok(())
}

fn optimize_one_image(
    raw: &mut RawDocument,
    img: &ImageXObject,
    displayed: Option<(f64, f64)>,
    config: &OptimizerConfig,
    diag: &dyn DiagnosticSink,
) -> Result<()> {
    let Some(gen) = raw.gen_of(img.id) else {
        return Ok(());
    };
    let Some(Primitive::Stream(stream)) = raw.get(img.id).cloned() else {
        return Ok(());
    };
    let Ok(mut decoded) = image::load_from_memory(&img.data) else {
        diag_warn!(diag, "image {} is not a directly decodable raster format, skipping", img.id);
        return Ok(());
    };

    let mut downsampled = false;
    if config.image_upper_ppi > 0.0 {
        if let Some((disp_w, disp_h)) = displayed {
            if disp_w > 0.0 && disp_h > 0.0 {
                let target_w = ((config.image_upper_ppi * disp_w / 72.0).round().max(1.0)) as u32;
                let target_h = ((config.image_upper_ppi * disp_h / 72.0).round().max(1.0)) as u32;
                if img.width as f64 > target_w as f64 * 1.2 || img.height as f64 > target_h as f64 * 1.2 {
                    decoded = decoded.resize(target_w, target_h, image::imageops::FilterType::Lanczos3);
                    downsampled = true;
                }
            }
        }
    }

    let already_jpeg = matches!(img.filters.last(), Some(crate::enc::Filter::DCTDecode));
    if config.image_quality == 0 || (already_jpeg && !downsampled) {
        return Ok(());
    }

    let is_gray = decoded.color().channel_count() <= 2;
    let mut bytes = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, config.image_quality);
    let encode_result = if is_gray {
        encoder.encode_image(&decoded.to_luma8())
    } else {
        encoder.encode_image(&decoded.to_rgb8())
    };
    encode_result.map_err(|e| error::PdfError::Other { reason: format!("JPEG re-encode of image {}: {e}", img.id) })?;

    let mut info = stream.info.clone();
    info.remove("DecodeParms");
    info.insert("Filter", Primitive::Name("DCTDecode".to_string()));
    info.insert("Width", Primitive::Integer(decoded.width() as i64));
    info.insert("Height", Primitive::Integer(decoded.height() as i64));
    info.insert("BitsPerComponent", Primitive::Integer(8));
    info.insert("ColorSpace", Primitive::Name(if is_gray { "DeviceGray" } else { "DeviceRGB" }.to_string()));
    info.insert("Length", Primitive::Integer(bytes.len() as i64));
    raw.set(img.id, gen, Primitive::Stream(PdfStream { info, data: bytes }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Trailer;

    fn doc_with_objects(objects: Vec<(ObjNr, Primitive)>, root: ObjNr) -> RawDocument {
        let mut raw = RawDocument::new(Trailer { size: 0, root: PlainRef { id: root, gen: 0 }, ..Trailer::default() });
        for (id, p) in objects {
            raw.set(id, 0, p);
        }
        raw
    }

    #[test]
    fn structural_hash_ignores_dictionary_key_order() {
        let mut a = Dictionary::new();
        a.insert("A", Primitive::Integer(1));
        a.insert("B", Primitive::Integer(2));
        let mut b = Dictionary::new();
        b.insert("B", Primitive::Integer(2));
        b.insert("A", Primitive::Integer(1));
        assert_eq!(structural_hash(&Primitive::Dictionary(a)), structural_hash(&Primitive::Dictionary(b)));
    }

    #[test]
    fn structural_hash_of_a_reference_does_not_resolve_it() {
        let r1 = Primitive::Reference(PlainRef { id: 5, gen: 0 });
        let r2 = Primitive::Reference(PlainRef { id: 5, gen: 0 });
        let r3 = Primitive::Reference(PlainRef { id: 6, gen: 0 });
        assert_eq!(structural_hash(&r1), structural_hash(&r2));
        assert_ne!(structural_hash(&r1), structural_hash(&r3));
    }

    #[test]
    fn combine_identical_indirect_objects_merges_duplicates_and_rewrites_refs() {
        let mut d1 = Dictionary::new();
        d1.insert("V", Primitive::Integer(1));
        let mut d2 = Dictionary::new();
        d2.insert("V", Primitive::Integer(1));
        let mut root = Dictionary::new();
        root.insert("Kids", Primitive::Array(vec![
            Primitive::Reference(PlainRef { id: 2, gen: 0 }),
            Primitive::Reference(PlainRef { id: 3, gen: 0 }),
        ]));

        let mut raw = doc_with_objects(
            vec![(1, Primitive::Dictionary(root)), (2, Primitive::Dictionary(d1)), (3, Primitive::Dictionary(d2))],
            1,
        );
        combine_identical_indirect_objects(&mut raw, false, &crate::cancel::never()).unwrap();

        assert_eq!(raw.len(), 2);
        let kids = match raw.get(1).unwrap() {
            Primitive::Dictionary(d) => d.get("Kids").unwrap().clone().into_array().unwrap(),
            _ => panic!("expected dictionary"),
        };
        let refs: Vec<ObjNr> = kids.into_iter().map(|p| p.as_reference().unwrap().id).collect();
        assert_eq!(refs[0], refs[1]);
    }

    #[test]
    fn combine_duplicate_direct_objects_promotes_repeated_arrays() {
        let shared = Primitive::Array(vec![Primitive::Integer(1), Primitive::Integer(2)]);
        let mut d1 = Dictionary::new();
        d1.insert("M", shared.clone());
        let mut d2 = Dictionary::new();
        d2.insert("M", shared);
        let mut root = Dictionary::new();
        root.insert("Kids", Primitive::Array(vec![
            Primitive::Reference(PlainRef { id: 2, gen: 0 }),
            Primitive::Reference(PlainRef { id: 3, gen: 0 }),
        ]));

        let mut raw = doc_with_objects(
            vec![(1, Primitive::Dictionary(root)), (2, Primitive::Dictionary(d1)), (3, Primitive::Dictionary(d2))],
            1,
        );
        combine_duplicate_direct_objects(&mut raw, &crate::cancel::never()).unwrap();

        assert_eq!(raw.len(), 4);
        let get_m_ref = |id: ObjNr| -> PlainRef {
            match raw.get(id).unwrap() {
                Primitive::Dictionary(d) => d.get("M").unwrap().as_reference().unwrap(),
                _ => panic!("expected dictionary"),
            }
        };
        assert_eq!(get_m_ref(2), get_m_ref(3));
    }

    #[test]
    fn clean_unused_resources_drops_unreachable_objects() {
        let mut root = Dictionary::new();
        root.insert("Kid", Primitive::Reference(PlainRef { id: 2, gen: 0 }));
        let mut raw = doc_with_objects(
            vec![
                (1, Primitive::Dictionary(root)),
                (2, Primitive::Dictionary(Dictionary::new())),
                (3, Primitive::Dictionary(Dictionary::new())),
            ],
            1,
        );
        clean_unused_resources(&mut raw);
        assert!(raw.contains(1));
        assert!(raw.contains(2));
        assert!(!raw.contains(3));
    }

    #[test]
    fn compress_streams_shrinks_uncompressed_stream_and_updates_length() {
        let mut info = Dictionary::new();
        let data = b"the quick brown fox jumps over the lazy dog".repeat(8);
        info.insert("Length", Primitive::Integer(data.len() as i64));
        let mut raw = doc_with_objects(vec![(1, Primitive::Stream(PdfStream { info, data: data.clone() }))], 1);
        raw.trailer.root = PlainRef { id: 1, gen: 0 };

        compress_streams(&mut raw, &crate::cancel::never()).unwrap();

        match raw.get(1).unwrap() {
            Primitive::Stream(s) => {
                assert!(s.data.len() < data.len());
                assert_eq!(s.info.get("Filter").unwrap().as_name().unwrap(), "FlateDecode");
            }
            _ => panic!("expected stream"),
        }
    }
}
