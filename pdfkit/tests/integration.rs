//! Black-box tests over the public API, one per documented scenario.

use pdfkit::cancel;
use pdfkit::decoded::DecodedCache;
use pdfkit::diagnostic::CollectingSink;
use pdfkit::editor;
use pdfkit::object::{PlainRef, Primitive, RawDocument, Trailer};
use pdfkit::optimizer::{self, OptimizerConfig};
use pdfkit::semantic::page::{ContentStream, Rotation};
use pdfkit::semantic::resources::Resources;
use pdfkit::semantic::{builder, Document, Page, Rect, StructureChild, StructureElement, StructureTree};

const MAX_DECOMPRESSED_SIZE: usize = 64 * 1024 * 1024;

#[test]
fn round_trip_builds_one_page_with_its_media_box() {
    let bytes = b"%PDF-1.7\n1 0 obj<</Type/Catalog /Pages 2 0 R>>endobj 2 0 obj<</Type/Pages/Kids[3 0 R]/Count 1>>endobj 3 0 obj<</Type/Page/Parent 2 0 R/MediaBox[0 0 100 100]>>endobj trailer<</Root 1 0 R/Size 4>>";
    let raw = pdfkit::file::from_bytes(bytes).unwrap();

    let cache = DecodedCache::new(MAX_DECOMPRESSED_SIZE);
    let sink = CollectingSink::new();
    let doc = builder::build(&raw, &cache, MAX_DECOMPRESSED_SIZE, &cancel::never(), &sink).unwrap();

    assert_eq!(doc.pages.len(), 1);
    assert_eq!(doc.pages[0].media_box, Rect { left: 0.0, bottom: 0.0, right: 100.0, top: 100.0 });
}

fn blank_page(data: &[u8]) -> Page {
    let full = Rect { left: 0.0, bottom: 0.0, right: 612.0, top: 792.0 };
    Page {
        original_ref: None,
        dirty: false,
        media_box: full,
        crop_box: full,
        trim_box: full,
        bleed_box: full,
        art_box: full,
        rotate: Rotation::None,
        resources: Resources::default(),
        contents: vec![ContentStream::new(None, data.to_vec())],
        annotations: Vec::new(),
        user_unit: 1.0,
    }
}

#[test]
fn redact_whole_page_drops_emptied_spans_and_cascades_struct_tree() {
    let mut doc = Document::default();
    doc.pages.push(blank_page(
        b"/Span <</MCID 1>> BDC (hello) Tj EMC /Span <</MCID 2>> BDC (world) Tj EMC",
    ));
    doc.struct_tree = Some(StructureTree {
        kids: vec![
            StructureElement { struct_type: "P".to_string(), id: None, page_index: Some(0), children: vec![StructureChild::Mcid(1)] },
            StructureElement { struct_type: "P".to_string(), id: None, page_index: Some(0), children: vec![StructureChild::Mcid(2)] },
        ],
        ..StructureTree::default()
    });

    let sink = CollectingSink::new();
    let whole_page = Rect { left: 0.0, bottom: 0.0, right: 612.0, top: 792.0 };
    editor::remove_rect(&mut doc, 0, whole_page, &sink, &cancel::never()).unwrap();

    let mut stream = doc.pages[0].contents[0].clone();
    assert_eq!(stream.operations().unwrap().len(), 0);
    assert_eq!(doc.struct_tree.unwrap().kids.len(), 0);
}

#[test]
fn dedup_indirect_merges_identical_arrays_and_rewrites_references() {
    let mut raw = RawDocument::new(Trailer { size: 0, root: PlainRef { id: 4, gen: 0 }, ..Trailer::default() });
    raw.set(1, 0, Primitive::Array(vec![Primitive::Integer(1), Primitive::Integer(2)]));
    raw.set(2, 0, Primitive::Array(vec![Primitive::Integer(1), Primitive::Integer(2)]));
    raw.set(3, 0, Primitive::Array(vec![Primitive::Integer(3)]));
    raw.set(
        4,
        0,
        Primitive::Array(vec![
            Primitive::Reference(PlainRef { id: 1, gen: 0 }),
            Primitive::Reference(PlainRef { id: 2, gen: 0 }),
        ]),
    );

    let config = OptimizerConfig {
        combine_identical_indirect_objects: true,
        combine_duplicate_streams: false,
        combine_duplicate_direct_objects: false,
        compress_streams: false,
        clean_unused_resources: false,
        image_quality: 0,
        image_upper_ppi: 0.0,
    };
    let sink = CollectingSink::new();
    optimizer::optimize(&mut raw, &Document::default(), &config, &sink, &cancel::never()).unwrap();

    assert_eq!(raw.len(), 3);
    let refs: Vec<_> = match raw.get(4).unwrap() {
        Primitive::Array(items) => items.iter().map(|p| p.as_reference().unwrap()).collect(),
        other => panic!("expected array, got {}", other.kind_name()),
    };
    assert_eq!(refs[0], refs[1]);
}
