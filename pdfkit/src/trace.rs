//! The tracer (spec §4.4, component C7): a virtual interpretation of a
//! content stream that only cares about geometry — it drives the same
//! [`crate::content::ExecutionContext`] state machine as C6 and, alongside
//! it, emits a bounding box per drawing operation. The editor (C9) and its
//! spatial index (C8) are built entirely on this output.

use crate::cancel::CancelToken;
use crate::content::{self, matrix, ExecutionContext, Operand, Operation};
use crate::diagnostic::DiagnosticSink;
use crate::error::{self, Result};
use crate::semantic::font::Font;
use crate::semantic::resources::{Rect, Resources};

/// One traced operation's bounding box (spec §4.4 `BBox[]`), normalized so
/// `left <= right` and `bottom <= top` regardless of the CTM's orientation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BBox {
    pub op_index: usize,
    pub rect: Rect,
}

fn normalize(p0: (f64, f64), p1: (f64, f64)) -> Rect {
    Rect {
        left: p0.0.min(p1.0),
        right: p0.0.max(p1.0),
        bottom: p0.1.min(p1.1),
        top: p0.1.max(p1.1),
    }
}

fn rect_corners(rect: &Rect, m: matrix::Matrix) -> Rect {
    let corners = [
        matrix::apply(m, rect.left, rect.bottom),
        matrix::apply(m, rect.right, rect.bottom),
        matrix::apply(m, rect.right, rect.top),
        matrix::apply(m, rect.left, rect.top),
    ];
    let mut acc = Rect { left: f64::INFINITY, bottom: f64::INFINITY, right: f64::NEG_INFINITY, top: f64::NEG_INFINITY };
    for (x, y) in corners {
        acc.left = acc.left.min(x);
        acc.right = acc.right.max(x);
        acc.bottom = acc.bottom.min(y);
        acc.top = acc.top.max(y);
    }
    acc
}

/// Width of one shown code point in thousandths of an em, resolving
/// through whichever font is current. `Identity-H` (the only CMap pdfkit's
/// Type0 support recognizes) maps a 2-byte code directly to its CID — no
/// `ToUnicode` round trip needed for width lookup, unlike re-encoding in
/// the editor's `replaceText` (see DESIGN.md).
fn show_string_width(font: &Font, bytes: &[u8]) -> f64 {
    if font.cid_metrics.is_some() {
        bytes.chunks(2).filter(|c| c.len() == 2).map(|c| font.glyph_width(u16::from_be_bytes([c[0], c[1]]) as u32)).sum()
    } else {
        bytes.iter().map(|&b| font.glyph_width(b as u32)).sum()
    }
}

/// Traces one content stream, returning a bbox for every `re`, `Do` and
/// text-showing operation (spec §4.4). Non-drawing operators still update
/// state (CTM, text matrix, current font) but emit nothing.
pub fn trace(operations: &[Operation], resources: &Resources, diag: &dyn DiagnosticSink, cancel: &CancelToken) -> Result<Vec<BBox>> {
    let mut ctx = ExecutionContext::new(resources);
    let mut out = Vec::new();

    for (op_index, op) in operations.iter().enumerate() {
        cancel.check()?;

        match op.operator.as_str() {
            "re" => {
                if let (Some(a), Some(b), Some(c), Some(d)) =
                    (op.operands.first(), op.operands.get(1), op.operands.get(2), op.operands.get(3))
                {
                    if let (Ok(x), Ok(y), Ok(w), Ok(h)) = (a.as_number(), b.as_number(), c.as_number(), d.as_number()) {
                        let r = Rect { left: x, bottom: y, right: x + w, top: y + h };
                        out.push(BBox { op_index, rect: rect_corners(&r, ctx.gs.ctm) });
                    }
                }
            }
            "Do" => {
                if let Some(Operand::Name(name)) = op.operands.first() {
                    if let Some(bbox) = xobject_bbox(name, resources, ctx.gs.ctm) {
                        out.push(BBox { op_index, rect: bbox });
                    }
                }
            }
            "Tj" | "'" | "\"" => {
                if let Some(text) = op.operands.last().and_then(|o| o.as_string().ok()) {
                    if let Some(rect) = text_bbox(&ctx, resources, text) {
                        out.push(BBox { op_index, rect });
                    }
                }
            }
            "TJ" => {
                if let Some(Operand::Array(items)) = op.operands.first() {
                    if let Some(rect) = tj_array_bbox(&ctx, resources, items) {
                        out.push(BBox { op_index, rect });
                    }
                }
            }
            _ => {}
        }

        match ctx.apply(op, diag) {
            Ok(()) => {}
            Err(error::PdfError::UnknownOperator { recoverable: true, .. }) => continue,
            Err(other) => return error::TraceSnafu { op_index, reason: other.to_string() }.fail(),
        }
    }
    Ok(out)
}

fn current_font<'a>(ctx: &ExecutionContext<'_>, resources: &'a Resources) -> Option<&'a Font> {
    ctx.ts.font.as_ref().and_then(|name| resources.fonts.get(name))
}

/// `Tj`/`'`/`"`: bbox of `[0,0]..[advance, fontSize]` under `TextMatrix ∘ CTM`
/// (spec §4.4).
fn text_bbox(ctx: &ExecutionContext<'_>, resources: &Resources, text: &[u8]) -> Option<Rect> {
    let font = current_font(ctx, resources)?;
    let advance_em = show_string_width(font, text) / 1000.0;
    let advance = advance_em * ctx.ts.font_size * (ctx.ts.h_scale / 100.0) + (text.len() as f64) * ctx.ts.char_spacing;
    let m = matrix::concat(ctx.ts.text_matrix, ctx.gs.ctm);
    let p0 = matrix::apply(m, 0.0, 0.0);
    let p1 = matrix::apply(m, advance, ctx.ts.font_size);
    Some(normalize(p0, p1))
}

/// `TJ`: like `Tj` but kerning numbers (thousandths of an em) subtract from
/// the advance between strings (spec §4.4).
fn tj_array_bbox(ctx: &ExecutionContext<'_>, resources: &Resources, items: &[Operand]) -> Option<Rect> {
    let font = current_font(ctx, resources)?;
    let mut advance = 0.0;
    for item in items {
        match item {
            Operand::String(s) => {
                let em = show_string_width(font, s) / 1000.0;
                advance += em * ctx.ts.font_size * (ctx.ts.h_scale / 100.0) + (s.len() as f64) * ctx.ts.char_spacing;
            }
            Operand::Number(adj) => {
                advance -= adj / 1000.0 * ctx.ts.font_size * (ctx.ts.h_scale / 100.0);
            }
            _ => {}
        }
    }
    let m = matrix::concat(ctx.ts.text_matrix, ctx.gs.ctm);
    let p0 = matrix::apply(m, 0.0, 0.0);
    let p1 = matrix::apply(m, advance, ctx.ts.font_size);
    Some(normalize(p0, p1))
}

/// `Do`: unit square under the CTM, refined by a form XObject's own
/// `BBox`/`Matrix` if it declares one (spec §4.4). Image XObjects always
/// occupy the unit square since they have no further geometry of their own.
fn xobject_bbox(name: &str, resources: &Resources, ctm: matrix::Matrix) -> Option<Rect> {
    use crate::semantic::xobject::XObject;
    match resources.xobjects.get(name)? {
        XObject::Image(_) => Some(rect_corners(&Rect { left: 0.0, bottom: 0.0, right: 1.0, top: 1.0 }, ctm)),
        XObject::Form(form) => {
            let local = form.matrix.map(|m| matrix::concat(m, ctm)).unwrap_or(ctm);
            let unit = Rect { left: 0.0, bottom: 0.0, right: 1.0, top: 1.0 };
            let bbox = form.bbox.unwrap_or(unit);
            Some(rect_corners(&bbox, local))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::CollectingSink;
    use crate::semantic::font::{Font, FontType, SimpleFontMetrics};

    fn helvetica() -> Font {
        Font {
            subtype: FontType::Type1,
            base_font: "Helvetica".to_string(),
            metrics: Some(SimpleFontMetrics { first_char: 32, last_char: 33, widths: vec![278.0, 278.0], descriptor: None }),
            cid_metrics: None,
            cid_encoding: None,
            to_unicode: None,
        }
    }

    #[test]
    fn re_emits_bbox_under_ctm() {
        let resources = Resources::default();
        let sink = CollectingSink::new();
        let ops = content::parse_content_stream(b"1 0 0 1 10 20 cm 0 0 100 50 re").unwrap();
        let bboxes = trace(&ops, &resources, &sink, &crate::cancel::never()).unwrap();
        assert_eq!(bboxes.len(), 1);
        assert_eq!(bboxes[0].op_index, 1);
        assert_eq!(bboxes[0].rect, Rect { left: 10.0, bottom: 20.0, right: 110.0, top: 70.0 });
    }

    #[test]
    fn tj_uses_font_width_table_for_advance() {
        let mut resources = Resources::default();
        resources.fonts.insert("F1".to_string(), helvetica());
        let sink = CollectingSink::new();
        let ops = content::parse_content_stream(b"BT /F1 10 Tf (  ) Tj ET").unwrap();
        let bboxes = trace(&ops, &resources, &sink, &crate::cancel::never()).unwrap();
        assert_eq!(bboxes.len(), 1);
        // two space glyphs at 278/1000 em * 10pt each
        let expected_advance = 2.0 * 278.0 / 1000.0 * 10.0;
        assert!((bboxes[0].rect.right - expected_advance).abs() < 1e-9);
    }

    #[test]
    fn unknown_operator_does_not_abort_trace() {
        let resources = Resources::default();
        let sink = CollectingSink::new();
        let ops = content::parse_content_stream(b"0 0 10 10 re XY 0 0 5 5 re").unwrap();
        let bboxes = trace(&ops, &resources, &sink, &crate::cancel::never()).unwrap();
        assert_eq!(bboxes.len(), 2);
    }
}
