//! The content-stream processor (spec §4.3, component C6): tokenizes an
//! operator stream and replays it against an [`ExecutionContext`], the same
//! split the tracer (C7) and editor (C9) both build on rather than each
//! re-tokenizing and re-interpreting content streams their own way.
//!
//! Unlike a renderer, nothing here paints anything: painting operators only
//! need to update the graphics/text state so the tracer can derive bounding
//! boxes from it (spec §1 Non-goals: no rasterization).

pub mod matrix;
pub mod operand;
pub mod state;

pub use matrix::Matrix;
pub use operand::{parse_content_stream, InlineImage, Operand, OperandDict, Operation};
pub use state::{ColorState, GraphicsState, MarkedContentEntry, TextState};

use crate::cancel::CancelToken;
use crate::diagnostic::{diag_warn, DiagnosticSink};
use crate::error::{self, Result};
use crate::semantic::resources::Resources;

/// Mutable state threaded through a content stream's operators (spec §4.3):
/// the graphics/text state stacks and the open marked-content nesting.
pub struct ExecutionContext<'a> {
    pub gs: GraphicsState,
    gs_stack: Vec<GraphicsState>,
    pub ts: TextState,
    in_text: bool,
    pub mc_stack: Vec<MarkedContentEntry>,
    pub resources: &'a Resources,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(resources: &'a Resources) -> ExecutionContext<'a> {
        ExecutionContext {
            gs: GraphicsState::default(),
            gs_stack: Vec::new(),
            ts: TextState::default(),
            in_text: false,
            mc_stack: Vec::new(),
            resources,
        }
    }

    pub fn with_ctm(resources: &'a Resources, ctm: Matrix) -> ExecutionContext<'a> {
        let mut ctx = ExecutionContext::new(resources);
        ctx.gs.ctm = ctm;
        ctx
    }

    fn resolve_mcid(&self, props: &Operand) -> Option<i32> {
        mcid_from_operand(props, self.resources)
    }

    /// Applies one operator to the state. Unknown operators are reported
    /// through `diag` and otherwise ignored (spec §4.3: an unrecognized
    /// operator must not abort the whole stream).
    pub fn apply(&mut self, op: &Operation, diag: &dyn DiagnosticSink) -> Result<()> {
        let args = &op.operands;
        macro_rules! num {
            ($i:expr) => {
                args.get($i).ok_or(error::PdfError::UnbalancedState { op: "operand" })?.as_number()?
            };
        }
        match op.operator.as_str() {
            "q" => self.gs_stack.push(self.gs.clone()),
            "Q" => {
                self.gs = self.gs_stack.pop().ok_or(error::PdfError::UnbalancedState { op: "Q" })?;
            }
            "cm" => {
                let m: Matrix = [num!(0), num!(1), num!(2), num!(3), num!(4), num!(5)];
                self.gs.ctm = matrix::concat(m, self.gs.ctm);
            }
            "w" => self.gs.line_width = num!(0),
            "J" => self.gs.line_cap = num!(0) as i32,
            "j" => self.gs.line_join = num!(0) as i32,
            "M" => self.gs.miter_limit = num!(0),
            "d" => {
                self.gs.dash_array = args.first().and_then(|a| a.as_array().ok()).map(|a| a.iter().filter_map(|v| v.as_number().ok()).collect()).unwrap_or_default();
                self.gs.dash_phase = args.get(1).and_then(|a| a.as_number().ok()).unwrap_or(0.0);
            }
            "ri" => self.gs.rendering_intent = args.first().and_then(|a| a.as_name().ok()).map(|s| s.to_string()),
            "i" => self.gs.flatness = num!(0),
            "gs" => {} // ExtGState: alpha/blend parameters live in the resource dict, not interpreted here
            "G" => self.gs.stroke_color = ColorState { space: "DeviceGray".to_string(), components: vec![num!(0)] },
            "g" => self.gs.fill_color = ColorState { space: "DeviceGray".to_string(), components: vec![num!(0)] },
            "RG" => self.gs.stroke_color = ColorState { space: "DeviceRGB".to_string(), components: vec![num!(0), num!(1), num!(2)] },
            "rg" => self.gs.fill_color = ColorState { space: "DeviceRGB".to_string(), components: vec![num!(0), num!(1), num!(2)] },
            "K" => self.gs.stroke_color = ColorState { space: "DeviceCMYK".to_string(), components: vec![num!(0), num!(1), num!(2), num!(3)] },
            "k" => self.gs.fill_color = ColorState { space: "DeviceCMYK".to_string(), components: vec![num!(0), num!(1), num!(2), num!(3)] },
            "CS" => self.gs.stroke_color.space = args.first().and_then(|a| a.as_name().ok()).unwrap_or("").to_string(),
            "cs" => self.gs.fill_color.space = args.first().and_then(|a| a.as_name().ok()).unwrap_or("").to_string(),
            "SC" | "SCN" => {
                self.gs.stroke_color.components = args.iter().filter_map(|a| a.as_number().ok()).collect();
            }
            "sc" | "scn" => {
                self.gs.fill_color.components = args.iter().filter_map(|a| a.as_number().ok()).collect();
            }
            // path construction / painting: the tracer derives a bbox from
            // the operator name and current CTM, no path state accumulates here
            "m" | "l" | "c" | "v" | "y" | "h" | "re" | "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" | "n" | "W" | "W*" => {}
            "BT" => {
                if self.in_text {
                    return error::UnbalancedStateSnafu { op: "BT" }.fail();
                }
                self.in_text = true;
                self.ts.begin_text();
            }
            "ET" => {
                if !self.in_text {
                    return error::UnbalancedStateSnafu { op: "ET" }.fail();
                }
                self.in_text = false;
            }
            "Tc" => self.ts.char_spacing = num!(0),
            "Tw" => self.ts.word_spacing = num!(0),
            "Tz" => self.ts.h_scale = num!(0),
            "TL" => self.ts.leading = num!(0),
            "Tf" => {
                self.ts.font = args.first().and_then(|a| a.as_name().ok()).map(|s| s.to_string());
                self.ts.font_size = num!(1);
            }
            "Tr" => self.ts.render_mode = num!(0) as i32,
            "Ts" => self.ts.rise = num!(0),
            "Td" => self.ts.move_line(num!(0), num!(1)),
            "TD" => {
                self.ts.leading = -num!(1);
                self.ts.move_line(num!(0), num!(1));
            }
            "Tm" => {
                self.ts.line_matrix = [num!(0), num!(1), num!(2), num!(3), num!(4), num!(5)];
                self.ts.text_matrix = self.ts.line_matrix;
            }
            "T*" => {
                let leading = self.ts.leading;
                self.ts.move_line(0.0, -leading);
            }
            // glyph-width advance is the tracer's job (it owns font lookup);
            // C6 only needs the text matrix positioned for the next operator
            "Tj" => {}
            "'" => {
                let leading = self.ts.leading;
                self.ts.move_line(0.0, -leading);
            }
            "\"" => {
                self.ts.word_spacing = num!(0);
                self.ts.char_spacing = num!(1);
                let leading = self.ts.leading;
                self.ts.move_line(0.0, -leading);
            }
            "TJ" => {
                // kerning array advance is computed by the tracer, which owns
                // font-width lookup; here we only need the text matrix to end
                // up roughly advanced so later non-traced ops see a sane CTM
                if let Some(Operand::Array(items)) = args.first() {
                    for item in items {
                        if let Operand::Number(adj) = item {
                            let tx = -adj / 1000.0 * self.ts.font_size * (self.ts.h_scale / 100.0);
                            self.ts.advance(tx);
                        }
                    }
                }
            }
            "Do" => {} // XObject painting: bbox handled by the tracer, which has font/xobject context
            "sh" => {}
            "BMC" => {
                self.mc_stack.push(MarkedContentEntry { tag: args.first().and_then(|a| a.as_name().ok()).unwrap_or("").to_string(), mcid: None });
            }
            "BDC" => {
                let tag = args.first().and_then(|a| a.as_name().ok()).unwrap_or("").to_string();
                let mcid = args.get(1).and_then(|p| self.resolve_mcid(p));
                self.mc_stack.push(MarkedContentEntry { tag, mcid });
            }
            "EMC" => {
                if self.mc_stack.pop().is_none() {
                    return error::UnbalancedStateSnafu { op: "EMC" }.fail();
                }
            }
            "MP" | "DP" => {}
            "BX" | "EX" => {} // compatibility section markers: unknown operators inside are tolerated regardless
            other => {
                diag_warn!(diag, "unknown content operator '{other}'");
                return error::UnknownOperatorSnafu { name: other.to_string(), recoverable: true }.fail();
            }
        }
        Ok(())
    }
}

/// Looks up an `MCID` on a marked-content properties operand: either an
/// inline dict (`/P <</MCID 3>> BDC`) or a name resolved through the page's
/// `/Properties` resource category (`/P /MC0 BDC`). Shared by the
/// execution context and the editor's MCID bookkeeping (spec §4.6 step 4).
pub(crate) fn mcid_from_operand(props: &Operand, resources: &Resources) -> Option<i32> {
    match props {
        Operand::Dict(d) => d.get("MCID").and_then(|v| v.as_number().ok()).map(|n| n as i32),
        Operand::Name(name) => resources
            .other
            .get(&format!("Properties/{name}"))
            .and_then(|d| d.get("MCID"))
            .and_then(|p| p.as_integer().ok())
            .map(|n| n as i32),
        _ => None,
    }
}

/// MCID carried by a `BMC`/`BDC` operation, if any (`BMC` never carries one).
pub(crate) fn mcid_of(op: &Operation, resources: &Resources) -> Option<i32> {
    if op.operator != "BDC" {
        return None;
    }
    op.operands.get(1).and_then(|props| mcid_from_operand(props, resources))
}

/// Replays a whole content stream against a fresh [`ExecutionContext`],
/// stopping at the first unrecoverable error. Unknown operators are
/// diagnosed and skipped rather than aborting the run.
pub fn run(operations: &[Operation], resources: &Resources, diag: &dyn DiagnosticSink, cancel: &CancelToken) -> Result<()> {
    let mut ctx = ExecutionContext::new(resources);
    for op in operations {
        cancel.check()?;
        match ctx.apply(op, diag) {
            Ok(()) => {}
            Err(error::PdfError::UnknownOperator { recoverable: true, .. }) => continue,
            Err(other) => return Err(other),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::CollectingSink;

    #[test]
    fn q_q_balances_graphics_state() {
        let resources = Resources::default();
        let mut ctx = ExecutionContext::new(&resources);
        let sink = CollectingSink::new();
        let ops = parse_content_stream(b"1 0 0 1 10 20 cm q 2 0 0 2 0 0 cm Q").unwrap();
        for op in &ops {
            ctx.apply(op, &sink).unwrap();
        }
        assert_eq!(ctx.gs.ctm, matrix::translate(10.0, 20.0));
    }

    #[test]
    fn unbalanced_q_is_an_error() {
        let resources = Resources::default();
        let mut ctx = ExecutionContext::new(&resources);
        let sink = CollectingSink::new();
        let ops = parse_content_stream(b"Q").unwrap();
        assert!(ctx.apply(&ops[0], &sink).is_err());
    }

    #[test]
    fn bdc_emc_track_marked_content_nesting_with_mcid() {
        let resources = Resources::default();
        let mut ctx = ExecutionContext::new(&resources);
        let sink = CollectingSink::new();
        let ops = parse_content_stream(b"/P <</MCID 5>> BDC EMC").unwrap();
        ctx.apply(&ops[0], &sink).unwrap();
        assert_eq!(ctx.mc_stack.len(), 1);
        assert_eq!(ctx.mc_stack[0].mcid, Some(5));
        ctx.apply(&ops[1], &sink).unwrap();
        assert!(ctx.mc_stack.is_empty());
    }

    #[test]
    fn unknown_operator_is_diagnosed_not_fatal() {
        let resources = Resources::default();
        let sink = CollectingSink::new();
        let ops = parse_content_stream(b"q 1 XY Q").unwrap();
        run(&ops, &resources, &sink, &crate::cancel::never()).unwrap();
        assert!(!sink.take().is_empty());
    }
}
