//! Graphics and text state (spec §4.3): everything `q`/`Q` snapshot and the
//! text-positioning operators mutate.

use crate::content::matrix::{self, Matrix};

/// A color in whatever space was last selected; components are kept
/// unresolved since full colorspace resolution (ICC profiles, `Separation`
/// tint transforms) is outside the content processor's job (spec §1
/// Non-goals: no rendering).
#[derive(Clone, Debug, PartialEq)]
pub struct ColorState {
    pub space: String,
    pub components: Vec<f64>,
}

impl Default for ColorState {
    fn default() -> ColorState {
        ColorState { space: "DeviceGray".to_string(), components: vec![0.0] }
    }
}

#[derive(Clone, Debug)]
pub struct GraphicsState {
    pub ctm: Matrix,
    pub line_width: f64,
    pub line_cap: i32,
    pub line_join: i32,
    pub miter_limit: f64,
    pub dash_array: Vec<f64>,
    pub dash_phase: f64,
    pub rendering_intent: Option<String>,
    pub flatness: f64,
    pub fill_color: ColorState,
    pub stroke_color: ColorState,
    pub fill_alpha: f64,
    pub stroke_alpha: f64,
}

impl Default for GraphicsState {
    fn default() -> GraphicsState {
        GraphicsState {
            ctm: matrix::IDENTITY,
            line_width: 1.0,
            line_cap: 0,
            line_join: 0,
            miter_limit: 10.0,
            dash_array: Vec::new(),
            dash_phase: 0.0,
            rendering_intent: None,
            flatness: 0.0,
            fill_color: ColorState::default(),
            stroke_color: ColorState::default(),
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TextState {
    pub char_spacing: f64,
    pub word_spacing: f64,
    pub h_scale: f64,
    pub leading: f64,
    pub font: Option<String>,
    pub font_size: f64,
    pub render_mode: i32,
    pub rise: f64,
    pub knockout: bool,
    pub text_matrix: Matrix,
    pub line_matrix: Matrix,
}

impl Default for TextState {
    fn default() -> TextState {
        TextState {
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 100.0,
            leading: 0.0,
            font: None,
            font_size: 0.0,
            render_mode: 0,
            rise: 0.0,
            knockout: true,
            text_matrix: matrix::IDENTITY,
            line_matrix: matrix::IDENTITY,
        }
    }
}

impl TextState {
    /// `BT` resets both matrices to identity (spec §4.3).
    pub fn begin_text(&mut self) {
        self.text_matrix = matrix::IDENTITY;
        self.line_matrix = matrix::IDENTITY;
    }

    pub fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = matrix::concat(matrix::translate(tx, ty), self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    pub fn advance(&mut self, tx: f64) {
        self.text_matrix = matrix::concat(matrix::translate(tx, 0.0), self.text_matrix);
    }
}

/// One open `BMC`/`BDC` nesting level (spec §4.3, §9 "MCID counters").
#[derive(Clone, Debug)]
pub struct MarkedContentEntry {
    pub tag: String,
    pub mcid: Option<i32>,
}
