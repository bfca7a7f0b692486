//! Page annotations (spec §3 C4: "Annotation (sum type)"). A closed tagged
//! union over subtype with a common base, mirroring the teacher's own
//! closed-enum-over-`Subtype` pattern used for `XObject` in `object/types.rs`.

use crate::error::{self, Result};
use crate::object::{Dictionary, PdfString, Resolve};
use crate::semantic::action::Action;
use crate::semantic::resources::Rect;

#[derive(Copy, Clone, Debug, Default)]
pub struct AnnotationFlags(pub i32);

impl AnnotationFlags {
    pub fn hidden(self) -> bool {
        self.0 & (1 << 1) != 0
    }
    pub fn print(self) -> bool {
        self.0 & (1 << 2) != 0
    }
    pub fn no_view(self) -> bool {
        self.0 & (1 << 5) != 0
    }
}

#[derive(Clone, Debug)]
pub enum AnnotationKind {
    Link { action: Option<Action> },
    Widget,
    Text,
    Highlight,
    Underline,
    StrikeOut,
    Squiggly,
    FreeText,
    Line,
    Square,
    Circle,
    Stamp,
    Ink,
    FileAttachment,
    Popup,
    Sound,
    Movie,
    Screen,
    PrinterMark,
    TrapNet,
    Watermark,
    ThreeD,
    Redact,
    Projection,
    /// Any subtype not listed above, kept as a bag of raw keys.
    Generic { subtype: String },
}

#[derive(Clone, Debug)]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub rect: Rect,
    pub contents: Option<String>,
    pub flags: AnnotationFlags,
    /// Appearance stream name (`/AP /N`, resolved to its XObject name in
    /// the page's resources by the builder when present as a dictionary
    /// rather than a single stream).
    pub appearance: Option<String>,
    pub appearance_state: Option<String>,
    pub border: Vec<f64>,
    pub color: Vec<f64>,
}

fn text_field(dict: &Dictionary, key: &'static str, resolve: &dyn Resolve) -> Result<Option<String>> {
    match dict.get(key) {
        Some(p) => Ok(Some(PdfString(p.clone().resolve(resolve)?.as_string()?.to_vec()).to_string_lossy())),
        None => Ok(None),
    }
}

fn name_field(dict: &Dictionary, key: &'static str, resolve: &dyn Resolve) -> Result<Option<String>> {
    match dict.get(key) {
        Some(p) => Ok(Some(p.clone().resolve(resolve)?.into_name()?)),
        None => Ok(None),
    }
}

fn number_array(dict: &Dictionary, key: &'static str, resolve: &dyn Resolve) -> Result<Vec<f64>> {
    match dict.get(key) {
        Some(p) => p
            .clone()
            .resolve(resolve)?
            .into_array()?
            .into_iter()
            .map(|v| v.resolve(resolve)?.as_number())
            .collect(),
        None => Ok(Vec::new()),
    }
}

impl Annotation {
    pub fn build(
        dict: &Dictionary,
        resolve: &dyn Resolve,
        resolve_page_index: &dyn Fn(crate::object::PlainRef) -> Option<usize>,
    ) -> Result<Annotation> {
        dict.expect("Type", "Annot", false)?;
        let subtype = dict
            .get("Subtype")
            .ok_or_else(|| error::MissingEntrySnafu { typ: "Annotation", field: "Subtype" }.build())?
            .clone()
            .resolve(resolve)?
            .into_name()?;

        let rect = match dict.get("Rect") {
            Some(p) => <Rect as crate::object::Object>::from_primitive(p.clone(), resolve)?,
            None => Rect { left: 0.0, bottom: 0.0, right: 0.0, top: 0.0 },
        };
        let flags = AnnotationFlags(
            dict.get("F")
                .map(|p| p.clone().resolve(resolve)?.as_integer())
                .transpose()?
                .unwrap_or(0) as i32,
        );

        let kind = match subtype.as_str() {
            "Link" => {
                let action = match dict.get("A") {
                    Some(p) => Some(Action::build(&p.clone().resolve(resolve)?.into_dictionary()?, resolve, resolve_page_index)?),
                    None => None,
                };
                AnnotationKind::Link { action }
            }
            "Widget" => AnnotationKind::Widget,
            "Text" => AnnotationKind::Text,
            "Highlight" => AnnotationKind::Highlight,
            "Underline" => AnnotationKind::Underline,
            "StrikeOut" => AnnotationKind::StrikeOut,
            "Squiggly" => AnnotationKind::Squiggly,
            "FreeText" => AnnotationKind::FreeText,
            "Line" => AnnotationKind::Line,
            "Square" => AnnotationKind::Square,
            "Circle" => AnnotationKind::Circle,
            "Stamp" => AnnotationKind::Stamp,
            "Ink" => AnnotationKind::Ink,
            "FileAttachment" => AnnotationKind::FileAttachment,
            "Popup" => AnnotationKind::Popup,
            "Sound" => AnnotationKind::Sound,
            "Movie" => AnnotationKind::Movie,
            "Screen" => AnnotationKind::Screen,
            "PrinterMark" => AnnotationKind::PrinterMark,
            "TrapNet" => AnnotationKind::TrapNet,
            "Watermark" => AnnotationKind::Watermark,
            "3D" => AnnotationKind::ThreeD,
            "Redact" => AnnotationKind::Redact,
            "Projection" => AnnotationKind::Projection,
            other => AnnotationKind::Generic { subtype: other.to_string() },
        };

        Ok(Annotation {
            kind,
            rect,
            contents: text_field(dict, "Contents", resolve)?,
            flags,
            // `/AP /N` resolution to a resource name happens once the owning
            // page's resources are known; the builder fills this in.
            appearance: None,
            appearance_state: name_field(dict, "AS", resolve)?,
            border: number_array(dict, "Border", resolve)?,
            color: number_array(dict, "C", resolve)?,
        })
    }
}
