//! Font resources (spec §3, semantic IR C4). Grounded on the teacher's
//! `font.rs`, adapted from a `#[derive(Object)]`-driven lazy dictionary read
//! into a value the semantic builder (C5) assembles eagerly, embedded
//! program bytes and all, since C4 has no remaining reference back to the
//! raw document.

use crate::decoded::DecodedCache;
use crate::error::{self, Result};
use crate::object::{Dictionary, Resolve};
use crate::semantic::resources::Rect;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum FontType {
    Type0,
    Type1,
    MMType1,
    Type3,
    TrueType,
    CIDFontType0,
    CIDFontType2,
}

impl FontType {
    fn from_name(name: &str) -> Result<FontType> {
        Ok(match name {
            "Type0" => FontType::Type0,
            "Type1" => FontType::Type1,
            "MMType1" => FontType::MMType1,
            "Type3" => FontType::Type3,
            "TrueType" => FontType::TrueType,
            "CIDFontType0" => FontType::CIDFontType0,
            "CIDFontType2" => FontType::CIDFontType2,
            other => {
                return error::UnknownVariantSnafu {
                    id: "FontType",
                    name: other.to_string(),
                }
                .fail()
            }
        })
    }
}

/// Mirrors the teacher's flag bit table (ISO 32000-1 Table 123).
#[derive(Copy, Clone, Default, Debug)]
pub struct FontFlags(pub i32);

impl FontFlags {
    pub fn fixed_pitch(self) -> bool {
        self.0 & (1 << 0) != 0
    }
    pub fn serif(self) -> bool {
        self.0 & (1 << 1) != 0
    }
    pub fn symbolic(self) -> bool {
        self.0 & (1 << 2) != 0
    }
    pub fn nonsymbolic(self) -> bool {
        self.0 & (1 << 5) != 0
    }
    pub fn italic(self) -> bool {
        self.0 & (1 << 6) != 0
    }
}

#[derive(Clone, Debug)]
pub enum EmbeddedProgram {
    Type1(Vec<u8>),
    TrueType(Vec<u8>),
    /// `FontFile3`: CFF (`Type1C`/`CIDFontType0C`) or a full `OpenType` wrapper.
    OpenTypeOrCff(Vec<u8>),
}

#[derive(Clone, Debug)]
pub struct FontDescriptor {
    pub font_name: String,
    pub flags: FontFlags,
    pub font_bbox: Option<Rect>,
    pub italic_angle: f64,
    pub ascent: f64,
    pub descent: f64,
    pub cap_height: f64,
    pub stem_v: f64,
    pub missing_width: f64,
    pub embedded: Option<EmbeddedProgram>,
}

#[derive(Clone, Debug)]
pub struct SimpleFontMetrics {
    pub first_char: i32,
    pub last_char: i32,
    pub widths: Vec<f64>,
    pub descriptor: Option<FontDescriptor>,
}

/// Width table for a `Type0` font's descendant CIDFont: `DW` plus the
/// expanded `W` array (ISO 32000-1 §9.7.4.3). Kept as a sparse map rather
/// than the original's compact run-length encoding since lookups, not
/// memory, dominate here (tracer width lookup, editor re-encoding).
#[derive(Clone, Debug)]
pub struct CidFontMetrics {
    pub default_width: f64,
    pub widths: std::collections::BTreeMap<u32, f64>,
    pub descriptor: Option<FontDescriptor>,
}

impl CidFontMetrics {
    pub fn width(&self, cid: u32) -> f64 {
        self.widths.get(&cid).copied().unwrap_or(self.default_width)
    }
}

/// A parsed `ToUnicode` CMap (ISO 32000-1 §9.10.3): `beginbfchar`/`beginbfrange`
/// blocks mapping a code to one or more Unicode scalars. Grounded on the
/// bfchar/bfrange scanning approach used elsewhere in the retrieval pack for
/// this exact problem, rewritten against this crate's stream decoding
/// instead of reading a whole external document.
#[derive(Clone, Debug, Default)]
pub struct ToUnicodeMap {
    mappings: std::collections::BTreeMap<u32, String>,
}

impl ToUnicodeMap {
    pub fn get(&self, code: u32) -> Option<&str> {
        self.mappings.get(&code).map(|s| s.as_str())
    }

    /// Decodes a show-string's bytes into text, assuming 2-byte codes (the
    /// only encoding pdfkit's Type0 support recognizes: `Identity-H`).
    pub fn decode_2byte(&self, bytes: &[u8]) -> String {
        let mut out = String::new();
        for pair in bytes.chunks(2) {
            if pair.len() < 2 {
                break;
            }
            let code = u16::from_be_bytes([pair[0], pair[1]]) as u32;
            match self.get(code) {
                Some(s) => out.push_str(s),
                None => {}
            }
        }
        out
    }

    /// Finds the single code mapping to `ch`, for `replaceText` re-encoding.
    /// Returns `None` if no code maps to it or more than one does (ambiguous).
    pub fn code_for_char(&self, ch: char) -> Option<u32> {
        let mut found = None;
        for (&code, text) in &self.mappings {
            if text.chars().eq(std::iter::once(ch)) {
                if found.is_some() {
                    return None;
                }
                found = Some(code);
            }
        }
        found
    }

    fn parse(text: &str) -> ToUnicodeMap {
        let mut mappings = std::collections::BTreeMap::new();
        let mut lines = text.lines().map(|l| l.trim()).filter(|l| !l.is_empty());
        while let Some(line) = lines.next() {
            if line.starts_with("beginbfchar") {
                for l in lines.by_ref() {
                    if l.starts_with("endbfchar") {
                        break;
                    }
                    let tokens: Vec<&str> = l.split_whitespace().collect();
                    if tokens.len() < 2 {
                        continue;
                    }
                    if let (Some(code), Some(uni)) = (parse_hex_token(tokens[0]), parse_hex_tokens(tokens[1])) {
                        mappings.insert(code, uni);
                    }
                }
            } else if line.starts_with("beginbfrange") {
                for l in lines.by_ref() {
                    if l.starts_with("endbfrange") {
                        break;
                    }
                    let tokens: Vec<&str> = l.split_whitespace().collect();
                    if tokens.len() < 3 {
                        continue;
                    }
                    let (Some(start), Some(end)) = (parse_hex_token(tokens[0]), parse_hex_token(tokens[1])) else {
                        continue;
                    };
                    if tokens[2].starts_with('[') {
                        let joined = tokens[2..].join(" ");
                        let inner = joined.trim_start_matches('[').trim_end_matches(']');
                        for (i, token) in inner.split_whitespace().enumerate() {
                            if let Some(uni) = parse_hex_tokens(token) {
                                mappings.insert(start + i as u32, uni);
                            }
                        }
                    } else if let Some(start_uni) = parse_hex_token(tokens[2]) {
                        for (i, code) in (start..=end).enumerate() {
                            if let Some(ch) = char::from_u32(start_uni + i as u32) {
                                mappings.insert(code, ch.to_string());
                            }
                        }
                    }
                }
            }
        }
        ToUnicodeMap { mappings }
    }

    pub fn build(dict: &Dictionary, resolve: &dyn Resolve) -> Result<Option<ToUnicodeMap>> {
        let Some(p) = dict.get("ToUnicode") else {
            return Ok(None);
        };
        let stream = p.clone().resolve(resolve)?.into_stream()?;
        let data = crate::decoded::decode_standalone(&stream, crate::enc::DEFAULT_MAX_DECOMPRESSED_SIZE)?;
        let text = String::from_utf8_lossy(&data);
        Ok(Some(ToUnicodeMap::parse(&text)))
    }
}

fn parse_hex_token(token: &str) -> Option<u32> {
    let token = token.trim();
    let inner = token.strip_prefix('<')?.strip_suffix('>')?;
    u32::from_str_radix(inner, 16).ok()
}

/// A `<XXXX...>` token may encode several UTF-16BE code units (e.g. an
/// astral character or a short ligature run); decode them all.
fn parse_hex_tokens(token: &str) -> Option<String> {
    let token = token.trim();
    let inner = token.strip_prefix('<')?.strip_suffix('>')?;
    if inner.len() % 4 != 0 {
        return None;
    }
    let units: Vec<u16> = (0..inner.len())
        .step_by(4)
        .map(|i| u16::from_str_radix(&inner[i..i + 4], 16))
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    Some(String::from_utf16_lossy(&units))
}

#[derive(Clone, Debug)]
pub struct Font {
    pub subtype: FontType,
    pub base_font: String,
    /// `None` for the 14 standard fonts, which carry no embedded metrics in
    /// the file itself (SPEC_FULL: no fonts loader is carried — spec §1
    /// Non-goals — so standard-font metrics are not synthesized here).
    pub metrics: Option<SimpleFontMetrics>,
    /// Descendant CIDFont width table, for `Type0` fonts only.
    pub cid_metrics: Option<CidFontMetrics>,
    /// `Encoding` name on a `Type0` font; only `Identity-H` is interpreted
    /// as a 2-byte, CID-equals-code mapping (SPEC_FULL: other predefined
    /// CMaps are out of scope).
    pub cid_encoding: Option<String>,
    pub to_unicode: Option<ToUnicodeMap>,
}

impl Font {
    /// Width of `code` in 1000-unit text space, falling back to the spec's
    /// default of 500 for simple fonts with no matching `Widths` entry and
    /// 1000 for CID fonts with no matching `W` entry (ISO 32000-1 defaults).
    pub fn glyph_width(&self, code: u32) -> f64 {
        if let Some(cid) = &self.cid_metrics {
            return cid.width(code);
        }
        if let Some(simple) = &self.metrics {
            let idx = code as i32 - simple.first_char;
            if idx >= 0 {
                if let Some(&w) = simple.widths.get(idx as usize) {
                    return w;
                }
            }
            if let Some(d) = &simple.descriptor {
                if d.missing_width != 0.0 {
                    return d.missing_width;
                }
            }
            return 500.0;
        }
        1000.0
    }
}

const STANDARD_FONTS: &[&str] = &[
    "Courier",
    "Courier-Bold",
    "Courier-Oblique",
    "Courier-BoldOblique",
    "Times-Roman",
    "Times-Bold",
    "Times-Italic",
    "Times-BoldItalic",
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-Oblique",
    "Helvetica-BoldOblique",
    "Symbol",
    "ZapfDingbats",
];

fn name_field(dict: &Dictionary, key: &'static str, typ: &'static str, resolve: &dyn Resolve) -> Result<String> {
    dict.get(key)
        .ok_or_else(|| error::MissingEntrySnafu { typ, field: key }.build())?
        .clone()
        .resolve(resolve)?
        .into_name()
}

fn number_field(dict: &Dictionary, key: &'static str, default: f64, resolve: &dyn Resolve) -> Result<f64> {
    match dict.get(key) {
        Some(p) => p.clone().resolve(resolve)?.as_number(),
        None => Ok(default),
    }
}

impl FontDescriptor {
    fn build(dict: &Dictionary, resolve: &dyn Resolve, cache: &DecodedCache) -> Result<FontDescriptor> {
        let font_name = name_field(dict, "FontName", "FontDescriptor", resolve)?;
        let flags = FontFlags(
            dict.get("Flags")
                .map(|p| p.clone().resolve(resolve)?.as_integer())
                .transpose()?
                .unwrap_or(0) as i32,
        );
        let font_bbox = match dict.get("FontBBox") {
            Some(p) => Some(<Rect as crate::object::Object>::from_primitive(p.clone(), resolve)?),
            None => None,
        };
        let embedded = read_embedded(dict, resolve, cache)?;
        Ok(FontDescriptor {
            font_name,
            flags,
            font_bbox,
            italic_angle: number_field(dict, "ItalicAngle", 0.0, resolve)?,
            ascent: number_field(dict, "Ascent", 0.0, resolve)?,
            descent: number_field(dict, "Descent", 0.0, resolve)?,
            cap_height: number_field(dict, "CapHeight", 0.0, resolve)?,
            stem_v: number_field(dict, "StemV", 0.0, resolve)?,
            missing_width: number_field(dict, "MissingWidth", 0.0, resolve)?,
            embedded,
        })
    }
}

fn read_embedded(dict: &Dictionary, resolve: &dyn Resolve, cache: &DecodedCache) -> Result<Option<EmbeddedProgram>> {
    let _ = cache; // embedded font programs are decoded once and not reused, unlike page content
    for (key, wrap) in [
        ("FontFile", EmbeddedProgram::Type1 as fn(Vec<u8>) -> EmbeddedProgram),
        ("FontFile2", EmbeddedProgram::TrueType as fn(Vec<u8>) -> EmbeddedProgram),
        ("FontFile3", EmbeddedProgram::OpenTypeOrCff as fn(Vec<u8>) -> EmbeddedProgram),
    ] {
        if let Some(p) = dict.get(key) {
            let stream = p.clone().resolve(resolve)?.into_stream()?;
            let data = crate::decoded::decode_standalone(&stream, crate::enc::DEFAULT_MAX_DECOMPRESSED_SIZE)?;
            return Ok(Some(wrap(data)));
        }
    }
    Ok(None)
}

impl Font {
    pub fn build(dict: &Dictionary, resolve: &dyn Resolve, cache: &DecodedCache) -> Result<Font> {
        dict.expect("Type", "Font", true)?;
        let base_font = name_field(dict, "BaseFont", "Font", resolve)?;
        let subtype_name = name_field(dict, "Subtype", "Font", resolve)?;
        let subtype = FontType::from_name(&subtype_name)?;

        let to_unicode = ToUnicodeMap::build(dict, resolve)?;

        if STANDARD_FONTS.contains(&base_font.as_str()) && dict.get("FontDescriptor").is_none() && subtype != FontType::Type0 {
            return Ok(Font { subtype, base_font, metrics: None, cid_metrics: None, cid_encoding: None, to_unicode });
        }

        let metrics = match subtype {
            FontType::Type1 | FontType::TrueType | FontType::MMType1 => {
                let first_char = dict
                    .get("FirstChar")
                    .map(|p| p.clone().resolve(resolve)?.as_integer())
                    .transpose()?
                    .unwrap_or(0) as i32;
                let last_char = dict
                    .get("LastChar")
                    .map(|p| p.clone().resolve(resolve)?.as_integer())
                    .transpose()?
                    .unwrap_or(0) as i32;
                let widths = match dict.get("Widths") {
                    Some(p) => p
                        .clone()
                        .resolve(resolve)?
                        .into_array()?
                        .into_iter()
                        .map(|w| w.resolve(resolve)?.as_number())
                        .collect::<Result<Vec<_>>>()?,
                    None => Vec::new(),
                };
                let descriptor = match dict.get("FontDescriptor") {
                    Some(p) => Some(FontDescriptor::build(&p.clone().resolve(resolve)?.into_dictionary()?, resolve, cache)?),
                    None => None,
                };
                Some(SimpleFontMetrics { first_char, last_char, widths, descriptor })
            }
            _ => None,
        };

        let (cid_metrics, cid_encoding) = match subtype {
            FontType::Type0 => {
                let encoding = dict.get("Encoding").map(|p| p.clone().resolve(resolve)?.into_name()).transpose()?;
                let descendants = dict
                    .get("DescendantFonts")
                    .ok_or_else(|| error::MissingEntrySnafu { typ: "Font", field: "DescendantFonts" }.build())?
                    .clone()
                    .resolve(resolve)?
                    .into_array()?;
                let cid_dict = descendants
                    .into_iter()
                    .next()
                    .ok_or_else(|| error::InvalidResourcesSnafu { reason: "Type0 font has no descendant CIDFont".to_string() }.build())?
                    .resolve(resolve)?
                    .into_dictionary()?;
                (Some(CidFontMetrics::build(&cid_dict, resolve, cache)?), encoding)
            }
            _ => (None, None),
        };

        Ok(Font { subtype, base_font, metrics, cid_metrics, cid_encoding, to_unicode })
    }
}

impl CidFontMetrics {
    /// Expands the compact `W` array (ISO 32000-1 Table 117): each run is
    /// either `c [w1 w2 ...]` (consecutive CIDs from `c`) or `c_first c_last w`
    /// (one width for the whole range).
    fn build(dict: &Dictionary, resolve: &dyn Resolve, cache: &DecodedCache) -> Result<CidFontMetrics> {
        let default_width = number_field(dict, "DW", 1000.0, resolve)?;
        let mut widths = std::collections::BTreeMap::new();
        if let Some(p) = dict.get("W") {
            let entries = p.clone().resolve(resolve)?.into_array()?;
            let mut it = entries.into_iter();
            while let Some(first) = it.next() {
                let first_cid = first.resolve(resolve)?.as_integer()? as u32;
                match it.next() {
                    Some(second) => match second.clone().resolve(resolve)? {
                        crate::object::Primitive::Array(ws) => {
                            for (i, w) in ws.into_iter().enumerate() {
                                widths.insert(first_cid + i as u32, w.resolve(resolve)?.as_number()?);
                            }
                        }
                        other => {
                            let last_cid = other.as_integer()? as u32;
                            let w = it
                                .next()
                                .ok_or_else(|| error::InvalidResourcesSnafu { reason: "W array: truncated range entry".to_string() }.build())?
                                .resolve(resolve)?
                                .as_number()?;
                            for cid in first_cid..=last_cid {
                                widths.insert(cid, w);
                            }
                        }
                    },
                    None => break,
                }
            }
        }
        let descriptor = match dict.get("FontDescriptor") {
            Some(p) => Some(FontDescriptor::build(&p.clone().resolve(resolve)?.into_dictionary()?, resolve, cache)?),
            None => None,
        };
        Ok(CidFontMetrics { default_width, widths, descriptor })
    }
}

