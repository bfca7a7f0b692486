//! `/XObject` resources (spec §3 C4): form XObjects (nested content
//! streams) and image XObjects. Image *pixel* decoding (DCT/JPX/CCITT) is
//! out of scope (spec §1 Non-goals); the optimizer's image step (C10)
//! reaches for the `image` crate only when it needs to re-encode JPEG data,
//! using these bytes as-is.

use crate::decoded::DecodedCache;
use crate::error::{self, Result};
use crate::object::{Dictionary, ObjNr, PdfStream, Resolve};
use crate::semantic::resources::Rect;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RenderingIntent {
    AbsoluteColorimetric,
    RelativeColorimetric,
    Saturation,
    Perceptual,
}

impl RenderingIntent {
    fn from_name(name: &str) -> Result<RenderingIntent> {
        Ok(match name {
            "AbsoluteColorimetric" => RenderingIntent::AbsoluteColorimetric,
            "RelativeColorimetric" => RenderingIntent::RelativeColorimetric,
            "Saturation" => RenderingIntent::Saturation,
            "Perceptual" => RenderingIntent::Perceptual,
            other => {
                return error::UnknownVariantSnafu {
                    id: "RenderingIntent",
                    name: other.to_string(),
                }
                .fail()
            }
        })
    }
}

#[derive(Clone, Debug)]
pub struct ImageXObject {
    pub id: ObjNr,
    pub width: i32,
    pub height: i32,
    pub bits_per_component: i32,
    pub intent: Option<RenderingIntent>,
    pub image_mask: bool,
    pub interpolate: bool,
    /// Still in whatever encoding its final filter left it in (e.g. raw
    /// DCT/JPEG bytes for a `DCTDecode` image) — the filter chain in C2
    /// leaves image codecs as an opaque passthrough.
    pub data: Vec<u8>,
    pub filters: Vec<crate::enc::Filter>,
}

#[derive(Clone, Debug)]
pub struct FormXObject {
    pub id: ObjNr,
    pub bbox: Option<Rect>,
    pub matrix: Option<[f64; 6]>,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug)]
pub enum XObject {
    Image(ImageXObject),
    Form(FormXObject),
}

fn number_field(dict: &Dictionary, key: &'static str, resolve: &dyn Resolve) -> Result<i32> {
    Ok(dict
        .get(key)
        .ok_or_else(|| error::MissingEntrySnafu { typ: "XObject", field: key }.build())?
        .clone()
        .resolve(resolve)?
        .as_integer()? as i32)
}

impl XObject {
    pub fn build(id: ObjNr, stream: &PdfStream, resolve: &dyn Resolve, cache: &DecodedCache) -> Result<XObject> {
        stream.info.expect("Type", "XObject", false)?;
        let subtype = stream
            .info
            .get("Subtype")
            .ok_or_else(|| error::MissingEntrySnafu { typ: "XObject", field: "Subtype" }.build())?
            .clone()
            .resolve(resolve)?
            .into_name()?;

        let chain = crate::enc::filter_chain(stream.info.get("Filter"), stream.info.get("DecodeParms"), resolve)?;

        match subtype.as_str() {
            "Image" => {
                let data = cache.get_or_decode(id, stream, resolve)?;
                let intent = match stream.info.get("Intent") {
                    Some(p) => Some(RenderingIntent::from_name(p.clone().resolve(resolve)?.into_name()?.as_str())?),
                    None => None,
                };
                let image_mask = match stream.info.get("ImageMask") {
                    Some(p) => p.clone().resolve(resolve)?.as_bool()?,
                    None => false,
                };
                let interpolate = match stream.info.get("Interpolate") {
                    Some(p) => p.clone().resolve(resolve)?.as_bool()?,
                    None => false,
                };
                Ok(XObject::Image(ImageXObject {
                    id,
                    width: number_field(&stream.info, "Width", resolve)?,
                    height: number_field(&stream.info, "Height", resolve)?,
                    bits_per_component: dict_opt_int(&stream.info, "BitsPerComponent", resolve)?.unwrap_or(8),
                    intent,
                    image_mask,
                    interpolate,
                    data,
                    filters: chain.into_iter().map(|(f, _)| f).collect(),
                }))
            }
            "Form" => {
                let data = cache.get_or_decode(id, stream, resolve)?;
                let bbox = match stream.info.get("BBox") {
                    Some(p) => Some(<Rect as crate::object::Object>::from_primitive(p.clone(), resolve)?),
                    None => None,
                };
                let matrix = match stream.info.get("Matrix") {
                    Some(p) => {
                        let arr = p.clone().resolve(resolve)?.into_array()?;
                        if arr.len() == 6 {
                            let mut m = [0.0; 6];
                            for (i, v) in arr.into_iter().enumerate() {
                                m[i] = v.resolve(resolve)?.as_number()?;
                            }
                            Some(m)
                        } else {
                            None
                        }
                    }
                    None => None,
                };
                Ok(XObject::Form(FormXObject { id, bbox, matrix, data }))
            }
            other => error::UnknownVariantSnafu {
                id: "XObject",
                name: other.to_string(),
            }
            .fail(),
        }
    }
}

fn dict_opt_int(dict: &Dictionary, key: &'static str, resolve: &dyn Resolve) -> Result<Option<i32>> {
    match dict.get(key) {
        Some(p) => Ok(Some(p.clone().resolve(resolve)?.as_integer()? as i32)),
        None => Ok(None),
    }
}
