//! Interactive form fields (spec §3 C4: "FormField (sum type)") and the
//! catalog's `AcroForm` dictionary.

use crate::error::{self, Result};
use crate::object::{Dictionary, PdfString, Resolve};

#[derive(Clone, Debug)]
pub enum FieldValue {
    Text(String),
    Choice(Vec<String>),
    ButtonOn(String),
    ButtonOff,
    Signature,
    Unset,
}

#[derive(Clone, Debug)]
pub enum FormField {
    Text {
        default_appearance: Option<String>,
        quadding: i32,
    },
    Choice {
        options: Vec<String>,
        combo: bool,
    },
    Button {
        checkbox: bool,
        radio: bool,
        push: bool,
    },
    Signature,
    Generic,
}

#[derive(Clone, Debug)]
pub struct Field {
    pub name: String,
    pub page_index: Option<usize>,
    pub rect: Option<crate::semantic::resources::Rect>,
    pub flags: i32,
    pub value: FieldValue,
    pub kind: FormField,
}

#[derive(Clone, Debug, Default)]
pub struct AcroForm {
    pub fields: Vec<Field>,
    pub need_appearances: bool,
}

fn text_field(dict: &Dictionary, key: &'static str, resolve: &dyn Resolve) -> Result<Option<String>> {
    match dict.get(key) {
        Some(p) => Ok(Some(PdfString(p.clone().resolve(resolve)?.as_string()?.to_vec()).to_string_lossy())),
        None => Ok(None),
    }
}

impl Field {
    pub fn build(
        dict: &Dictionary,
        resolve: &dyn Resolve,
        resolve_page_index: &dyn Fn(crate::object::PlainRef) -> Option<usize>,
    ) -> Result<Field> {
        let name = text_field(dict, "T", resolve)?.unwrap_or_default();
        let ftype = match dict.get("FT") {
            Some(p) => Some(p.clone().resolve(resolve)?.into_name()?),
            None => None,
        };
        let flags = dict
            .get("Ff")
            .map(|p| p.clone().resolve(resolve)?.as_integer())
            .transpose()?
            .unwrap_or(0) as i32;

        let page_index = match dict.get("P") {
            Some(crate::object::Primitive::Reference(r)) => resolve_page_index(*r),
            _ => None,
        };
        let rect = match dict.get("Rect") {
            Some(p) => Some(<crate::semantic::resources::Rect as crate::object::Object>::from_primitive(p.clone(), resolve)?),
            None => None,
        };

        let kind = match ftype.as_deref() {
            Some("Tx") => FormField::Text {
                default_appearance: text_field(dict, "DA", resolve)?,
                quadding: dict
                    .get("Q")
                    .map(|p| p.clone().resolve(resolve)?.as_integer())
                    .transpose()?
                    .unwrap_or(0) as i32,
            },
            Some("Ch") => {
                let options = match dict.get("Opt") {
                    Some(p) => p
                        .clone()
                        .resolve(resolve)?
                        .into_array()?
                        .into_iter()
                        .map(|v| Ok(PdfString(v.resolve(resolve)?.as_string()?.to_vec()).to_string_lossy()))
                        .collect::<Result<Vec<_>>>()?,
                    None => Vec::new(),
                };
                FormField::Choice { options, combo: flags & (1 << 17) != 0 }
            }
            Some("Btn") => FormField::Button {
                checkbox: flags & (1 << 15) == 0 && flags & (1 << 16) == 0,
                radio: flags & (1 << 15) != 0,
                push: flags & (1 << 16) != 0,
            },
            Some("Sig") => FormField::Signature,
            _ => FormField::Generic,
        };

        let value = match dict.get("V") {
            Some(p) => {
                let resolved = p.clone().resolve(resolve)?;
                match resolved {
                    crate::object::Primitive::Name(n) if n == "Off" => FieldValue::ButtonOff,
                    crate::object::Primitive::Name(n) => FieldValue::ButtonOn(n),
                    crate::object::Primitive::String(s) => FieldValue::Text(String::from_utf8_lossy(&s).into_owned()),
                    _ => FieldValue::Unset,
                }
            }
            None => FieldValue::Unset,
        };

        Ok(Field { name, page_index, rect, flags, value, kind })
    }
}

impl AcroForm {
    pub fn build(
        dict: &Dictionary,
        resolve: &dyn Resolve,
        resolve_page_index: &dyn Fn(crate::object::PlainRef) -> Option<usize>,
        sink: &dyn crate::diagnostic::DiagnosticSink,
    ) -> Result<AcroForm> {
        let need_appearances = dict
            .get("NeedAppearances")
            .map(|p| p.clone().resolve(resolve)?.as_bool())
            .transpose()?
            .unwrap_or(false);

        let mut fields = Vec::new();
        if let Some(p) = dict.get("Fields") {
            for entry in p.clone().resolve(resolve)?.into_array()? {
                let field_dict = match entry.resolve(resolve)?.into_dictionary() {
                    Ok(d) => d,
                    Err(e) => {
                        crate::diagnostic::diag_warn!(sink, "skipping malformed form field: {e}");
                        continue;
                    }
                };
                match Field::build(&field_dict, resolve, resolve_page_index) {
                    Ok(field) => fields.push(field),
                    Err(e) => crate::diagnostic::diag_warn!(sink, "skipping malformed form field: {e}"),
                }
            }
        }

        Ok(AcroForm { fields, need_appearances })
    }
}
