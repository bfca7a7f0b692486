//! Interactive actions (spec §3 C4: "Action (sum type)"), attached to
//! annotations, outline items, and the catalog's `OpenAction`.

use crate::error::{self, Result};
use crate::object::{Dictionary, Resolve};

#[derive(Clone, Debug)]
pub enum Destination {
    /// `[page /Fit]` and friends; only the page index and a raw fit
    /// descriptor are kept, since layout-specific fit parameters (zoom,
    /// left/top) are a view concern outside this crate's scope.
    PageIndex(usize),
}

#[derive(Clone, Debug)]
pub enum Action {
    GoTo(Destination),
    GoToR { file: String, dest: Option<String> },
    Uri(String),
    Named(String),
    /// Anything else: `JavaScript`, `SubmitForm`, `Launch`, … kept opaque
    /// since scripting is an external collaborator (spec §6), not
    /// something this crate interprets.
    Other { subtype: String, dict: Dictionary },
}

impl Action {
    pub fn build(dict: &Dictionary, resolve: &dyn Resolve, resolve_page_index: &dyn Fn(crate::object::PlainRef) -> Option<usize>) -> Result<Action> {
        let subtype = dict
            .get("S")
            .ok_or_else(|| error::MissingEntrySnafu { typ: "Action", field: "S" }.build())?
            .clone()
            .resolve(resolve)?
            .into_name()?;

        match subtype.as_str() {
            "GoTo" => {
                let d = dict
                    .get("D")
                    .ok_or_else(|| error::MissingEntrySnafu { typ: "Action", field: "D" }.build())?
                    .clone()
                    .resolve(resolve)?;
                Ok(Action::GoTo(build_destination(d, resolve, resolve_page_index)?))
            }
            "GoToR" => {
                let spec = dict
                    .get("F")
                    .ok_or_else(|| error::MissingEntrySnafu { typ: "Action", field: "F" }.build())?
                    .clone()
                    .resolve(resolve)?;
                let file = match spec {
                    crate::object::Primitive::String(s) => String::from_utf8_lossy(&s).into_owned(),
                    crate::object::Primitive::Dictionary(d) => d
                        .get("F")
                        .map(|p| p.clone().resolve(resolve)?.as_string().map(|s| String::from_utf8_lossy(s).into_owned()))
                        .transpose()?
                        .unwrap_or_default(),
                    other => return error::UnexpectedPrimitiveSnafu { expected: "String or Dictionary", found: other.kind_name() }.fail(),
                };
                Ok(Action::GoToR { file, dest: None })
            }
            "URI" => {
                let uri_dict = dict
                    .get("URI")
                    .ok_or_else(|| error::MissingEntrySnafu { typ: "Action", field: "URI" }.build())?
                    .clone()
                    .resolve(resolve)?;
                Ok(Action::Uri(String::from_utf8_lossy(uri_dict.as_string()?).into_owned()))
            }
            "Named" => {
                let name = dict
                    .get("N")
                    .ok_or_else(|| error::MissingEntrySnafu { typ: "Action", field: "N" }.build())?
                    .clone()
                    .resolve(resolve)?
                    .into_name()?;
                Ok(Action::Named(name))
            }
            other => Ok(Action::Other {
                subtype: other.to_string(),
                dict: dict.clone(),
            }),
        }
    }
}

fn build_destination(
    p: crate::object::Primitive,
    resolve: &dyn Resolve,
    resolve_page_index: &dyn Fn(crate::object::PlainRef) -> Option<usize>,
) -> Result<Destination> {
    let arr = p.into_array()?;
    let first = arr
        .into_iter()
        .next()
        .ok_or_else(|| error::ParseSnafu { pos: 0usize, reason: "empty destination array".to_string() }.build())?;
    let index = match first {
        crate::object::Primitive::Reference(r) => resolve_page_index(r).unwrap_or(0),
        other => other.resolve(resolve)?.as_integer()? as usize,
    };
    Ok(Destination::PageIndex(index))
}
