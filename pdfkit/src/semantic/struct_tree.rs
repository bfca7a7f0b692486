//! The logical structure tree (spec §3 C4 "StructureTree"), used by the
//! editor (C9) to keep tagged-PDF structure consistent with content-stream
//! edits (spec §4.6, invariant I3/P7).

use crate::error::{self, Result};
use crate::object::{Dictionary, PdfString, Resolve};
use std::collections::BTreeMap;

/// One child of a structure element (spec §3): nested element, a bare
/// marked-content id (implicit page — the owning element's `page_index`),
/// an explicit `(page, mcid)` reference, or a reference to an annotation or
/// other object participating in the structure.
#[derive(Clone, Debug)]
pub enum StructureChild {
    Element(Box<StructureElement>),
    Mcid(i32),
    MarkedContentRef { page_index: usize, mcid: i32 },
    ObjectRef(crate::object::PlainRef),
}

#[derive(Clone, Debug)]
pub struct StructureElement {
    pub struct_type: String,
    pub id: Option<String>,
    pub page_index: Option<usize>,
    pub children: Vec<StructureChild>,
}

#[derive(Clone, Debug, Default)]
pub struct StructureTree {
    pub kids: Vec<StructureElement>,
    pub role_map: BTreeMap<String, String>,
    pub class_map: BTreeMap<String, Dictionary>,
    pub id_tree: BTreeMap<String, Vec<usize>>,
    /// Per-page lists of structure-tree paths (each path is a sequence of
    /// child indices from `kids[0]` down) whose element targets that page,
    /// supporting `repairStructTree`'s page-scoped walk (spec §4.6 step 5).
    pub parent_tree: BTreeMap<usize, Vec<Vec<usize>>>,
}

fn build_children(
    arr: Vec<crate::object::Primitive>,
    resolve: &dyn Resolve,
    resolve_page_index: &dyn Fn(crate::object::PlainRef) -> Option<usize>,
    path: &mut Vec<usize>,
    id_tree: &mut BTreeMap<String, Vec<usize>>,
    parent_tree: &mut BTreeMap<usize, Vec<Vec<usize>>>,
    sink: &dyn crate::diagnostic::DiagnosticSink,
) -> Result<Vec<StructureChild>> {
    let mut children = Vec::new();
    for (i, item) in arr.into_iter().enumerate() {
        match item.resolve(resolve)? {
            crate::object::Primitive::Integer(mcid) => children.push(StructureChild::Mcid(mcid as i32)),
            crate::object::Primitive::Dictionary(dict) => {
                path.push(i);
                match build_element(&dict, resolve, resolve_page_index, path, id_tree, parent_tree, sink) {
                    Ok(elem) => children.push(StructureChild::Element(Box::new(elem))),
                    Err(e) => crate::diagnostic::diag_warn!(sink, "skipping malformed structure element: {e}"),
                }
                path.pop();
            }
            other => {
                crate::diagnostic::diag_warn!(sink, "skipping structure child of unexpected kind {}", other.kind_name());
            }
        }
    }
    Ok(children)
}

fn build_element(
    dict: &Dictionary,
    resolve: &dyn Resolve,
    resolve_page_index: &dyn Fn(crate::object::PlainRef) -> Option<usize>,
    path: &mut Vec<usize>,
    id_tree: &mut BTreeMap<String, Vec<usize>>,
    parent_tree: &mut BTreeMap<usize, Vec<Vec<usize>>>,
    sink: &dyn crate::diagnostic::DiagnosticSink,
) -> Result<StructureElement> {
    let struct_type = dict
        .get("S")
        .ok_or_else(|| error::MissingEntrySnafu { typ: "StructElem", field: "S" }.build())?
        .clone()
        .resolve(resolve)?
        .into_name()?;

    let id = match dict.get("ID") {
        Some(p) => {
            let s = PdfString(p.clone().resolve(resolve)?.as_string()?.to_vec()).to_string_lossy();
            id_tree.insert(s.clone(), path.clone());
            Some(s)
        }
        None => None,
    };

    let page_index = match dict.get("Pg") {
        Some(crate::object::Primitive::Reference(r)) => resolve_page_index(*r),
        _ => None,
    };
    if let Some(idx) = page_index {
        parent_tree.entry(idx).or_default().push(path.clone());
    }

    let children = match dict.get("K") {
        Some(p) => build_children(p.clone().resolve(resolve)?.into_array()?, resolve, resolve_page_index, path, id_tree, parent_tree, sink)?,
        None => Vec::new(),
    };

    Ok(StructureElement { struct_type, id, page_index, children })
}

impl StructureTree {
    pub fn build(
        dict: &Dictionary,
        resolve: &dyn Resolve,
        resolve_page_index: &dyn Fn(crate::object::PlainRef) -> Option<usize>,
        sink: &dyn crate::diagnostic::DiagnosticSink,
    ) -> Result<StructureTree> {
        let mut role_map = BTreeMap::new();
        if let Some(p) = dict.get("RoleMap") {
            for (k, v) in p.clone().resolve(resolve)?.into_dictionary()?.iter() {
                if let Ok(name) = v.clone().resolve(resolve).and_then(|v| v.into_name()) {
                    role_map.insert(k.clone(), name);
                }
            }
        }

        let mut class_map = BTreeMap::new();
        if let Some(p) = dict.get("ClassMap") {
            for (k, v) in p.clone().resolve(resolve)?.into_dictionary()?.iter() {
                if let Ok(d) = v.clone().resolve(resolve).and_then(|v| v.into_dictionary()) {
                    class_map.insert(k.clone(), d);
                }
            }
        }

        let mut id_tree = BTreeMap::new();
        let mut parent_tree = BTreeMap::new();
        let mut kids = Vec::new();
        if let Some(p) = dict.get("K") {
            for (i, item) in p.clone().resolve(resolve)?.into_array()?.into_iter().enumerate() {
                let elem_dict = match item.resolve(resolve)?.into_dictionary() {
                    Ok(d) => d,
                    Err(e) => {
                        crate::diagnostic::diag_warn!(sink, "skipping malformed top-level structure element: {e}");
                        continue;
                    }
                };
                let mut path = vec![i];
                match build_element(&elem_dict, resolve, resolve_page_index, &mut path, &mut id_tree, &mut parent_tree, sink) {
                    Ok(elem) => kids.push(elem),
                    Err(e) => crate::diagnostic::diag_warn!(sink, "skipping malformed top-level structure element: {e}"),
                }
            }
        }

        Ok(StructureTree { kids, role_map, class_map, id_tree, parent_tree })
    }

    /// Looks up the element at `path` (a sequence of child indices from the
    /// root), used by the editor's `repairStructTree` (spec §4.6 step 5).
    pub fn element_at(&self, path: &[usize]) -> Option<&StructureElement> {
        let (&first, rest) = path.split_first()?;
        let mut current = self.kids.get(first)?;
        for &idx in rest {
            current = match current.children.get(idx)? {
                StructureChild::Element(e) => e,
                _ => return None,
            };
        }
        Some(current)
    }
}
