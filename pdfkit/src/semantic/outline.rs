//! Document outline ("bookmarks", spec §3 C4 "Document: outlines[]").

use crate::error::Result;
use crate::object::{Dictionary, PdfString, Resolve};
use crate::semantic::action::{Action, Destination};

#[derive(Clone, Debug)]
pub struct OutlineItem {
    pub title: String,
    pub destination: Option<Destination>,
    pub action: Option<Action>,
    pub children: Vec<OutlineItem>,
}

impl OutlineItem {
    fn build_sibling_chain(
        mut next: Option<crate::object::PlainRef>,
        resolve: &dyn Resolve,
        resolve_page_index: &dyn Fn(crate::object::PlainRef) -> Option<usize>,
        sink: &dyn crate::diagnostic::DiagnosticSink,
        depth: usize,
    ) -> Result<Vec<OutlineItem>> {
        // outline trees are small by construction; this bound only guards
        // against a cyclic /Next chain in a hostile file.
        const MAX_DEPTH: usize = 4096;
        let mut items = Vec::new();
        let mut seen = std::collections::HashSet::new();
        while let Some(r) = next {
            if depth > MAX_DEPTH || !seen.insert(r) {
                crate::diagnostic::diag_warn!(sink, "outline chain too deep or cyclic, truncating");
                break;
            }
            let dict = match resolve.resolve(r).and_then(|p| p.into_dictionary()) {
                Ok(d) => d,
                Err(e) => {
                    crate::diagnostic::diag_warn!(sink, "skipping malformed outline item: {e}");
                    break;
                }
            };
            match Self::build_one(&dict, resolve, resolve_page_index, sink, depth) {
                Ok(item) => items.push(item),
                Err(e) => crate::diagnostic::diag_warn!(sink, "skipping malformed outline item: {e}"),
            }
            next = match dict.get("Next") {
                Some(crate::object::Primitive::Reference(r)) => Some(*r),
                _ => None,
            };
        }
        Ok(items)
    }

    fn build_one(
        dict: &Dictionary,
        resolve: &dyn Resolve,
        resolve_page_index: &dyn Fn(crate::object::PlainRef) -> Option<usize>,
        sink: &dyn crate::diagnostic::DiagnosticSink,
        depth: usize,
    ) -> Result<OutlineItem> {
        let title = match dict.get("Title") {
            Some(p) => PdfString(p.clone().resolve(resolve)?.as_string()?.to_vec()).to_string_lossy(),
            None => String::new(),
        };

        let destination = match dict.get("Dest") {
            Some(p) => {
                let arr = p.clone().resolve(resolve)?.into_array()?;
                match arr.into_iter().next() {
                    Some(crate::object::Primitive::Reference(r)) => resolve_page_index(r).map(Destination::PageIndex),
                    Some(other) => other.resolve(resolve)?.as_integer().ok().map(|i| Destination::PageIndex(i as usize)),
                    None => None,
                }
            }
            None => None,
        };

        let action = match dict.get("A") {
            Some(p) => Some(Action::build(&p.clone().resolve(resolve)?.into_dictionary()?, resolve, resolve_page_index)?),
            None => None,
        };

        let first_child = match dict.get("First") {
            Some(crate::object::Primitive::Reference(r)) => Some(*r),
            _ => None,
        };
        let children = Self::build_sibling_chain(first_child, resolve, resolve_page_index, sink, depth + 1)?;

        Ok(OutlineItem { title, destination, action, children })
    }

    pub fn build_top_level(
        outlines_dict: &Dictionary,
        resolve: &dyn Resolve,
        resolve_page_index: &dyn Fn(crate::object::PlainRef) -> Option<usize>,
        sink: &dyn crate::diagnostic::DiagnosticSink,
    ) -> Result<Vec<OutlineItem>> {
        let first = match outlines_dict.get("First") {
            Some(crate::object::Primitive::Reference(r)) => Some(*r),
            _ => None,
        };
        Self::build_sibling_chain(first, resolve, resolve_page_index, sink, 0)
    }
}
