//! The semantic IR (spec §3 C4): a fully-materialized typed DAG over the
//! raw/decoded layers, built by [`builder`] (C5).

pub mod action;
pub mod annotation;
pub mod builder;
pub mod embedded_file;
pub mod field;
pub mod font;
pub mod outline;
pub mod page;
pub mod resources;
pub mod struct_tree;
pub mod xobject;

pub use action::{Action, Destination};
pub use annotation::{Annotation, AnnotationFlags, AnnotationKind};
pub use embedded_file::EmbeddedFile;
pub use field::{AcroForm, Field, FieldValue, FormField};
pub use font::{Font, FontDescriptor, FontType};
pub use outline::OutlineItem;
pub use page::{ContentStream, Document, Info, Page, PageLabelRange, Rotation};
pub use resources::{Rect, Resources};
pub use struct_tree::{StructureChild, StructureElement, StructureTree};
pub use xobject::{FormXObject, ImageXObject, XObject};
