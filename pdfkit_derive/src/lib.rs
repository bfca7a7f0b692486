//! `pdfkit_derive` provides the `#[derive(Object)]` proc macro used throughout
//! `pdfkit` to connect typed Rust structs/enums to the raw `Primitive` tree.
//!
//! ## Struct from a PDF dictionary
//!
//! ```ignore
//! #[derive(Object)]
//! #[pdf(Type = "XObject", Subtype = "Image")]
//! pub struct ImageDict {
//!     #[pdf(key = "Width")]
//!     pub width: i32,
//!     #[pdf(key = "Height")]
//!     pub height: i32,
//!     #[pdf(key = "Interpolate", default = "false")]
//!     pub interpolate: bool,
//! }
//! ```
//!
//! `Type`/`Subtype`/any other `Name = "Value"` struct attribute becomes a
//! required dictionary check unless the value ends in `?`, in which case the
//! check only runs when the key is present. Each field needs `T: Object`;
//! `Option<T>` and `Vec<T>` already treat a missing key as "not present"
//! rather than an error. `default = "<expr>"` supplies a fallback instead of
//! erroring when the key is absent.
//!
//! ## Struct from a PDF stream
//!
//! Add `#[pdf(is_stream)]` and give the struct an `info: T` and `data: Vec<u8>`
//! field; `info` is populated the way a plain struct would be, `data` holds
//! the stream's raw (still-filtered) bytes.
//!
//! ## Enum from a PDF name
//!
//! ```ignore
//! #[derive(Object)]
//! pub enum StreamFilter {
//!     ASCIIHexDecode,
//!     ASCII85Decode,
//!     #[pdf(name = "LZW")]
//!     LZWDecode,
//! }
//! ```
//!
//! ## Enum from a PDF stream dispatching on `/Subtype`
//!
//! Add `#[pdf(is_stream)]` to the enum; each variant must hold exactly one
//! field whose type implements `Object` by parsing a stream.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Data, DataEnum, DeriveInput, Fields, Ident, Lit, LitStr, Meta, Type,
};

#[proc_macro_derive(Object, attributes(pdf))]
pub fn object(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    impl_object(&ast).into()
}

struct FieldAttrs {
    key: LitStr,
    default: Option<syn::Expr>,
}

/// `None` means the field carries no `#[pdf(..)]` attribute (or an explicit
/// `#[pdf(skip)]`) and is not part of the dictionary round trip at all.
fn field_attrs(field: &syn::Field) -> Option<FieldAttrs> {
    let mut key = None;
    let mut default = None;
    let mut skip = false;
    let mut seen = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("pdf") {
            continue;
        }
        seen = true;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("key") {
                let s: LitStr = meta.value()?.parse()?;
                key = Some(s);
            } else if meta.path.is_ident("default") {
                let s: LitStr = meta.value()?.parse()?;
                default = Some(s.parse::<syn::Expr>()?);
            } else if meta.path.is_ident("skip") {
                skip = true;
            } else {
                return Err(meta.error("unsupported pdf() field attribute"));
            }
            Ok(())
        })
        .expect("malformed #[pdf(..)] field attribute");
    }

    if !seen || skip {
        return None;
    }
    Some(FieldAttrs {
        key: key.expect("#[pdf(..)] field attribute is missing `key = \"..\"`"),
        default,
    })
}

#[derive(Default)]
struct GlobalAttrs {
    /// Extra `key == "value"` checks beyond `Type` (e.g. `Subtype = "Image"`).
    checks: Vec<(String, String)>,
    type_name: Option<String>,
    type_required: bool,
    is_stream: bool,
}

impl GlobalAttrs {
    fn from_attrs(attrs: &[syn::Attribute]) -> GlobalAttrs {
        let mut out = GlobalAttrs::default();
        for attr in attrs {
            if !attr.path().is_ident("pdf") {
                continue;
            }
            let Meta::List(list) = &attr.meta else {
                panic!("only #[pdf(attrs...)] is supported at the item level");
            };
            list.parse_nested_meta(|meta| {
                if meta.path.is_ident("is_stream") {
                    out.is_stream = true;
                    return Ok(());
                }
                let ident = meta
                    .path
                    .get_ident()
                    .expect("pdf() attribute keys must be plain identifiers")
                    .to_string();
                let lit: Lit = meta.value()?.parse()?;
                let Lit::Str(s) = lit else {
                    panic!("pdf() attribute values must be string literals");
                };
                let mut value = s.value();
                if ident == "Type" {
                    out.type_required = !value.ends_with('?');
                    if !out.type_required {
                        value.pop();
                    }
                    out.type_name = Some(value);
                } else {
                    out.checks.push((ident, value));
                }
                Ok(())
            })
            .expect("malformed #[pdf(..)] item attribute");
        }
        out
    }
}

fn impl_object(ast: &DeriveInput) -> TokenStream2 {
    let attrs = GlobalAttrs::from_attrs(&ast.attrs);
    match (attrs.is_stream, &ast.data) {
        (true, Data::Struct(data)) => impl_struct_from_stream(ast, &data.fields),
        (false, Data::Struct(data)) => impl_struct_from_dict(ast, &data.fields, &attrs),
        (true, Data::Enum(data)) => impl_enum_from_stream(ast, data, &attrs),
        (false, Data::Enum(data)) => impl_enum_from_name(ast, data),
        (_, Data::Union(_)) => panic!("#[derive(Object)] does not support unions"),
    }
}

fn variant_name_override(variant: &syn::Variant) -> Option<LitStr> {
    for attr in &variant.attrs {
        if !attr.path().is_ident("pdf") {
            continue;
        }
        let mut found = None;
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                found = Some(meta.value()?.parse::<LitStr>()?);
            }
            Ok(())
        });
        if found.is_some() {
            return found;
        }
    }
    None
}

fn impl_enum_from_name(ast: &DeriveInput, data: &DataEnum) -> TokenStream2 {
    let id = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let names: Vec<LitStr> = data
        .variants
        .iter()
        .map(|v| {
            variant_name_override(v)
                .unwrap_or_else(|| LitStr::new(&v.ident.to_string(), v.ident.span()))
        })
        .collect();
    let idents: Vec<&Ident> = data.variants.iter().map(|v| &v.ident).collect();

    quote! {
        impl #impl_generics crate::object::Object for #id #ty_generics #where_clause {
            fn serialize<W: ::std::io::Write>(&self, out: &mut W) -> crate::error::Result<()> {
                let name = match self {
                    #( #id::#idents => #names, )*
                };
                write!(out, "/{}", name)?;
                Ok(())
            }
            fn from_primitive(p: crate::object::Primitive, _resolve: &dyn crate::object::Resolve) -> crate::error::Result<Self> {
                let name = p.into_name()?;
                match name.as_str() {
                    #( #names => Ok(#id::#idents), )*
                    other => Err(crate::error::PdfError::UnknownVariant {
                        id: stringify!(#id),
                        name: other.to_string(),
                    }),
                }
            }
        }
    }
}

fn impl_enum_from_stream(ast: &DeriveInput, data: &DataEnum, attrs: &GlobalAttrs) -> TokenStream2 {
    let id = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let ty_check = match (&attrs.type_name, attrs.type_required) {
        (Some(ty), required) => quote! { stream.info.expect("Type", #ty, #required)?; },
        (None, _) => quote! {},
    };

    let mut subtypes = Vec::new();
    let mut inner_tys = Vec::new();
    let mut idents = Vec::new();
    for var in &data.variants {
        let inner_ty = match &var.fields {
            Fields::Unnamed(f) if f.unnamed.len() == 1 => f.unnamed.first().unwrap().ty.clone(),
            _ => panic!("#[pdf(is_stream)] enum variants must wrap exactly one type"),
        };
        let subty = variant_name_override(var)
            .unwrap_or_else(|| LitStr::new(&var.ident.to_string(), var.ident.span()));
        subtypes.push(subty);
        inner_tys.push(inner_ty);
        idents.push(&var.ident);
    }

    quote! {
        impl #impl_generics crate::object::Object for #id #ty_generics #where_clause {
            fn serialize<W: ::std::io::Write>(&self, out: &mut W) -> crate::error::Result<()> {
                match self {
                    #( #id::#idents(inner) => inner.serialize(out), )*
                }
            }
            fn from_primitive(p: crate::object::Primitive, resolve: &dyn crate::object::Resolve) -> crate::error::Result<Self> {
                let stream = crate::object::PdfStream::from_primitive(p, resolve)?;
                #ty_check
                let subty = stream.info.get("Subtype")
                    .ok_or(crate::error::PdfError::MissingEntry { typ: stringify!(#id), field: "Subtype" })?
                    .clone().into_name()?;
                match subty.as_str() {
                    #( #subtypes => Ok(#id::#idents(<#inner_tys as crate::object::Object>::from_primitive(crate::object::Primitive::Stream(stream), resolve)?)), )*
                    other => Err(crate::error::PdfError::UnknownVariant { id: stringify!(#id), name: other.to_string() }),
                }
            }
        }
    }
}

fn impl_struct_from_stream(ast: &DeriveInput, fields: &Fields) -> TokenStream2 {
    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let info_ty = fields
        .iter()
        .find(|f| f.ident.as_ref().map(|i| i == "info").unwrap_or(false))
        .map(|f| f.ty.clone())
        .expect("#[pdf(is_stream)] struct must have an `info: T` field");

    quote! {
        impl #impl_generics crate::object::Object for #name #ty_generics #where_clause {
            fn serialize<W: ::std::io::Write>(&self, out: &mut W) -> crate::error::Result<()> {
                self.info.serialize(out)?;
                writeln!(out, "\nstream")?;
                out.write_all(&self.data)?;
                writeln!(out, "\nendstream")?;
                Ok(())
            }
            fn from_primitive(p: crate::object::Primitive, resolve: &dyn crate::object::Resolve) -> crate::error::Result<Self> {
                let crate::object::PdfStream { info, data } = p.into_stream()?;
                Ok(#name {
                    info: <#info_ty as crate::object::Object>::from_primitive(crate::object::Primitive::Dictionary(info), resolve)?,
                    data,
                })
            }
        }
    }
}

fn impl_struct_from_dict(ast: &DeriveInput, fields: &Fields, attrs: &GlobalAttrs) -> TokenStream2 {
    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();
    let type_name = name.to_string();

    let parts: Vec<(Option<&Ident>, Option<FieldAttrs>, &Type)> = fields
        .iter()
        .map(|f| (f.ident.as_ref(), field_attrs(f), &f.ty))
        .collect();

    let fields_ser = parts.iter().filter_map(|(field, attrs, _)| {
        let attrs = attrs.as_ref()?;
        let key = &attrs.key;
        Some(quote! {
            write!(out, "/{} ", #key)?;
            self.#field.serialize(out)?;
            writeln!(out)?;
        })
    });

    let checks_ser = attrs.checks.iter().map(|(key, val)| {
        quote! { writeln!(out, "/{} /{}", #key, #val)?; }
    });

    let pdf_type_ser = attrs.type_name.as_ref().map(|ty| {
        quote! { writeln!(out, "/Type /{}", #ty)?; }
    });

    let let_parts = parts.iter().map(|(field, attrs, ty)| {
        let field = field.expect("tuple struct fields are not supported by #[derive(Object)]");
        let Some(attrs) = attrs else {
            return quote! { let #field: #ty = ::std::default::Default::default(); };
        };
        let key = &attrs.key;
        match &attrs.default {
            Some(default) => quote! {
                let #field: #ty = match dict.remove(#key) {
                    Some(primitive) => <#ty as crate::object::Object>::from_primitive(primitive, resolve)
                        .map_err(|e| crate::error::PdfError::FromPrimitive {
                            typ: #type_name,
                            field: stringify!(#field),
                            source: Box::new(e),
                        })?,
                    None => #default,
                };
            },
            None => quote! {
                let #field: #ty = match dict.remove(#key) {
                    Some(primitive) => <#ty as crate::object::Object>::from_primitive(primitive, resolve)
                        .map_err(|e| crate::error::PdfError::FromPrimitive {
                            typ: #type_name,
                            field: stringify!(#field),
                            source: Box::new(e),
                        })?,
                    None => match <#ty as crate::object::Object>::from_primitive(crate::object::Primitive::Null, resolve) {
                        Ok(obj) => obj,
                        Err(_) => return Err(crate::error::PdfError::MissingEntry {
                            typ: #type_name,
                            field: stringify!(#field),
                        }),
                    },
                };
            },
        }
    });

    let field_build = parts.iter().map(|(field, _, _)| {
        let field = field.expect("tuple struct fields are not supported by #[derive(Object)]");
        quote! { #field, }
    });

    let checks_de = attrs.checks.iter().map(|(key, val)| {
        quote! { dict.expect(#key, #val, true)?; }
    });

    let ty_check = match (&attrs.type_name, attrs.type_required) {
        (Some(ty), required) => quote! { dict.expect("Type", #ty, #required)?; },
        (None, _) => quote! {},
    };

    quote! {
        impl #impl_generics crate::object::Object for #name #ty_generics #where_clause {
            fn serialize<W: ::std::io::Write>(&self, out: &mut W) -> crate::error::Result<()> {
                writeln!(out, "<<")?;
                #pdf_type_ser
                #( #checks_ser )*
                #( #fields_ser )*
                write!(out, ">>")?;
                Ok(())
            }
            fn from_primitive(p: crate::object::Primitive, resolve: &dyn crate::object::Resolve) -> crate::error::Result<Self> {
                let mut dict = p.into_dictionary()?;
                #ty_check
                #( #checks_de )*
                #( #let_parts )*
                Ok(#name {
                    #( #field_build )*
                })
            }
        }
    }
}
