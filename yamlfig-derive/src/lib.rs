//! `#[derive(Config)]` for yamlfig.
//!
//! Generates `yamlfig::Shape` (the field list the loader walks) and
//! `yamlfig::Template` (the commented YAML renderer) for structs with named
//! fields.
//!
//! Field attributes:
//!
//! - `///` doc comments or `#[config(comment = "...")]`: template comment.
//! - `#[config(default = <literal>)]`: value shown in templates.
//! - `#[config(secret)]`: never printed in templates or audit output.
//! - `#[config(leaf)]`: treat the field as one opaque value handed to serde.
//! - `#[serde(rename = "...")]`, `#[serde(flatten)]`, `#[serde(skip)]` are
//!   honored so the shape matches what serde decodes. Only struct fields
//!   may be flattened; anything else fails the shape check at load time.
//!
//! Container attribute `#[config(custom_template)]` skips the `Template` impl.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]

extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::{
    Data, DeriveInput, Expr, ExprLit, ExprUnary, Fields, Ident, Lit, LitStr, Type, UnOp,
    parse_macro_input, parse_quote,
};

#[proc_macro_derive(Config, attributes(config))]
pub fn derive_config(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

struct FieldSpec {
    ident: Ident,
    ty: Type,
    rename: Option<String>,
    comment: Option<String>,
    default: Option<String>,
    secret: bool,
    flatten: bool,
    leaf: bool,
}

#[derive(Default)]
struct ContainerSpec {
    custom_template: bool,
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let container = parse_container(&input)?;

    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Config can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Config can only be derived for structs",
            ));
        }
    };

    let mut fields = Vec::new();
    for field in named {
        if let Some(spec) = parse_field(field)? {
            fields.push(spec);
        }
    }

    let shape_entries = fields.iter().map(shape_entry);

    let mut shape_generics = input.generics.clone();
    for param in input.generics.type_params() {
        let ident = &param.ident;
        shape_generics
            .make_where_clause()
            .predicates
            .push(parse_quote!(#ident: ::yamlfig::Shape));
    }
    let (impl_generics, ty_generics, where_clause) = shape_generics.split_for_impl();

    let shape_impl = quote! {
        impl #impl_generics ::yamlfig::Shape for #name #ty_generics #where_clause {
            fn shape() -> ::yamlfig::ShapeNode {
                ::yamlfig::ShapeNode::structure::<Self>(::std::vec![
                    #( #shape_entries ),*
                ])
            }
        }
    };

    if container.custom_template {
        return Ok(shape_impl);
    }

    let mut template_generics = input.generics.clone();
    for param in input.generics.type_params() {
        let ident = &param.ident;
        template_generics
            .make_where_clause()
            .predicates
            .push(parse_quote!(#ident: ::yamlfig::Template));
    }
    let (impl_generics, ty_generics, where_clause) = template_generics.split_for_impl();

    let calls = fields.iter().enumerate().map(|(i, f)| {
        let ident = &f.ident;
        if f.flatten {
            quote! { t.flatten(&self.#ident)?; }
        } else if f.leaf {
            quote! { t.opaque_field(&fields[#i], &self.#ident)?; }
        } else {
            quote! { t.field(&fields[#i], &self.#ident)?; }
        }
    });

    let template_impl = quote! {
        impl #impl_generics ::yamlfig::Template for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn template_to(
                &self,
                t: &mut ::yamlfig::Templater<'_>,
            ) -> ::core::result::Result<(), ::yamlfig::YamlfigError> {
                let shape = <Self as ::yamlfig::Shape>::shape();
                let fields = shape.struct_fields();
                t.structure(|t| {
                    #( #calls )*
                    ::core::result::Result::Ok(())
                })
            }
        }
    };

    Ok(quote! {
        #shape_impl
        #template_impl
    })
}

fn shape_entry(f: &FieldSpec) -> TokenStream2 {
    let name = f.ident.to_string();
    let ty = &f.ty;
    let node = if f.leaf {
        quote! { ::yamlfig::ShapeNode::opaque::<#ty>() }
    } else {
        quote! { <#ty as ::yamlfig::Shape>::shape() }
    };

    let mut entry = quote! { ::yamlfig::FieldShape::new(#name, #node) };
    if let Some(rename) = &f.rename {
        entry = quote! { #entry.rename(#rename) };
    }
    if let Some(comment) = &f.comment {
        entry = quote! { #entry.comment(#comment) };
    }
    if let Some(default) = &f.default {
        entry = quote! { #entry.default_value(#default) };
    }
    if f.secret {
        entry = quote! { #entry.secret() };
    }
    if f.flatten {
        entry = quote! { #entry.flatten() };
    }
    entry
}

fn parse_container(input: &DeriveInput) -> syn::Result<ContainerSpec> {
    let mut spec = ContainerSpec::default();
    for attr in &input.attrs {
        if attr.path().is_ident("config") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("custom_template") {
                    spec.custom_template = true;
                    Ok(())
                } else {
                    Err(meta.error("unknown config container attribute"))
                }
            })?;
        } else if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") {
                    return Err(meta.error(
                        "serde(rename_all) is not supported by Config, rename fields individually",
                    ));
                }
                skip_meta(meta)
            })?;
        }
    }
    Ok(spec)
}

fn parse_field(field: &syn::Field) -> syn::Result<Option<FieldSpec>> {
    let Some(ident) = field.ident.clone() else {
        return Err(syn::Error::new_spanned(field, "expected a named field"));
    };

    let mut spec = FieldSpec {
        ident,
        ty: field.ty.clone(),
        rename: None,
        comment: None,
        default: None,
        secret: false,
        flatten: false,
        leaf: false,
    };
    let mut doc_lines = Vec::new();
    let mut skipped = false;

    for attr in &field.attrs {
        if attr.path().is_ident("doc") {
            if let syn::Meta::NameValue(nv) = &attr.meta
                && let Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) = &nv.value
            {
                doc_lines.push(s.value().trim().to_string());
            }
        } else if attr.path().is_ident("config") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("default") {
                    spec.default = Some(literal_string(&meta.value()?.parse()?)?);
                } else if meta.path.is_ident("comment") {
                    let s: LitStr = meta.value()?.parse()?;
                    spec.comment = Some(s.value());
                } else if meta.path.is_ident("secret") {
                    spec.secret = true;
                } else if meta.path.is_ident("leaf") {
                    spec.leaf = true;
                } else {
                    return Err(meta.error("unknown config field attribute"));
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    if meta.input.peek(syn::Token![=]) {
                        let s: LitStr = meta.value()?.parse()?;
                        spec.rename = Some(s.value());
                    } else {
                        meta.parse_nested_meta(|inner| {
                            if inner.path.is_ident("deserialize") {
                                let s: LitStr = inner.value()?.parse()?;
                                spec.rename = Some(s.value());
                                Ok(())
                            } else {
                                skip_meta(inner)
                            }
                        })?;
                    }
                    Ok(())
                } else if meta.path.is_ident("flatten") {
                    spec.flatten = true;
                    Ok(())
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_deserializing") {
                    skipped = true;
                    Ok(())
                } else {
                    skip_meta(meta)
                }
            })?;
        }
    }

    if skipped {
        return Ok(None);
    }
    if spec.comment.is_none() {
        let doc = doc_lines
            .iter()
            .filter(|l| !l.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        if !doc.is_empty() {
            spec.comment = Some(doc);
        }
    }
    Ok(Some(spec))
}

/// Consume an attribute argument we do not interpret.
fn skip_meta(meta: ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(syn::Token![=]) {
        let _: Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(skip_meta)?;
    }
    Ok(())
}

/// Render a default literal the way it should appear in a template.
fn literal_string(expr: &Expr) -> syn::Result<String> {
    match expr {
        Expr::Lit(ExprLit { lit, .. }) => lit_string(lit),
        Expr::Unary(ExprUnary {
            op: UnOp::Neg(_),
            expr,
            ..
        }) => match expr.as_ref() {
            Expr::Lit(ExprLit { lit, .. }) => Ok(format!("-{}", lit_string(lit)?)),
            other => Err(syn::Error::new_spanned(other, "expected a literal")),
        },
        other => Err(syn::Error::new_spanned(other, "expected a literal")),
    }
}

fn lit_string(lit: &Lit) -> syn::Result<String> {
    match lit {
        Lit::Str(s) => Ok(s.value()),
        Lit::Int(i) => Ok(i.base10_digits().to_string()),
        Lit::Float(f) => Ok(f.base10_digits().to_string()),
        Lit::Bool(b) => Ok(b.value.to_string()),
        Lit::Char(c) => Ok(c.value().to_string()),
        other => Err(syn::Error::new_spanned(other, "unsupported default literal")),
    }
}
