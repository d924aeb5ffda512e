//! `#[derive(TemplateFields)]` implementation.
//!
//! Generates impls of `TemplateFields` (the record's fields as
//! `(name, value)` pairs in declaration order) and `ToValue` (the record as a
//! map, so it can be nested inside other records and lists).

use darling::{FromDeriveInput, FromField};
use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

/// Struct-level attributes from `#[template(...)]`.
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(template), supports(struct_named))]
pub struct TemplateOpts {
    pub ident: syn::Ident,
    pub generics: syn::Generics,
    pub data: darling::ast::Data<(), TemplateFieldOpts>,

    /// Path to the runtime crate, for callers that re-export it.
    #[darling(default, rename = "crate")]
    pub krate: Option<syn::Path>,
}

/// Per-field attributes from `#[template(...)]`.
#[derive(Debug, FromField)]
#[darling(attributes(template))]
pub struct TemplateFieldOpts {
    pub ident: Option<syn::Ident>,

    /// Bind the field under this name instead of the field name.
    #[darling(default)]
    pub rename: Option<String>,

    /// Leave the field out.
    #[darling(default)]
    pub skip: bool,
}

/// Generates the `TemplateFields` and `ToValue` impls for the struct.
pub fn derive_template_fields_impl(input: &DeriveInput) -> TokenStream {
    let opts = match TemplateOpts::from_derive_input(input) {
        Ok(o) => o,
        Err(e) => return e.write_errors(),
    };

    let Some(fields) = opts.data.as_ref().take_struct() else {
        return syn::Error::new_spanned(input, "#[derive(TemplateFields)] only supports named structs")
            .to_compile_error();
    };

    let krate = opts
        .krate
        .clone()
        .unwrap_or_else(|| syn::parse_quote!(::docweave_template));

    let entries: Vec<TokenStream> = fields
        .fields
        .iter()
        .filter(|f| !f.skip)
        .filter_map(|f| {
            let ident = f.ident.as_ref()?;
            let name = f.rename.clone().unwrap_or_else(|| unraw(ident));
            Some(quote! {
                (
                    ::std::string::String::from(#name),
                    #krate::binding::ToValue::to_value(&self.#ident),
                )
            })
        })
        .collect();

    let struct_name = &opts.ident;
    let (impl_generics, ty_generics, where_clause) = opts.generics.split_for_impl();

    quote! {
        impl #impl_generics #krate::binding::TemplateFields for #struct_name #ty_generics #where_clause {
            fn template_fields(&self) -> ::std::vec::Vec<(::std::string::String, #krate::value::Value)> {
                ::std::vec![
                    #(#entries),*
                ]
            }
        }

        impl #impl_generics #krate::binding::ToValue for #struct_name #ty_generics #where_clause {
            fn to_value(&self) -> #krate::value::Value {
                #krate::value::Value::Map(
                    #krate::binding::TemplateFields::template_fields(self)
                        .into_iter()
                        .collect(),
                )
            }
        }
    }
}

/// The field name without a raw-identifier prefix (`r#type` -> `type`).
fn unraw(ident: &syn::Ident) -> String {
    let name = ident.to_string();
    name.strip_prefix("r#").map_or_else(|| name.clone(), str::to_string)
}
