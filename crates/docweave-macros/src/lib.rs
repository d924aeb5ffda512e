//! # docweave-macros
//!
//! Procedural macros for docweave. Provides `#[derive(TemplateFields)]`,
//! which lets a plain struct be bound as template data.
//!
//! This crate is independent of all other docweave crates because proc-macro
//! crates cannot depend on crates that use them. The generated code refers to
//! `::docweave_template` unless `#[template(crate = "...")]` names another
//! path.

use proc_macro::TokenStream;
use syn::parse_macro_input;

mod template_fields;

/// Derives `TemplateFields` and `ToValue` for a struct with named fields.
///
/// Every field is bound under its name; its type must implement `ToValue`.
/// A field whose value is a map (another derived record, or a `HashMap`) is
/// also flattened one level when bound.
///
/// # Attributes
///
/// - `#[template(rename = "name")]` on a field binds it under `name`
/// - `#[template(skip)]` on a field leaves it out
/// - `#[template(crate = "path")]` on the struct sets the runtime crate path
///
/// # Example
///
/// ```ignore
/// use docweave_macros::TemplateFields;
///
/// #[derive(TemplateFields)]
/// struct Invoice {
///     #[template(rename = "invoice_no")]
///     number: u32,
///     customer: Customer,
///     #[template(skip)]
///     internal_note: String,
/// }
/// ```
#[proc_macro_derive(TemplateFields, attributes(template))]
pub fn derive_template_fields(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as syn::DeriveInput);
    template_fields::derive_template_fields_impl(&input).into()
}
