//! # docweave-template
//!
//! Template engine for styled documents. A template is an ordinary document
//! (paragraphs of formatted runs, tables of cells) whose text contains
//! `{{...}}` directives. Rendering substitutes data into a copy of the
//! document while keeping the formatting of the runs the directives were
//! written in.
//!
//! ## Directives
//!
//! | Directive | Meaning |
//! |-----------|---------|
//! | `{{name}}` | Variable, dotted paths allowed |
//! | `{{#if name}}…{{else}}…{{/if}}` | Conditional |
//! | `{{#each list}}…{{/each}}` | Loop; `{{this}}`, `{{@index}}`, `{{@number}}`, `{{@first}}`, `{{@last}}` |
//! | `{{#block "id"}}…{{/block}}` | Named block, overridable by child templates |
//! | `{{extends "parent"}}` | Inherit from `parent` |
//! | `{{#image name}}` | Image placeholder |
//!
//! A table row that starts with `{{#each list}}` in its first cell and ends
//! with `{{/each}}` in its last cell is repeated once per list entry.
//!
//! ## Modules
//!
//! - [`document`] - The styled document model templates are read from and rendered into
//! - [`value`] - Dynamic values bound to names
//! - [`data`] - [`TemplateData`](data::TemplateData), the data a render consumes
//! - [`binding`] - Struct binding traits
//! - [`lexer`] / [`parser`] - Directive recognition and the block tree
//! - [`inheritance`] - `extends` / named block resolution
//! - [`context`] - Scoped name resolution
//! - [`renderer`] - Block tree to document
//! - [`image`] / [`loaders`] - Image embedding and the image loading seam
//! - [`analysis`] - Which names a template consumes
//! - [`engine`] - The template registry and entry point

pub mod analysis;
pub mod binding;
pub mod context;
pub mod data;
pub mod document;
pub mod engine;
pub mod image;
pub mod inheritance;
pub mod lexer;
pub mod loaders;
pub mod parser;
pub mod renderer;
pub mod value;

pub use binding::{TemplateFields, ToValue};
pub use data::{ImageConfig, ImageSize, TemplateData};
pub use document::Document;
pub use engine::Engine;
pub use value::Value;
