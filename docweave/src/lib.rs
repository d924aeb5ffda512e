//! # docweave
//!
//! Styled-document template engine.
//!
//! This is the meta-crate that re-exports all sub-crates for convenient access.
//! You can depend on `docweave` to get everything, or depend on individual
//! crates for finer-grained control.
//!
//! ```
//! use docweave::prelude::*;
//!
//! let mut engine = Engine::new();
//! engine.load_template("greeting", "Hello {{name}}!").unwrap();
//!
//! let mut data = TemplateData::new();
//! data.set_variable("name", "World");
//! assert_eq!(engine.render_to_string("greeting", &data).unwrap(), "Hello World!");
//! ```

/// Errors, settings and logging.
pub use docweave_core as core;

/// Document model, parser, inheritance resolver and renderer.
pub use docweave_template as template;

/// `#[derive(TemplateFields)]`.
///
/// The derive refers to `::docweave_template`; when depending on this crate
/// only, add `#[template(crate = "docweave::template")]` to the struct.
#[cfg(feature = "derive")]
pub use docweave_macros::TemplateFields;

/// Third-party crates re-exported for convenience.
pub use serde;
pub use serde_json;
pub use tracing;
pub use tracing_subscriber;

/// The most commonly used types.
pub mod prelude {
    pub use docweave_core::{DocweaveError, DocweaveResult, Settings, TemplateSettings};
    pub use docweave_template::binding::{TemplateFields, ToValue};
    pub use docweave_template::data::{ImageConfig, ImageSize, TemplateData};
    pub use docweave_template::document::{BodyElement, Document, Paragraph, Run, Table};
    pub use docweave_template::engine::Engine;
    pub use docweave_template::value::Value;
}
