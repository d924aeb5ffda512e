//! # docweave-core
//!
//! Foundation types shared by every docweave crate. This crate knows nothing
//! about documents or templates; it only defines how failures are reported,
//! how the engine is configured and how logging is wired up.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy and result alias
//! - [`settings`] - Engine configuration with defaults
//! - [`settings_loader`] - TOML/JSON/environment loading of [`Settings`]
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{DocweaveError, DocweaveResult, ParseError, ParseErrorKind, Position};
pub use settings::{Settings, TemplateSettings};
