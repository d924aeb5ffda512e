//! Core error types for docweave.
//!
//! [`DocweaveError`] covers every failure the template engine can report:
//! malformed directives, missing or cyclic templates, strict-mode variable
//! misses, unreadable images, and the render-level wrapper that attaches a
//! template name and location to any of those.

use std::fmt;

use thiserror::Error;

/// An approximate location inside a template's styled tree.
///
/// `paragraph` counts paragraphs in document order (table cells included),
/// starting at zero. `offset` is the byte offset inside the concatenated text
/// of that paragraph's runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
    /// Paragraph ordinal in document order.
    pub paragraph: usize,
    /// Byte offset within the paragraph text.
    pub offset: usize,
}

impl Position {
    /// Creates a new position.
    pub const fn new(paragraph: usize, offset: usize) -> Self {
        Self { paragraph, offset }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "paragraph {}, offset {}", self.paragraph, self.offset)
    }
}

/// The specific way a template failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// An opening directive was never closed.
    UnclosedDirective(String),
    /// A closing directive had no open directive to close.
    UnmatchedCloser(String),
    /// A closing directive did not match the innermost open directive.
    MismatchedCloser {
        /// The closer the innermost open directive needs.
        expected: String,
        /// The closer that was found.
        found: String,
    },
    /// `{{else}}` appeared outside an `{{#if}}`.
    UnexpectedElse,
    /// A second `{{else}}` appeared in the same `{{#if}}`.
    DuplicateElse,
    /// A directive that is not part of the grammar (strict mode only).
    UnknownDirective(String),
    /// A known directive with missing or invalid arguments.
    MalformedDirective(String),
    /// `{{extends}}` that is not the first directive (strict mode only).
    MisplacedExtends(String),
    /// Directives nested deeper than the configured limit.
    NestingTooDeep {
        /// The configured limit.
        limit: usize,
    },
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnclosedDirective(d) => write!(f, "unclosed directive '{d}'"),
            Self::UnmatchedCloser(d) => write!(f, "closing directive '{d}' has no opening directive"),
            Self::MismatchedCloser { expected, found } => {
                write!(f, "expected '{expected}' but found '{found}'")
            }
            Self::UnexpectedElse => write!(f, "'{{{{else}}}}' outside of '{{{{#if}}}}'"),
            Self::DuplicateElse => write!(f, "more than one '{{{{else}}}}' in the same '{{{{#if}}}}'"),
            Self::UnknownDirective(d) => write!(f, "unknown directive '{d}'"),
            Self::MalformedDirective(d) => write!(f, "malformed directive '{d}'"),
            Self::MisplacedExtends(name) => {
                write!(f, "'extends \"{name}\"' must be the first directive of a template")
            }
            Self::NestingTooDeep { limit } => {
                write!(f, "directives nested deeper than the limit of {limit}")
            }
        }
    }
}

/// A template source could not be turned into a block tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} at {position}")]
pub struct ParseError {
    /// Name of the template being parsed; empty until the engine attaches it.
    pub template: String,
    /// What went wrong.
    pub kind: ParseErrorKind,
    /// Approximately where it went wrong.
    pub position: Position,
}

impl ParseError {
    /// Creates a parse error without a template name.
    pub const fn new(kind: ParseErrorKind, position: Position) -> Self {
        Self {
            template: String::new(),
            kind,
            position,
        }
    }

    /// Attaches the template name.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }
}

/// The primary error type for docweave.
#[derive(Error, Debug)]
pub enum DocweaveError {
    // ── Loading ──────────────────────────────────────────────────────

    /// Unmatched or malformed directive.
    #[error("Template parse error in '{}': {}", .0.template, .0)]
    Parse(#[from] ParseError),

    /// A render or `extends` referenced a template that is not registered.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// `extends` chains loop back on themselves.
    #[error("Template inheritance cycle: {}", .0.join(" -> "))]
    InheritanceCycle(Vec<String>),

    // ── Rendering ────────────────────────────────────────────────────

    /// A variable could not be resolved (strict mode only).
    #[error("Variable could not be resolved: {0}")]
    VariableResolution(String),

    /// An image source could not be read or decoded.
    #[error("Image '{name}' could not be loaded: {reason}")]
    ImageLoad {
        /// The image placeholder name.
        name: String,
        /// Why loading failed.
        reason: String,
    },

    /// Any of the above, raised while rendering a particular template.
    #[error("Render error in template '{}'{}: {}", .template, location_suffix(.location), .source)]
    Render {
        /// The template being rendered.
        template: String,
        /// Where in the template the failure happened, if known.
        location: Option<Position>,
        /// The underlying failure.
        source: Box<DocweaveError>,
    },

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn location_suffix(location: &Option<Position>) -> String {
    location.map_or_else(String::new, |p| format!(" at {p}"))
}

impl DocweaveError {
    /// Returns a short, stable code naming the error category.
    ///
    /// `Render` reports the code of the error it wraps.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse_error",
            Self::TemplateNotFound(_) | Self::InheritanceCycle(_) => "template_not_found",
            Self::VariableResolution(_) => "variable_resolution",
            Self::ImageLoad { .. } => "image_load",
            Self::Render { source, .. } => source.code(),
            Self::Configuration(_) => "configuration",
            Self::Io(_) => "io",
        }
    }

    /// Returns `true` for missing templates and inheritance cycles, at any
    /// depth of `Render` wrapping.
    pub fn is_template_not_found(&self) -> bool {
        self.code() == "template_not_found"
    }

    /// Strips `Render` wrappers and returns the underlying error.
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Render { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Wraps this error with the template name and location it was raised
    /// in. An error that is already wrapped is returned unchanged so the
    /// innermost (most precise) context wins.
    #[must_use]
    pub fn in_template(self, template: &str, location: Option<Position>) -> Self {
        match self {
            Self::Render { .. } => self,
            other => Self::Render {
                template: template.to_string(),
                location,
                source: Box::new(other),
            },
        }
    }
}

/// A convenience type alias for `Result<T, DocweaveError>`.
pub type DocweaveResult<T> = Result<T, DocweaveError>;
