//! Settings for docweave.
//!
//! [`Settings`] holds the process-level knobs (debug mode, log level) and the
//! [`TemplateSettings`] consumed by the template engine. Every field has a
//! default so partial configuration files are enough.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Template engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    /// Fail on unknown directives, misplaced `extends` and unresolved
    /// variables instead of degrading gracefully.
    pub strict: bool,
    /// Maximum depth of nested `if`/`each`/`block` directives.
    pub max_nesting_depth: usize,
    /// Text emitted in place of an `{{#image}}` placeholder whose image is
    /// not bound. `{name}` is replaced by the placeholder name.
    pub image_not_found_marker: String,
    /// Directories searched for relative template file paths.
    pub dirs: Vec<PathBuf>,
    /// Merge adjacent runs with identical style in paragraphs that
    /// contained directives.
    pub coalesce_runs: bool,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            strict: false,
            max_nesting_depth: 64,
            image_not_found_marker: "[IMAGE_NOT_FOUND:{name}]".to_string(),
            dirs: Vec::new(),
            coalesce_runs: true,
        }
    }
}

impl TemplateSettings {
    /// Formats the fallback marker for a missing image.
    pub fn missing_image_marker(&self, name: &str) -> String {
        self.image_not_found_marker.replace("{name}", name)
    }
}

/// The complete set of docweave settings.
///
/// # Examples
///
/// ```
/// use docweave_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(!settings.debug);
/// assert_eq!(settings.template.max_nesting_depth, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,
    /// The log level filter (e.g. "info", "docweave_template=debug").
    pub log_level: String,
    /// Template engine configuration.
    pub template: TemplateSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".to_string(),
            template: TemplateSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert!(!s.debug);
        assert_eq!(s.log_level, "info");
        assert!(!s.template.strict);
        assert_eq!(s.template.max_nesting_depth, 64);
        assert!(s.template.dirs.is_empty());
        assert!(s.template.coalesce_runs);
    }

    #[test]
    fn test_missing_image_marker() {
        let t = TemplateSettings::default();
        assert_eq!(t.missing_image_marker("logo"), "[IMAGE_NOT_FOUND:logo]");

        let custom = TemplateSettings {
            image_not_found_marker: "<missing {name}>".into(),
            ..TemplateSettings::default()
        };
        assert_eq!(custom.missing_image_marker("logo"), "<missing logo>");
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let s: Settings = serde_json::from_str(r#"{"template": {"strict": true}}"#).unwrap();
        assert!(s.template.strict);
        assert_eq!(s.template.max_nesting_depth, 64);
        assert_eq!(s.log_level, "info");
    }
}
