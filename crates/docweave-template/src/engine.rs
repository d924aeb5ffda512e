//! Template engine: registering, parsing and rendering templates.
//!
//! The [`Engine`] struct is the central entry point. It owns the registry of
//! parsed templates, the render settings and the [`ImageLoader`] used for
//! path-bound images.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use docweave_core::logging::render_span;
use docweave_core::{DocweaveError, DocweaveResult, TemplateSettings};

use crate::analysis::{self, TemplateAnalysis};
use crate::context::Context;
use crate::data::TemplateData;
use crate::document::Document;
use crate::inheritance;
use crate::loaders::{FileSystemLoader, ImageLoader};
use crate::parser::{self, Template};
use crate::renderer;

/// The template engine.
///
/// Each engine is an independent registry: templates loaded into one engine
/// are invisible to another. Rendering only reads the engine, so an engine
/// can be shared behind an `Arc` (wrap it in a lock to load templates while
/// other threads render).
///
/// # Examples
///
/// ```
/// use docweave_template::data::TemplateData;
/// use docweave_template::engine::Engine;
///
/// let mut engine = Engine::new();
/// engine.load_template("hello", "Hello {{name}}!").unwrap();
///
/// let mut data = TemplateData::new();
/// data.set_variable("name", "World");
///
/// let result = engine.render_to_string("hello", &data).unwrap();
/// assert_eq!(result, "Hello World!");
/// ```
pub struct Engine {
    /// Parsed templates by name.
    templates: HashMap<String, Template>,
    settings: TemplateSettings,
    /// Reads path-bound images at render time.
    image_loader: Box<dyn ImageLoader>,
}

impl Engine {
    /// Creates a new engine with default settings.
    pub fn new() -> Self {
        Self::from_settings(&TemplateSettings::default())
    }

    /// Creates an engine from the given settings. Images bound by relative
    /// path are searched for in `settings.dirs`.
    pub fn from_settings(settings: &TemplateSettings) -> Self {
        Self {
            templates: HashMap::new(),
            settings: settings.clone(),
            image_loader: Box::new(FileSystemLoader::new(settings.dirs.clone())),
        }
    }

    /// The engine's settings.
    pub const fn settings(&self) -> &TemplateSettings {
        &self.settings
    }

    /// Sets strict mode. Applies to templates loaded and rendered afterwards.
    pub fn set_strict(&mut self, strict: bool) {
        self.settings.strict = strict;
    }

    /// Replaces the image loader.
    pub fn set_image_loader(&mut self, loader: Box<dyn ImageLoader>) {
        self.image_loader = loader;
    }

    // ── Loading ──────────────────────────────────────────────────────

    /// Parses a plain-text template (one paragraph per line) and registers
    /// it under `name`, replacing any template of the same name.
    ///
    /// # Errors
    ///
    /// Returns `Parse` for unbalanced or malformed directives. Nothing is
    /// registered in that case.
    pub fn load_template(&mut self, name: &str, source: &str) -> DocweaveResult<&Template> {
        let template = parser::parse_str(name, source, &self.settings)?;
        Ok(self.register(template))
    }

    /// Parses a styled document and registers it under `name`, replacing any
    /// template of the same name.
    ///
    /// # Errors
    ///
    /// Returns `Parse` for unbalanced or malformed directives.
    pub fn load_template_from_document(
        &mut self,
        name: &str,
        document: Document,
    ) -> DocweaveResult<&Template> {
        let template = parser::parse_document(name, document, &self.settings)?;
        Ok(self.register(template))
    }

    /// Reads a plain-text template from disk and registers it under `name`.
    ///
    /// Relative paths are searched for in the configured template
    /// directories first, then against the working directory.
    ///
    /// # Errors
    ///
    /// Returns `TemplateNotFound` if no file exists, `Io` if it cannot be
    /// read and `Parse` if it does not parse.
    pub fn load_template_file(
        &mut self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> DocweaveResult<&Template> {
        let path = path.as_ref();
        let found = self.find_file(path).ok_or_else(|| {
            DocweaveError::TemplateNotFound(format!(
                "'{}' not found in directories: {:?}",
                path.display(),
                self.settings.dirs
            ))
        })?;
        tracing::debug!(template = %name, path = %found.display(), "reading template file");
        let source = std::fs::read_to_string(&found)?;
        self.load_template(name, &source)
    }

    fn find_file(&self, path: &Path) -> Option<PathBuf> {
        if path.is_absolute() {
            return path.is_file().then(|| path.to_path_buf());
        }
        self.settings
            .dirs
            .iter()
            .map(|dir| dir.join(path))
            .chain(std::iter::once(path.to_path_buf()))
            .find(|candidate| candidate.is_file())
    }

    fn register(&mut self, template: Template) -> &Template {
        tracing::info!(
            template = %template.name,
            extends = ?template.extends,
            variables = template.variables.len(),
            "loaded template"
        );
        let name = template.name.clone();
        if self.templates.insert(name.clone(), template).is_some() {
            tracing::debug!(template = %name, "replaced existing template");
        }
        &self.templates[&name]
    }

    /// Checks that `source` parses, without registering anything.
    ///
    /// # Errors
    ///
    /// Returns the `Parse` error the source would fail to load with.
    pub fn validate_template(&self, source: &str) -> DocweaveResult<()> {
        parser::parse_str("<validate>", source, &self.settings)?;
        Ok(())
    }

    // ── Registry ─────────────────────────────────────────────────────

    /// The template registered under `name`.
    pub fn get_template(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// Returns `true` if a template is registered under `name`.
    pub fn has_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Unregisters and returns the template registered under `name`.
    pub fn remove_template(&mut self, name: &str) -> Option<Template> {
        self.templates.remove(name)
    }

    /// Unregisters every template.
    pub fn clear(&mut self) {
        self.templates.clear();
    }

    /// Names of all registered templates, sorted.
    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    // ── Rendering ────────────────────────────────────────────────────

    /// Renders the template registered under `name` into a new document.
    ///
    /// Neither the template nor `data` is modified; rendering twice with the
    /// same data yields equal documents.
    ///
    /// # Errors
    ///
    /// Returns `TemplateNotFound` if `name` (or an ancestor) is not
    /// registered, `InheritanceCycle` for a looping `extends` chain, and any
    /// strict-mode or image error wrapped in `Render` with the name of the
    /// template that holds the failing directive and its location there.
    pub fn render_to_document(&self, name: &str, data: &TemplateData) -> DocweaveResult<Document> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| DocweaveError::TemplateNotFound(name.to_string()))?;

        let span = render_span(name);
        let _guard = span.enter();

        let chain = inheritance::chain(template, |parent| self.templates.get(parent))
            .map_err(|e| e.in_template(name, None))?;
        // The skeleton belongs to the root ancestor, so its locations do too.
        let skeleton = chain.last().map_or(name, |root| root.name.as_str());
        let blocks = inheritance::resolve_chain(&chain);
        let mut ctx = Context::new(data).with_strict(self.settings.strict);
        let document = renderer::render(
            skeleton,
            &blocks,
            &mut ctx,
            &self.settings,
            self.image_loader.as_ref(),
        )?;

        tracing::debug!(elements = document.body.len(), "rendered template");
        Ok(document)
    }

    /// Renders the template registered under `name` and returns the plain
    /// text of the result.
    ///
    /// # Errors
    ///
    /// See [`Engine::render_to_document`].
    pub fn render_to_string(&self, name: &str, data: &TemplateData) -> DocweaveResult<String> {
        Ok(self.render_to_document(name, data)?.plain_text())
    }

    /// Lists the names the template registered under `name` consumes, with
    /// inheritance applied.
    ///
    /// # Errors
    ///
    /// Returns `TemplateNotFound` or `InheritanceCycle`.
    pub fn analyze(&self, name: &str) -> DocweaveResult<TemplateAnalysis> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| DocweaveError::TemplateNotFound(name.to_string()))?;
        let blocks = inheritance::resolve(template, |parent| self.templates.get(parent))?;
        Ok(analysis::analyze(name, &blocks))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
