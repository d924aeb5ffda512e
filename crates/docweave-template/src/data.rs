//! Data supplied to a render.
//!
//! [`TemplateData`] groups the four kinds of bindings a template can consume:
//! scalar variables, lists iterated by `{{#each}}`, boolean conditions read by
//! `{{#if}}`, and images substituted for `{{#image}}` placeholders.

use std::collections::HashMap;
use std::path::PathBuf;

use docweave_core::DocweaveResult;
use serde::{Deserialize, Serialize};

use crate::binding::{self, TemplateFields};
use crate::document::{Alignment, ImagePosition, ImageWrap};
use crate::value::Value;

/// Requested display size of an image, in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSize {
    /// Width in millimetres; `0.0` means "derive".
    pub width_mm: f64,
    /// Height in millimetres; `0.0` means "derive".
    pub height_mm: f64,
    /// When only one dimension is given, derive the other from the image's
    /// aspect ratio.
    pub keep_aspect_ratio: bool,
}

/// Placement of a bound image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Display size; `None` derives it from the pixel size at 96 DPI.
    pub size: Option<ImageSize>,
    pub position: ImagePosition,
    pub alignment: Option<Alignment>,
    pub wrap: ImageWrap,
    /// Horizontal offset of a floating image in millimetres.
    pub offset_x_mm: f64,
    /// Vertical offset of a floating image in millimetres.
    pub offset_y_mm: f64,
}

impl ImageConfig {
    /// An inline image of the given width; the height follows the aspect
    /// ratio.
    pub fn with_width(width_mm: f64) -> Self {
        Self {
            size: Some(ImageSize {
                width_mm,
                height_mm: 0.0,
                keep_aspect_ratio: true,
            }),
            ..Self::default()
        }
    }
}

/// Where an image's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// A file read through the engine's image loader at render time.
    Path(PathBuf),
    /// Encoded bytes supplied directly.
    Data(Vec<u8>),
}

/// An image bound to a placeholder name.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateImage {
    pub source: ImageSource,
    pub config: ImageConfig,
    pub alt_text: Option<String>,
    pub title: Option<String>,
}

/// The data a template is rendered against.
///
/// # Examples
///
/// ```
/// use docweave_template::data::TemplateData;
/// use docweave_template::value::Value;
///
/// let mut data = TemplateData::new();
/// data.set_variable("name", "World");
/// data.set_condition("vip", true);
/// data.set_list("items", vec![Value::from("a"), Value::from("b")]);
///
/// assert_eq!(data.variable("name"), Some(&Value::from("World")));
/// assert_eq!(data.condition("vip"), Some(true));
/// assert_eq!(data.list("items").map(<[Value]>::len), Some(2));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateData {
    variables: HashMap<String, Value>,
    lists: HashMap<String, Vec<Value>>,
    conditions: HashMap<String, bool>,
    images: HashMap<String, TemplateImage>,
}

impl TemplateData {
    /// Creates empty template data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds template data from a type implementing [`TemplateFields`].
    ///
    /// See [`binding`](crate::binding) for the flattening rules.
    pub fn from_struct<T: TemplateFields + ?Sized>(record: &T) -> Self {
        let mut data = Self::new();
        data.bind_struct(record);
        data
    }

    /// Builds template data from any serializable record.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the value does not serialize to a
    /// JSON object.
    pub fn from_serialize<T: Serialize + ?Sized>(record: &T) -> DocweaveResult<Self> {
        let mut data = Self::new();
        binding::bind_fields(&mut data, binding::serialize_fields(record)?);
        Ok(data)
    }

    /// Binds the fields of `record` into this data, on top of what is
    /// already bound.
    pub fn bind_struct<T: TemplateFields + ?Sized>(&mut self, record: &T) -> &mut Self {
        binding::bind_fields(self, record.template_fields());
        self
    }

    // ── Setters ──────────────────────────────────────────────────────

    /// Binds a scalar (or any) value to a variable name.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Binds several variables at once.
    pub fn set_variables<I, K, V>(&mut self, variables: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (k, v) in variables {
            self.variables.insert(k.into(), v.into());
        }
        self
    }

    /// Binds a list for `{{#each}}`. Entries are maps (fields are exposed
    /// inside the loop) or scalars (exposed as `this`).
    pub fn set_list<I, V>(&mut self, name: impl Into<String>, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.lists
            .insert(name.into(), entries.into_iter().map(Into::into).collect());
        self
    }

    /// Binds a boolean condition for `{{#if}}`.
    pub fn set_condition(&mut self, name: impl Into<String>, value: bool) -> &mut Self {
        self.conditions.insert(name.into(), value);
        self
    }

    /// Binds an image file to a placeholder name.
    pub fn set_image(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        config: ImageConfig,
    ) -> &mut Self {
        self.insert_image(name, ImageSource::Path(path.into()), config, None, None)
    }

    /// Binds encoded image bytes to a placeholder name.
    pub fn set_image_from_data(
        &mut self,
        name: impl Into<String>,
        bytes: Vec<u8>,
        config: ImageConfig,
    ) -> &mut Self {
        self.insert_image(name, ImageSource::Data(bytes), config, None, None)
    }

    /// Binds an image with alternative text and a title.
    pub fn set_image_with_details(
        &mut self,
        name: impl Into<String>,
        source: ImageSource,
        config: ImageConfig,
        alt_text: impl Into<String>,
        title: impl Into<String>,
    ) -> &mut Self {
        self.insert_image(
            name,
            source,
            config,
            Some(alt_text.into()),
            Some(title.into()),
        )
    }

    fn insert_image(
        &mut self,
        name: impl Into<String>,
        source: ImageSource,
        config: ImageConfig,
        alt_text: Option<String>,
        title: Option<String>,
    ) -> &mut Self {
        self.images.insert(
            name.into(),
            TemplateImage {
                source,
                config,
                alt_text,
                title,
            },
        );
        self
    }

    // ── Getters ──────────────────────────────────────────────────────

    /// The value bound to a variable name.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// The entries of a list.
    pub fn list(&self, name: &str) -> Option<&[Value]> {
        self.lists.get(name).map(Vec::as_slice)
    }

    /// The value of a condition.
    pub fn condition(&self, name: &str) -> Option<bool> {
        self.conditions.get(name).copied()
    }

    /// The image bound to a placeholder name.
    pub fn image(&self, name: &str) -> Option<&TemplateImage> {
        self.images.get(name)
    }

    /// All variables.
    pub const fn variables(&self) -> &HashMap<String, Value> {
        &self.variables
    }

    /// All lists.
    pub const fn lists(&self) -> &HashMap<String, Vec<Value>> {
        &self.lists
    }

    /// All conditions.
    pub const fn conditions(&self) -> &HashMap<String, bool> {
        &self.conditions
    }

    /// All images.
    pub const fn images(&self) -> &HashMap<String, TemplateImage> {
        &self.images
    }

    /// Returns `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
            && self.lists.is_empty()
            && self.conditions.is_empty()
            && self.images.is_empty()
    }

    // ── Bulk operations ──────────────────────────────────────────────

    /// Copies every binding of `other` into this data. Bindings of `other`
    /// win on name conflicts. Nested lists and maps are copied, never
    /// shared, so `other` can be reused and mutated afterwards.
    pub fn merge(&mut self, other: &Self) -> &mut Self {
        self.variables
            .extend(other.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.lists
            .extend(other.lists.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.conditions
            .extend(other.conditions.iter().map(|(k, v)| (k.clone(), *v)));
        self.images
            .extend(other.images.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Removes every binding.
    pub fn clear(&mut self) {
        self.variables.clear();
        self.lists.clear();
        self.conditions.clear();
        self.images.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_and_getters() {
        let mut data = TemplateData::new();
        data.set_variable("title", "Report")
            .set_variable("count", 3)
            .set_condition("draft", false)
            .set_list("tags", vec!["a", "b"]);

        assert_eq!(data.variable("title"), Some(&Value::from("Report")));
        assert_eq!(data.variable("count"), Some(&Value::Integer(3)));
        assert_eq!(data.condition("draft"), Some(false));
        assert_eq!(data.list("tags").unwrap()[1], Value::from("b"));
        assert_eq!(data.variable("missing"), None);
        assert!(!data.is_empty());
    }

    #[test]
    fn test_set_variables() {
        let mut data = TemplateData::new();
        data.set_variables([("a", 1), ("b", 2)]);
        assert_eq!(data.variables().len(), 2);
    }

    #[test]
    fn test_merge_other_wins() {
        let mut base = TemplateData::new();
        base.set_variable("company", "Acme").set_variable("year", 2023);

        let mut other = TemplateData::new();
        other.set_variable("year", 2024).set_condition("paid", true);

        base.merge(&other);
        assert_eq!(base.variable("company"), Some(&Value::from("Acme")));
        assert_eq!(base.variable("year"), Some(&Value::from(2024)));
        assert_eq!(base.condition("paid"), Some(true));
    }

    #[test]
    fn test_merge_deep_copies() {
        let mut common = TemplateData::new();
        common.set_list("items", vec![Value::from(serde_json::json!({"name": "A"}))]);

        let mut target = TemplateData::new();
        target.merge(&common);

        // Mutating the source afterwards must not leak into the merged copy.
        common.set_list("items", Vec::<Value>::new());
        common.set_variable("late", true);

        assert_eq!(target.list("items").unwrap().len(), 1);
        assert_eq!(target.variable("late"), None);
    }

    #[test]
    fn test_images() {
        let mut data = TemplateData::new();
        data.set_image("logo", "/tmp/logo.png", ImageConfig::with_width(40.0));
        data.set_image_from_data("sig", vec![1, 2, 3], ImageConfig::default());
        data.set_image_with_details(
            "chart",
            ImageSource::Path("chart.png".into()),
            ImageConfig::default(),
            "Sales chart",
            "Q1",
        );

        assert_eq!(
            data.image("logo").unwrap().source,
            ImageSource::Path("/tmp/logo.png".into())
        );
        assert_eq!(data.image("sig").unwrap().source, ImageSource::Data(vec![1, 2, 3]));
        assert_eq!(
            data.image("chart").unwrap().alt_text.as_deref(),
            Some("Sales chart")
        );
        assert_eq!(data.images().len(), 3);
    }

    #[test]
    fn test_clear() {
        let mut data = TemplateData::new();
        data.set_variable("a", 1).set_condition("b", true);
        data.clear();
        assert!(data.is_empty());
    }

    #[test]
    fn test_from_serialize() {
        #[derive(Serialize)]
        struct Invoice {
            number: u32,
            customer: Customer,
        }
        #[derive(Serialize)]
        struct Customer {
            name: String,
        }

        let data = TemplateData::from_serialize(&Invoice {
            number: 7,
            customer: Customer {
                name: "Ada".into(),
            },
        })
        .unwrap();

        assert_eq!(data.variable("number"), Some(&Value::from(7)));
        assert_eq!(data.variable("name"), Some(&Value::from("Ada")));
        assert!(data.variable("customer").unwrap().as_map().is_some());
    }

    #[test]
    fn test_from_serialize_rejects_non_object() {
        assert!(TemplateData::from_serialize(&[1, 2, 3]).is_err());
    }
}
