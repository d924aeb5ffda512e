//! Struct binding: turning records into template variables.
//!
//! A type becomes bindable by implementing [`TemplateFields`], usually
//! through `#[derive(TemplateFields)]` from `docweave-macros`. Binding a
//! record writes each field as a top-level variable. A field whose value is
//! a map (a nested record) is bound under its own name *and* flattened one
//! level, so `{{customer.name}}` and `{{name}}` both resolve.
//!
//! Flattening can make names collide, e.g. two nested records that both have
//! a `name` field. Fields are applied in declaration order and the last one
//! applied wins; every overwrite is logged at debug level.

use std::collections::HashMap;

use docweave_core::{DocweaveError, DocweaveResult};
use serde::Serialize;

use crate::data::TemplateData;
use crate::value::Value;

/// Converts a value into a template [`Value`].
pub trait ToValue {
    /// Returns the template value.
    fn to_value(&self) -> Value;
}

/// A record whose fields can be bound as template variables.
///
/// # Examples
///
/// ```
/// use docweave_template::binding::TemplateFields;
/// use docweave_template::data::TemplateData;
/// use docweave_template::value::Value;
///
/// struct Letter {
///     recipient: String,
///     pages: u32,
/// }
///
/// impl TemplateFields for Letter {
///     fn template_fields(&self) -> Vec<(String, Value)> {
///         vec![
///             ("recipient".into(), Value::from(self.recipient.as_str())),
///             ("pages".into(), Value::from(self.pages)),
///         ]
///     }
/// }
///
/// let data = TemplateData::from_struct(&Letter { recipient: "Ada".into(), pages: 2 });
/// assert_eq!(data.variable("pages"), Some(&Value::from(2)));
/// ```
pub trait TemplateFields {
    /// The record's fields as `(name, value)` pairs, in declaration order.
    fn template_fields(&self) -> Vec<(String, Value)>;
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::from(self)
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::from(self.as_str())
    }
}

macro_rules! impl_to_value_copy {
    ($($t:ty),*) => {
        $(
            impl ToValue for $t {
                fn to_value(&self) -> Value {
                    Value::from(*self)
                }
            }
        )*
    };
}

impl_to_value_copy!(i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64, bool);

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue, S> ToValue for HashMap<String, T, S> {
    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.clone(), v.to_value())).collect())
    }
}

/// Writes `fields` into `data.variables`, flattening map values one level.
pub(crate) fn bind_fields(data: &mut TemplateData, fields: Vec<(String, Value)>) {
    for (name, value) in fields {
        if let Value::Map(map) = &value {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, nested) in entries {
                set_logged(data, key.clone(), nested.clone(), &name);
            }
        }
        set_logged(data, name.clone(), value, &name);
    }
}

fn set_logged(data: &mut TemplateData, key: String, value: Value, origin: &str) {
    if data.variable(&key).is_some() {
        tracing::debug!(variable = %key, origin = %origin, "struct binding overwrote an earlier field");
    }
    data.set_variable(key, value);
}

/// Serializes `record` and returns its top-level fields.
pub(crate) fn serialize_fields<T: Serialize + ?Sized>(
    record: &T,
) -> DocweaveResult<Vec<(String, Value)>> {
    let json = serde_json::to_value(record).map_err(|e| {
        DocweaveError::Configuration(format!("Failed to serialize template data: {e}"))
    })?;
    match json {
        serde_json::Value::Object(map) => Ok(map
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect()),
        other => Err(DocweaveError::Configuration(format!(
            "Template data must serialize to an object, got {}",
            json_kind(&other)
        ))),
    }
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Address {
        city: String,
        name: String,
    }

    impl TemplateFields for Address {
        fn template_fields(&self) -> Vec<(String, Value)> {
            vec![
                ("city".into(), self.city.to_value()),
                ("name".into(), self.name.to_value()),
            ]
        }
    }

    impl ToValue for Address {
        fn to_value(&self) -> Value {
            Value::Map(self.template_fields().into_iter().collect())
        }
    }

    struct Order {
        name: String,
        total: f64,
        shipping: Address,
        tags: Vec<&'static str>,
        note: Option<String>,
    }

    impl TemplateFields for Order {
        fn template_fields(&self) -> Vec<(String, Value)> {
            vec![
                ("name".into(), self.name.to_value()),
                ("total".into(), self.total.to_value()),
                ("shipping".into(), self.shipping.to_value()),
                ("tags".into(), self.tags.to_value()),
                ("note".into(), self.note.to_value()),
            ]
        }
    }

    fn order() -> Order {
        Order {
            name: "Order 7".into(),
            total: 12.5,
            shipping: Address {
                city: "Oslo".into(),
                name: "Warehouse".into(),
            },
            tags: vec!["a", "b"],
            note: None,
        }
    }

    #[test]
    fn test_top_level_fields() {
        let data = TemplateData::from_struct(&order());
        assert_eq!(data.variable("total"), Some(&Value::Float(12.5)));
        assert_eq!(data.variable("note"), Some(&Value::Null));
        assert_eq!(
            data.variable("tags"),
            Some(&Value::from(vec!["a", "b"]))
        );
    }

    #[test]
    fn test_nested_record_bound_and_flattened() {
        let data = TemplateData::from_struct(&order());
        assert_eq!(data.variable("city"), Some(&Value::from("Oslo")));
        assert_eq!(
            data.variable("shipping").and_then(|v| v.lookup("city")),
            Some(&Value::from("Oslo"))
        );
    }

    #[test]
    fn test_collision_last_applied_wins() {
        // `shipping` is declared after `name`, so its flattened `name` wins.
        let data = TemplateData::from_struct(&order());
        assert_eq!(data.variable("name"), Some(&Value::from("Warehouse")));
    }

    #[test]
    fn test_bind_struct_on_existing_data() {
        let mut data = TemplateData::new();
        data.set_variable("total", 0).set_variable("kept", true);
        data.bind_struct(&order());
        assert_eq!(data.variable("total"), Some(&Value::Float(12.5)));
        assert_eq!(data.variable("kept"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_serialize_fields_rejects_scalars() {
        let err = serialize_fields(&5).unwrap_err();
        assert!(err.to_string().contains("a number"));
    }
}
