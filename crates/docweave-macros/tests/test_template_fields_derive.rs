//! Integration tests for `#[derive(TemplateFields)]`.
//!
//! These tests verify that derived records bind the expected variables and
//! render through the engine.

use std::collections::HashMap;

use docweave_macros::TemplateFields;
use docweave_template::binding::{TemplateFields as _, ToValue};
use docweave_template::data::TemplateData;
use docweave_template::engine::Engine;
use docweave_template::value::Value;

// ── Basic record ────────────────────────────────────────────────────────

#[derive(TemplateFields)]
struct Customer {
    name: String,
    city: String,
}

#[derive(TemplateFields)]
struct Invoice {
    #[template(rename = "invoice_no")]
    number: u32,
    total: f64,
    paid: bool,
    customer: Customer,
    lines: Vec<Line>,
    note: Option<String>,
    #[template(skip)]
    #[allow(dead_code)]
    internal: String,
}

#[derive(TemplateFields)]
struct Line {
    sku: &'static str,
    qty: i64,
}

fn invoice() -> Invoice {
    Invoice {
        number: 42,
        total: 99.5,
        paid: false,
        customer: Customer {
            name: "Ada".into(),
            city: "London".into(),
        },
        lines: vec![Line { sku: "A-1", qty: 2 }, Line { sku: "B-2", qty: 1 }],
        note: None,
        internal: "do not bind".into(),
    }
}

#[test]
fn test_field_order_and_names() {
    let names: Vec<String> = invoice()
        .template_fields()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(
        names,
        vec!["invoice_no", "total", "paid", "customer", "lines", "note"]
    );
}

#[test]
fn test_skip_leaves_field_out() {
    let data = TemplateData::from_struct(&invoice());
    assert!(data.variable("internal").is_none());
}

#[test]
fn test_scalar_values() {
    let data = TemplateData::from_struct(&invoice());
    assert_eq!(data.variable("invoice_no"), Some(&Value::Integer(42)));
    assert_eq!(data.variable("total"), Some(&Value::Float(99.5)));
    assert_eq!(data.variable("paid"), Some(&Value::Bool(false)));
    assert_eq!(data.variable("note"), Some(&Value::Null));
}

#[test]
fn test_nested_record_flattened() {
    let data = TemplateData::from_struct(&invoice());
    assert_eq!(data.variable("city"), Some(&Value::from("London")));
    assert_eq!(
        data.variable("customer").and_then(|c| c.lookup("name")),
        Some(&Value::from("Ada"))
    );
}

#[test]
fn test_to_value_is_map() {
    let value = Customer {
        name: "Ada".into(),
        city: "London".into(),
    }
    .to_value();
    let map = value.as_map().unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["city"], Value::from("London"));
}

// ── Rendering ───────────────────────────────────────────────────────────

#[test]
fn test_render_derived_record() {
    let mut engine = Engine::new();
    engine
        .load_template(
            "invoice",
            "Invoice {{invoice_no}} for {{customer.name}} ({{city}})\n{{#each lines}}{{sku}} x{{qty}}; {{/each}}",
        )
        .unwrap();
    let text = engine
        .render_to_string("invoice", &TemplateData::from_struct(&invoice()))
        .unwrap();
    assert_eq!(text, "Invoice 42 for Ada (London)\nA-1 x2; B-2 x1; ");
}

// ── Collisions and maps ─────────────────────────────────────────────────

#[derive(TemplateFields)]
struct Shipment {
    name: String,
    origin: Customer,
    destination: Customer,
}

#[test]
fn test_flatten_collision_last_applied_wins() {
    let shipment = Shipment {
        name: "S1".into(),
        origin: Customer {
            name: "Depot".into(),
            city: "Leeds".into(),
        },
        destination: Customer {
            name: "Shop".into(),
            city: "York".into(),
        },
    };
    let data = TemplateData::from_struct(&shipment);
    assert_eq!(data.variable("name"), Some(&Value::from("Shop")));
    assert_eq!(data.variable("city"), Some(&Value::from("York")));
    assert_eq!(
        data.variable("origin").and_then(|o| o.lookup("city")),
        Some(&Value::from("Leeds"))
    );
}

#[derive(TemplateFields)]
struct Tagged {
    attributes: HashMap<String, i32>,
}

#[test]
fn test_hash_map_field_flattened() {
    let mut attributes = HashMap::new();
    attributes.insert("width".to_string(), 3);
    let data = TemplateData::from_struct(&Tagged { attributes });
    assert_eq!(data.variable("width"), Some(&Value::Integer(3)));
}

// ── Serde path ──────────────────────────────────────────────────────────

#[test]
fn test_from_serialize_matches_shape() {
    let data = TemplateData::from_serialize(&serde_json::json!({
        "invoice_no": 42,
        "customer": { "name": "Ada" },
    }))
    .unwrap();
    assert_eq!(data.variable("invoice_no"), Some(&Value::Integer(42)));
    assert_eq!(data.variable("name"), Some(&Value::from("Ada")));
}
