//! Integration tests for the `docweave` meta-crate: configuration, logging
//! and struct binding wired together through the re-exports.

use docweave::core::logging::setup_logging;
use docweave::core::settings_loader;
use docweave::prelude::*;
use docweave::TemplateFields;

#[derive(TemplateFields)]
#[template(crate = "docweave::template")]
struct Receipt {
    #[template(rename = "receipt_no")]
    number: u32,
    shop: Shop,
    items: Vec<Item>,
}

#[derive(TemplateFields)]
#[template(crate = "docweave::template")]
struct Shop {
    city: String,
}

#[derive(TemplateFields)]
#[template(crate = "docweave::template")]
struct Item {
    label: String,
    price: f64,
}

#[test]
fn test_engine_from_toml_settings() {
    let settings = settings_loader::from_toml_str(
        r#"
        debug = true
        log_level = "docweave_template=debug"

        [template]
        image_not_found_marker = "(no {name})"
        "#,
    )
    .unwrap();
    setup_logging(&settings);

    let mut engine = Engine::from_settings(&settings.template);
    engine
        .load_template(
            "receipt",
            "Receipt {{receipt_no}} ({{city}})\n{{#each items}}\n{{label}}: {{price}}\n{{/each}}\n{{#image logo}}",
        )
        .unwrap();

    let receipt = Receipt {
        number: 7,
        shop: Shop {
            city: "Bergen".into(),
        },
        items: vec![
            Item {
                label: "Tea".into(),
                price: 2.5,
            },
            Item {
                label: "Cake".into(),
                price: 4.0,
            },
        ],
    };
    let text = engine
        .render_to_string("receipt", &TemplateData::from_struct(&receipt))
        .unwrap();
    assert_eq!(text, "Receipt 7 (Bergen)\nTea: 2.5\nCake: 4\n(no logo)");
}

#[test]
fn test_prelude_error_type() {
    let engine = Engine::new();
    let err: DocweaveError = engine
        .render_to_document("missing", &TemplateData::new())
        .unwrap_err();
    assert!(err.is_template_not_found());
}
