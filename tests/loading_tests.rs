//! Loading schemas and generator configurations from disk

mod common;

use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;
use xmlschema_arbitrary::{
    ChoiceWeighting, Element, ErrorKind, GeneratorConfig, QName, RandomSource, Schema, SchemaModel,
};

#[test]
fn test_schema_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("formula.json");
    let schema = common::formula();
    fs::write(&path, schema.to_json().unwrap()).unwrap();

    let loaded = Schema::from_file(&path).unwrap();
    assert_eq!(loaded, schema);
    assert_eq!(loaded.target_namespace.as_deref(), Some(common::LOGIC_NS));
    let members: Vec<String> = loaded
        .substitution_members(&common::logic("Formula"))
        .iter()
        .map(|d| d.name.local_name.clone())
        .collect();
    assert_eq!(members, vec!["Var", "True", "And", "Or", "Not"]);
}

#[test]
fn test_schema_with_dangling_reference_is_rejected() {
    let json = r#"{
        "elements": [{"name": "root", "type": {"named": "Missing"}}]
    }"#;
    let err = Schema::from_json_str(json).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownType);
}

#[test]
fn test_config_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{"max_unbounded_occurs": 3, "choice_weighting": "schema_hint", "default_size": 40}"#,
    )
    .unwrap();

    let config = GeneratorConfig::from_file(&path).unwrap();
    assert_eq!(config.max_unbounded_occurs, 3);
    assert_eq!(config.choice_weighting, ChoiceWeighting::SchemaHint);
    assert_eq!(config.max_depth, GeneratorConfig::default().max_depth);

    let schema = common::purchase_order();
    let gen = xmlschema_arbitrary::ElementGenerator::new(
        &schema,
        &QName::local("purchaseOrder"),
        Default::default(),
        config,
    )
    .unwrap();
    let (batch, _) = gen.sample_with(gen.config().default_size, 20, RandomSource::from_seed(8));
    for order in batch.values() {
        let items: Vec<&Element> = order.find_children("items")[0].find_children("item");
        assert!(items.len() <= 3);
    }
}

#[test]
fn test_generated_xml_files_reparse() {
    let dir = TempDir::new().unwrap();
    let schema = common::formula();
    let gen = common::generator(&schema, &common::logic("Formula"));
    let (batch, _) = gen.sample_with(15, 5, RandomSource::from_seed(21));

    for (index, element) in batch.values().into_iter().enumerate() {
        let path = dir.path().join(format!("formula-{}.xml", index));
        fs::write(&path, element.to_xml().unwrap()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(&Element::from_xml(&text).unwrap(), element);
    }
}
