//! Validates contract fixtures against frozen JSON schemas.

use jsonschema::JSONSchema;
use serde_json::Value;
use soilscan_contract::{failure_message, parse_analysis_result};

const ANALYSIS_FIXTURE: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../contracts/fixtures/analysis-result.valid.json"
);
const ERROR_FIXTURE: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../contracts/fixtures/error-response.valid.json"
);

fn read(path: &str) -> String {
    std::fs::read_to_string(path).expect("json file should be readable")
}

fn load_json(path: &str) -> Value {
    serde_json::from_str(&read(path)).expect("json file should be valid")
}

fn compile_validator(schema_path: &str) -> JSONSchema {
    let schema = load_json(schema_path);
    JSONSchema::compile(&schema).expect("schema should compile")
}

#[test]
fn analysis_fixture_matches_schema() {
    let validator = compile_validator(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../contracts/analysis-result.schema.json"
    ));
    assert!(
        validator.is_valid(&load_json(ANALYSIS_FIXTURE)),
        "analysis fixture should validate against schema"
    );
}

#[test]
fn error_fixture_matches_schema() {
    let validator = compile_validator(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../contracts/error-response.schema.json"
    ));
    assert!(
        validator.is_valid(&load_json(ERROR_FIXTURE)),
        "error fixture should validate against schema"
    );
}

#[test]
fn analysis_schema_rejects_non_object_body() {
    let validator = compile_validator(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../contracts/analysis-result.schema.json"
    ));
    assert!(!validator.is_valid(&serde_json::json!(["Loamy"])));
}

#[test]
fn analysis_fixture_parses_into_client_model() {
    let result = parse_analysis_result(&read(ANALYSIS_FIXTURE)).expect("fixture should parse");

    assert_eq!(result.soil_type.map(|value| value.to_string()).as_deref(), Some("Clay Loam"));
    assert_eq!(result.ph_max.map(|value| value.to_string()).as_deref(), Some("7.4"));
    assert_eq!(result.recommended_crops.len(), 2);

    let names: Vec<_> = result
        .micro_nutrients
        .iter()
        .map(|entry| entry.name.as_str())
        .collect();
    assert_eq!(names, ["Zinc", "Manganese", "Copper"]);
}

#[test]
fn error_fixture_yields_detail_message() {
    assert_eq!(failure_message(&read(ERROR_FIXTURE)), "model unavailable");
}
