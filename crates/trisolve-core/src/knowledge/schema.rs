//! JSON Schema validation for knowledge-base files.
//!
//! The schema lives next to the built-in YAML and is compiled in.

use std::sync::OnceLock;

const KNOWLEDGE_SCHEMA_JSON: &str = include_str!("../../knowledge/knowledge.schema.json");

static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(KNOWLEDGE_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;
        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });
    result.as_ref().map_err(Clone::clone)
}

/// Validate a knowledge-base document against the embedded schema.
///
/// Returns every violation, each suffixed with its instance path.
pub fn validate_knowledge_schema(document: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
