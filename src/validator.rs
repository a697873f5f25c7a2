//! Representation validation against declared response schemas.

use serde_json::Value;

use crate::error::ShapeError;

/// Validate a representation against a response schema.
///
/// Semantic annotations (`x-@id`) are unknown keywords to JSON Schema and
/// are ignored. A schema that cannot be compiled (for instance one that still
/// holds a recursive reference) is skipped with a warning rather than failing
/// the response.
///
/// # Errors
///
/// Returns every mismatch found, each with a JSON Pointer into the payload.
pub fn validate_representation(schema: &Value, payload: &Value) -> Result<(), Vec<ShapeError>> {
    let validator = match jsonschema::validator_for(schema) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "response schema cannot be compiled, shape check skipped");
            return Ok(());
        }
    };

    let errors: Vec<ShapeError> = validator
        .iter_errors(payload)
        .map(|e| ShapeError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
