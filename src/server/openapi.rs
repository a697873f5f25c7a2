//! Bundled resource documents, one per API revision.

use serde_json::Value;

use super::config::ApiVersion;

const V1: &str = include_str!("../../data/openapi/v1.json");
const V2: &str = include_str!("../../data/openapi/v2.json");
const V3: &str = include_str!("../../data/openapi/v3.json");

/// The document for `version`, advertising `public_url` as its server.
pub fn document(version: ApiVersion, public_url: &str) -> Result<Value, serde_json::Error> {
    let source = match version {
        ApiVersion::V1 => V1,
        ApiVersion::V2 => V2,
        ApiVersion::V3 => V3,
    };
    let mut document: Value = serde_json::from_str(source)?;
    if let Some(server) = document
        .get_mut("servers")
        .and_then(Value::as_array_mut)
        .and_then(|servers| servers.first_mut())
    {
        server["url"] = Value::String(public_url.to_string());
    }
    Ok(document)
}
