//! Core types for semantic operation resolution.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Annotation key carrying a semantic URI on schemas, properties and parameters.
pub const SEMANTIC_ID: &str = "x-@id";

/// Annotation key carrying the relation URI of an OpenAPI link.
pub const SEMANTIC_RELATION: &str = "x-@relation";

/// Key under which a representation embeds the relations it currently offers.
pub const EMBEDDED_LINKS: &str = "_links";

/// HTTP methods recognised as operations under an OpenAPI path item.
pub const OPERATION_METHODS: &[&str] = &["get", "put", "post", "delete", "patch", "head", "options"];

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Opaque semantic identifier: a concept, property or relation URI.
///
/// Compared by exact string match. No normalization is performed, so
/// `http://schema.org/name` and `https://schema.org/name` are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iri(String);

impl Iri {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Iri {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Iri {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&Iri> for Iri {
    fn from(value: &Iri) -> Self {
        value.clone()
    }
}

/// HTTP method of an operation descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    /// Parse a method name, case-insensitively.
    ///
    /// Returns `None` for names that are not operation methods.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Some(HttpMethod::Get),
            "put" => Some(HttpMethod::Put),
            "post" => Some(HttpMethod::Post),
            "delete" => Some(HttpMethod::Delete),
            "patch" => Some(HttpMethod::Patch),
            "head" => Some(HttpMethod::Head),
            "options" => Some(HttpMethod::Options),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// Where a parameter value is placed in the concrete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    /// Substituted into a `{slot}` of the URL template.
    Path,
    /// Appended as a query string pair.
    Query,
    /// Sent as a request header.
    Header,
    /// Set as a field of the JSON request body.
    Body,
}

impl ParameterLocation {
    /// Parse an OpenAPI `in` value. Cookies are not supported.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "body" => Some(ParameterLocation::Body),
            _ => None,
        }
    }
}

/// Render a parameter value as it appears in a URL or header.
///
/// Strings are used verbatim (no quotes); everything else uses its JSON text.
pub fn value_to_param_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
