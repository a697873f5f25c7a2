//! Operation descriptors: declarative recipes for invoking one API capability.
//!
//! A descriptor is built once, when the resource document is loaded, and is
//! immutable afterwards. Turning it into a concrete request is a pure step
//! ([`OperationDescriptor::build_request`]) so parameter checks happen before
//! any network activity.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::HypermediaError;
use crate::types::{value_to_param_string, HttpMethod, Iri, ParameterLocation};

/// Binds one semantic property to a slot of the concrete request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterBinding {
    /// Literal parameter name (template slot, query key, header or body field).
    pub name: String,
    /// Semantic property the caller supplies the value under.
    pub property: Iri,
    pub location: ParameterLocation,
    pub required: bool,
}

/// Maps a semantic property onto the JSON key carrying it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyBinding {
    pub property: Iri,
    pub key: String,
}

/// What a successful response looks like, as declared by the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseShape {
    /// Concept the representation stands for (`x-@id` of the schema).
    pub concept: Option<Iri>,
    /// The response schema with internal references inlined.
    pub schema: Value,
    pub properties: Vec<PropertyBinding>,
    /// Shape of each member when the representation is an array.
    pub items: Option<Box<ResponseShape>>,
}

impl ResponseShape {
    /// JSON key carrying `property`, if the shape declares one.
    pub fn key_for(&self, property: &Iri) -> Option<&str> {
        self.properties
            .iter()
            .find(|b| &b.property == property)
            .map(|b| b.key.as_str())
    }
}

/// A relation the document declares on an operation's response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkDescriptor {
    /// Link name, as keyed under the response's `links`.
    pub name: String,
    pub relation: Iri,
    /// `operationId` of the operation the relation invokes.
    pub operation_id: String,
    /// Target parameter name to literal value or runtime expression.
    pub parameters: Vec<(String, Value)>,
}

/// Declarative recipe for invoking one capability of the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationDescriptor {
    /// `operationId`, or `"METHOD template"` when the document omits one.
    pub id: String,
    pub method: HttpMethod,
    /// Path template relative to the server URL, e.g. `/users/{id}`.
    pub url_template: String,
    /// Concepts this operation satisfies.
    pub concepts: Vec<Iri>,
    pub parameters: Vec<ParameterBinding>,
    pub response: Option<ResponseShape>,
    pub links: Vec<LinkDescriptor>,
}

/// Semantic parameter values supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(HashMap<Iri, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Parameters::insert`].
    pub fn with(mut self, property: impl Into<Iri>, value: impl Into<Value>) -> Self {
        self.insert(property, value);
        self
    }

    pub fn insert(&mut self, property: impl Into<Iri>, value: impl Into<Value>) {
        self.0.insert(property.into(), value.into());
    }

    pub fn get(&self, property: &Iri) -> Option<&Value> {
        self.0.get(property)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Values in `other` override values already present.
    pub fn merged(mut self, other: &Parameters) -> Self {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
        self
    }
}

impl<K: Into<Iri>, V: Into<Value>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A concrete request ready to be sent, relative to the server URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPlan {
    pub method: HttpMethod,
    /// Expanded path, with slot values percent-encoded.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl OperationDescriptor {
    /// Bindings whose value must be supplied by the caller.
    pub fn required_parameters(&self) -> impl Iterator<Item = &ParameterBinding> {
        self.parameters.iter().filter(|p| p.required)
    }

    /// Whether this operation satisfies `concept`.
    pub fn satisfies(&self, concept: &Iri) -> bool {
        self.concepts.contains(concept)
    }

    /// Build the concrete request for the given parameter values.
    ///
    /// # Errors
    ///
    /// Returns `HypermediaError::MissingParameter` for the first required
    /// binding (in declaration order) absent from `params`, or for a template
    /// slot no binding fills.
    pub fn build_request(&self, params: &Parameters) -> Result<RequestPlan, HypermediaError> {
        if let Some(missing) = self
            .required_parameters()
            .find(|p| params.get(&p.property).is_none())
        {
            return Err(HypermediaError::MissingParameter {
                operation: self.id.clone(),
                parameter: missing.property.clone(),
            });
        }

        let path = self.expand_template(params)?;
        let mut query = Vec::new();
        let mut headers = Vec::new();
        let mut body: Option<Map<String, Value>> = None;

        for binding in &self.parameters {
            let Some(value) = params.get(&binding.property) else {
                continue;
            };
            match binding.location {
                ParameterLocation::Path => {}
                ParameterLocation::Query => {
                    query.push((binding.name.clone(), value_to_param_string(value)))
                }
                ParameterLocation::Header => {
                    headers.push((binding.name.clone(), value_to_param_string(value)))
                }
                ParameterLocation::Body => {
                    body.get_or_insert_with(Map::new)
                        .insert(binding.name.clone(), value.clone());
                }
            }
        }

        Ok(RequestPlan {
            method: self.method,
            path,
            query,
            headers,
            body: body.map(Value::Object),
        })
    }

    fn expand_template(&self, params: &Parameters) -> Result<String, HypermediaError> {
        let mut out = String::with_capacity(self.url_template.len());
        let mut rest = self.url_template.as_str();

        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}') else {
                break;
            };
            let slot = &rest[open + 1..open + close];
            out.push_str(&rest[..open]);

            let value = self
                .parameters
                .iter()
                .find(|p| p.location == ParameterLocation::Path && p.name == slot)
                .and_then(|p| params.get(&p.property))
                .ok_or_else(|| HypermediaError::MissingParameter {
                    operation: self.id.clone(),
                    parameter: Iri::from(slot),
                })?;
            out.push_str(&urlencoding::encode(&value_to_param_string(value)));
            rest = &rest[open + close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Names of the `{slot}` placeholders in a path template, in order.
pub fn template_slots(template: &str) -> Vec<&str> {
    let mut slots = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        slots.push(&rest[open + 1..open + close]);
        rest = &rest[open + close + 1..];
    }
    slots
}

/// Evaluate an OpenAPI link parameter against a response body.
///
/// Supports `$response.body` and `$response.body#/json/pointer`; any other
/// `$`-prefixed expression yields `None`. Non-expression values are literals.
pub fn evaluate_expression(expression: &Value, body: &Value) -> Option<Value> {
    let Value::String(expr) = expression else {
        return Some(expression.clone());
    };
    if !expr.starts_with('$') {
        return Some(expression.clone());
    }
    let pointer = expr.strip_prefix("$response.body")?;
    if pointer.is_empty() {
        return Some(body.clone());
    }
    let pointer = pointer.strip_prefix('#')?;
    body.pointer(pointer).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn binding(name: &str, property: &str, location: ParameterLocation, required: bool) -> ParameterBinding {
        ParameterBinding {
            name: name.into(),
            property: Iri::from(property),
            location,
            required,
        }
    }

    fn get_user_by_path() -> OperationDescriptor {
        OperationDescriptor {
            id: "getUser".into(),
            method: HttpMethod::Get,
            url_template: "/users/{id}".into(),
            concepts: vec![Iri::from("http://myVoc.org/vocab#user")],
            parameters: vec![binding(
                "id",
                "https://schema.org/identifier",
                ParameterLocation::Path,
                true,
            )],
            response: None,
            links: vec![],
        }
    }

    #[test]
    fn path_slot_is_substituted() {
        let params = Parameters::new().with("https://schema.org/identifier", 7);
        let plan = get_user_by_path().build_request(&params).unwrap();
        assert_eq!(plan.method, HttpMethod::Get);
        assert_eq!(plan.path, "/users/7");
        assert!(plan.query.is_empty());
        assert!(plan.body.is_none());
    }

    #[test]
    fn path_slot_values_are_percent_encoded() {
        let params = Parameters::new().with("https://schema.org/identifier", "a b/c");
        let plan = get_user_by_path().build_request(&params).unwrap();
        assert_eq!(plan.path, "/users/a%20b%2Fc");
    }

    #[test]
    fn missing_required_parameter_fails() {
        let err = get_user_by_path().build_request(&Parameters::new()).unwrap_err();
        match err {
            HypermediaError::MissingParameter { operation, parameter } => {
                assert_eq!(operation, "getUser");
                assert_eq!(parameter.as_str(), "https://schema.org/identifier");
            }
            other => panic!("expected MissingParameter, got {other:?}"),
        }
    }

    #[test]
    fn query_header_and_body_bindings() {
        let op = OperationDescriptor {
            id: "updateUser".into(),
            method: HttpMethod::Put,
            url_template: "/user".into(),
            concepts: vec![],
            parameters: vec![
                binding("id", "https://schema.org/identifier", ParameterLocation::Query, true),
                binding("X-Trace", "urn:trace", ParameterLocation::Header, false),
                binding("firstName", "https://schema.org/givenName", ParameterLocation::Body, false),
                binding("bio", "https://schema.org/abstract", ParameterLocation::Body, false),
            ],
            response: None,
            links: vec![],
        };
        let params = Parameters::new()
            .with("https://schema.org/identifier", 3)
            .with("urn:trace", "abc")
            .with("https://schema.org/givenName", "Ada");

        let plan = op.build_request(&params).unwrap();
        assert_eq!(plan.path, "/user");
        assert_eq!(plan.query, vec![("id".to_string(), "3".to_string())]);
        assert_eq!(plan.headers, vec![("X-Trace".to_string(), "abc".to_string())]);
        // optional bio absent from params is not sent
        assert_eq!(plan.body, Some(json!({ "firstName": "Ada" })));
    }

    #[test]
    fn unbound_template_slot_fails() {
        let mut op = get_user_by_path();
        op.parameters.clear();
        let err = op.build_request(&Parameters::new()).unwrap_err();
        assert!(matches!(err, HypermediaError::MissingParameter { parameter, .. } if parameter.as_str() == "id"));
    }

    #[test]
    fn template_slots_in_order() {
        assert_eq!(template_slots("/a/{x}/b/{y}"), vec!["x", "y"]);
        assert!(template_slots("/users").is_empty());
    }

    #[test]
    fn link_expressions() {
        let body = json!({ "id": 7, "profile": { "email": "ada@example.com" } });
        assert_eq!(evaluate_expression(&json!("$response.body#/id"), &body), Some(json!(7)));
        assert_eq!(
            evaluate_expression(&json!("$response.body#/profile/email"), &body),
            Some(json!("ada@example.com"))
        );
        assert_eq!(evaluate_expression(&json!("$response.body#/missing"), &body), None);
        assert_eq!(evaluate_expression(&json!("$request.path.id"), &body), None);
        assert_eq!(evaluate_expression(&json!(42), &body), Some(json!(42)));
        assert_eq!(evaluate_expression(&json!("literal"), &body), Some(json!("literal")));
    }

    #[test]
    fn merged_parameters_override() {
        let base = Parameters::new().with("a", 1).with("b", 2);
        let merged = base.merged(&Parameters::new().with("b", 3));
        assert_eq!(merged.get(&Iri::from("a")), Some(&json!(1)));
        assert_eq!(merged.get(&Iri::from("b")), Some(&json!(3)));
        assert_eq!(merged.len(), 2);
    }
}
