//! Resource documents: parsed, semantically annotated API descriptions.
//!
//! A document is an OpenAPI 3 description whose schemas, parameters and
//! links carry vocabulary annotations:
//!
//! ```json
//! {
//!   "servers": [{ "url": "http://localhost:3000" }],
//!   "paths": {
//!     "/users/{id}": {
//!       "get": {
//!         "operationId": "getUser",
//!         "parameters": [{
//!           "name": "id", "in": "path", "required": true,
//!           "schema": { "type": "integer", "x-@id": "https://schema.org/identifier" }
//!         }],
//!         "responses": {
//!           "200": {
//!             "content": { "application/json": { "schema": {
//!               "type": "object",
//!               "x-@id": "http://myVoc.org/vocab#user",
//!               "properties": { "firstName": { "type": "string", "x-@id": "https://schema.org/givenName" } }
//!             } } }
//!           }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Parsing happens once; the document and its [`OperationIndex`] are
//! read-only afterwards.

use serde_json::{Map, Value};
use reqwest::Url;

use crate::error::LoadError;
use crate::index::{OperationIndex, Operations};
use crate::loader::navigate_fragment;
use crate::operation::{
    LinkDescriptor, OperationDescriptor, ParameterBinding, PropertyBinding, ResponseShape,
};
use crate::types::{
    HttpMethod, Iri, ParameterLocation, OPERATION_METHODS, SEMANTIC_ID, SEMANTIC_RELATION,
};

/// An immutable, indexed API description.
#[derive(Debug, Clone)]
pub struct ResourceDocument {
    raw: Value,
    base_url: Option<Url>,
    operations: Vec<OperationDescriptor>,
    index: OperationIndex,
}

impl ResourceDocument {
    /// Parse a document that was not fetched from a URL.
    ///
    /// A relative (or missing) server URL leaves the base URL unset; callers
    /// must then supply one to the invoker.
    pub fn from_value(raw: Value) -> Result<Self, LoadError> {
        Self::from_value_at(raw, None)
    }

    /// Parse a document fetched from `source`.
    ///
    /// Relative server URLs resolve against `source`.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidDocument` for structural problems and
    /// `LoadError::BrokenRef` for references that do not resolve.
    pub fn from_value_at(raw: Value, source: Option<&Url>) -> Result<Self, LoadError> {
        let paths = raw
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| LoadError::InvalidDocument {
                path: "/paths".into(),
                message: "expected an object of path items".into(),
            })?;

        let mut operations = Vec::new();
        for (template, item) in paths {
            let item_path = format!("/paths/{}", escape_pointer(template));
            let item = inline_refs(&raw, item, &item_path, &mut Vec::new())?;
            let Some(item_obj) = item.as_object() else {
                return Err(LoadError::InvalidDocument {
                    path: item_path,
                    message: "path item must be an object".into(),
                });
            };
            let shared = item_obj.get("parameters");

            for method_name in OPERATION_METHODS {
                let Some(op) = item_obj.get(*method_name) else {
                    continue;
                };
                let Some(method) = HttpMethod::parse(method_name) else {
                    continue;
                };
                let op_path = format!("{item_path}/{method_name}");
                operations.push(parse_operation(template, method, op, shared, &op_path)?);
            }
        }

        let base_url = resolve_base_url(&raw, source)?;
        let index = OperationIndex::build(&operations);

        tracing::debug!(
            operations = operations.len(),
            base_url = base_url.as_ref().map(Url::as_str),
            "resource document indexed"
        );

        Ok(Self {
            raw,
            base_url,
            operations,
            index,
        })
    }

    /// Operations satisfying `concept`, in document order. Empty if unmatched.
    pub fn find_operations(&self, concept: impl Into<Iri>) -> Operations<'_> {
        let concept = concept.into();
        let matches = self
            .index
            .positions(&concept)
            .iter()
            .map(|&i| &self.operations[i])
            .collect();
        Operations::new(concept, matches)
    }

    /// The operation with the given `operationId`.
    pub fn operation(&self, operation_id: &str) -> Option<&OperationDescriptor> {
        self.index
            .position_of(operation_id)
            .map(|i| &self.operations[i])
    }

    pub fn operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }

    pub fn index(&self) -> &OperationIndex {
        &self.index
    }

    /// Every link declared anywhere in the document, with its declaring operation.
    pub fn links(&self) -> impl Iterator<Item = (&OperationDescriptor, &LinkDescriptor)> {
        self.operations
            .iter()
            .flat_map(|op| op.links.iter().map(move |link| (op, link)))
    }

    /// Base URL operations are invoked against, if known.
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Replace the base URL declared by the document.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// The document as it was parsed.
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

fn parse_operation(
    template: &str,
    method: HttpMethod,
    op: &Value,
    shared_parameters: Option<&Value>,
    path: &str,
) -> Result<OperationDescriptor, LoadError> {
    let id = op
        .get("operationId")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| format!("{} {}", method, template));

    let mut parameters = Vec::new();
    for list in [shared_parameters, op.get("parameters")].into_iter().flatten() {
        let Some(items) = list.as_array() else {
            return Err(LoadError::InvalidDocument {
                path: format!("{path}/parameters"),
                message: "parameters must be an array".into(),
            });
        };
        for (i, param) in items.iter().enumerate() {
            if let Some(binding) = parse_parameter(param, &format!("{path}/parameters/{i}"))? {
                // operation-level parameters override path-level ones
                parameters.retain(|p: &ParameterBinding| {
                    !(p.name == binding.name && p.location == binding.location)
                });
                parameters.push(binding);
            }
        }
    }
    parameters.extend(parse_request_body(op));

    let mut concepts = semantic_ids(op.get(SEMANTIC_ID));
    let (response, links) = match success_response(op) {
        Some((status, response)) => {
            let shape = response_schema(response).map(ResponseShape::from_schema);
            let links = parse_links(response, &format!("{path}/responses/{status}/links"))?;
            (shape, links)
        }
        None => (None, Vec::new()),
    };
    if let Some(concept) = response.as_ref().and_then(|r| r.concept.clone()) {
        if !concepts.contains(&concept) {
            concepts.push(concept);
        }
    }

    Ok(OperationDescriptor {
        id,
        method,
        url_template: template.to_string(),
        concepts,
        parameters,
        response,
        links,
    })
}

fn parse_parameter(param: &Value, path: &str) -> Result<Option<ParameterBinding>, LoadError> {
    let name = param
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| LoadError::InvalidDocument {
            path: path.to_string(),
            message: "parameter is missing a name".into(),
        })?;
    let location_name = param.get("in").and_then(Value::as_str).unwrap_or("query");
    let Some(location) = ParameterLocation::parse(location_name) else {
        tracing::warn!(parameter = name, location = location_name, "unsupported parameter location, skipped");
        return Ok(None);
    };

    let property = param
        .get(SEMANTIC_ID)
        .or_else(|| param.get("schema").and_then(|s| s.get(SEMANTIC_ID)))
        .and_then(Value::as_str)
        .unwrap_or(name);

    let required = location == ParameterLocation::Path
        || param.get("required").and_then(Value::as_bool).unwrap_or(false);

    Ok(Some(ParameterBinding {
        name: name.to_string(),
        property: Iri::from(property),
        location,
        required,
    }))
}

fn parse_request_body(op: &Value) -> Vec<ParameterBinding> {
    let Some(schema) = op
        .get("requestBody")
        .and_then(|b| b.get("content"))
        .and_then(json_media)
        .and_then(|m| m.get("schema"))
    else {
        return Vec::new();
    };

    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(key, prop)| ParameterBinding {
                    name: key.clone(),
                    property: Iri::from(prop.get(SEMANTIC_ID).and_then(Value::as_str).unwrap_or(key)),
                    location: ParameterLocation::Body,
                    required: required.contains(&key.as_str()),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// The lowest declared 2xx response (`"2XX"` counts as a fallback).
fn success_response(op: &Value) -> Option<(&str, &Value)> {
    let responses = op.get("responses")?.as_object()?;
    responses
        .iter()
        .filter(|(status, _)| status.starts_with('2'))
        .min_by_key(|(status, _)| status.parse::<u16>().unwrap_or(u16::MAX))
        .map(|(status, response)| (status.as_str(), response))
}

fn response_schema(response: &Value) -> Option<&Value> {
    response
        .get("content")
        .and_then(json_media)
        .and_then(|m| m.get("schema"))
}

/// `application/json` media, else the first declared media type.
fn json_media(content: &Value) -> Option<&Value> {
    let content = content.as_object()?;
    content
        .get("application/json")
        .or_else(|| content.values().next())
}

fn parse_links(response: &Value, path: &str) -> Result<Vec<LinkDescriptor>, LoadError> {
    let Some(links) = response.get("links").and_then(Value::as_object) else {
        return Ok(Vec::new());
    };

    let mut out = Vec::with_capacity(links.len());
    for (name, link) in links {
        let Some(operation_id) = link.get("operationId").and_then(Value::as_str) else {
            if link.get("operationRef").is_some() {
                tracing::warn!(link = name.as_str(), "operationRef links are not supported, skipped");
                continue;
            }
            return Err(LoadError::InvalidDocument {
                path: format!("{path}/{}", escape_pointer(name)),
                message: "link must name an operationId".into(),
            });
        };
        let relation = link
            .get(SEMANTIC_RELATION)
            .and_then(Value::as_str)
            .unwrap_or(name);
        let parameters = link
            .get("parameters")
            .and_then(Value::as_object)
            .map(|p| p.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        out.push(LinkDescriptor {
            name: name.clone(),
            relation: Iri::from(relation),
            operation_id: operation_id.to_string(),
            parameters,
        });
    }
    Ok(out)
}

impl ResponseShape {
    /// Derive the semantic shape of a (reference-free) response schema.
    pub fn from_schema(schema: &Value) -> Self {
        let concept = schema.get(SEMANTIC_ID).and_then(Value::as_str).map(Iri::from);
        let mut properties = Vec::new();
        collect_properties(schema, &mut properties);

        let items = schema
            .get("items")
            .filter(|items| items.is_object())
            .map(|items| Box::new(ResponseShape::from_schema(items)));

        Self {
            concept,
            schema: schema.clone(),
            properties,
            items,
        }
    }
}

fn collect_properties(schema: &Value, out: &mut Vec<PropertyBinding>) {
    if let Some(props) = schema.get("properties").and_then(Value::as_object) {
        for (key, prop) in props {
            if let Some(id) = prop.get(SEMANTIC_ID).and_then(Value::as_str) {
                out.push(PropertyBinding {
                    property: Iri::from(id),
                    key: key.clone(),
                });
            }
        }
    }
    if let Some(branches) = schema.get("allOf").and_then(Value::as_array) {
        for branch in branches {
            collect_properties(branch, out);
        }
    }
}

fn semantic_ids(value: Option<&Value>) -> Vec<Iri> {
    match value {
        Some(Value::String(s)) => vec![Iri::from(s.as_str())],
        Some(Value::Array(arr)) => arr.iter().filter_map(Value::as_str).map(Iri::from).collect(),
        _ => Vec::new(),
    }
}

fn resolve_base_url(raw: &Value, source: Option<&Url>) -> Result<Option<Url>, LoadError> {
    let server = raw
        .get("servers")
        .and_then(Value::as_array)
        .and_then(|s| s.first())
        .and_then(|s| s.get("url"))
        .and_then(Value::as_str)
        .unwrap_or("/");

    let parsed = match source {
        Some(source) => source.join(server),
        None => match Url::parse(server) {
            Ok(url) => Ok(url),
            Err(_) => return Ok(None),
        },
    };
    parsed.map(Some).map_err(|e| LoadError::InvalidUrl {
        url: server.to_string(),
        message: e.to_string(),
    })
}

/// Recursively inline internal `#/...` references against `root`.
///
/// A reference already being expanded higher up is left in place, so
/// recursive schemas terminate. Keys next to a `$ref` override the target's.
pub(crate) fn inline_refs(
    root: &Value,
    value: &Value,
    path: &str,
    stack: &mut Vec<String>,
) -> Result<Value, LoadError> {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                if stack.iter().any(|r| r == reference) {
                    return Ok(value.clone());
                }
                let broken = || LoadError::BrokenRef {
                    path: path.to_string(),
                    reference: reference.to_string(),
                };
                if !reference.starts_with('#') {
                    return Err(broken());
                }
                let target = navigate_fragment(root, reference).map_err(|_| broken())?;

                stack.push(reference.to_string());
                let mut resolved = inline_refs(root, &target, path, stack)?;
                stack.pop();

                if let Value::Object(obj) = &mut resolved {
                    for (k, v) in map {
                        if k != "$ref" {
                            obj.insert(k.clone(), inline_refs(root, v, path, stack)?);
                        }
                    }
                }
                return Ok(resolved);
            }

            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                let child_path = format!("{path}/{}", escape_pointer(k));
                out.insert(k.clone(), inline_refs(root, v, &child_path, stack)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .map(|(i, v)| inline_refs(root, v, &format!("{path}/{i}"), stack))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

/// Escape a key for use in a JSON Pointer (RFC 6901).
pub(crate) fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_document() -> Value {
        json!({
            "openapi": "3.0.3",
            "servers": [{ "url": "http://localhost:3000" }],
            "paths": {
                "/users": {
                    "get": {
                        "operationId": "listUsers",
                        "responses": { "200": { "content": { "application/json": { "schema": {
                            "type": "array",
                            "x-@id": "http://myVoc.org/vocab#users",
                            "items": { "$ref": "#/components/schemas/User" }
                        } } } } }
                    }
                },
                "/users/{id}": {
                    "parameters": [{
                        "name": "id", "in": "path",
                        "schema": { "type": "integer", "x-@id": "https://schema.org/identifier" }
                    }],
                    "get": {
                        "operationId": "getUser",
                        "responses": {
                            "404": { "description": "missing" },
                            "200": {
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/User" } } },
                                "links": {
                                    "delete": {
                                        "operationId": "deleteUser",
                                        "x-@relation": "http://myVoc.org/#rel/delete",
                                        "parameters": { "id": "$response.body#/id" }
                                    }
                                }
                            }
                        }
                    },
                    "delete": {
                        "operationId": "deleteUser",
                        "responses": { "204": { "description": "deleted" } }
                    }
                }
            },
            "components": { "schemas": { "User": {
                "type": "object",
                "x-@id": "http://myVoc.org/vocab#user",
                "properties": {
                    "id": { "type": "integer", "x-@id": "https://schema.org/identifier" },
                    "firstName": { "type": "string", "x-@id": "https://schema.org/givenName" },
                    "note": { "type": "string" }
                }
            } } }
        })
    }

    #[test]
    fn operations_are_parsed_in_document_order() {
        let doc = ResourceDocument::from_value(user_document()).unwrap();
        let ids: Vec<&str> = doc.operations().iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["listUsers", "getUser", "deleteUser"]);
    }

    #[test]
    fn concept_comes_from_referenced_schema() {
        let doc = ResourceDocument::from_value(user_document()).unwrap();
        let ops = doc.find_operations("http://myVoc.org/vocab#user");
        assert_eq!(ops.len(), 1);
        let op = ops.first().unwrap();
        assert_eq!(op.id, "getUser");
        assert_eq!(op.url_template, "/users/{id}");
        assert_eq!(op.method, HttpMethod::Get);

        // the collection is its own concept, not indexed under its items
        let lists = doc.find_operations("http://myVoc.org/vocab#users");
        assert_eq!(lists.first().unwrap().id, "listUsers");
    }

    #[test]
    fn unknown_concept_yields_empty_result() {
        let doc = ResourceDocument::from_value(user_document()).unwrap();
        assert!(doc.find_operations("http://myVoc.org/vocab#order").is_empty());
    }

    #[test]
    fn shared_path_parameters_are_bound_semantically() {
        let doc = ResourceDocument::from_value(user_document()).unwrap();
        let op = doc.operation("deleteUser").unwrap();
        assert_eq!(op.parameters.len(), 1);
        let p = &op.parameters[0];
        assert_eq!(p.name, "id");
        assert_eq!(p.property.as_str(), "https://schema.org/identifier");
        assert_eq!(p.location, ParameterLocation::Path);
        assert!(p.required);
    }

    #[test]
    fn response_shape_maps_annotated_properties_only() {
        let doc = ResourceDocument::from_value(user_document()).unwrap();
        let shape = doc.operation("getUser").unwrap().response.as_ref().unwrap();
        assert_eq!(shape.key_for(&Iri::from("https://schema.org/givenName")), Some("firstName"));
        assert_eq!(shape.properties.len(), 2);

        let list = doc.operation("listUsers").unwrap().response.as_ref().unwrap();
        let items = list.items.as_ref().unwrap();
        assert_eq!(items.concept.as_ref().unwrap().as_str(), "http://myVoc.org/vocab#user");
    }

    #[test]
    fn links_are_collected_from_success_response() {
        let doc = ResourceDocument::from_value(user_document()).unwrap();
        let links: Vec<_> = doc.links().collect();
        assert_eq!(links.len(), 1);
        let (op, link) = links[0];
        assert_eq!(op.id, "getUser");
        assert_eq!(link.name, "delete");
        assert_eq!(link.relation.as_str(), "http://myVoc.org/#rel/delete");
        assert_eq!(link.operation_id, "deleteUser");
        assert_eq!(link.parameters, vec![("id".to_string(), json!("$response.body#/id"))]);
    }

    #[test]
    fn operation_level_concepts_are_indexed() {
        let doc = ResourceDocument::from_value(json!({
            "paths": { "/ping": { "get": {
                "x-@id": ["urn:ping", "urn:health"],
                "responses": { "204": { "description": "ok" } }
            } } }
        }))
        .unwrap();
        assert_eq!(doc.find_operations("urn:health").first().unwrap().id, "GET /ping");
        assert_eq!(doc.find_operations("urn:ping").len(), 1);
    }

    #[test]
    fn request_body_fields_become_body_bindings() {
        let doc = ResourceDocument::from_value(json!({
            "paths": { "/users": { "post": {
                "operationId": "createUser",
                "requestBody": { "content": { "application/json": { "schema": {
                    "type": "object",
                    "required": ["firstName"],
                    "properties": {
                        "firstName": { "type": "string", "x-@id": "https://schema.org/givenName" },
                        "bio": { "type": "string" }
                    }
                } } } },
                "responses": { "201": { "description": "created" } }
            } } }
        }))
        .unwrap();
        let op = doc.operation("createUser").unwrap();
        assert_eq!(op.parameters.len(), 2);
        assert!(op.parameters[0].required);
        assert_eq!(op.parameters[0].location, ParameterLocation::Body);
        assert_eq!(op.parameters[1].property.as_str(), "bio");
        assert!(!op.parameters[1].required);
    }

    #[test]
    fn broken_ref_fails_to_load() {
        let mut raw = user_document();
        raw["components"]["schemas"] = json!({});
        let err = ResourceDocument::from_value(raw).unwrap_err();
        assert!(matches!(err, LoadError::BrokenRef { reference, .. } if reference == "#/components/schemas/User"));
    }

    #[test]
    fn missing_paths_is_invalid() {
        let err = ResourceDocument::from_value(json!({ "openapi": "3.0.3" })).unwrap_err();
        assert!(matches!(err, LoadError::InvalidDocument { .. }));
    }

    #[test]
    fn recursive_schema_terminates() {
        let doc = ResourceDocument::from_value(json!({
            "paths": { "/tree": { "get": {
                "responses": { "200": { "content": { "application/json": {
                    "schema": { "$ref": "#/components/schemas/Node" }
                } } } }
            } } },
            "components": { "schemas": { "Node": {
                "type": "object",
                "x-@id": "urn:node",
                "properties": { "child": { "$ref": "#/components/schemas/Node" } }
            } } }
        }))
        .unwrap();
        assert_eq!(doc.find_operations("urn:node").len(), 1);
    }

    #[test]
    fn relative_server_url_resolves_against_source() {
        let mut raw = user_document();
        raw["servers"] = json!([{ "url": "/api" }]);
        let source = Url::parse("http://example.com:8080/docs/openapi.json").unwrap();
        let doc = ResourceDocument::from_value_at(raw.clone(), Some(&source)).unwrap();
        assert_eq!(doc.base_url().unwrap().as_str(), "http://example.com:8080/api");

        let doc = ResourceDocument::from_value(raw).unwrap();
        assert!(doc.base_url().is_none());
    }

    #[test]
    fn missing_servers_default_to_source_origin() {
        let mut raw = user_document();
        raw.as_object_mut().unwrap().remove("servers");
        let source = Url::parse("http://localhost:3000/openapi.json").unwrap();
        let doc = ResourceDocument::from_value_at(raw, Some(&source)).unwrap();
        assert_eq!(doc.base_url().unwrap().as_str(), "http://localhost:3000/");
    }
}
