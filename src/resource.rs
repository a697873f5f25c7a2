//! Semantic resources: a fetched representation paired with the relations it
//! currently offers.
//!
//! Relations are read once, from the `_links` the server embedded in this
//! particular response. A relation absent from `_links` is simply not on
//! offer right now; nothing is inferred from the document alone.

use serde_json::Value;

use crate::document::ResourceDocument;
use crate::error::HypermediaError;
use crate::operation::{
    evaluate_expression, LinkDescriptor, OperationDescriptor, Parameters, ResponseShape,
};
use crate::types::{HttpMethod, Iri, EMBEDDED_LINKS};

/// A follow-up operation offered by one specific representation.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDescriptor {
    pub relation: Iri,
    /// Name the representation used for the relation in `_links`.
    pub name: String,
    /// Operation the relation invokes.
    operation: OperationDescriptor,
    /// Parameter values pre-bound from the representation.
    pub parameters: Parameters,
}

impl RelationDescriptor {
    /// The canonical operation for this relation.
    pub fn operation(&self) -> &OperationDescriptor {
        &self.operation
    }
}

/// Outcome of a relation lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Relation<'a> {
    Present(&'a RelationDescriptor),
    Absent,
}

impl<'a> Relation<'a> {
    pub fn is_present(&self) -> bool {
        matches!(self, Relation::Present(_))
    }

    pub fn as_option(&self) -> Option<&'a RelationDescriptor> {
        match self {
            Relation::Present(r) => Some(r),
            Relation::Absent => None,
        }
    }

    /// The relation, or `NoMatchingOperation` naming `relation` when absent.
    pub fn require(self, relation: &Iri) -> Result<&'a RelationDescriptor, HypermediaError> {
        match self {
            Relation::Present(r) => Ok(r),
            Relation::Absent => Err(HypermediaError::NoMatchingOperation {
                concept: relation.clone(),
            }),
        }
    }
}

/// A representation and the relations it embeds.
///
/// Never mutated: a new fetch produces a new resource.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticResource {
    raw: Value,
    shape: Option<ResponseShape>,
    values: Vec<(Iri, Value)>,
    relations: Vec<RelationDescriptor>,
}

impl SemanticResource {
    /// Build a resource from a response body.
    ///
    /// `shape` supplies the property-to-key mapping; `producer` is the
    /// operation that returned the body, whose declared links are preferred
    /// when resolving `_links` entries.
    pub fn new(
        raw: Value,
        shape: Option<&ResponseShape>,
        producer: Option<&OperationDescriptor>,
        document: &ResourceDocument,
    ) -> Self {
        let values = shape
            .map(|s| {
                s.properties
                    .iter()
                    .filter_map(|b| raw.get(&b.key).map(|v| (b.property.clone(), v.clone())))
                    .collect()
            })
            .unwrap_or_default();
        let relations = embedded_relations(&raw, producer, document);

        Self {
            raw,
            shape: shape.cloned(),
            values,
            relations,
        }
    }

    /// A resource with no shape and no relations, e.g. an empty 204 body.
    pub fn bare(raw: Value) -> Self {
        Self {
            raw,
            shape: None,
            values: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// The representation as received.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Concept the representation stands for, if declared.
    pub fn concept(&self) -> Option<&Iri> {
        self.shape.as_ref().and_then(|s| s.concept.as_ref())
    }

    /// Value of a semantic property.
    ///
    /// Looks up the key the response schema binds to `property`, then falls
    /// back to a key spelled exactly like the property.
    ///
    /// # Errors
    ///
    /// Returns `HypermediaError::PropertyNotFound` if neither is present.
    pub fn get_one_value(&self, property: &Iri) -> Result<&Value, HypermediaError> {
        self.values
            .iter()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v)
            .or_else(|| self.raw.get(property.as_str()))
            .ok_or_else(|| HypermediaError::PropertyNotFound {
                property: property.clone(),
            })
    }

    /// Relation offered by this representation, or `Absent`.
    ///
    /// `relation` is matched against the resolved relation URI, not the key
    /// the body used in `_links`: a v3 user embedding `_links.delete` offers
    /// `http://myVoc.org/#rel/delete`, and a lookup of `"delete"` is `Absent`.
    /// Self-described entries without a `rel` resolve to their key.
    pub fn get_relation(&self, relation: &Iri) -> Relation<'_> {
        self.relations
            .iter()
            .find(|r| &r.relation == relation)
            .map(Relation::Present)
            .unwrap_or(Relation::Absent)
    }

    pub fn is_relation_available(&self, relation: &Iri) -> bool {
        self.get_relation(relation).is_present()
    }

    /// All relations currently offered.
    pub fn relations(&self) -> &[RelationDescriptor] {
        &self.relations
    }

    /// Members of an array representation, shaped by the item schema.
    ///
    /// Empty for non-array representations.
    pub fn members(&self, document: &ResourceDocument) -> Vec<SemanticResource> {
        let Some(items) = self.raw.as_array() else {
            return Vec::new();
        };
        let item_shape = self.shape.as_ref().and_then(|s| s.items.as_deref());
        items
            .iter()
            .map(|item| SemanticResource::new(item.clone(), item_shape, None, document))
            .collect()
    }
}

/// Resolve every `_links` entry of `raw` to a relation descriptor.
fn embedded_relations(
    raw: &Value,
    producer: Option<&OperationDescriptor>,
    document: &ResourceDocument,
) -> Vec<RelationDescriptor> {
    let entries: Vec<(String, Value)> = match raw.get(EMBEDDED_LINKS) {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .map(|n| (n.to_string(), Value::Null))
            .collect(),
        _ => return Vec::new(),
    };

    let mut relations = Vec::with_capacity(entries.len());
    for (name, entry) in entries {
        let resolved = self_described(&name, &entry)
            .or_else(|| from_document_link(&name, raw, producer, document));
        match resolved {
            Some(relation) => {
                tracing::debug!(relation = %relation.relation, name = name.as_str(), "relation offered");
                relations.push(relation);
            }
            None => {
                tracing::warn!(name = name.as_str(), "embedded relation matches no declared link, skipped")
            }
        }
    }
    relations
}

/// `{ "href": "/user?id=7", "method": "DELETE", "rel": "..." }`
fn self_described(name: &str, entry: &Value) -> Option<RelationDescriptor> {
    let href = entry.get("href")?.as_str()?;
    let method = entry
        .get("method")
        .and_then(Value::as_str)
        .and_then(HttpMethod::parse)
        .unwrap_or(HttpMethod::Get);
    let relation = entry.get("rel").and_then(Value::as_str).unwrap_or(name);

    Some(RelationDescriptor {
        relation: Iri::from(relation),
        name: name.to_string(),
        operation: OperationDescriptor {
            id: format!("{method} {href}"),
            method,
            url_template: href.to_string(),
            concepts: Vec::new(),
            parameters: Vec::new(),
            response: None,
            links: Vec::new(),
        },
        parameters: Parameters::new(),
    })
}

fn from_document_link(
    name: &str,
    raw: &Value,
    producer: Option<&OperationDescriptor>,
    document: &ResourceDocument,
) -> Option<RelationDescriptor> {
    let matches = |link: &&LinkDescriptor| link.name == name || link.relation.as_str() == name;

    let declared = producer.and_then(|op| op.links.iter().find(matches));
    let link = declared.or_else(|| document.links().map(|(_, l)| l).find(matches))?;
    let target = document.operation(&link.operation_id)?;

    let mut parameters = Parameters::new();
    for (param_name, expression) in &link.parameters {
        let Some(value) = evaluate_expression(expression, raw) else {
            continue;
        };
        let property = target
            .parameters
            .iter()
            .find(|b| &b.name == param_name)
            .map(|b| b.property.clone())
            .unwrap_or_else(|| Iri::from(param_name.as_str()));
        parameters.insert(property, value);
    }

    Some(RelationDescriptor {
        relation: link.relation.clone(),
        name: name.to_string(),
        operation: target.clone(),
        parameters,
    })
}
