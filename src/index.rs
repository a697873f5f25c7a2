//! Concept-to-operation lookup table.
//!
//! Built once when a document is loaded; every lookup afterwards is a single
//! hash probe.

use std::collections::HashMap;

use crate::error::HypermediaError;
use crate::operation::OperationDescriptor;
use crate::types::Iri;

/// Index from concept URI (and `operationId`) to operation positions.
#[derive(Debug, Clone, Default)]
pub struct OperationIndex {
    by_concept: HashMap<Iri, Vec<usize>>,
    by_id: HashMap<String, usize>,
}

impl OperationIndex {
    /// Index `operations`, preserving their order under each concept.
    ///
    /// When two operations share an `operationId` the first one wins.
    pub fn build(operations: &[OperationDescriptor]) -> Self {
        let mut by_concept: HashMap<Iri, Vec<usize>> = HashMap::new();
        let mut by_id = HashMap::new();

        for (position, op) in operations.iter().enumerate() {
            for concept in &op.concepts {
                let entry = by_concept.entry(concept.clone()).or_default();
                if !entry.contains(&position) {
                    entry.push(position);
                }
            }
            by_id.entry(op.id.clone()).or_insert(position);
        }

        Self { by_concept, by_id }
    }

    /// Positions of the operations satisfying `concept`, in document order.
    pub fn positions(&self, concept: &Iri) -> &[usize] {
        self.by_concept
            .get(concept)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Position of the operation with the given `operationId`.
    pub fn position_of(&self, operation_id: &str) -> Option<usize> {
        self.by_id.get(operation_id).copied()
    }

    /// All indexed concepts.
    pub fn concepts(&self) -> impl Iterator<Item = &Iri> {
        self.by_concept.keys()
    }
}

/// Result of a concept lookup: zero or more operations, in document order.
///
/// Whether an empty result is fatal is the caller's decision; see
/// [`Operations::get_or_err`].
#[derive(Debug, Clone)]
pub struct Operations<'a> {
    concept: Iri,
    matches: Vec<&'a OperationDescriptor>,
}

impl<'a> Operations<'a> {
    pub(crate) fn new(concept: Iri, matches: Vec<&'a OperationDescriptor>) -> Self {
        Self { concept, matches }
    }

    pub fn concept(&self) -> &Iri {
        &self.concept
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// The canonical (first declared) match.
    pub fn first(&self) -> Option<&'a OperationDescriptor> {
        self.matches.first().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a OperationDescriptor> + '_ {
        self.matches.iter().copied()
    }

    /// The canonical match, or `NoMatchingOperation` when there is none.
    pub fn get_or_err(&self) -> Result<&'a OperationDescriptor, HypermediaError> {
        self.first().ok_or_else(|| HypermediaError::NoMatchingOperation {
            concept: self.concept.clone(),
        })
    }
}

impl<'a> IntoIterator for Operations<'a> {
    type Item = &'a OperationDescriptor;
    type IntoIter = std::vec::IntoIter<&'a OperationDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HttpMethod;

    fn op(id: &str, concepts: &[&str]) -> OperationDescriptor {
        OperationDescriptor {
            id: id.into(),
            method: HttpMethod::Get,
            url_template: format!("/{id}"),
            concepts: concepts.iter().map(|c| Iri::from(*c)).collect(),
            parameters: vec![],
            response: None,
            links: vec![],
        }
    }

    #[test]
    fn many_to_many_lookup_keeps_document_order() {
        let ops = vec![
            op("getUser", &["user"]),
            op("listUsers", &["users"]),
            op("getUserLegacy", &["user", "legacyUser"]),
        ];
        let index = OperationIndex::build(&ops);

        assert_eq!(index.positions(&Iri::from("user")), &[0, 2]);
        assert_eq!(index.positions(&Iri::from("legacyUser")), &[2]);
        assert!(index.positions(&Iri::from("unknown")).is_empty());
    }

    #[test]
    fn duplicate_concepts_on_one_operation_are_indexed_once() {
        let ops = vec![op("getUser", &["user", "user"])];
        let index = OperationIndex::build(&ops);
        assert_eq!(index.positions(&Iri::from("user")), &[0]);
    }

    #[test]
    fn first_operation_id_wins() {
        let ops = vec![op("getUser", &["a"]), op("getUser", &["b"])];
        let index = OperationIndex::build(&ops);
        assert_eq!(index.position_of("getUser"), Some(0));
        assert_eq!(index.position_of("nope"), None);
    }

    #[test]
    fn empty_result_is_only_fatal_on_request() {
        let empty = Operations::new(Iri::from("user"), vec![]);
        assert!(empty.is_empty());
        assert!(empty.first().is_none());
        assert!(matches!(
            empty.get_or_err(),
            Err(HypermediaError::NoMatchingOperation { concept }) if concept.as_str() == "user"
        ));
    }
}
