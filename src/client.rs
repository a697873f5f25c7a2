//! Client façade: one loaded document, one invoker.

use std::sync::Arc;

use crate::document::ResourceDocument;
use crate::error::HypermediaError;
use crate::index::Operations;
use crate::invoker::{InvokerOptions, OperationInvoker};
use crate::loader::load_document_url;
use crate::operation::Parameters;
use crate::resource::SemanticResource;
use crate::types::Iri;

/// Resolves semantic needs against an API's resource document.
#[derive(Debug, Clone)]
pub struct HypermediaClient {
    invoker: OperationInvoker,
}

impl HypermediaClient {
    /// Load the document at `url` and build a client for it.
    ///
    /// # Errors
    ///
    /// Returns `HypermediaError::DocumentLoad` if the document cannot be
    /// fetched or parsed; the client is unusable without it.
    pub async fn for_api_at_url(url: &str) -> Result<Self, HypermediaError> {
        Self::for_api_at_url_with(url, InvokerOptions::default()).await
    }

    pub async fn for_api_at_url_with(
        url: &str,
        options: InvokerOptions,
    ) -> Result<Self, HypermediaError> {
        let document = load_document_url(url).await.map_err(|e| {
            tracing::error!(url, error = %e, "cannot load resource document");
            e
        })?;
        Self::from_document(document, options)
    }

    /// Build a client for an already loaded document.
    pub fn from_document(
        document: ResourceDocument,
        options: InvokerOptions,
    ) -> Result<Self, HypermediaError> {
        let invoker = OperationInvoker::with_options(Arc::new(document), options)?;
        Ok(Self { invoker })
    }

    pub fn document(&self) -> &ResourceDocument {
        self.invoker.document()
    }

    pub fn invoker(&self) -> &OperationInvoker {
        &self.invoker
    }

    /// Operations satisfying `concept`. Empty if unmatched.
    pub fn find_operations(&self, concept: impl Into<Iri>) -> Operations<'_> {
        self.document().find_operations(concept)
    }

    /// Invoke the canonical operation for `concept`.
    ///
    /// # Errors
    ///
    /// Returns `NoMatchingOperation` when the document offers none.
    pub async fn invoke_concept(
        &self,
        concept: impl Into<Iri>,
        params: &Parameters,
    ) -> Result<SemanticResource, HypermediaError> {
        let operations = self.find_operations(concept);
        let operation = operations.get_or_err()?;
        self.invoker.invoke(operation, params).await
    }

    /// Invoke a relation offered by `resource`.
    pub async fn follow(
        &self,
        resource: &SemanticResource,
        relation: impl Into<Iri>,
        params: &Parameters,
    ) -> Result<SemanticResource, HypermediaError> {
        self.invoker.follow(resource, &relation.into(), params).await
    }

    /// Members of a collection resource.
    pub fn members(&self, resource: &SemanticResource) -> Vec<SemanticResource> {
        resource.members(self.document())
    }
}
