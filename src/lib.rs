//! Evolvable API
//!
//! Runtime resolution of semantically annotated API operations.
//!
//! Clients name what they need with vocabulary URIs (a concept such as
//! `http://myVoc.org/vocab#user`, a property such as
//! `https://schema.org/givenName`, a relation such as
//! `http://myVoc.org/#rel/delete`). The server's resource document maps those
//! URIs to concrete routes, parameters and field names, so the server can
//! rename fields, move identifiers between path and query, or turn a route
//! into an embedded relation without breaking clients.
//!
//! # Example
//!
//! ```
//! use evolvable_api::{Parameters, ResourceDocument};
//! use serde_json::json;
//!
//! let document = ResourceDocument::from_value(json!({
//!     "servers": [{ "url": "http://localhost:3000" }],
//!     "paths": {
//!         "/users/{id}": {
//!             "get": {
//!                 "operationId": "getUser",
//!                 "parameters": [{
//!                     "name": "id", "in": "path", "required": true,
//!                     "schema": { "x-@id": "https://schema.org/identifier" }
//!                 }],
//!                 "responses": { "200": { "content": { "application/json": {
//!                     "schema": { "type": "object", "x-@id": "http://myVoc.org/vocab#user" }
//!                 } } } }
//!             }
//!         }
//!     }
//! }))
//! .unwrap();
//!
//! let operations = document.find_operations("http://myVoc.org/vocab#user");
//! let get_user = operations.first().unwrap();
//!
//! let params = Parameters::new().with("https://schema.org/identifier", 7);
//! let request = get_user.build_request(&params).unwrap();
//! assert_eq!(request.path, "/users/7");
//! ```
//!
//! # Vocabulary annotations
//!
//! | Annotation | Where | Meaning |
//! |------------|-------|---------|
//! | `x-@id` | operation, response schema | concept the operation satisfies |
//! | `x-@id` | schema property | property URI of that field |
//! | `x-@id` | parameter or its schema | property URI the parameter is bound from |
//! | `x-@relation` | response link | relation URI the link offers |
//!
//! Representations advertise relations that apply to them right now in an
//! embedded `_links` member; see [`SemanticResource::get_relation`].

mod client;
mod document;
mod error;
mod index;
mod invoker;
mod linter;
mod loader;
mod operation;
mod projector;
mod resource;
mod types;
mod validator;

pub mod users;

#[cfg(feature = "server")]
pub mod server;

pub use client::HypermediaClient;
pub use document::ResourceDocument;
pub use error::{ConfigError, HypermediaError, LoadError, ShapeError};
pub use index::{OperationIndex, Operations};
pub use invoker::{InvokerOptions, OperationInvoker};
pub use linter::{lint, lint_document, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use loader::{
    is_url, load_document, load_document_auto, load_document_str, load_document_url, load_value,
    load_value_url, navigate_fragment, parse_document_text, DocumentFormat,
};
pub use operation::{
    evaluate_expression, template_slots, LinkDescriptor, OperationDescriptor, ParameterBinding,
    Parameters, PropertyBinding, RequestPlan, ResponseShape,
};
pub use projector::{
    project, FieldMapping, FieldProjector, Projection, ProjectionState, SemanticSource,
};
pub use resource::{Relation, RelationDescriptor, SemanticResource};
pub use types::{
    HttpMethod, Iri, ParameterLocation, EMBEDDED_LINKS, SEMANTIC_ID, SEMANTIC_RELATION,
};
pub use users::UserService;
pub use validator::validate_representation;
