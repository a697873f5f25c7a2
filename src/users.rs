//! User directory access expressed purely in vocabulary terms.
//!
//! Nothing here names an endpoint or a JSON field: renamed fields, moved
//! identifiers and relocated delete routes are absorbed by the document.

use crate::client::HypermediaClient;
use crate::error::HypermediaError;
use crate::operation::Parameters;
use crate::projector::FieldMapping;
use crate::resource::SemanticResource;
use crate::types::Iri;

/// Concept: a single user.
pub const USER: &str = "http://myVoc.org/vocab#user";
/// Concept: the user collection.
pub const USERS: &str = "http://myVoc.org/vocab#users";
/// Relation: delete this user.
pub const DELETE_RELATION: &str = "http://myVoc.org/#rel/delete";

pub const IDENTIFIER: &str = "https://schema.org/identifier";
pub const GIVEN_NAME: &str = "https://schema.org/givenName";
pub const FAMILY_NAME: &str = "https://schema.org/familyName";
pub const EMAIL: &str = "https://schema.org/email";
pub const ABSTRACT: &str = "https://schema.org/abstract";
pub const DATE_CREATED: &str = "https://schema.org/dateCreated";

/// Display fields of a profile card.
pub fn profile_mapping() -> FieldMapping {
    FieldMapping::new()
        .field("firstName", GIVEN_NAME)
        .field("lastName", FAMILY_NAME)
        .field("email", EMAIL)
        .field("bio", ABSTRACT)
        .field("createdAt", DATE_CREATED)
}

/// User operations over a [`HypermediaClient`].
#[derive(Debug, Clone)]
pub struct UserService {
    client: HypermediaClient,
}

impl UserService {
    pub fn new(client: HypermediaClient) -> Self {
        Self { client }
    }

    /// Load the API document at `url`.
    pub async fn for_api_at_url(url: &str) -> Result<Self, HypermediaError> {
        Ok(Self::new(HypermediaClient::for_api_at_url(url).await?))
    }

    pub fn client(&self) -> &HypermediaClient {
        &self.client
    }

    /// Fetch one user by identifier.
    ///
    /// # Errors
    ///
    /// `NoMatchingOperation` if the API exposes no user concept;
    /// `OperationFailed` (404 for an unknown id) if the fetch fails.
    pub async fn get_user_info(&self, id: u64) -> Result<SemanticResource, HypermediaError> {
        let params = Parameters::new().with(IDENTIFIER, id);
        self.client.invoke_concept(USER, &params).await
    }

    /// Fetch every user. An empty collection is not an error.
    pub async fn list_users(&self) -> Result<Vec<SemanticResource>, HypermediaError> {
        let collection = self.client.invoke_concept(USERS, &Parameters::new()).await?;
        Ok(self.client.members(&collection))
    }

    /// Whether `user` currently offers deletion.
    pub fn can_delete(&self, user: &SemanticResource) -> bool {
        user.is_relation_available(&Iri::from(DELETE_RELATION))
    }

    /// Delete `user` through the relation it embeds.
    ///
    /// # Errors
    ///
    /// `NoMatchingOperation`, without any request, when `user` does not offer
    /// deletion.
    pub async fn delete_user(&self, user: &SemanticResource) -> Result<(), HypermediaError> {
        self.client
            .follow(user, DELETE_RELATION, &Parameters::new())
            .await?;
        Ok(())
    }
}
