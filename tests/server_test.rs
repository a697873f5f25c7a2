//! The same client code against every revision of the reference backend.

#![cfg(feature = "server")]

use evolvable_api::server::{serve_on, ApiVersion, ServerConfig, UserStore};
use evolvable_api::users::{profile_mapping, GIVEN_NAME};
use evolvable_api::{project, HypermediaError, Iri, UserService};
use serde_json::json;
use tokio::net::TcpListener;

/// Serve `version` on an ephemeral port; returns the document URL.
async fn spawn(version: ApiVersion) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ServerConfig {
        version,
        ..ServerConfig::default()
    };
    tokio::spawn(async move {
        serve_on(listener, UserStore::seeded().unwrap(), &config)
            .await
            .unwrap();
    });
    format!("http://{}{}", addr, version.document_route())
}

async fn service(version: ApiVersion) -> UserService {
    UserService::for_api_at_url(&spawn(version).await).await.unwrap()
}

#[tokio::test]
async fn every_revision_resolves_the_same_user() {
    for version in [ApiVersion::V1, ApiVersion::V2, ApiVersion::V3] {
        let users = service(version).await;
        let user = users.get_user_info(7).await.unwrap();
        assert_eq!(
            user.get_one_value(&Iri::from(GIVEN_NAME)).unwrap(),
            &json!("Barbara"),
            "{version}"
        );
    }
}

#[tokio::test]
async fn every_revision_lists_users() {
    for version in [ApiVersion::V1, ApiVersion::V2, ApiVersion::V3] {
        let users = service(version).await;
        let listed = users.list_users().await.unwrap();
        assert_eq!(listed.len(), 5, "{version}");

        let card = project(&listed[0], &profile_mapping()).await.unwrap();
        assert_eq!(card.text("firstName"), "Ada", "{version}");
        assert_eq!(card.text("createdAt"), "2023-01-10T09:30:00Z", "{version}");
    }
}

#[tokio::test]
async fn v2_withholds_creation_date_of_single_user() {
    let users = service(ApiVersion::V2).await;
    let user = users.get_user_info(1).await.unwrap();

    let card = project(&user, &profile_mapping()).await.unwrap();
    assert_eq!(card.text("firstName"), "Ada");
    assert_eq!(card.missing, vec!["createdAt".to_string()]);
}

#[tokio::test]
async fn unknown_user_is_not_found_everywhere() {
    for version in [ApiVersion::V1, ApiVersion::V2, ApiVersion::V3] {
        let users = service(version).await;
        let err = users.get_user_info(999).await.unwrap_err();
        assert!(err.is_not_found(), "{version}: {err}");
    }
}

#[tokio::test]
async fn only_v3_offers_deletion() {
    for version in [ApiVersion::V1, ApiVersion::V2] {
        let users = service(version).await;
        let user = users.get_user_info(7).await.unwrap();
        assert!(!users.can_delete(&user), "{version}");
        assert!(matches!(
            users.delete_user(&user).await,
            Err(HypermediaError::NoMatchingOperation { .. })
        ));
    }
}

#[tokio::test]
async fn v3_delete_through_relation() {
    let users = service(ApiVersion::V3).await;
    let user = users.get_user_info(7).await.unwrap();
    assert!(users.can_delete(&user));

    users.delete_user(&user).await.unwrap();

    let err = users.get_user_info(7).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(users.list_users().await.unwrap().len(), 4);

    // the stale representation still offers the relation; the server refuses
    let err = users.delete_user(&user).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}
