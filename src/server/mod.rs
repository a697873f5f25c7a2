//! Reference backend serving the three revisions of the user API.
//!
//! Every revision exposes the same directory with a different wire shape,
//! so clients written against the vocabulary can be exercised against all
//! of them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod store;

use std::sync::Arc;

use axum::{
    routing::{delete, get},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{ApiVersion, ServerConfig};
pub use error::{AppError, ServerError};
pub use handlers::AppState;
pub use store::{StoreError, User, UserStore};

/// Build the application router for `state.version`.
pub fn build_router(state: AppState) -> Router {
    let version = state.version;
    let router = Router::new()
        .route(version.document_route(), get(handlers::document))
        .route("/users", get(handlers::list_users));

    let router = match version {
        ApiVersion::V1 => router
            .route("/users/{id}", get(handlers::get_user_by_path))
            .route("/user", delete(handlers::delete_user)),
        ApiVersion::V2 => router.route("/user/{id}", get(handlers::get_user_by_path)),
        ApiVersion::V3 => router.route(
            "/user",
            get(handlers::get_user_by_query).delete(handlers::delete_user),
        ),
    };

    let cors = match version {
        ApiVersion::V3 => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        ApiVersion::V1 | ApiVersion::V2 => CorsLayer::new().allow_origin(Any).allow_methods(Any),
    };

    router
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve on an already bound listener until the process stops.
pub async fn serve_on(
    listener: TcpListener,
    store: UserStore,
    config: &ServerConfig,
) -> Result<(), ServerError> {
    let local = listener.local_addr().map_err(ServerError::Serve)?;
    let state = AppState {
        store: Arc::new(store),
        version: config.version,
        public_url: Arc::from(config.public_url_for(local)),
    };
    tracing::info!(
        version = %config.version,
        addr = %local,
        document = %format!("{}{}", state.public_url, config.version.document_route()),
        "serving user API"
    );

    axum::serve(listener, build_router(state))
        .await
        .map_err(ServerError::Serve)
}

/// Load the configured store, bind and serve.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let store = match &config.data {
        Some(path) => {
            tracing::info!(path = %path.display(), "store: JSON file");
            UserStore::load(path)?
        }
        None => {
            tracing::info!("store: bundled seed data (removals will not survive restart)");
            UserStore::seeded()?
        }
    };

    let listener = TcpListener::bind(config.bind)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind,
            source,
        })?;
    serve_on(listener, store, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(version: ApiVersion) -> Router {
        build_router(AppState {
            store: Arc::new(UserStore::seeded().unwrap()),
            version,
            public_url: Arc::from("http://127.0.0.1:3000"),
        })
    }

    async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, String) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn v1_routes() {
        let (status, body) = send(app(ApiVersion::V1), "GET", "/users/7").await;
        assert_eq!(status, StatusCode::OK);
        let user: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(user["firstName"], "Barbara");
        assert!(user.get("createdAt").is_some());

        let (status, _) = send(app(ApiVersion::V1), "GET", "/user?id=7").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn v1_document_is_json_with_rewritten_server() {
        let (status, body) = send(app(ApiVersion::V1), "GET", "/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        let doc: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["servers"][0]["url"], "http://127.0.0.1:3000");
    }

    #[tokio::test]
    async fn v2_document_is_yaml() {
        let (status, body) = send(app(ApiVersion::V2), "GET", "/openapi.yml").await;
        assert_eq!(status, StatusCode::OK);
        let doc: Value = serde_yaml::from_str(&body).unwrap();
        assert_eq!(doc["info"]["version"], "2.0.0");

        let (status, _) = send(app(ApiVersion::V2), "GET", "/openapi.json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn v3_single_user_embeds_delete() {
        let (status, body) = send(app(ApiVersion::V3), "GET", "/user?id=7").await;
        assert_eq!(status, StatusCode::OK);
        let user: Value = serde_json::from_str(&body).unwrap();
        assert!(user.get("created_at").is_some());
        assert!(user["_links"].get("delete").is_some());
    }

    #[tokio::test]
    async fn unknown_user_is_404_with_error_body() {
        for (version, uri) in [
            (ApiVersion::V1, "/users/999"),
            (ApiVersion::V2, "/user/999"),
            (ApiVersion::V3, "/user?id=999"),
        ] {
            let (status, body) = send(app(version), "GET", uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{version}");
            assert_eq!(body, r#"{"error":"user not found"}"#);
        }
    }

    #[tokio::test]
    async fn delete_then_delete_again() {
        let app = app(ApiVersion::V3);

        let (status, body) = send(app.clone(), "DELETE", "/user?id=7").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());

        let (status, _) = send(app.clone(), "DELETE", "/user?id=7").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(app, "GET", "/user?id=7").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn v3_preflight_allows_custom_headers() {
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/user?id=7")
            .header("origin", "http://localhost:5173")
            .header("access-control-request-method", "DELETE")
            .header("access-control-request-headers", "x-requested-with")
            .body(Body::empty())
            .unwrap();
        let resp = app(ApiVersion::V3).oneshot(req).await.unwrap();
        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers()
                .get("access-control-allow-headers")
                .unwrap()
                .to_str()
                .unwrap(),
            "*"
        );
    }
}
