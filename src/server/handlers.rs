//! Request handlers for every API revision.
//!
//! Revisions differ only in wire shape; all of them read the same store.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::config::ApiVersion;
use super::error::AppError;
use super::openapi;
use super::store::{User, UserStore};

/// Shared state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<UserStore>,
    pub version: ApiVersion,
    /// Server URL written into the served document.
    pub public_url: Arc<str>,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub id: u64,
}

/// How a user is being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Listed,
    Single,
}

/// `GET /openapi.json` or `GET /openapi.yml`
pub async fn document(State(state): State<AppState>) -> Result<Response, AppError> {
    let document = openapi::document(state.version, &state.public_url)
        .map_err(|e| AppError::Internal(format!("bundled document is invalid: {e}")))?;

    match state.version {
        ApiVersion::V2 => {
            let yaml = serde_yaml::to_string(&document)
                .map_err(|e| AppError::Internal(format!("cannot render document: {e}")))?;
            Ok(([(header::CONTENT_TYPE, "application/yaml")], yaml).into_response())
        }
        ApiVersion::V1 | ApiVersion::V3 => Ok(Json(document).into_response()),
    }
}

/// `GET /users`
pub async fn list_users(State(state): State<AppState>) -> Json<Vec<Value>> {
    let users = state
        .store
        .list()
        .iter()
        .map(|u| representation(u, state.version, View::Listed))
        .collect();
    Json(users)
}

/// `GET /users/{id}` (v1) and `GET /user/{id}` (v2)
pub async fn get_user_by_path(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, AppError> {
    get_user(&state, id)
}

/// `GET /user?id=` (v3)
pub async fn get_user_by_query(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Value>, AppError> {
    get_user(&state, query.id)
}

/// `DELETE /user?id=`
///
/// 204 with an empty body on success, 404 when no such user exists.
pub async fn delete_user(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<StatusCode, AppError> {
    if state.store.remove(query.id).await? {
        tracing::info!(id = query.id, "user deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::user_not_found())
    }
}

fn get_user(state: &AppState, id: u64) -> Result<Json<Value>, AppError> {
    let user = state.store.get(id).ok_or_else(AppError::user_not_found)?;
    Ok(Json(representation(&user, state.version, View::Single)))
}

fn representation(user: &User, version: ApiVersion, view: View) -> Value {
    let Ok(Value::Object(fields)) = serde_json::to_value(user) else {
        return Value::Null;
    };

    let fields: Map<String, Value> = match version {
        ApiVersion::V1 => fields,
        ApiVersion::V2 => fields
            .into_iter()
            .filter(|(key, _)| !(view == View::Single && key == "createdAt"))
            .collect(),
        ApiVersion::V3 => {
            let mut renamed: Map<String, Value> = fields
                .into_iter()
                .map(|(key, value)| {
                    if key == "createdAt" {
                        ("created_at".to_string(), value)
                    } else {
                        (key, value)
                    }
                })
                .collect();
            if view == View::Single {
                renamed.insert("_links".into(), json!({ "delete": {} }));
            }
            renamed
        }
    };
    Value::Object(fields)
}
