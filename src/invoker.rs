//! Executing resolved operations over HTTP.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde_json::Value;

use crate::document::ResourceDocument;
use crate::error::{HypermediaError, LoadError};
use crate::operation::{OperationDescriptor, Parameters, RequestPlan};
use crate::resource::SemanticResource;
use crate::types::Iri;
use crate::validator::validate_representation;

/// Default timeout for operation requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for operation invocation.
#[derive(Debug, Clone)]
pub struct InvokerOptions {
    pub timeout: Duration,
    /// Overrides the server URL declared by the document.
    pub base_url: Option<Url>,
    /// Check each 2xx representation against the declared response schema.
    pub validate_responses: bool,
}

impl Default for InvokerOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            base_url: None,
            validate_responses: false,
        }
    }
}

impl InvokerOptions {
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn validate_responses(mut self, validate: bool) -> Self {
        self.validate_responses = validate;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Executes operation descriptors and wraps the results as semantic resources.
#[derive(Debug, Clone)]
pub struct OperationInvoker {
    client: reqwest::Client,
    document: Arc<ResourceDocument>,
    base_url: Url,
    validate_responses: bool,
}

impl OperationInvoker {
    /// Create an invoker with default options.
    pub fn new(document: Arc<ResourceDocument>) -> Result<Self, LoadError> {
        Self::with_options(document, InvokerOptions::default())
    }

    /// Create an invoker.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidDocument` when neither the options nor the
    /// document provide an absolute base URL.
    pub fn with_options(
        document: Arc<ResourceDocument>,
        options: InvokerOptions,
    ) -> Result<Self, LoadError> {
        let base_url = options
            .base_url
            .or_else(|| document.base_url().cloned())
            .ok_or_else(|| LoadError::InvalidDocument {
                path: "/servers".into(),
                message: "no absolute server URL declared; supply a base URL".into(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|source| LoadError::NetworkError {
                url: base_url.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            document,
            base_url,
            validate_responses: options.validate_responses,
        })
    }

    pub fn document(&self) -> &Arc<ResourceDocument> {
        &self.document
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Invoke `operation` with semantic parameter values.
    ///
    /// Required parameters are checked before any request is sent.
    ///
    /// # Errors
    ///
    /// - `MissingParameter` if a required parameter is absent (no request made)
    /// - `OperationFailed` for transport failures, non-2xx statuses, bodies
    ///   that are not JSON, or (when enabled) shape mismatches
    pub async fn invoke(
        &self,
        operation: &OperationDescriptor,
        params: &Parameters,
    ) -> Result<SemanticResource, HypermediaError> {
        let plan = operation.build_request(params)?;
        let url = self.request_url(&plan);
        let method = plan.method.as_str();
        let failed = |status: Option<u16>, message: String| HypermediaError::OperationFailed {
            method: method.to_string(),
            url: url.clone(),
            status,
            message,
        };

        tracing::info!(operation = operation.id.as_str(), method, url = url.as_str(), "invoking operation");

        let mut request = self
            .client
            .request(plan.method.into(), url.as_str())
            .query(&plan.query);
        for (name, value) in &plan.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &plan.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| failed(None, e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| failed(Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(operation = operation.id.as_str(), status = status.as_u16(), "operation failed");
            return Err(failed(Some(status.as_u16()), error_message(&text, status)));
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| failed(Some(status.as_u16()), format!("invalid JSON body: {e}")))?
        };

        if self.validate_responses && !body.is_null() {
            if let Some(shape) = &operation.response {
                validate_representation(&shape.schema, &body).map_err(|errors| {
                    let detail: Vec<String> = errors.iter().map(ToString::to_string).collect();
                    failed(
                        Some(status.as_u16()),
                        format!("response does not match declared shape: {}", detail.join("; ")),
                    )
                })?;
            }
        }

        Ok(SemanticResource::new(
            body,
            operation.response.as_ref(),
            Some(operation),
            &self.document,
        ))
    }

    /// Invoke the relation `relation` offered by `resource`.
    ///
    /// Values pre-bound by the relation are overridden by `params`.
    ///
    /// # Errors
    ///
    /// Returns `NoMatchingOperation` without any network activity when the
    /// resource does not offer `relation`; otherwise as [`Self::invoke`].
    pub async fn follow(
        &self,
        resource: &SemanticResource,
        relation: &Iri,
        params: &Parameters,
    ) -> Result<SemanticResource, HypermediaError> {
        let descriptor = resource.get_relation(relation).require(relation)?;
        tracing::debug!(relation = %relation, operation = descriptor.operation().id.as_str(), "following relation");
        let params = descriptor.parameters.clone().merged(params);
        self.invoke(descriptor.operation(), &params).await
    }

    fn request_url(&self, plan: &RequestPlan) -> String {
        if plan.path.starts_with("http://") || plan.path.starts_with("https://") {
            return plan.path.clone();
        }
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            plan.path.trim_start_matches('/')
        )
    }
}

/// Best-effort message for a failed response: `{"error": "..."}`, else the
/// body text, else the status reason.
fn error_message(text: &str, status: reqwest::StatusCode) -> String {
    if let Ok(Value::Object(body)) = serde_json::from_str::<Value>(text) {
        if let Some(Value::String(message)) = body.get("error") {
            return message.clone();
        }
    }
    let text = text.trim();
    if text.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        text.to_string()
    }
}
