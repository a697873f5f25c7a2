//! Resource document loading from various sources.
//!
//! Handles loading documents from files, strings, and HTTP URLs, in JSON or
//! YAML form.

use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde_json::Value;

use crate::document::ResourceDocument;
use crate::error::LoadError;

/// Default timeout for document requests (10 seconds).
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Serialization format of a document's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
    /// JSON if the text starts with `{` or `[`, YAML otherwise.
    Detect,
}

impl DocumentFormat {
    /// Guess the format from a file name or URL path.
    pub fn from_extension(name: &str) -> Self {
        let name = name.split(['?', '#']).next().unwrap_or(name);
        if name.ends_with(".yml") || name.ends_with(".yaml") {
            DocumentFormat::Yaml
        } else if name.ends_with(".json") {
            DocumentFormat::Json
        } else {
            DocumentFormat::Detect
        }
    }

    fn from_content_type(content_type: &str) -> Option<Self> {
        if content_type.contains("yaml") {
            Some(DocumentFormat::Yaml)
        } else if content_type.contains("json") {
            Some(DocumentFormat::Json)
        } else {
            None
        }
    }
}

/// Parse document text into a JSON value.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` or `LoadError::InvalidYaml`.
pub fn parse_document_text(content: &str, format: DocumentFormat) -> Result<Value, LoadError> {
    let format = match format {
        DocumentFormat::Detect => {
            let trimmed = content.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                DocumentFormat::Json
            } else {
                DocumentFormat::Yaml
            }
        }
        other => other,
    };
    match format {
        DocumentFormat::Yaml => {
            serde_yaml::from_str(content).map_err(|source| LoadError::InvalidYaml { source })
        }
        _ => serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source }),
    }
}

/// Load a raw document value from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or a parse error if the file isn't valid JSON/YAML.
pub fn load_value(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    parse_document_text(
        &content,
        DocumentFormat::from_extension(&path.to_string_lossy()),
    )
}

/// Load and index a document from a file path.
pub fn load_document(path: &Path) -> Result<ResourceDocument, LoadError> {
    ResourceDocument::from_value(load_value(path)?)
}

/// Load and index a document from a JSON or YAML string.
pub fn load_document_str(content: &str) -> Result<ResourceDocument, LoadError> {
    ResourceDocument::from_value(parse_document_text(content, DocumentFormat::Detect)?)
}

/// Fetch a raw document value over HTTP(S).
///
/// The format follows the response `Content-Type`, then the URL extension.
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails,
/// `LoadError::HttpStatus` for a non-2xx response, or a parse error.
pub async fn load_value_url(url: &str) -> Result<Value, LoadError> {
    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    // Check for HTTP errors before parsing
    let status = response.status();
    if !status.is_success() {
        return Err(LoadError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let format = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(DocumentFormat::from_content_type)
        .unwrap_or_else(|| DocumentFormat::from_extension(url));

    let text = response
        .text()
        .await
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    parse_document_text(&text, format)
}

/// Fetch and index a document over HTTP(S).
///
/// Relative server URLs in the document resolve against `url`.
pub async fn load_document_url(url: &str) -> Result<ResourceDocument, LoadError> {
    let source = Url::parse(url).map_err(|e| LoadError::InvalidUrl {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    let raw = load_value_url(url).await?;
    let document = ResourceDocument::from_value_at(raw, Some(&source))?;
    tracing::info!(
        url,
        operations = document.operations().len(),
        "resource document loaded"
    );
    Ok(document)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a document from a file path or URL.
///
/// Automatically detects whether the source is a URL or file path.
pub async fn load_document_auto(source: &str) -> Result<ResourceDocument, LoadError> {
    if is_url(source) {
        load_document_url(source).await
    } else {
        load_document(Path::new(source))
    }
}

/// Navigate a JSON Pointer fragment (e.g., "#/components/schemas/User").
///
/// Returns the value at the given JSON Pointer path within the document.
/// The fragment should start with '#'.
pub fn navigate_fragment(document: &Value, fragment: &str) -> Result<Value, LoadError> {
    // Remove leading # and split by /
    let path = fragment.trim_start_matches('#').trim_start_matches('/');
    if path.is_empty() {
        return Ok(document.clone());
    }

    let mut current = document;
    for part in path.split('/') {
        // Unescape JSON Pointer encoding (~1 = /, ~0 = ~)
        let key = part.replace("~1", "/").replace("~0", "~");
        current = match current {
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            other => other.get(&key),
        }
        .ok_or_else(|| LoadError::BrokenRef {
            path: String::new(),
            reference: fragment.to_string(),
        })?;
    }
    Ok(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_JSON: &str = r#"{"paths": {"/users": {"get": {"operationId": "listUsers"}}}}"#;

    const MINIMAL_YAML: &str = "
paths:
  /users:
    get:
      operationId: listUsers
";

    #[test]
    fn load_document_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{MINIMAL_JSON}").unwrap();

        let doc = load_document(file.path()).unwrap();
        assert_eq!(doc.operations()[0].id, "listUsers");
    }

    #[test]
    fn load_document_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        write!(file, "{MINIMAL_YAML}").unwrap();

        let doc = load_document(file.path()).unwrap();
        assert_eq!(doc.operations()[0].id, "listUsers");
    }

    #[test]
    fn load_document_file_not_found() {
        let result = load_document(Path::new("/nonexistent/openapi.json"));
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    #[test]
    fn load_document_invalid_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, "not valid json").unwrap();

        let result = load_document(file.path());
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }

    #[test]
    fn load_document_str_detects_format() {
        assert_eq!(load_document_str(MINIMAL_JSON).unwrap().operations().len(), 1);
        assert_eq!(load_document_str(MINIMAL_YAML).unwrap().operations().len(), 1);
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(DocumentFormat::from_extension("openapi.yml"), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_extension("http://x/openapi.yaml?v=2"), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_extension("openapi.json"), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_extension("openapi"), DocumentFormat::Detect);
    }

    #[test]
    fn is_url_schemes() {
        assert!(is_url("https://example.com/openapi.json"));
        assert!(is_url("http://localhost:3000/openapi.json"));
        assert!(!is_url("/path/to/openapi.json"));
        assert!(!is_url("openapi.json"));
    }

    #[test]
    fn navigate_fragment_objects_and_arrays() {
        let doc = json!({ "servers": [{ "url": "http://a" }], "a/b": { "c~d": 1 } });
        assert_eq!(navigate_fragment(&doc, "#/servers/0/url").unwrap(), json!("http://a"));
        assert_eq!(navigate_fragment(&doc, "#/a~1b/c~0d").unwrap(), json!(1));
        assert_eq!(navigate_fragment(&doc, "#").unwrap(), doc);
        assert!(matches!(
            navigate_fragment(&doc, "#/missing"),
            Err(LoadError::BrokenRef { .. })
        ));
    }

    #[tokio::test]
    async fn load_document_url_rejects_error_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/openapi.json")
            .with_status(500)
            .create_async()
            .await;

        let result = load_document_url(&format!("{}/openapi.json", server.url())).await;
        assert!(matches!(result, Err(LoadError::HttpStatus { status: 500, .. })));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn load_document_url_follows_content_type() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/openapi")
            .with_status(200)
            .with_header("content-type", "application/yaml")
            .with_body(MINIMAL_YAML)
            .create_async()
            .await;

        let doc = load_document_url(&format!("{}/openapi", server.url()))
            .await
            .unwrap();
        assert_eq!(doc.operations()[0].id, "listUsers");
        // no servers entry: invoke against the document's origin
        assert_eq!(doc.base_url().unwrap().as_str(), format!("{}/", server.url()));
    }

    #[tokio::test]
    async fn load_document_url_unreachable() {
        let result = load_document_url("http://127.0.0.1:9/openapi.json").await;
        assert!(matches!(result, Err(LoadError::NetworkError { .. })));
    }
}
