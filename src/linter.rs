//! Document linting - static analysis of semantically annotated API documents.
//!
//! Validates document files for:
//! - JSON/YAML syntax errors
//! - Broken `$ref` references
//! - Path templates, parameters and links that cannot be invoked
//! - Missing or malformed semantic annotations

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::document::{escape_pointer, inline_refs};
use crate::loader::{load_value, navigate_fragment};
use crate::operation::template_slots;
use crate::types::{json_type_name, OPERATION_METHODS, SEMANTIC_ID, SEMANTIC_RELATION};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON path to the issue (e.g., "/paths/~1users~1{id}/get")
    pub path: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

impl FileStatus {
    fn from_diagnostics(diagnostics: &[Diagnostic]) -> Self {
        if diagnostics.iter().any(|d| d.severity == Severity::Error) {
            FileStatus::Error
        } else if diagnostics.iter().any(|d| d.severity == Severity::Warning) {
            FileStatus::Warning
        } else {
            FileStatus::Ok
        }
    }
}

/// Result of linting a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a file or directory.
///
/// If path is a directory, recursively finds all .json, .yml and .yaml files.
/// If `strict` is true, warnings are treated as errors.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let files = collect_document_files(path);
    let mut results = Vec::new();
    let mut total_errors = 0;
    let mut total_warnings = 0;

    for file in &files {
        let file_result = lint_file(file, path);
        total_errors += file_result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        total_warnings += file_result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count();
        results.push(file_result);
    }

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors: total_errors,
        warnings: total_warnings,
        results,
    }
}

/// Lint a single document file.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let display = match file.strip_prefix(base_path) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative.to_path_buf(),
        _ => file.to_path_buf(),
    };
    let diagnostics = match load_value(file) {
        Ok(document) => lint_document(&document, file),
        Err(e) => vec![Diagnostic {
            severity: Severity::Error,
            code: "E001".to_string(),
            file: file.to_path_buf(),
            path: "/".to_string(),
            message: format!("syntax error: {}", e),
        }],
    };

    FileResult {
        file: display,
        status: FileStatus::from_diagnostics(&diagnostics),
        diagnostics,
    }
}

/// Lint an already parsed document. `file` is only used for reporting.
pub fn lint_document(document: &Value, file: &Path) -> Vec<Diagnostic> {
    let mut lint = Linter {
        file,
        root: document,
        diagnostics: Vec::new(),
    };
    lint.check_refs(document, "");
    lint.check_annotations(document, "");
    lint.check_paths();
    lint.diagnostics
}

struct Linter<'a> {
    file: &'a Path,
    root: &'a Value,
    diagnostics: Vec<Diagnostic>,
}

impl Linter<'_> {
    fn report(&mut self, severity: Severity, code: &str, path: &str, message: String) {
        self.diagnostics.push(Diagnostic {
            severity,
            code: code.to_string(),
            file: self.file.to_path_buf(),
            path: path.to_string(),
            message,
        });
    }

    /// Recursively check `$ref` values.
    fn check_refs(&mut self, value: &Value, path: &str) {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    if !reference.starts_with('#') {
                        self.report(
                            Severity::Error,
                            "E002",
                            path,
                            format!("external reference not supported: {}", reference),
                        );
                    } else if reference != "#" && navigate_fragment(self.root, reference).is_err() {
                        self.report(
                            Severity::Error,
                            "E003",
                            path,
                            format!("anchor not found: {}", reference),
                        );
                    }
                }
                for (key, val) in map {
                    let child_path = format!("{}/{}", path, escape_pointer(key));
                    self.check_refs(val, &child_path);
                }
            }
            Value::Array(arr) => {
                for (i, item) in arr.iter().enumerate() {
                    self.check_refs(item, &format!("{}/{}", path, i));
                }
            }
            _ => {}
        }
    }

    /// Semantic annotations must be strings (`x-@id` may also be a string
    /// array on operations).
    fn check_annotations(&mut self, value: &Value, path: &str) {
        match value {
            Value::Object(map) => {
                for key in [SEMANTIC_ID, SEMANTIC_RELATION] {
                    let Some(annotation) = map.get(key) else {
                        continue;
                    };
                    let valid = match annotation {
                        Value::String(s) => !s.is_empty(),
                        Value::Array(items) => key == SEMANTIC_ID && items.iter().all(Value::is_string),
                        _ => false,
                    };
                    if !valid {
                        self.report(
                            Severity::Error,
                            "E007",
                            &format!("{}/{}", path, escape_pointer(key)),
                            format!(
                                "invalid {} value: expected a non-empty URI string, got {}",
                                key,
                                json_type_name(annotation)
                            ),
                        );
                    }
                }
                for (key, val) in map {
                    self.check_annotations(val, &format!("{}/{}", path, escape_pointer(key)));
                }
            }
            Value::Array(arr) => {
                for (i, item) in arr.iter().enumerate() {
                    self.check_annotations(item, &format!("{}/{}", path, i));
                }
            }
            _ => {}
        }
    }

    fn check_paths(&mut self) {
        let root = self.root;
        let Some(paths) = root.get("paths").and_then(Value::as_object) else {
            self.report(
                Severity::Error,
                "E008",
                "/paths",
                "document has no paths object".to_string(),
            );
            return;
        };

        let mut operation_ids: HashMap<String, String> = HashMap::new();
        let mut links: Vec<(String, String)> = Vec::new();

        for (template, item) in paths {
            let item_path = format!("/paths/{}", escape_pointer(template));
            let Ok(item) = inline_refs(root, item, &item_path, &mut Vec::new()) else {
                // already reported by check_refs
                continue;
            };
            let shared = item.get("parameters").and_then(Value::as_array);

            for method in OPERATION_METHODS {
                let Some(op) = item.get(*method) else {
                    continue;
                };
                let op_path = format!("{}/{}", item_path, method);

                if let Some(id) = op.get("operationId").and_then(Value::as_str) {
                    if let Some(first) = operation_ids.get(id) {
                        self.report(
                            Severity::Error,
                            "E006",
                            &format!("{}/operationId", op_path),
                            format!("duplicate operationId \"{}\" (first declared at {})", id, first),
                        );
                    } else {
                        operation_ids.insert(id.to_string(), op_path.clone());
                    }
                }

                let params: Vec<&Value> = shared
                    .into_iter()
                    .flatten()
                    .chain(op.get("parameters").and_then(Value::as_array).into_iter().flatten())
                    .collect();
                self.check_parameters(template, &params, &op_path);

                if !exposes_concept(op) {
                    self.report(
                        Severity::Warning,
                        "W001",
                        &op_path,
                        "operation exposes no concept: it can only be reached by operationId"
                            .to_string(),
                    );
                }

                for (status, response) in op
                    .get("responses")
                    .and_then(Value::as_object)
                    .into_iter()
                    .flatten()
                {
                    for (name, link) in response
                        .get("links")
                        .and_then(Value::as_object)
                        .into_iter()
                        .flatten()
                    {
                        if let Some(target) = link.get("operationId").and_then(Value::as_str) {
                            links.push((
                                format!(
                                    "{}/responses/{}/links/{}",
                                    op_path,
                                    escape_pointer(status),
                                    escape_pointer(name)
                                ),
                                target.to_string(),
                            ));
                        }
                    }
                }
            }
        }

        for (path, target) in links {
            if !operation_ids.contains_key(&target) {
                self.report(
                    Severity::Error,
                    "E005",
                    &path,
                    format!("link targets unknown operationId \"{}\"", target),
                );
            }
        }
    }

    fn check_parameters(&mut self, template: &str, params: &[&Value], op_path: &str) {
        let path_params: Vec<&str> = params
            .iter()
            .filter(|p| p.get("in").and_then(Value::as_str) == Some("path"))
            .filter_map(|p| p.get("name").and_then(Value::as_str))
            .collect();
        let slots = template_slots(template);

        for slot in &slots {
            if !path_params.contains(slot) {
                self.report(
                    Severity::Error,
                    "E004",
                    op_path,
                    format!("path slot {{{}}} has no path parameter", slot),
                );
            }
        }
        for name in &path_params {
            if !slots.contains(name) {
                self.report(
                    Severity::Warning,
                    "W003",
                    op_path,
                    format!("path parameter \"{}\" does not appear in {}", name, template),
                );
            }
        }

        for param in params {
            let has_id = param.get(SEMANTIC_ID).is_some()
                || param.get("schema").and_then(|s| s.get(SEMANTIC_ID)).is_some();
            if !has_id {
                let name = param.get("name").and_then(Value::as_str).unwrap_or("?");
                self.report(
                    Severity::Warning,
                    "W002",
                    op_path,
                    format!("parameter \"{}\" has no semantic URI; callers must use its literal name", name),
                );
            }
        }
    }
}

fn exposes_concept(op: &Value) -> bool {
    if op.get(SEMANTIC_ID).is_some() {
        return true;
    }
    op.get("responses")
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
        .filter(|(status, _)| status.starts_with('2'))
        .filter_map(|(_, r)| r.get("content").and_then(Value::as_object))
        .flat_map(|content| content.values())
        .any(|media| media.get("schema").and_then(|s| s.get(SEMANTIC_ID)).is_some())
}

/// Collect all document files in a path (file or directory).
fn collect_document_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if is_document_file(path) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn is_document_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "json" || e == "yml" || e == "yaml")
        .unwrap_or(false)
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if is_document_file(&path) {
            files.push(path);
        }
    }
}
