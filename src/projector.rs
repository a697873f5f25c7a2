//! Field projection: semantic property URIs onto caller-chosen display keys.
//!
//! Resolution is asynchronous. Every mapped property is requested at once and
//! joined before a result is committed. A [`FieldProjector`] holds the
//! visible state; assigning a new resource supersedes any resolution still in
//! flight, whose result is then dropped instead of committed.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::error::HypermediaError;
use crate::resource::SemanticResource;
use crate::types::Iri;

/// Anything that can supply the value of a semantic property.
#[async_trait]
pub trait SemanticSource: Send + Sync {
    /// Value of `property`.
    ///
    /// Returns `PropertyNotFound` when the source does not carry it.
    async fn one_value(&self, property: &Iri) -> Result<Value, HypermediaError>;
}

#[async_trait]
impl SemanticSource for SemanticResource {
    async fn one_value(&self, property: &Iri) -> Result<Value, HypermediaError> {
        self.get_one_value(property).cloned()
    }
}

/// Ordered `{local key: property URI}` mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    entries: Vec<(String, Iri)>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `key` to `property`. A repeated key replaces the earlier entry
    /// but keeps its position.
    pub fn field(mut self, key: impl Into<String>, property: impl Into<Iri>) -> Self {
        let key = key.into();
        let property = property.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = property,
            None => self.entries.push((key, property)),
        }
        self
    }

    pub fn entries(&self) -> &[(String, Iri)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, P: Into<Iri>> FromIterator<(K, P)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (K, P)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(FieldMapping::new(), |mapping, (k, p)| mapping.field(k, p))
    }
}

/// Resolved fields, keyed and ordered as the mapping declared them.
///
/// Properties the source does not carry are absent from `fields` and listed
/// in `missing`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub fields: Map<String, Value>,
    pub missing: Vec<String>,
}

impl Projection {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Field as display text: strings verbatim, other values as JSON, and
    /// missing fields as an empty string.
    pub fn text(&self, key: &str) -> String {
        match self.fields.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

/// Resolve every mapped property of `source` concurrently.
///
/// # Errors
///
/// A missing property is recorded as absent, not an error. Any other source
/// failure (e.g. a failed fetch) is returned.
pub async fn project<S>(source: &S, mapping: &FieldMapping) -> Result<Projection, HypermediaError>
where
    S: SemanticSource + ?Sized,
{
    let lookups = mapping
        .entries()
        .iter()
        .map(|(_, property)| source.one_value(property));
    let results = join_all(lookups).await;

    let mut projection = Projection::default();
    for ((key, _), result) in mapping.entries().iter().zip(results) {
        match result {
            Ok(value) => {
                projection.fields.insert(key.clone(), value);
            }
            Err(HypermediaError::PropertyNotFound { .. }) => projection.missing.push(key.clone()),
            Err(e) => return Err(e),
        }
    }
    Ok(projection)
}

/// Caller-visible state of a [`FieldProjector`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionState {
    /// Not yet resolved; renders as a loading indicator.
    Pending,
    Resolved(Projection),
    Failed(String),
}

impl ProjectionState {
    /// Resolved fields, or the empty placeholder while pending or failed.
    pub fn fields(&self) -> Map<String, Value> {
        match self {
            ProjectionState::Resolved(p) => p.fields.clone(),
            _ => Map::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ProjectionState::Pending)
    }
}

/// Holds the projection of the current resource under a fixed mapping.
pub struct FieldProjector {
    mapping: FieldMapping,
    generation: Arc<AtomicU64>,
    state: Arc<watch::Sender<ProjectionState>>,
}

impl FieldProjector {
    pub fn new(mapping: FieldMapping) -> Self {
        let (state, _) = watch::channel(ProjectionState::Pending);
        Self {
            mapping,
            generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(state),
        }
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<ProjectionState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> ProjectionState {
        self.state.borrow().clone()
    }

    /// Make `source` the current resource.
    ///
    /// The state becomes `Pending` immediately, before the returned future is
    /// polled. The future resolves the projection and commits it only if no
    /// later `assign` happened meanwhile; it yields whether it committed.
    /// In-flight lookups of a superseded assignment are not cancelled.
    pub fn assign<S>(&self, source: Arc<S>) -> impl Future<Output = bool> + Send + 'static
    where
        S: SemanticSource + ?Sized + 'static,
    {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(ProjectionState::Pending);

        let generation = Arc::clone(&self.generation);
        let state = Arc::clone(&self.state);
        let mapping = self.mapping.clone();

        async move {
            let outcome = project(source.as_ref(), &mapping).await;
            let mut next = Some(match outcome {
                Ok(projection) => ProjectionState::Resolved(projection),
                Err(e) => ProjectionState::Failed(e.to_string()),
            });
            // generation is compared under the channel lock
            let committed = state.send_if_modified(|current| {
                if generation.load(Ordering::SeqCst) != ticket {
                    return false;
                }
                if let Some(next) = next.take() {
                    *current = next;
                }
                true
            });
            if !committed {
                tracing::debug!(ticket, "stale projection dropped");
            }
            committed
        }
    }
}
