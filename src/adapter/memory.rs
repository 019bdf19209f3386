//! In-process simulated control plane.
//!
//! [`InMemoryAdapter`] keeps the set of existing resources in memory and can
//! be scripted to fail: a queue of errors returned by the next create calls
//! for an identity, or an error returned by every call. It counts calls per
//! identity so callers can assert exactly how often the engine reached out.

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::trace;

use super::{AdapterError, AdapterErrorKind, AdapterResult, ProviderAdapter};
use crate::resource::{ResourceDescriptor, ResourceId};

#[derive(Debug, Default)]
struct State {
    existing: HashSet<ResourceId>,
    scripted: HashMap<ResourceId, VecDeque<AdapterError>>,
    always_fail: HashMap<ResourceId, AdapterError>,
    exists_calls: HashMap<ResourceId, u32>,
    create_calls: HashMap<ResourceId, u32>,
    parameters: HashMap<ResourceId, IndexMap<String, String>>,
}

/// Thread-safe simulated provider.
#[derive(Debug, Default)]
pub struct InMemoryAdapter {
    state: Mutex<State>,
}

impl InMemoryAdapter {
    /// Create an adapter with no existing resources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a resource as already existing.
    pub fn with_existing(self, id: ResourceId) -> Self {
        self.state.lock().existing.insert(id);
        self
    }

    /// Make the next create calls for `id` return these errors, in order,
    /// before succeeding.
    pub fn fail_next_creates(&self, id: ResourceId, errors: impl IntoIterator<Item = AdapterError>) {
        self.state
            .lock()
            .scripted
            .entry(id)
            .or_default()
            .extend(errors);
    }

    /// Make every call for `id` (existence checks included) return `error`.
    pub fn fail_always(&self, id: ResourceId, error: AdapterError) {
        self.state.lock().always_fail.insert(id, error);
    }

    /// Whether a resource currently exists.
    pub fn exists(&self, id: &ResourceId) -> bool {
        self.state.lock().existing.contains(id)
    }

    /// Number of existence checks made for `id`.
    pub fn exists_calls(&self, id: &ResourceId) -> u32 {
        self.state.lock().exists_calls.get(id).copied().unwrap_or(0)
    }

    /// Number of create calls made for `id`.
    pub fn create_calls(&self, id: &ResourceId) -> u32 {
        self.state.lock().create_calls.get(id).copied().unwrap_or(0)
    }

    /// Total number of calls of any kind.
    pub fn total_calls(&self) -> u32 {
        let state = self.state.lock();
        state.exists_calls.values().sum::<u32>() + state.create_calls.values().sum::<u32>()
    }

    /// Parameters a resource was created with.
    pub fn created_with(&self, id: &ResourceId) -> Option<IndexMap<String, String>> {
        self.state.lock().parameters.get(id).cloned()
    }

    fn create(&self, id: ResourceId, params: &IndexMap<String, String>) -> AdapterResult<()> {
        let mut state = self.state.lock();
        *state.create_calls.entry(id.clone()).or_insert(0) += 1;

        if let Some(err) = state.always_fail.get(&id) {
            return Err(err.clone());
        }
        if let Some(err) = state.scripted.get_mut(&id).and_then(VecDeque::pop_front) {
            trace!(resource = %id, error = %err, "Scripted failure");
            return Err(err);
        }
        if state.existing.contains(&id) {
            return Err(AdapterError::new(
                AdapterErrorKind::AlreadyExists,
                format!("{} already exists", id),
            ));
        }

        state.parameters.insert(id.clone(), params.clone());
        state.existing.insert(id);
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for InMemoryAdapter {
    fn name(&self) -> &str {
        "memory"
    }

    async fn resource_exists(&self, descriptor: &ResourceDescriptor) -> AdapterResult<bool> {
        let mut state = self.state.lock();
        let id = descriptor.id();
        *state.exists_calls.entry(id.clone()).or_insert(0) += 1;

        if let Some(err) = state.always_fail.get(id) {
            return Err(err.clone());
        }
        Ok(state.existing.contains(id))
    }

    async fn create_project(
        &self,
        name: &str,
        params: &IndexMap<String, String>,
    ) -> AdapterResult<()> {
        self.create(ResourceId::project(name), params)
    }

    async fn enable_service(&self, name: &str) -> AdapterResult<()> {
        self.create(ResourceId::service(name), &IndexMap::new())
    }

    async fn create_bucket(
        &self,
        name: &str,
        params: &IndexMap<String, String>,
    ) -> AdapterResult<()> {
        self.create(ResourceId::bucket(name), params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_exists() {
        let adapter = InMemoryAdapter::new();
        let bucket = ResourceDescriptor::bucket("b");

        assert!(!adapter.resource_exists(&bucket).await.unwrap());
        adapter.create_bucket("b", &IndexMap::new()).await.unwrap();
        assert!(adapter.resource_exists(&bucket).await.unwrap());

        assert_eq!(adapter.exists_calls(bucket.id()), 2);
        assert_eq!(adapter.create_calls(bucket.id()), 1);
        assert_eq!(adapter.total_calls(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_create_reports_already_exists() {
        let adapter = InMemoryAdapter::new().with_existing(ResourceId::service("s"));
        let err = adapter.enable_service("s").await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn test_scripted_failures_drain_in_order() {
        let adapter = InMemoryAdapter::new();
        let id = ResourceId::project("p");
        adapter.fail_next_creates(
            id.clone(),
            [AdapterError::rate_limited("slow down"), AdapterError::timeout("late")],
        );

        let params = IndexMap::new();
        assert_eq!(
            adapter.create_project("p", &params).await.unwrap_err().kind,
            AdapterErrorKind::RateLimited
        );
        assert_eq!(
            adapter.create_project("p", &params).await.unwrap_err().kind,
            AdapterErrorKind::Timeout
        );
        adapter.create_project("p", &params).await.unwrap();
        assert!(adapter.exists(&id));
    }
}
