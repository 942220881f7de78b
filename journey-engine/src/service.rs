//! Cache-aside journey reads.
//!
//! Every cached operation follows the same path: derive the key, try the
//! cache, and on a miss resolve versions, assemble the response and write it
//! back unless it is empty. Failures degrade to empty responses; no
//! operation returns an error.
//!
//! Distinct requests can share a key (the batch `["A:B"]` and `["A", "B"]`
//! both encode to `journeyId:A:B`), so a hit is only served when it belongs
//! to the request; anything else is treated as a miss.

use std::future::Future;
use std::sync::Arc;

use journey_core::{
    CacheError, Flow, JourneyConfig, JourneyResponse, JourneyResponseList, JourneysResponse,
    ModuleVersionResponse,
};
use journey_storage::{CacheStore, JourneyCacheKey, StorageGateway};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::assembler::ResponseAssembler;
use crate::inflight::SingleFlight;
use crate::resolver::VersionResolver;

/// Journey read service.
///
/// Cheap to clone; clones share storage, cache and the single-flight
/// registry.
///
/// # Example
///
/// ```ignore
/// let service = JourneyService::new(storage, cache, JourneyConfig::from_env()?);
/// let journey = service.get_journey_by_id("J1").await;
/// if journey.is_found() {
///     // ...
/// }
/// ```
pub struct JourneyService<S, C>
where
    S: StorageGateway,
    C: CacheStore,
{
    storage: Arc<S>,
    cache: Arc<C>,
    resolver: VersionResolver<S>,
    inflight: Arc<SingleFlight>,
    config: JourneyConfig,
}

impl<S, C> Clone for JourneyService<S, C>
where
    S: StorageGateway,
    C: CacheStore,
{
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            cache: Arc::clone(&self.cache),
            resolver: self.resolver.clone(),
            inflight: Arc::clone(&self.inflight),
            config: self.config.clone(),
        }
    }
}

impl<S, C> JourneyService<S, C>
where
    S: StorageGateway,
    C: CacheStore,
{
    pub fn new(storage: Arc<S>, cache: Arc<C>, config: JourneyConfig) -> Self {
        let resolver = VersionResolver::new(Arc::clone(&storage), config.active_policy);
        Self {
            storage,
            cache,
            resolver,
            inflight: Arc::new(SingleFlight::new()),
            config,
        }
    }

    pub fn config(&self) -> &JourneyConfig {
        &self.config
    }

    /// Every journey configured for one merchant context.
    #[tracing::instrument(skip(self))]
    pub async fn get_journeys(
        &self,
        merchant_id: &str,
        tenant_id: &str,
        channel_id: &str,
    ) -> JourneysResponse {
        let key = JourneyCacheKey::context(merchant_id, tenant_id, channel_id);
        let context = journey_core::FlowContext::new(merchant_id, tenant_id, channel_id);

        self.cache_aside(key, JourneysResponse::is_empty, |_| true, || async move {
            let flows = match self.storage.find_flows_by_context(&context).await {
                Ok(flows) => flows,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load flows for context");
                    return JourneysResponse::default();
                }
            };
            if flows.is_empty() {
                return JourneysResponse::default();
            }
            let versions = self.resolver.resolve_active_versions(&flows).await;
            if versions.degraded {
                return JourneysResponse::default();
            }
            JourneysResponse {
                journey_responses: ResponseAssembler::assemble_summaries(&flows, &versions),
            }
        })
        .await
    }

    /// Nested view of one journey.
    #[tracing::instrument(skip(self))]
    pub async fn get_journey_by_id(&self, external_id: &str) -> JourneyResponse {
        let key = JourneyCacheKey::nested(external_id);

        let belongs = |r: &JourneyResponse| r.external_id == external_id;
        self.cache_aside(key, JourneyResponse::is_empty, belongs, || async move {
            let Some(flow) = self.load_flow(external_id).await else {
                return JourneyResponse::default();
            };
            let versions = self
                .resolver
                .resolve_active_versions(std::slice::from_ref(&flow))
                .await;
            if versions.degraded {
                return JourneyResponse::default();
            }
            ResponseAssembler::assemble_nested(&flow, &versions)
        })
        .await
    }

    /// Flattened view of one journey.
    #[tracing::instrument(skip(self))]
    pub async fn get_journey_details_as_list(&self, external_id: &str) -> JourneyResponseList {
        let key = JourneyCacheKey::flat(external_id);

        let belongs = |r: &JourneyResponseList| r.external_id == external_id;
        self.cache_aside(key, JourneyResponseList::is_empty, belongs, || async move {
            let Some(flow) = self.load_flow(external_id).await else {
                return JourneyResponseList::default();
            };
            let versions = self
                .resolver
                .resolve_active_versions(std::slice::from_ref(&flow))
                .await;
            if versions.degraded {
                return JourneyResponseList::default();
            }
            ResponseAssembler::assemble_list(&flow, &versions)
        })
        .await
    }

    /// Flattened views of several journeys, in the order requested.
    #[tracing::instrument(skip(self))]
    pub async fn get_journey_details_list_for_journey_ids(
        &self,
        external_ids: &[String],
    ) -> Vec<JourneyResponseList> {
        if external_ids.is_empty() {
            return Vec::new();
        }
        let key = JourneyCacheKey::batch(external_ids);

        let belongs = |lists: &Vec<JourneyResponseList>| {
            lists.iter().all(|l| external_ids.contains(&l.external_id))
        };
        self.cache_aside(key, Vec::is_empty, belongs, || async move {
            let flows = match self.storage.find_flows_by_external_ids(external_ids).await {
                Ok(flows) => flows,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load flows");
                    return Vec::new();
                }
            };
            if flows.is_empty() {
                return Vec::new();
            }
            let versions = self.resolver.resolve_active_versions(&flows).await;
            if versions.degraded {
                return Vec::new();
            }
            ResponseAssembler::assemble_batch(external_ids, &flows, &versions)
        })
        .await
    }

    /// One module with its resolved sections and fields. Not cached.
    #[tracing::instrument(skip(self))]
    pub async fn get_module_by_id(&self, module_external_id: &str) -> ModuleVersionResponse {
        let module = match self.storage.find_module_by_external_id(module_external_id).await {
            Ok(Some(module)) => module,
            Ok(None) => {
                tracing::debug!("Module not found");
                return ModuleVersionResponse::default();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load module");
                return ModuleVersionResponse::default();
            }
        };
        let versions = self.resolver.resolve_module(&module).await;
        if versions.degraded {
            return ModuleVersionResponse::default();
        }
        ResponseAssembler::assemble_module(&module, &versions)
    }

    /// Load a flow, returning `None` when it does not exist or storage fails.
    async fn load_flow(&self, external_id: &str) -> Option<Flow> {
        match self.storage.find_flow_by_external_id(external_id).await {
            Ok(flow) if flow.is_found() => Some(flow),
            Ok(_) => {
                tracing::debug!(external_id, "Flow not found");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, external_id, "Failed to load flow");
                None
            }
        }
    }

    async fn cache_aside<T, E, A, F, Fut>(
        &self,
        key: JourneyCacheKey,
        is_empty: E,
        belongs: A,
        compute: F,
    ) -> T
    where
        T: Serialize + DeserializeOwned + Default,
        E: Fn(&T) -> bool,
        A: Fn(&T) -> bool,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.cache.is_available() {
            tracing::warn!(key = %key, "Cache unavailable, returning empty response");
            return T::default();
        }

        let encoded = key.encode();
        if let Some(hit) = self.read_cached(&encoded, &belongs).await {
            return hit;
        }

        let _flight = if self.config.single_flight {
            let guard = self.inflight.acquire(&encoded).await;
            if let Some(hit) = self.read_cached(&encoded, &belongs).await {
                return hit;
            }
            Some(guard)
        } else {
            None
        };

        let value = compute().await;
        if is_empty(&value) {
            tracing::debug!(key = %encoded, "Empty result, not caching");
            return value;
        }

        self.write_cached(&encoded, &value).await;
        value
    }

    async fn read_cached<T, A>(&self, key: &str, belongs: &A) -> Option<T>
    where
        T: DeserializeOwned,
        A: Fn(&T) -> bool,
    {
        let payload = match self.cache.get(key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                tracing::debug!(key, "Cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, key, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(value) if belongs(&value) => {
                tracing::debug!(key, "Cache hit");
                Some(value)
            }
            Ok(_) => {
                tracing::debug!(key, "Cached entry belongs to another request, treating as miss");
                None
            }
            Err(e) => {
                let err = CacheError::Deserialization {
                    key: key.to_string(),
                    reason: e.to_string(),
                };
                tracing::warn!(error = %err, "Discarding unreadable cache entry");
                None
            }
        }
    }

    async fn write_cached<T: Serialize>(&self, key: &str, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                let err = CacheError::Serialization {
                    key: key.to_string(),
                    reason: e.to_string(),
                };
                tracing::error!(error = %err, "Skipping cache write");
                return;
            }
        };

        match self.cache.set(key, payload, self.config.cache_ttl).await {
            Ok(()) => tracing::debug!(key, ttl_secs = self.config.cache_ttl.as_secs(), "Cached response"),
            Err(e) => tracing::warn!(error = %e, key, "Cache write failed"),
        }
    }
}
