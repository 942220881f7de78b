//! Journey Storage - Gateway Trait, Cache Stores and Mock Implementation
//!
//! Defines the read surface the engine needs from the relational store and
//! the cache store abstraction used by the cache-aside layer.

pub mod cache;

pub use cache::{
    context_key, CacheStats, CacheStore, InMemoryCacheStore, JourneyCacheKey, LmdbCacheError,
    LmdbCacheStore,
};

use async_trait::async_trait;
use journey_core::{
    EntityId, EntityKind, FieldNode, FieldWithVersion, Flow, FlowContext, ModuleNode,
    StorageError, StorageResult, VersionRecord,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

// ============================================================================
// STORAGE GATEWAY
// ============================================================================

/// Read-only lookups over flows, structure trees and version rows.
///
/// Every method returns `StorageError::Unavailable` when no connection can
/// be obtained; callers degrade to empty results.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Look up a flow by external id.
    ///
    /// A missing flow is returned as `Flow::default()` (empty name), not as
    /// an error.
    async fn find_flow_by_external_id(&self, external_id: &str) -> StorageResult<Flow>;

    /// Look up several flows. Rows may come back in any order; unknown ids
    /// are simply absent.
    async fn find_flows_by_external_ids(&self, external_ids: &[String]) -> StorageResult<Vec<Flow>>;

    /// All flows configured for a merchant context.
    async fn find_flows_by_context(&self, context: &FlowContext) -> StorageResult<Vec<Flow>>;

    /// Look up a module with its section/field tree by external id.
    async fn find_module_by_external_id(&self, external_id: &str)
        -> StorageResult<Option<ModuleNode>>;

    /// Every version row of the given modules.
    async fn module_versions(&self, module_ids: &BTreeSet<EntityId>) -> StorageResult<Vec<VersionRecord>>;

    /// Every version row of the given sections.
    async fn section_versions(&self, section_ids: &BTreeSet<EntityId>) -> StorageResult<Vec<VersionRecord>>;

    /// Every version row of the given fields.
    async fn field_versions(&self, field_ids: &BTreeSet<EntityId>) -> StorageResult<Vec<VersionRecord>>;

    /// Field rows joined with the field-version rows whose ids are given.
    async fn fields_with_versions(
        &self,
        version_ids: &BTreeSet<EntityId>,
    ) -> StorageResult<Vec<FieldWithVersion>>;
}

// ============================================================================
// MOCK STORAGE
// ============================================================================

/// In-memory storage for testing.
///
/// Flows are indexed by external id; inserting a flow also indexes its
/// modules and fields so module and join lookups can find them.
#[derive(Debug)]
pub struct MockStorage {
    flows: RwLock<HashMap<String, Flow>>,
    modules: RwLock<HashMap<String, ModuleNode>>,
    fields: RwLock<HashMap<EntityId, FieldNode>>,
    versions: RwLock<Vec<VersionRecord>>,
    connected: AtomicBool,
    reverse_rows: AtomicBool,
    failing_kinds: RwLock<HashSet<EntityKind>>,
    queries: AtomicUsize,
}

impl Default for MockStorage {
    fn default() -> Self {
        Self {
            flows: RwLock::new(HashMap::new()),
            modules: RwLock::new(HashMap::new()),
            fields: RwLock::new(HashMap::new()),
            versions: RwLock::new(Vec::new()),
            connected: AtomicBool::new(true),
            reverse_rows: AtomicBool::new(false),
            failing_kinds: RwLock::new(HashSet::new()),
            queries: AtomicUsize::new(0),
        }
    }
}

impl MockStorage {
    /// Create a new empty mock storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a flow and index its modules and fields.
    pub fn insert_flow(&self, flow: Flow) -> StorageResult<()> {
        for module in &flow.modules {
            self.insert_module(module.clone())?;
        }
        self.flows
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .insert(flow.external_id.clone(), flow);
        Ok(())
    }

    /// Store a module that may not belong to any flow.
    pub fn insert_module(&self, module: ModuleNode) -> StorageResult<()> {
        {
            let mut fields = self.fields.write().map_err(|_| StorageError::LockPoisoned)?;
            for field in module.sections.iter().flat_map(|s| s.fields.iter()) {
                fields.insert(field.id, field.clone());
            }
        }
        self.modules
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .insert(module.external_id.clone(), module);
        Ok(())
    }

    /// Store a version row.
    pub fn insert_version(&self, version: VersionRecord) -> StorageResult<()> {
        self.versions
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .push(version);
        Ok(())
    }

    /// Simulate the connection going away (or coming back).
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Return multi-row results in reverse of their natural order.
    pub fn set_reverse_rows(&self, reverse: bool) {
        self.reverse_rows.store(reverse, Ordering::SeqCst);
    }

    /// Make version queries for `kind` fail (or succeed again). Covers the
    /// field join as well when `kind` is `Field`.
    pub fn set_failing(&self, kind: EntityKind, failing: bool) -> StorageResult<()> {
        let mut kinds = self.failing_kinds.write().map_err(|_| StorageError::LockPoisoned)?;
        if failing {
            kinds.insert(kind);
        } else {
            kinds.remove(&kind);
        }
        Ok(())
    }

    /// Number of gateway calls served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Remove everything.
    pub fn clear(&self) -> StorageResult<()> {
        self.flows.write().map_err(|_| StorageError::LockPoisoned)?.clear();
        self.modules.write().map_err(|_| StorageError::LockPoisoned)?.clear();
        self.fields.write().map_err(|_| StorageError::LockPoisoned)?.clear();
        self.versions.write().map_err(|_| StorageError::LockPoisoned)?.clear();
        Ok(())
    }

    fn begin_query(&self) -> StorageResult<()> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable)
        }
    }

    fn finish_rows<T>(&self, mut rows: Vec<T>) -> Vec<T> {
        if self.reverse_rows.load(Ordering::SeqCst) {
            rows.reverse();
        }
        rows
    }

    fn check_kind(&self, kind: EntityKind) -> StorageResult<()> {
        let kinds = self.failing_kinds.read().map_err(|_| StorageError::LockPoisoned)?;
        if kinds.contains(&kind) {
            return Err(StorageError::QueryFailed {
                entity_kind: kind,
                reason: "simulated query failure".to_string(),
            });
        }
        Ok(())
    }

    fn versions_of(&self, kind: EntityKind, ids: &BTreeSet<EntityId>) -> StorageResult<Vec<VersionRecord>> {
        self.begin_query()?;
        self.check_kind(kind)?;
        let versions = self.versions.read().map_err(|_| StorageError::LockPoisoned)?;
        let rows = versions
            .iter()
            .filter(|v| v.kind == kind && ids.contains(&v.entity_id))
            .cloned()
            .collect();
        Ok(self.finish_rows(rows))
    }
}

#[async_trait]
impl StorageGateway for MockStorage {
    async fn find_flow_by_external_id(&self, external_id: &str) -> StorageResult<Flow> {
        self.begin_query()?;
        let flows = self.flows.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(flows.get(external_id).cloned().unwrap_or_default())
    }

    async fn find_flows_by_external_ids(&self, external_ids: &[String]) -> StorageResult<Vec<Flow>> {
        self.begin_query()?;
        let flows = self.flows.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut rows: Vec<Flow> = external_ids
            .iter()
            .filter_map(|id| flows.get(id).cloned())
            .collect();
        // Natural row order is by internal id, not by request order.
        rows.sort_by_key(|f| f.id);
        Ok(self.finish_rows(rows))
    }

    async fn find_flows_by_context(&self, context: &FlowContext) -> StorageResult<Vec<Flow>> {
        self.begin_query()?;
        let flows = self.flows.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut rows: Vec<Flow> = flows
            .values()
            .filter(|f| &f.context == context)
            .cloned()
            .collect();
        rows.sort_by_key(|f| f.id);
        Ok(self.finish_rows(rows))
    }

    async fn find_module_by_external_id(
        &self,
        external_id: &str,
    ) -> StorageResult<Option<ModuleNode>> {
        self.begin_query()?;
        let modules = self.modules.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(modules.get(external_id).cloned())
    }

    async fn module_versions(&self, module_ids: &BTreeSet<EntityId>) -> StorageResult<Vec<VersionRecord>> {
        self.versions_of(EntityKind::Module, module_ids)
    }

    async fn section_versions(&self, section_ids: &BTreeSet<EntityId>) -> StorageResult<Vec<VersionRecord>> {
        self.versions_of(EntityKind::Section, section_ids)
    }

    async fn field_versions(&self, field_ids: &BTreeSet<EntityId>) -> StorageResult<Vec<VersionRecord>> {
        self.versions_of(EntityKind::Field, field_ids)
    }

    async fn fields_with_versions(
        &self,
        version_ids: &BTreeSet<EntityId>,
    ) -> StorageResult<Vec<FieldWithVersion>> {
        self.begin_query()?;
        self.check_kind(EntityKind::Field)?;
        let versions = self.versions.read().map_err(|_| StorageError::LockPoisoned)?;
        let fields = self.fields.read().map_err(|_| StorageError::LockPoisoned)?;
        let rows = versions
            .iter()
            .filter(|v| v.kind == EntityKind::Field && version_ids.contains(&v.id))
            .filter_map(|v| {
                fields.get(&v.entity_id).map(|field| FieldWithVersion {
                    field: field.clone(),
                    version: v.clone(),
                })
            })
            .collect();
        Ok(self.finish_rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journey_core::SectionNode;
    use serde_json::json;

    fn make_flow(id: EntityId, external_id: &str, context: FlowContext) -> Flow {
        Flow {
            id,
            external_id: external_id.to_string(),
            name: format!("flow {external_id}"),
            context,
            modules: vec![ModuleNode {
                id: id * 10,
                external_id: format!("{external_id}-M"),
                name: "module".to_string(),
                sections: vec![SectionNode {
                    id: id * 100,
                    external_id: format!("{external_id}-S"),
                    name: "section".to_string(),
                    fields: vec![FieldNode {
                        id: id * 1000,
                        external_id: format!("{external_id}-F"),
                        name: "field".to_string(),
                    }],
                }],
            }],
        }
    }

    fn make_version(id: EntityId, kind: EntityKind, entity_id: EntityId) -> VersionRecord {
        VersionRecord {
            id,
            entity_id,
            kind,
            version_number: 1,
            content: json!({ "v": id }),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_missing_flow_is_default() {
        let storage = MockStorage::new();
        let flow = storage.find_flow_by_external_id("nope").await.unwrap();
        assert!(!flow.is_found());
    }

    #[tokio::test]
    async fn test_find_by_context() {
        let storage = MockStorage::new();
        let ctx = FlowContext::new("m", "t", "c");
        storage.insert_flow(make_flow(2, "B", ctx.clone())).unwrap();
        storage.insert_flow(make_flow(1, "A", ctx.clone())).unwrap();
        storage
            .insert_flow(make_flow(3, "C", FlowContext::new("m", "t", "other")))
            .unwrap();

        let flows = storage.find_flows_by_context(&ctx).await.unwrap();
        let ids: Vec<_> = flows.iter().map(|f| f.external_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_reverse_rows() {
        let storage = MockStorage::new();
        let ctx = FlowContext::new("m", "t", "c");
        storage.insert_flow(make_flow(1, "A", ctx.clone())).unwrap();
        storage.insert_flow(make_flow(2, "B", ctx.clone())).unwrap();
        storage.set_reverse_rows(true);

        let flows = storage
            .find_flows_by_external_ids(&["A".to_string(), "B".to_string()])
            .await
            .unwrap();
        let ids: Vec<_> = flows.iter().map(|f| f.external_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn test_disconnected_storage_is_unavailable() {
        let storage = MockStorage::new();
        storage.set_connected(false);
        assert_eq!(
            storage.find_flow_by_external_id("A").await,
            Err(StorageError::Unavailable)
        );
        assert_eq!(storage.query_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_kind_only_affects_that_kind() {
        let storage = MockStorage::new();
        storage.insert_version(make_version(1, EntityKind::Module, 10)).unwrap();
        storage.insert_version(make_version(2, EntityKind::Section, 10)).unwrap();
        storage.set_failing(EntityKind::Section, true).unwrap();

        let ids: BTreeSet<_> = [10].into_iter().collect();
        assert!(matches!(
            storage.section_versions(&ids).await,
            Err(StorageError::QueryFailed {
                entity_kind: EntityKind::Section,
                ..
            })
        ));
        assert_eq!(storage.module_versions(&ids).await.unwrap().len(), 1);

        storage.set_failing(EntityKind::Section, false).unwrap();
        assert_eq!(storage.section_versions(&ids).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_versions_filtered_by_kind_and_id() {
        let storage = MockStorage::new();
        storage.insert_version(make_version(1, EntityKind::Module, 10)).unwrap();
        storage.insert_version(make_version(2, EntityKind::Section, 10)).unwrap();
        storage.insert_version(make_version(3, EntityKind::Module, 11)).unwrap();

        let ids: BTreeSet<_> = [10].into_iter().collect();
        let rows = storage.module_versions(&ids).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 1);
    }

    #[tokio::test]
    async fn test_fields_with_versions_join() {
        let storage = MockStorage::new();
        storage
            .insert_flow(make_flow(1, "A", FlowContext::new("m", "t", "c")))
            .unwrap();
        storage.insert_version(make_version(50, EntityKind::Field, 1000)).unwrap();
        storage.insert_version(make_version(51, EntityKind::Field, 1000)).unwrap();
        // Version of a field that has no field row: dropped by the join.
        storage.insert_version(make_version(52, EntityKind::Field, 9999)).unwrap();

        let ids: BTreeSet<_> = [50, 52].into_iter().collect();
        let rows = storage.fields_with_versions(&ids).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field.external_id, "A-F");
        assert_eq!(rows[0].version.id, 50);
    }

    #[tokio::test]
    async fn test_module_lookup() {
        let storage = MockStorage::new();
        storage
            .insert_flow(make_flow(1, "A", FlowContext::new("m", "t", "c")))
            .unwrap();

        let module = storage.find_module_by_external_id("A-M").await.unwrap();
        assert_eq!(module.map(|m| m.id), Some(10));
        assert!(storage.find_module_by_external_id("X").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let storage = MockStorage::new();
        storage
            .insert_flow(make_flow(1, "A", FlowContext::new("m", "t", "c")))
            .unwrap();
        storage.clear().unwrap();
        assert!(!storage.find_flow_by_external_id("A").await.unwrap().is_found());
    }
}
