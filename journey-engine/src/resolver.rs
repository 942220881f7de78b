//! Active version resolution.
//!
//! For a set of flows, collects every module, section and field id reachable
//! from them, loads all version rows for those ids and keeps exactly one
//! version per entity according to the configured `ActivePolicy`.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use journey_core::{
    extract_keys, ActivePolicy, EntityId, EntityKind, FieldVersionMap, Flow, ModuleNode,
    ModuleVersionMap, SectionVersionMap, StorageResult, VersionMap, VersionRecord,
};
use journey_storage::StorageGateway;

/// Version maps produced by one resolution pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVersions {
    pub modules: ModuleVersionMap,
    pub sections: SectionVersionMap,
    pub fields: FieldVersionMap,
    /// Set when any version query failed; the maps are then incomplete.
    pub degraded: bool,
}

impl Default for ResolvedVersions {
    fn default() -> Self {
        Self {
            modules: VersionMap::new(EntityKind::Module),
            sections: VersionMap::new(EntityKind::Section),
            fields: VersionMap::new(EntityKind::Field),
            degraded: false,
        }
    }
}

/// Ordering used to pick a winner among candidate versions of one entity:
/// higher version number first, then higher row id.
fn precedence(a: &VersionRecord, b: &VersionRecord) -> Ordering {
    a.version_number
        .cmp(&b.version_number)
        .then_with(|| a.id.cmp(&b.id))
}

/// Keep one version per entity.
///
/// The result does not depend on the order of `versions`.
pub fn select_active<I>(kind: EntityKind, versions: I, policy: ActivePolicy) -> VersionMap
where
    I: IntoIterator<Item = VersionRecord>,
{
    let mut winners: HashMap<EntityId, VersionRecord> = HashMap::new();

    for candidate in versions {
        if candidate.kind != kind {
            continue;
        }
        if policy == ActivePolicy::FlaggedActive && !candidate.is_active {
            continue;
        }
        let wins = winners
            .get(&candidate.entity_id)
            .map_or(true, |current| precedence(&candidate, current) == Ordering::Greater);
        if wins {
            winners.insert(candidate.entity_id, candidate);
        }
    }

    let mut map = VersionMap::new(kind);
    for record in winners.into_values() {
        map.insert(record);
    }
    map
}

/// Resolves active versions through a `StorageGateway`.
///
/// Read-only. A storage failure for one kind yields an empty map for that
/// kind and marks the result `degraded`.
pub struct VersionResolver<S: StorageGateway> {
    storage: Arc<S>,
    policy: ActivePolicy,
}

impl<S: StorageGateway> Clone for VersionResolver<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            policy: self.policy,
        }
    }
}

impl<S: StorageGateway> VersionResolver<S> {
    pub fn new(storage: Arc<S>, policy: ActivePolicy) -> Self {
        Self { storage, policy }
    }

    pub fn policy(&self) -> ActivePolicy {
        self.policy
    }

    /// Resolve every module, section and field reachable from `flows`.
    pub async fn resolve_active_versions(&self, flows: &[Flow]) -> ResolvedVersions {
        let module_ids: BTreeSet<EntityId> = flows.iter().flat_map(Flow::module_ids).collect();
        let section_ids: BTreeSet<EntityId> = flows.iter().flat_map(Flow::section_ids).collect();
        let field_ids: BTreeSet<EntityId> = flows.iter().flat_map(Flow::field_ids).collect();

        self.resolve_ids(&module_ids, &section_ids, &field_ids).await
    }

    /// Resolve one module and everything beneath it.
    pub async fn resolve_module(&self, module: &ModuleNode) -> ResolvedVersions {
        let module_ids: BTreeSet<EntityId> = [module.id].into_iter().collect();
        self.resolve_ids(&module_ids, &module.section_ids(), &module.field_ids())
            .await
    }

    /// Resolve field versions from a candidate set of field-version ids by
    /// joining them with their owning field rows.
    pub async fn resolve_field_versions_by_version_ids(
        &self,
        version_ids: &BTreeSet<EntityId>,
    ) -> FieldVersionMap {
        if version_ids.is_empty() {
            return VersionMap::new(EntityKind::Field);
        }
        let rows = self.storage.fields_with_versions(version_ids).await;
        let versions = rows.map(|rows| rows.into_iter().map(|row| row.version).collect::<Vec<_>>());
        self.select_or_empty(EntityKind::Field, versions, &mut false)
    }

    /// Same as `resolve_field_versions_by_version_ids`, taking the candidate
    /// ids as the keys of a map (for example a version-id -> flag map taken
    /// from a section payload).
    pub async fn resolve_field_versions_from_map<V: Sync>(
        &self,
        candidates: &HashMap<EntityId, V>,
    ) -> FieldVersionMap {
        let version_ids = extract_keys(candidates);
        self.resolve_field_versions_by_version_ids(&version_ids).await
    }

    async fn resolve_ids(
        &self,
        module_ids: &BTreeSet<EntityId>,
        section_ids: &BTreeSet<EntityId>,
        field_ids: &BTreeSet<EntityId>,
    ) -> ResolvedVersions {
        let mut degraded = false;

        let modules = if module_ids.is_empty() {
            VersionMap::new(EntityKind::Module)
        } else {
            let rows = self.storage.module_versions(module_ids).await;
            self.select_or_empty(EntityKind::Module, rows, &mut degraded)
        };

        let sections = if section_ids.is_empty() {
            VersionMap::new(EntityKind::Section)
        } else {
            let rows = self.storage.section_versions(section_ids).await;
            self.select_or_empty(EntityKind::Section, rows, &mut degraded)
        };

        let fields = if field_ids.is_empty() {
            VersionMap::new(EntityKind::Field)
        } else {
            let rows = self.storage.field_versions(field_ids).await;
            self.select_or_empty(EntityKind::Field, rows, &mut degraded)
        };

        tracing::debug!(
            modules = modules.len(),
            sections = sections.len(),
            fields = fields.len(),
            degraded,
            "Resolved active versions"
        );

        ResolvedVersions {
            modules,
            sections,
            fields,
            degraded,
        }
    }

    fn select_or_empty(
        &self,
        kind: EntityKind,
        rows: StorageResult<Vec<VersionRecord>>,
        degraded: &mut bool,
    ) -> VersionMap {
        match rows {
            Ok(rows) => select_active(kind, rows, self.policy),
            Err(e) => {
                tracing::warn!(error = %e, kind = ?kind, "Failed to load versions, resolving to none");
                *degraded = true;
                VersionMap::new(kind)
            }
        }
    }
}
