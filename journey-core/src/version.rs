//! Version records and per-pass version maps.

use crate::{EntityId, EntityKind, FieldNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One numbered, immutable snapshot of a module, section or field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Row id of the version itself.
    pub id: EntityId,
    /// Id of the entity this version belongs to.
    pub entity_id: EntityId,
    pub kind: EntityKind,
    pub version_number: i32,
    pub content: serde_json::Value,
    pub is_active: bool,
}

/// Field row joined with one of its version rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWithVersion {
    pub field: FieldNode,
    pub version: VersionRecord,
}

/// Resolved version per entity, for a single entity kind.
///
/// A map is built by one resolution pass and dropped with it. Entries are
/// ordered by entity id so iteration is stable.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionMap {
    kind: EntityKind,
    entries: BTreeMap<EntityId, VersionRecord>,
}

pub type ModuleVersionMap = VersionMap;
pub type SectionVersionMap = VersionMap;
pub type FieldVersionMap = VersionMap;

impl VersionMap {
    /// Create an empty map for the given kind.
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Insert the resolved version for `record.entity_id`.
    ///
    /// Records of another kind are rejected and `false` is returned.
    pub fn insert(&mut self, record: VersionRecord) -> bool {
        if record.kind != self.kind {
            return false;
        }
        self.entries.insert(record.entity_id, record);
        true
    }

    /// Look up the resolved version of an entity.
    pub fn get(&self, entity_id: EntityId) -> Option<&VersionRecord> {
        self.entries.get(&entity_id)
    }

    /// Look up by the composite (kind, id) key.
    pub fn get_keyed(&self, kind: EntityKind, entity_id: EntityId) -> Option<&VersionRecord> {
        if kind != self.kind {
            return None;
        }
        self.get(entity_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in entity-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &VersionRecord)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(kind: EntityKind, entity_id: EntityId) -> VersionRecord {
        VersionRecord {
            id: entity_id * 10,
            entity_id,
            kind,
            version_number: 1,
            content: json!({"label": "x"}),
            is_active: true,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let mut map = VersionMap::new(EntityKind::Section);
        assert!(map.insert(record(EntityKind::Section, 7)));
        assert_eq!(map.get(7).map(|r| r.id), Some(70));
        assert!(map.get(8).is_none());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_rejects_wrong_kind() {
        let mut map = VersionMap::new(EntityKind::Module);
        assert!(!map.insert(record(EntityKind::Field, 1)));
        assert!(map.is_empty());
    }

    #[test]
    fn test_composite_lookup_checks_kind() {
        let mut map = VersionMap::new(EntityKind::Field);
        map.insert(record(EntityKind::Field, 3));
        assert!(map.get_keyed(EntityKind::Field, 3).is_some());
        assert!(map.get_keyed(EntityKind::Module, 3).is_none());
    }
}
