//! Journey Core - Entity Types
//!
//! Pure data structures shared by every other crate: the flow structure tree,
//! version records, response DTOs, errors and configuration.

pub mod config;
pub mod dto;
pub mod error;
pub mod util;
pub mod version;

pub use config::{ActivePolicy, JourneyConfig, DEFAULT_CACHE_TTL, MAX_CACHE_TTL};
pub use dto::{
    FieldResponse, JourneyEntry, JourneyResponse, JourneyResponseList, JourneySummary,
    JourneysResponse, ModuleResponse, ModuleVersionResponse, SectionResponse,
};
pub use error::{
    CacheError, CacheResult, ConfigError, JourneyError, JourneyResult, StorageError,
    StorageResult,
};
pub use util::extract_keys;
pub use version::{
    FieldVersionMap, FieldWithVersion, ModuleVersionMap, SectionVersionMap, VersionMap,
    VersionRecord,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Internal row identifier shared by every entity kind.
pub type EntityId = i64;

/// Entity kind discriminator for version records and version maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Flow,
    Module,
    Section,
    Field,
}

/// The (merchant, tenant, channel) triple that scopes a set of flows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FlowContext {
    pub merchant_id: String,
    pub tenant_id: String,
    pub channel_id: String,
}

impl FlowContext {
    pub fn new(
        merchant_id: impl Into<String>,
        tenant_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            tenant_id: tenant_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

// ============================================================================
// STRUCTURE TREE
// ============================================================================

/// A field placed inside a section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldNode {
    pub id: EntityId,
    pub external_id: String,
    pub name: String,
}

/// A section placed inside a module, with its ordered fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SectionNode {
    pub id: EntityId,
    pub external_id: String,
    pub name: String,
    pub fields: Vec<FieldNode>,
}

/// A module placed inside a flow, with its ordered sections.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleNode {
    pub id: EntityId,
    pub external_id: String,
    pub name: String,
    pub sections: Vec<SectionNode>,
}

impl ModuleNode {
    /// Ids of every section beneath this module.
    pub fn section_ids(&self) -> BTreeSet<EntityId> {
        self.sections.iter().map(|s| s.id).collect()
    }

    /// Ids of every field beneath this module.
    pub fn field_ids(&self) -> BTreeSet<EntityId> {
        self.sections
            .iter()
            .flat_map(|s| s.fields.iter().map(|f| f.id))
            .collect()
    }
}

/// A journey definition with its structure tree loaded.
///
/// The tree carries identities only; version content is resolved separately.
/// A flow whose `name` is empty is the "not found" value returned by storage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flow {
    pub id: EntityId,
    pub external_id: String,
    pub name: String,
    pub context: FlowContext,
    pub modules: Vec<ModuleNode>,
}

impl Flow {
    /// Returns false for the empty-name placeholder storage yields on a miss.
    pub fn is_found(&self) -> bool {
        !self.name.is_empty()
    }

    /// Ids of every module in this flow.
    pub fn module_ids(&self) -> BTreeSet<EntityId> {
        self.modules.iter().map(|m| m.id).collect()
    }

    /// Ids of every section in this flow.
    pub fn section_ids(&self) -> BTreeSet<EntityId> {
        self.modules.iter().flat_map(|m| m.section_ids()).collect()
    }

    /// Ids of every field in this flow.
    pub fn field_ids(&self) -> BTreeSet<EntityId> {
        self.modules.iter().flat_map(|m| m.field_ids()).collect()
    }
}
