//! Journey Test Utilities
//!
//! Shared test infrastructure for the journey workspace:
//! - Builders for structure trees and version rows
//! - Seeded mock storage for common scenarios
//! - Proptest generators for version sets and contexts

// Re-export test doubles from their source crate
pub use journey_storage::{InMemoryCacheStore, MockStorage};

// Re-export core types for convenience
pub use journey_core::{
    ActivePolicy, EntityId, EntityKind, FieldNode, Flow, FlowContext, JourneyConfig, ModuleNode,
    SectionNode, VersionRecord,
};

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;
    use journey_core::StorageResult;
    use serde_json::json;

    /// Offset added to an entity id to derive its generated version row ids.
    const MODULE_VERSION_BASE: EntityId = 100_000;
    const SECTION_VERSION_BASE: EntityId = 200_000;
    const FIELD_VERSION_BASE: EntityId = 300_000;

    /// Context used by most tests.
    pub fn test_context() -> FlowContext {
        FlowContext::new("merchantA", "tenantA", "web")
    }

    pub fn field(id: EntityId, external_id: &str) -> FieldNode {
        FieldNode {
            id,
            external_id: external_id.to_string(),
            name: format!("Field {}", external_id),
        }
    }

    pub fn section(id: EntityId, external_id: &str, fields: Vec<FieldNode>) -> SectionNode {
        SectionNode {
            id,
            external_id: external_id.to_string(),
            name: format!("Section {}", external_id),
            fields,
        }
    }

    pub fn module(id: EntityId, external_id: &str, sections: Vec<SectionNode>) -> ModuleNode {
        ModuleNode {
            id,
            external_id: external_id.to_string(),
            name: format!("Module {}", external_id),
            sections,
        }
    }

    pub fn flow(
        id: EntityId,
        external_id: &str,
        name: &str,
        context: FlowContext,
        modules: Vec<ModuleNode>,
    ) -> Flow {
        Flow {
            id,
            external_id: external_id.to_string(),
            name: name.to_string(),
            context,
            modules,
        }
    }

    /// Version row whose content records which entity and number it is.
    pub fn version(
        id: EntityId,
        kind: EntityKind,
        entity_id: EntityId,
        version_number: i32,
        is_active: bool,
    ) -> VersionRecord {
        VersionRecord {
            id,
            entity_id,
            kind,
            version_number,
            content: json!({
                "entity": entity_id,
                "version": version_number,
            }),
            is_active,
        }
    }

    /// Flow `J1` with module `M1` (v1 inactive, v2 active), section `S1` and
    /// field `F1`, each with one active version.
    ///
    /// Ids: flow 1, module 10 (versions 101, 102), section 20 (version 201),
    /// field 30 (version 301).
    pub fn j1_storage() -> StorageResult<MockStorage> {
        let storage = MockStorage::new();
        storage.insert_flow(flow(
            1,
            "J1",
            "Onboarding",
            test_context(),
            vec![module(10, "M1", vec![section(20, "S1", vec![field(30, "F1")])])],
        ))?;
        storage.insert_version(version(101, EntityKind::Module, 10, 1, false))?;
        storage.insert_version(version(102, EntityKind::Module, 10, 2, true))?;
        storage.insert_version(version(201, EntityKind::Section, 20, 1, true))?;
        storage.insert_version(version(301, EntityKind::Field, 30, 1, true))?;
        Ok(storage)
    }

    /// Insert a one-module, one-section, one-field journey with a single
    /// active version per entity.
    ///
    /// Entity ids are derived from `flow_id` (module `flow_id * 10`, section
    /// `flow_id * 100`, field `flow_id * 1000`) so several seeded journeys
    /// never collide.
    pub fn seed_journey(
        storage: &MockStorage,
        flow_id: EntityId,
        external_id: &str,
        context: FlowContext,
    ) -> StorageResult<Flow> {
        let module_id = flow_id * 10;
        let section_id = flow_id * 100;
        let field_id = flow_id * 1000;

        let tree = flow(
            flow_id,
            external_id,
            &format!("Journey {}", external_id),
            context,
            vec![module(
                module_id,
                &format!("{}-M", external_id),
                vec![section(
                    section_id,
                    &format!("{}-S", external_id),
                    vec![field(field_id, &format!("{}-F", external_id))],
                )],
            )],
        );
        storage.insert_flow(tree.clone())?;
        storage.insert_version(version(
            MODULE_VERSION_BASE + module_id,
            EntityKind::Module,
            module_id,
            1,
            true,
        ))?;
        storage.insert_version(version(
            SECTION_VERSION_BASE + section_id,
            EntityKind::Section,
            section_id,
            1,
            true,
        ))?;
        storage.insert_version(version(
            FIELD_VERSION_BASE + field_id,
            EntityKind::Field,
            field_id,
            1,
            true,
        ))?;
        Ok(tree)
    }

    /// Insert a flow that exists but has no modules.
    pub fn seed_empty_journey(
        storage: &MockStorage,
        flow_id: EntityId,
        external_id: &str,
        context: FlowContext,
    ) -> StorageResult<Flow> {
        let tree = flow(flow_id, external_id, "Empty journey", context, Vec::new());
        storage.insert_flow(tree.clone())?;
        Ok(tree)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for journey types.

    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    /// Generate a non-empty identifier string.
    pub fn arb_external_id() -> impl Strategy<Value = String> {
        "[A-Z][A-Za-z0-9_-]{0,11}"
    }

    /// Generate a context; components may contain the separator-like
    /// characters `:` and `|`.
    pub fn arb_flow_context() -> impl Strategy<Value = FlowContext> {
        let part = "[a-zA-Z0-9:|_-]{0,12}";
        (part, part, part).prop_map(|(m, t, c)| FlowContext::new(m, t, c))
    }

    /// Generate a version set for entities `1..=max_entities` of `kind`.
    ///
    /// Row ids are unique; version numbers may repeat for one entity so the
    /// row-id tie-break gets exercised.
    pub fn entity_versions_strategy(
        kind: EntityKind,
        max_entities: EntityId,
    ) -> impl Strategy<Value = Vec<VersionRecord>> {
        prop::collection::vec((1..=max_entities, 1..5i32, any::<bool>()), 0..24).prop_map(
            move |rows| {
                rows.into_iter()
                    .enumerate()
                    .map(|(i, (entity_id, version_number, is_active))| VersionRecord {
                        id: i as EntityId + 1,
                        entity_id,
                        kind,
                        version_number,
                        content: json!({ "row": i }),
                        is_active,
                    })
                    .collect()
            },
        )
    }

    /// Build a found flow from a tree shape: one entry per module, holding
    /// the field count of each of its sections. Ids are unique per kind.
    fn shaped_flow(external_id: &str, name: &str, shape: &[Vec<usize>]) -> Flow {
        let mut next_section: EntityId = 0;
        let mut next_field: EntityId = 0;
        let modules = shape
            .iter()
            .enumerate()
            .map(|(m, sections)| {
                let module_id = m as EntityId + 1;
                let sections = sections
                    .iter()
                    .map(|field_count| {
                        next_section += 1;
                        let fields = (0..*field_count)
                            .map(|_| {
                                next_field += 1;
                                fixtures::field(next_field, &format!("F{}", next_field))
                            })
                            .collect();
                        fixtures::section(next_section, &format!("S{}", next_section), fields)
                    })
                    .collect();
                fixtures::module(module_id, &format!("M{}", module_id), sections)
            })
            .collect();
        fixtures::flow(1, external_id, name, fixtures::test_context(), modules)
    }

    fn entities_of(flow: &Flow) -> Vec<(EntityKind, EntityId)> {
        let mut entities = Vec::new();
        for module in &flow.modules {
            entities.push((EntityKind::Module, module.id));
            for section in &module.sections {
                entities.push((EntityKind::Section, section.id));
                entities.extend(section.fields.iter().map(|f| (EntityKind::Field, f.id)));
            }
        }
        entities
    }

    /// Generate a found flow with a random module/section/field tree and
    /// zero to two version rows per entity, with free-form text content.
    pub fn arb_flow_with_versions() -> impl Strategy<Value = (Flow, Vec<VersionRecord>)> {
        let shape = prop::collection::vec(prop::collection::vec(0usize..3, 0..3), 1..4);
        (arb_external_id(), "\\PC{1,12}", shape)
            .prop_map(|(external_id, name, shape)| shaped_flow(&external_id, &name, &shape))
            .prop_flat_map(|flow| {
                let entities = entities_of(&flow);
                let rows = prop::collection::vec(
                    prop::collection::vec((1..4i32, any::<bool>(), "\\PC{0,8}"), 0..3),
                    entities.len(),
                );
                (Just(flow), Just(entities), rows)
            })
            .prop_map(|(flow, entities, rows)| {
                let mut versions = Vec::new();
                for ((kind, entity_id), rows) in entities.into_iter().zip(rows) {
                    for (version_number, is_active, text) in rows {
                        versions.push(VersionRecord {
                            id: versions.len() as EntityId + 1,
                            entity_id,
                            kind,
                            version_number,
                            content: json!({ "text": text, "version": version_number }),
                            is_active,
                        });
                    }
                }
                (flow, versions)
            })
    }
}
