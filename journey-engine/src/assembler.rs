//! Response assembly.
//!
//! Pure projections of structure trees and resolved version maps into the
//! response shapes. Entities without a resolved version are skipped, and so
//! is everything beneath them.

use std::collections::HashMap;

use journey_core::{
    EntityId, EntityKind, FieldNode, FieldResponse, Flow, JourneyEntry, JourneyResponse,
    JourneyResponseList, JourneySummary, ModuleNode, ModuleResponse, ModuleVersionResponse,
    SectionNode, SectionResponse, VersionRecord,
};

use crate::resolver::ResolvedVersions;

/// Builds response DTOs. Never fails on missing version data.
pub struct ResponseAssembler;

impl ResponseAssembler {
    /// Nested shape for one flow. A not-found flow yields the default
    /// (`found = false`) response.
    pub fn assemble_nested(flow: &Flow, versions: &ResolvedVersions) -> JourneyResponse {
        if !flow.is_found() {
            return JourneyResponse::default();
        }
        JourneyResponse {
            found: true,
            journey_id: flow.id,
            external_id: flow.external_id.clone(),
            name: flow.name.clone(),
            modules: Self::modules(&flow.modules, versions),
        }
    }

    /// Flattened shape for one flow: modules, sections and fields in
    /// depth-first order.
    pub fn assemble_list(flow: &Flow, versions: &ResolvedVersions) -> JourneyResponseList {
        if !flow.is_found() {
            return JourneyResponseList::default();
        }

        let mut entries = Vec::new();
        for module in &flow.modules {
            let Some(module_version) = versions.modules.get(module.id) else {
                continue;
            };
            entries.push(entry(
                EntityKind::Module,
                module.id,
                None,
                &module.external_id,
                &module.name,
                module_version,
            ));

            for section in &module.sections {
                let Some(section_version) = versions.sections.get(section.id) else {
                    continue;
                };
                entries.push(entry(
                    EntityKind::Section,
                    section.id,
                    Some(module.id),
                    &section.external_id,
                    &section.name,
                    section_version,
                ));

                for field in &section.fields {
                    let Some(field_version) = versions.fields.get(field.id) else {
                        continue;
                    };
                    entries.push(entry(
                        EntityKind::Field,
                        field.id,
                        Some(section.id),
                        &field.external_id,
                        &field.name,
                        field_version,
                    ));
                }
            }
        }

        JourneyResponseList {
            found: true,
            journey_id: flow.id,
            external_id: flow.external_id.clone(),
            name: flow.name.clone(),
            entries,
        }
    }

    /// One flattened list per requested id, in request order regardless of
    /// the order `flows` arrived in. Ids with no matching flow are omitted.
    pub fn assemble_batch(
        requested_ids: &[String],
        flows: &[Flow],
        versions: &ResolvedVersions,
    ) -> Vec<JourneyResponseList> {
        let by_external_id: HashMap<&str, &Flow> = flows
            .iter()
            .filter(|f| f.is_found())
            .map(|f| (f.external_id.as_str(), f))
            .collect();

        requested_ids
            .iter()
            .filter_map(|id| by_external_id.get(id.as_str()))
            .map(|flow| Self::assemble_list(flow, versions))
            .collect()
    }

    /// Summaries for every flow of one merchant context, in the order given.
    pub fn assemble_summaries(flows: &[Flow], versions: &ResolvedVersions) -> Vec<JourneySummary> {
        flows
            .iter()
            .filter(|f| f.is_found())
            .map(|flow| JourneySummary {
                journey_id: flow.id,
                external_id: flow.external_id.clone(),
                name: flow.name.clone(),
                modules: Self::modules(&flow.modules, versions),
            })
            .collect()
    }

    /// Standalone module read. A module without a resolved version is not
    /// found.
    pub fn assemble_module(module: &ModuleNode, versions: &ResolvedVersions) -> ModuleVersionResponse {
        ModuleVersionResponse {
            module: Self::module(module, versions),
        }
    }

    fn modules(modules: &[ModuleNode], versions: &ResolvedVersions) -> Vec<ModuleResponse> {
        modules
            .iter()
            .filter_map(|m| Self::module(m, versions))
            .collect()
    }

    fn module(module: &ModuleNode, versions: &ResolvedVersions) -> Option<ModuleResponse> {
        let version = versions.modules.get(module.id)?;
        Some(ModuleResponse {
            module_id: module.id,
            external_id: module.external_id.clone(),
            name: module.name.clone(),
            version_id: version.id,
            version_number: version.version_number,
            content: version.content.clone(),
            sections: module
                .sections
                .iter()
                .filter_map(|s| Self::section(s, versions))
                .collect(),
        })
    }

    fn section(section: &SectionNode, versions: &ResolvedVersions) -> Option<SectionResponse> {
        let version = versions.sections.get(section.id)?;
        Some(SectionResponse {
            section_id: section.id,
            external_id: section.external_id.clone(),
            name: section.name.clone(),
            version_id: version.id,
            version_number: version.version_number,
            content: version.content.clone(),
            fields: section
                .fields
                .iter()
                .filter_map(|f| Self::field(f, versions))
                .collect(),
        })
    }

    fn field(field: &FieldNode, versions: &ResolvedVersions) -> Option<FieldResponse> {
        let version = versions.fields.get(field.id)?;
        Some(FieldResponse {
            field_id: field.id,
            external_id: field.external_id.clone(),
            name: field.name.clone(),
            version_id: version.id,
            version_number: version.version_number,
            content: version.content.clone(),
        })
    }
}

fn entry(
    kind: EntityKind,
    entity_id: EntityId,
    parent_id: Option<EntityId>,
    external_id: &str,
    name: &str,
    version: &VersionRecord,
) -> JourneyEntry {
    JourneyEntry {
        kind,
        entity_id,
        parent_id,
        external_id: external_id.to_string(),
        name: name.to_string(),
        version_id: version.id,
        version_number: version.version_number,
        content: version.content.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journey_test_utils::fixtures::{field, flow, module, section, test_context, version};

    fn two_module_flow() -> Flow {
        flow(
            1,
            "J1",
            "Onboarding",
            test_context(),
            vec![
                module(
                    10,
                    "M1",
                    vec![section(20, "S1", vec![field(30, "F1"), field(31, "F2")])],
                ),
                module(11, "M2", vec![section(21, "S2", vec![field(32, "F3")])]),
            ],
        )
    }

    fn all_resolved() -> ResolvedVersions {
        let mut versions = ResolvedVersions::default();
        versions.modules.insert(version(110, EntityKind::Module, 10, 2, true));
        versions.modules.insert(version(111, EntityKind::Module, 11, 1, true));
        versions.sections.insert(version(120, EntityKind::Section, 20, 1, true));
        versions.sections.insert(version(121, EntityKind::Section, 21, 1, true));
        versions.fields.insert(version(130, EntityKind::Field, 30, 1, true));
        versions.fields.insert(version(131, EntityKind::Field, 31, 1, true));
        versions.fields.insert(version(132, EntityKind::Field, 32, 1, true));
        versions
    }

    #[test]
    fn test_nested_carries_resolved_versions() {
        let response = ResponseAssembler::assemble_nested(&two_module_flow(), &all_resolved());

        assert!(response.is_found());
        assert_eq!(response.journey_id, 1);
        assert_eq!(response.modules.len(), 2);
        assert_eq!(response.modules[0].version_id, 110);
        assert_eq!(response.modules[0].version_number, 2);
        assert_eq!(response.modules[0].sections[0].fields.len(), 2);
        assert_eq!(response.modules[1].sections[0].fields[0].field_id, 32);
    }

    #[test]
    fn test_unresolved_module_is_skipped_with_children() {
        let mut versions = all_resolved();
        versions.modules = journey_core::VersionMap::new(EntityKind::Module);
        versions.modules.insert(version(111, EntityKind::Module, 11, 1, true));

        let nested = ResponseAssembler::assemble_nested(&two_module_flow(), &versions);
        assert_eq!(nested.modules.len(), 1);
        assert_eq!(nested.modules[0].module_id, 11);

        let list = ResponseAssembler::assemble_list(&two_module_flow(), &versions);
        assert!(list.entries.iter().all(|e| e.entity_id != 20 && e.entity_id != 30));
    }

    #[test]
    fn test_unresolved_field_is_skipped() {
        let mut versions = all_resolved();
        versions.fields = journey_core::VersionMap::new(EntityKind::Field);
        versions.fields.insert(version(131, EntityKind::Field, 31, 1, true));

        let nested = ResponseAssembler::assemble_nested(&two_module_flow(), &versions);
        let fields = &nested.modules[0].sections[0].fields;
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_id, 31);
        assert!(nested.modules[1].sections[0].fields.is_empty());
    }

    #[test]
    fn test_found_flow_without_versions_is_found_and_empty() {
        let response =
            ResponseAssembler::assemble_nested(&two_module_flow(), &ResolvedVersions::default());
        assert!(response.is_found());
        assert!(response.modules.is_empty());

        let list =
            ResponseAssembler::assemble_list(&two_module_flow(), &ResolvedVersions::default());
        assert!(list.is_found());
        assert!(list.entries.is_empty());
    }

    #[test]
    fn test_missing_flow_is_default() {
        let response = ResponseAssembler::assemble_nested(&Flow::default(), &all_resolved());
        assert_eq!(response, JourneyResponse::default());
        assert!(!response.is_found());

        let list = ResponseAssembler::assemble_list(&Flow::default(), &all_resolved());
        assert_eq!(list, JourneyResponseList::default());
    }

    #[test]
    fn test_list_is_depth_first_with_parents() {
        let list = ResponseAssembler::assemble_list(&two_module_flow(), &all_resolved());
        let shape: Vec<(EntityKind, EntityId, Option<EntityId>)> = list
            .entries
            .iter()
            .map(|e| (e.kind, e.entity_id, e.parent_id))
            .collect();

        assert_eq!(
            shape,
            vec![
                (EntityKind::Module, 10, None),
                (EntityKind::Section, 20, Some(10)),
                (EntityKind::Field, 30, Some(20)),
                (EntityKind::Field, 31, Some(20)),
                (EntityKind::Module, 11, None),
                (EntityKind::Section, 21, Some(11)),
                (EntityKind::Field, 32, Some(21)),
            ]
        );
    }

    #[test]
    fn test_batch_follows_requested_order() {
        let a = flow(1, "A", "Journey A", test_context(), Vec::new());
        let b = flow(2, "B", "Journey B", test_context(), Vec::new());
        let c = flow(3, "C", "Journey C", test_context(), Vec::new());
        let flows = vec![c, a, b];
        let requested = vec!["A".to_string(), "B".to_string(), "C".to_string()];

        let batch = ResponseAssembler::assemble_batch(&requested, &flows, &all_resolved());
        let order: Vec<&str> = batch.iter().map(|r| r.external_id.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_batch_omits_unknown_ids() {
        let a = flow(1, "A", "Journey A", test_context(), Vec::new());
        let requested = vec!["missing".to_string(), "A".to_string()];

        let batch = ResponseAssembler::assemble_batch(&requested, &[a], &all_resolved());
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].external_id, "A");
    }

    #[test]
    fn test_summaries_cover_every_flow() {
        let other = flow(2, "J2", "Checkout", test_context(), Vec::new());
        let summaries =
            ResponseAssembler::assemble_summaries(&[two_module_flow(), other], &all_resolved());

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].modules.len(), 2);
        assert_eq!(summaries[1].external_id, "J2");
        assert!(summaries[1].modules.is_empty());
    }

    #[test]
    fn test_module_read() {
        let tree = two_module_flow();
        let response = ResponseAssembler::assemble_module(&tree.modules[0], &all_resolved());
        assert!(response.is_found());
        assert_eq!(response.module.map(|m| m.sections.len()), Some(1));

        let unresolved =
            ResponseAssembler::assemble_module(&tree.modules[0], &ResolvedVersions::default());
        assert!(!unresolved.is_found());
    }
}
