//! Response DTOs.
//!
//! Every response is a pure projection of a flow's structure tree and the
//! version maps resolved for it. `Default` values are the "not found" /
//! "unavailable" results returned by the service.

use crate::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};

/// Resolved field inside a section.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldResponse {
    pub field_id: EntityId,
    pub external_id: String,
    pub name: String,
    pub version_id: EntityId,
    pub version_number: i32,
    pub content: serde_json::Value,
}

/// Resolved section with its resolved fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionResponse {
    pub section_id: EntityId,
    pub external_id: String,
    pub name: String,
    pub version_id: EntityId,
    pub version_number: i32,
    pub content: serde_json::Value,
    pub fields: Vec<FieldResponse>,
}

/// Resolved module with its resolved sections.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleResponse {
    pub module_id: EntityId,
    pub external_id: String,
    pub name: String,
    pub version_id: EntityId,
    pub version_number: i32,
    pub content: serde_json::Value,
    pub sections: Vec<SectionResponse>,
}

/// Nested response for one journey (flow -> modules -> sections -> fields).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyResponse {
    /// False only for the not-found / unavailable default value. A flow that
    /// exists but resolved no modules is `found` with empty `modules`.
    pub found: bool,
    pub journey_id: EntityId,
    pub external_id: String,
    pub name: String,
    pub modules: Vec<ModuleResponse>,
}

impl JourneyResponse {
    pub fn is_found(&self) -> bool {
        self.found
    }

    /// True when there is nothing worth caching: not found, or found with no
    /// resolved modules.
    pub fn is_empty(&self) -> bool {
        !self.found || self.modules.is_empty()
    }
}

/// One row of the flattened journey shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyEntry {
    pub kind: EntityKind,
    pub entity_id: EntityId,
    /// Owning module for sections, owning section for fields.
    pub parent_id: Option<EntityId>,
    pub external_id: String,
    pub name: String,
    pub version_id: EntityId,
    pub version_number: i32,
    pub content: serde_json::Value,
}

/// Flattened response for one journey: depth-first list of resolved entries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyResponseList {
    pub found: bool,
    pub journey_id: EntityId,
    pub external_id: String,
    pub name: String,
    pub entries: Vec<JourneyEntry>,
}

impl JourneyResponseList {
    pub fn is_found(&self) -> bool {
        self.found
    }

    /// True when not found or no entry resolved.
    pub fn is_empty(&self) -> bool {
        !self.found || self.entries.is_empty()
    }
}

/// Per-flow summary inside a merchant-context response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneySummary {
    pub journey_id: EntityId,
    pub external_id: String,
    pub name: String,
    pub modules: Vec<ModuleResponse>,
}

/// Every journey configured for one (merchant, tenant, channel).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneysResponse {
    pub journey_responses: Vec<JourneySummary>,
}

impl JourneysResponse {
    pub fn is_empty(&self) -> bool {
        self.journey_responses.is_empty()
    }
}

/// Standalone module read.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleVersionResponse {
    pub module: Option<ModuleResponse>,
}

impl ModuleVersionResponse {
    pub fn is_found(&self) -> bool {
        self.module.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_not_found() {
        assert!(!JourneyResponse::default().is_found());
        assert!(!JourneyResponseList::default().is_found());
        assert!(JourneysResponse::default().is_empty());
        assert!(!ModuleVersionResponse::default().is_found());
    }

    #[test]
    fn test_found_without_modules_is_empty() {
        let response = JourneyResponse {
            found: true,
            journey_id: 7,
            external_id: "J7".to_string(),
            name: "Empty".to_string(),
            modules: vec![],
        };
        assert!(response.is_found());
        assert!(response.is_empty());

        let list = JourneyResponseList {
            found: true,
            ..JourneyResponseList::default()
        };
        assert!(list.is_found());
        assert!(list.is_empty());
    }

    #[test]
    fn test_wire_format_uses_camel_case() {
        let response = JourneyResponse {
            found: true,
            journey_id: 1,
            external_id: "J1".to_string(),
            name: "Onboarding".to_string(),
            modules: vec![],
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["externalId"], json!("J1"));
        assert_eq!(value["journeyId"], json!(1));
    }
}
