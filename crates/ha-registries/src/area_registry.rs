//! Area Registry
//!
//! Tracks the areas (rooms, zones) reported by `config/area_registry/list`.

use serde::{Deserialize, Serialize};

use crate::registry::{null_as_empty, RegistryMap, RegistryRecord};

/// A registered area entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaEntry {
    /// Area id
    pub area_id: String,

    /// Area name (e.g., "Living Room")
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,

    /// Floor this area belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor_id: Option<String>,
}

impl AreaEntry {
    pub fn new(area_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            area_id: area_id.into(),
            name: name.into(),
            floor_id: None,
        }
    }
}

impl RegistryRecord for AreaEntry {
    const KIND: &'static str = "area";

    fn key(&self) -> &str {
        &self.area_id
    }
}

/// Areas keyed by area id
pub type AreaRegistry = RegistryMap<AreaEntry>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_indexed_by_area_id() {
        let records = vec![
            json!({"area_id": "living_room", "name": "Living Room", "floor_id": "ground"}),
            json!({"area_id": "garage", "name": null}),
            json!({"name": "No id"}),
        ];

        let registry = AreaRegistry::from_records(&records, |_| true);
        assert_eq!(registry.len(), 2);

        let living = registry.get("living_room").unwrap();
        assert_eq!(living.name, "Living Room");
        assert_eq!(living.floor_id.as_deref(), Some("ground"));

        let garage = registry.get("garage").unwrap();
        assert_eq!(garage, &AreaEntry::new("garage", ""));
        assert!(!registry.contains("No id"));
    }
}
