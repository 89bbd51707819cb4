//! Entity Registry
//!
//! Entities as listed by `config/entity_registry/list`, keyed by the
//! registry entry id (not the `domain.slug` entity id).

use serde::{Deserialize, Serialize};

use crate::registry::{null_as_empty, RegistryMap, RegistryRecord};

/// An entity reported by the hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityEntry {
    /// Registry entry id
    pub id: String,

    /// External identifier (`domain.slug`)
    pub entity_id: String,

    /// Entity category ("config", "diagnostic" or empty)
    #[serde(default, deserialize_with = "null_as_empty")]
    pub entity_category: String,

    /// User-set name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Integration default name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,

    /// Area assigned directly to the entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_id: Option<String>,

    /// Owning device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl EntityEntry {
    pub fn new(id: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_id: entity_id.into(),
            entity_category: String::new(),
            name: None,
            original_name: None,
            area_id: None,
            device_id: None,
        }
    }

    /// Domain part of the entity id ("light" for "light.kitchen")
    pub fn domain(&self) -> &str {
        entity_domain(&self.entity_id)
    }

    /// Name shown to users, falling back to the integration default
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.original_name.as_deref())
            .unwrap_or_default()
    }
}

impl RegistryRecord for EntityEntry {
    const KIND: &'static str = "entity";

    fn key(&self) -> &str {
        &self.id
    }
}

/// Entities keyed by registry entry id
pub type EntityRegistry = RegistryMap<EntityEntry>;

/// Substring before the first `.` of an entity id
pub fn entity_domain(entity_id: &str) -> &str {
    entity_id.split('.').next().unwrap_or_default()
}
