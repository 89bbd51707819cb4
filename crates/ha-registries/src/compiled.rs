//! Compiled entity view
//!
//! Joins each entity with its device and area. Unresolved references yield
//! empty strings, never missing fields.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::area_registry::AreaRegistry;
use crate::device_registry::DeviceRegistry;
use crate::entity_registry::{entity_domain, EntityEntry, EntityRegistry};

/// Device fields carried by a compiled entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledDevice {
    pub id: String,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

/// Area fields carried by a compiled entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledArea {
    pub area_id: String,
    pub name: String,
}

/// An entity joined with its device and area
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledEntity {
    pub id: String,
    pub entity_id: String,
    pub name: String,
    pub entity_category: String,
    /// Whether the entity id is in the published allowlist
    pub shared: bool,
    pub device: CompiledDevice,
    pub area: CompiledArea,
}

impl CompiledEntity {
    /// Domain part of the entity id
    pub fn domain(&self) -> &str {
        entity_domain(&self.entity_id)
    }
}

/// Join one entity against the device and area registries
pub fn compile_entity(
    entity: &EntityEntry,
    devices: &DeviceRegistry,
    areas: &AreaRegistry,
    allowlist: &HashSet<String>,
) -> CompiledEntity {
    let device = entity
        .device_id
        .as_deref()
        .and_then(|id| devices.get(id))
        .map(|d| CompiledDevice {
            id: d.id.clone(),
            name: d.display_name().to_string(),
            manufacturer: d.manufacturer.clone(),
            model: d.model.clone(),
        })
        .unwrap_or_default();

    let area = entity
        .area_id
        .as_deref()
        .and_then(|id| areas.get(id))
        .map(|a| CompiledArea {
            area_id: a.area_id.clone(),
            name: a.name.clone(),
        })
        .unwrap_or_default();

    CompiledEntity {
        id: entity.id.clone(),
        entity_id: entity.entity_id.clone(),
        name: entity.display_name().to_string(),
        entity_category: entity.entity_category.clone(),
        shared: allowlist.contains(&entity.entity_id),
        device,
        area,
    }
}

/// Join every entity, in entity-registry order
pub fn compile(
    devices: &DeviceRegistry,
    entities: &EntityRegistry,
    areas: &AreaRegistry,
    allowlist: &HashSet<String>,
) -> Vec<CompiledEntity> {
    entities
        .values()
        .map(|entity| compile_entity(entity, devices, areas, allowlist))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area_registry::AreaEntry;
    use crate::device_registry::DeviceEntry;

    fn fixtures() -> (DeviceRegistry, EntityRegistry, AreaRegistry) {
        let devices = DeviceRegistry::from_entries([DeviceEntry::new(
            "device-1",
            "Test Device",
            "Model X",
            "Manufacturer Y",
        )]);

        let mut entity = EntityEntry::new("entity-1", "light.living_room");
        entity.name = Some("Living Room Light".to_string());
        entity.area_id = Some("area-1".to_string());
        entity.device_id = Some("device-1".to_string());
        let entities = EntityRegistry::from_entries([entity]);

        let areas = AreaRegistry::from_entries([AreaEntry::new("area-1", "Living Room")]);

        (devices, entities, areas)
    }

    #[test]
    fn test_compile_resolves_references() {
        let (devices, entities, areas) = fixtures();
        let compiled = compile(&devices, &entities, &areas, &HashSet::new());

        assert_eq!(compiled.len(), 1);
        let entry = &compiled[0];
        assert_eq!(entry.id, "entity-1");
        assert_eq!(entry.name, "Living Room Light");
        assert!(!entry.shared);
        assert_eq!(
            entry.device,
            CompiledDevice {
                id: "device-1".to_string(),
                name: "Test Device".to_string(),
                manufacturer: "Manufacturer Y".to_string(),
                model: "Model X".to_string(),
            }
        );
        assert_eq!(entry.area.area_id, "area-1");
        assert_eq!(entry.area.name, "Living Room");
    }

    #[test]
    fn test_dangling_references_are_empty_strings() {
        let (devices, _, areas) = fixtures();
        let mut entity = EntityEntry::new("entity-2", "switch.porch");
        entity.device_id = Some("missing-device".to_string());
        entity.area_id = Some("missing-area".to_string());
        let entities = EntityRegistry::from_entries([entity]);

        let compiled = compile(&devices, &entities, &areas, &HashSet::new());
        assert_eq!(compiled[0].device, CompiledDevice::default());
        assert_eq!(compiled[0].area, CompiledArea::default());

        let json = serde_json::to_value(&compiled[0]).unwrap();
        assert_eq!(json["device"]["name"], "");
        assert_eq!(json["area"]["area_id"], "");
    }

    #[test]
    fn test_entity_without_area_does_not_inherit_device_area() {
        let (_, _, areas) = fixtures();
        let mut device = DeviceEntry::new("device-1", "Test Device", "Model X", "Manufacturer Y");
        device.area_id = Some("area-1".to_string());
        let devices = DeviceRegistry::from_entries([device]);

        let mut entity = EntityEntry::new("entity-1", "light.living_room");
        entity.device_id = Some("device-1".to_string());
        let entities = EntityRegistry::from_entries([entity]);

        let compiled = compile(&devices, &entities, &areas, &HashSet::new());
        assert_eq!(compiled[0].area, CompiledArea::default());
        assert_eq!(compiled[0].device.id, "device-1");
    }

    #[test]
    fn test_shared_flag_follows_allowlist() {
        let (devices, entities, areas) = fixtures();
        let allowlist: HashSet<String> = ["light.living_room".to_string()].into();

        let compiled = compile(&devices, &entities, &areas, &allowlist);
        assert!(compiled[0].shared);
        assert_eq!(compiled[0].domain(), "light");
    }
}
