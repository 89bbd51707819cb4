//! Home Assistant Registries
//!
//! Client-side snapshots of the hub's three registries:
//! - Devices (DeviceRegistry)
//! - Entities (EntityRegistry)
//! - Areas (AreaRegistry)
//!
//! Each registry is replaced wholesale whenever the hub answers a registry
//! query. Once all three are non-empty they can be joined into the
//! denormalized [`CompiledEntity`] list.

pub mod registry;

pub mod area_registry;
pub mod compiled;
pub mod device_registry;
pub mod entity_registry;

// Re-export main types
pub use registry::{RegistryMap, RegistryRecord};

pub use area_registry::{AreaEntry, AreaRegistry};
pub use compiled::{compile, compile_entity, CompiledArea, CompiledDevice, CompiledEntity};
pub use device_registry::{DeviceEntry, DeviceRegistry};
pub use entity_registry::{entity_domain, EntityEntry, EntityRegistry};

use std::collections::HashSet;

/// All registries bundled together
#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub devices: DeviceRegistry,
    pub entities: EntityRegistry,
    pub areas: AreaRegistry,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_devices(&mut self, devices: DeviceRegistry) {
        self.devices = devices;
    }

    pub fn replace_entities(&mut self, entities: EntityRegistry) {
        self.entities = entities;
    }

    pub fn replace_areas(&mut self, areas: AreaRegistry) {
        self.areas = areas;
    }

    /// True when every registry holds at least one entry
    pub fn is_complete(&self) -> bool {
        !self.devices.is_empty() && !self.entities.is_empty() && !self.areas.is_empty()
    }

    /// Join the registries, or `None` while any of them is still empty
    pub fn compile(&self, allowlist: &HashSet<String>) -> Option<Vec<CompiledEntity>> {
        self.is_complete()
            .then(|| compile(&self.devices, &self.entities, &self.areas, allowlist))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_requires_all_registries() {
        let mut registries = Registries::new();
        assert!(registries.compile(&HashSet::new()).is_none());

        registries.replace_entities(EntityRegistry::from_entries([EntityEntry::new(
            "e1",
            "light.kitchen",
        )]));
        registries.replace_devices(DeviceRegistry::from_entries([DeviceEntry::new(
            "d1", "Bulb", "", "",
        )]));
        assert!(!registries.is_complete());
        assert!(registries.compile(&HashSet::new()).is_none());

        registries.replace_areas(AreaRegistry::from_entries([AreaEntry::new("a1", "Kitchen")]));
        let compiled = registries.compile(&HashSet::new()).unwrap();
        assert_eq!(compiled.len(), registries.entities.len());
    }

    #[test]
    fn test_replace_is_wholesale() {
        let mut registries = Registries::new();
        registries.replace_areas(AreaRegistry::from_entries([
            AreaEntry::new("a1", "Kitchen"),
            AreaEntry::new("a2", "Office"),
        ]));
        registries.replace_areas(AreaRegistry::from_entries([AreaEntry::new("a3", "Garage")]));

        assert_eq!(registries.areas.len(), 1);
        assert!(registries.areas.get("a1").is_none());
        assert!(registries.areas.contains("a3"));
    }
}
