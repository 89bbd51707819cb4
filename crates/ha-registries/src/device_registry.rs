//! Device Registry
//!
//! Devices as listed by `config/device_registry/list`, keyed by device id.

use serde::{Deserialize, Serialize};

use crate::registry::{null_as_empty, RegistryMap, RegistryRecord};

/// A device reported by the hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Device id
    pub id: String,

    /// Integration-provided name
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,

    /// Name set by the user, takes precedence over `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_by_user: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub model: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub manufacturer: String,

    /// Area the device is placed in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_id: Option<String>,
}

impl DeviceEntry {
    /// Create a device with only the fields the join needs
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        model: impl Into<String>,
        manufacturer: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            name_by_user: None,
            model: model.into(),
            manufacturer: manufacturer.into(),
            area_id: None,
        }
    }

    /// Name shown to users
    pub fn display_name(&self) -> &str {
        self.name_by_user
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.name)
    }
}

impl RegistryRecord for DeviceEntry {
    const KIND: &'static str = "device";

    fn key(&self) -> &str {
        &self.id
    }
}

/// Devices keyed by id
pub type DeviceRegistry = RegistryMap<DeviceEntry>;
