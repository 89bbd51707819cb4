//! Alexa smart-home filter section
//!
//! The published allowlist lives at
//! `alexa.smart_home.filter.include_entities` in configuration.yaml.

use std::sync::OnceLock;

use regex::Regex;

use crate::codec::{ConfigDocument, ConfigKey, ConfigValue};
use crate::error::{ConfigError, ConfigResult};

/// Mapping keys leading to the allowlist
pub const FILTER_PATH: [&str; 3] = ["alexa", "smart_home", "filter"];

/// Key holding the allowlist inside the filter mapping
pub const INCLUDE_ENTITIES_KEY: &str = "include_entities";

static ENTITY_ID_PATTERN: OnceLock<Regex> = OnceLock::new();

fn entity_id_pattern() -> &'static Regex {
    ENTITY_ID_PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_]+\.[A-Za-z0-9_]+$").expect("entity id pattern is valid")
    })
}

/// Check one id against `domain.slug`
pub fn is_valid_entity_id(entity_id: &str) -> bool {
    entity_id_pattern().is_match(entity_id)
}

/// Reject the whole batch if any id is malformed
pub fn validate_entity_ids(entity_ids: &[String]) -> ConfigResult<()> {
    let invalid: Vec<String> = entity_ids
        .iter()
        .filter(|id| !is_valid_entity_id(id))
        .cloned()
        .collect();

    if invalid.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::InvalidEntityIds { invalid })
    }
}

/// Replace the allowlist, creating the filter path as needed
pub fn update_alexa_config(
    document: &mut ConfigDocument,
    entity_ids: &[String],
) -> ConfigResult<()> {
    let filter = document.ensure_mapping_path(&FILTER_PATH)?;
    filter.insert(
        ConfigKey::from(INCLUDE_ENTITIES_KEY),
        ConfigValue::from(entity_ids.to_vec()),
    );
    Ok(())
}

/// Currently published allowlist, empty when the section is absent
///
/// Non-string list items are ignored.
pub fn included_entities(document: &ConfigDocument) -> Vec<String> {
    let mut path = FILTER_PATH.to_vec();
    path.push(INCLUDE_ENTITIES_KEY);

    document
        .get_path(&path)
        .and_then(|v| v.as_sequence())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
