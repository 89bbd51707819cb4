//! Home Assistant configuration.yaml handling
//!
//! This crate reads and rewrites configuration.yaml without resolving or
//! dropping Home Assistant's custom tags:
//!
//! - `!include path` - Include another YAML file
//! - `!include_dir_list dir` - Include all YAML files in a directory as a list
//! - `!include_dir_merge_list dir` - Merge lists from all YAML files
//! - `!include_dir_named dir` - Include all YAML files as a mapping
//! - `!include_dir_merge_named dir` - Merge mappings from all YAML files
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR` - Environment variable substitution
//! - `!input name` - Blueprint input reference
//!
//! Tagged nodes survive a parse/serialize round trip unchanged, which lets
//! [`AlexaConfigMutator`] replace the Alexa allowlist in place.
//!
//! # Example
//!
//! ```ignore
//! use ha_config::{AlexaConfigMutator, ConfigPaths};
//!
//! let mutator = AlexaConfigMutator::new(ConfigPaths::from_env());
//! let outcome = mutator.update_alexa_configuration(&["light.kitchen".to_string()])?;
//! println!("{} entities published", outcome.entities_count);
//! ```

mod alexa;
mod codec;
mod error;
mod mutator;

pub use alexa::{
    included_entities, is_valid_entity_id, update_alexa_config, validate_entity_ids,
    FILTER_PATH, INCLUDE_ENTITIES_KEY,
};
pub use codec::{
    parse_document, serialize_document, ConfigDocument, ConfigKey, ConfigMap, ConfigValue,
    CustomTagValue, HaTag, TaggedNode,
};
pub use error::{ConfigError, ConfigResult, PipelineStage};
pub use mutator::{AlexaConfigMutator, ConfigPaths, PublishOutcome, CONF_PATH_ENV};
