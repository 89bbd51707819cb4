//! Alexa allowlist publisher
//!
//! Rewrites configuration.yaml in strict order:
//! validate → read → parse → backup → merge → serialize → write.
//! Nothing touches the disk before validation passes and the canonical
//! file is never written without a backup of the bytes that were read.
//! A failed write is not rolled back; the backup is the recovery path.

use std::env;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::alexa::{included_entities, update_alexa_config, validate_entity_ids};
use crate::codec::{parse_document, serialize_document, ConfigDocument};
use crate::error::{ConfigError, ConfigResult};

/// Environment variable holding the add-on filesystem root
pub const CONF_PATH_ENV: &str = "HA_CONF_PATH";

/// Location of configuration.yaml and its backup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub config_file: PathBuf,
    pub backup_file: PathBuf,
}

impl ConfigPaths {
    /// Paths below an add-on root (`<root>/homeassistant/configuration.yaml`)
    pub fn under(root: impl AsRef<Path>) -> Self {
        let config_file = root
            .as_ref()
            .join("homeassistant")
            .join("configuration.yaml");
        Self::for_file(config_file)
    }

    /// Use `config_file` directly, backing up to `<config_file>.backup`
    pub fn for_file(config_file: impl Into<PathBuf>) -> Self {
        let config_file = config_file.into();
        let mut backup = config_file.clone().into_os_string();
        backup.push(".backup");
        Self {
            config_file,
            backup_file: PathBuf::from(backup),
        }
    }

    /// Resolve from `HA_CONF_PATH`, defaulting to `/`
    pub fn from_env() -> Self {
        let root = env::var(CONF_PATH_ENV).unwrap_or_else(|_| "/".to_string());
        Self::under(root)
    }
}

/// Result of a successful publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub success: bool,
    pub message: String,
    pub entities_count: usize,
}

/// Publishes the Alexa allowlist into configuration.yaml
///
/// All file access goes through one mutex, so concurrent publishes from the
/// same process run one after another. Other processes are not excluded.
#[derive(Debug)]
pub struct AlexaConfigMutator {
    paths: ConfigPaths,
    lock: Mutex<()>,
}

impl AlexaConfigMutator {
    pub fn new(paths: ConfigPaths) -> Self {
        Self {
            paths,
            lock: Mutex::new(()),
        }
    }

    pub fn from_env() -> Self {
        Self::new(ConfigPaths::from_env())
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Replace `alexa.smart_home.filter.include_entities` with `entity_ids`
    pub fn update_alexa_configuration(&self, entity_ids: &[String]) -> ConfigResult<PublishOutcome> {
        validate_entity_ids(entity_ids)?;

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let content = self.read()?;
        let mut document = parse_document(&content)?;

        self.backup(&content)?;

        update_alexa_config(&mut document, entity_ids)?;
        let updated = serialize_document(&document)?;

        self.write(&updated)?;

        info!(
            path = %self.paths.config_file.display(),
            entities = entity_ids.len(),
            "Published Alexa entity allowlist"
        );

        Ok(PublishOutcome {
            success: true,
            message: "Configuration updated successfully".to_string(),
            entities_count: entity_ids.len(),
        })
    }

    /// Allowlist as currently written in the configuration file
    pub fn current_allowlist(&self) -> ConfigResult<Vec<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(included_entities(&self.load()?))
    }

    /// Read and parse the configuration file
    fn load(&self) -> ConfigResult<ConfigDocument> {
        parse_document(&self.read()?)
    }

    fn read(&self) -> ConfigResult<String> {
        let path = &self.paths.config_file;
        debug!("Reading configuration file: {:?}", path);

        fs::read_to_string(path).map_err(|e| read_error(path, e))
    }

    fn backup(&self, content: &str) -> ConfigResult<()> {
        let path = &self.paths.backup_file;
        fs::write(path, content).map_err(|e| {
            warn!("Failed to back up configuration to {:?}: {}", path, e);
            ConfigError::Backup {
                path: path.clone(),
                source: e,
            }
        })?;
        debug!("Backed up configuration to {:?}", path);
        Ok(())
    }

    fn write(&self, content: &str) -> ConfigResult<()> {
        let path = &self.paths.config_file;
        fs::write(path, content).map_err(|e| write_error(path, e))
    }
}

fn read_error(path: &Path, e: io::Error) -> ConfigError {
    match e.kind() {
        ErrorKind::NotFound => ConfigError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        },
    }
}

fn write_error(path: &Path, e: io::Error) -> ConfigError {
    match e.kind() {
        ErrorKind::PermissionDenied => ConfigError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ConfigError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        },
    }
}
