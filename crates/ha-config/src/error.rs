//! Error types for configuration handling

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while reading, parsing or updating the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more entity ids are not `domain.slug`
    #[error("Invalid entity ID format detected")]
    InvalidEntityIds { invalid: Vec<String> },

    /// The configuration file does not exist
    #[error("Configuration file not found at {path}")]
    NotFound { path: PathBuf },

    /// Failed to read the configuration file
    #[error("Failed to read configuration file: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {source}")]
    ParseYaml {
        #[source]
        source: serde_yaml::Error,
    },

    /// A mapping key that is not a scalar
    #[error("Failed to parse YAML: unsupported mapping key {key}")]
    UnsupportedKey { key: String },

    /// A custom tag carrying a sequence or mapping
    #[error("Failed to parse YAML: tag {tag} expects a scalar value")]
    InvalidTagValue { tag: String },

    /// Copying the pre-mutation file to the backup path failed
    #[error("Failed to create backup: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A node on the Alexa filter path exists but is not a mapping
    #[error("Cannot update configuration: '{key}' is {found}, expected a mapping")]
    MergeConflict { key: String, found: String },

    /// Failed to serialize YAML
    #[error("Failed to serialize YAML: {source}")]
    SerializeYaml {
        #[source]
        source: serde_yaml::Error,
    },

    /// The process may not write the configuration file
    #[error("Permission denied writing to configuration file")]
    PermissionDenied { path: PathBuf },

    /// Any other write failure
    #[error("Failed to write configuration file: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Pipeline stage the error was raised in
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::InvalidEntityIds { .. } => PipelineStage::Validate,
            Self::NotFound { .. } | Self::ReadFile { .. } => PipelineStage::Read,
            Self::ParseYaml { .. } | Self::UnsupportedKey { .. } | Self::InvalidTagValue { .. } => {
                PipelineStage::Parse
            }
            Self::Backup { .. } => PipelineStage::Backup,
            Self::MergeConflict { .. } => PipelineStage::Merge,
            Self::SerializeYaml { .. } => PipelineStage::Serialize,
            Self::PermissionDenied { .. } | Self::WriteFile { .. } => PipelineStage::Write,
        }
    }
}

/// Steps of the configuration update pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Validate,
    Read,
    Parse,
    Backup,
    Merge,
    Serialize,
    Write,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Read => "read",
            Self::Parse => "parse",
            Self::Backup => "backup",
            Self::Merge => "merge",
            Self::Serialize => "serialize",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
