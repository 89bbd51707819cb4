//! Connection credentials
//!
//! The add-on supervisor writes user options to `<root>/data/options.json`
//! and injects `SUPERVISOR_TOKEN`. Environment variables win over the file;
//! the file is read once and cached until [`AddonOptionsProvider::invalidate`].

use std::env;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};

/// Environment variable holding the supervisor-issued access token
pub const TOKEN_ENV: &str = "SUPERVISOR_TOKEN";

/// Environment variable overriding the websocket URL
pub const WEBSOCKET_URL_ENV: &str = "HA_WEBSOCKET_URL";

/// Environment variable holding the add-on filesystem root
pub const CONF_PATH_ENV: &str = "HA_CONF_PATH";

/// Supervisor proxy endpoint, reachable from inside an add-on
pub const DEFAULT_WEBSOCKET_URL: &str = "ws://supervisor/core/websocket";

/// Entity domains synced when the options leave them unset
pub const DEFAULT_ENTITY_DOMAINS: [&str; 8] = [
    "switch",
    "scene",
    "sensor",
    "binary_sensor",
    "light",
    "climate",
    "button",
    "automation",
];

/// Contents of options.json
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AddonOptions {
    #[serde(default, alias = "haWebsocketUrl")]
    pub ha_websocket_url: Option<String>,
    #[serde(default, alias = "haAccessToken")]
    pub ha_access_token: Option<String>,
    #[serde(default, alias = "haEntityDomains")]
    pub ha_entity_domains: Option<Vec<String>>,
}

/// Everything the sync engine needs to open a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub access_token: String,
    pub websocket_url: String,
    #[serde(skip)]
    pub entity_domains: Vec<String>,
}

impl ConnectionConfig {
    pub fn new(access_token: impl Into<String>, websocket_url: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            websocket_url: websocket_url.into(),
            entity_domains: default_entity_domains(),
        }
    }

    pub fn with_entity_domains(mut self, domains: Vec<String>) -> Self {
        self.entity_domains = domains;
        self
    }
}

pub fn default_entity_domains() -> Vec<String> {
    DEFAULT_ENTITY_DOMAINS.iter().map(|d| d.to_string()).collect()
}

/// Turn an `http(s)://host[:port]` base into a websocket endpoint
///
/// URLs that already carry a path are only re-schemed.
pub fn websocket_url(base: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    let (scheme, rest) = base.split_once("://").unwrap_or(("http", base));
    let ws_scheme = match scheme {
        "https" | "wss" => "wss",
        _ => "ws",
    };

    if rest.contains('/') {
        format!("{}://{}", ws_scheme, rest)
    } else {
        format!("{}://{}/api/websocket", ws_scheme, rest)
    }
}

/// Source of connection credentials
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn connection_config(&self) -> SyncResult<ConnectionConfig>;

    /// Drop any cached state so the next call re-reads its source
    fn invalidate(&self) {}
}

/// Credentials from the add-on environment and options.json
#[derive(Debug)]
pub struct AddonOptionsProvider {
    options_path: PathBuf,
    token_override: Option<String>,
    url_override: Option<String>,
    cache: RwLock<Option<AddonOptions>>,
}

impl AddonOptionsProvider {
    /// Read only from `options_path`, ignoring the environment
    pub fn new(options_path: impl Into<PathBuf>) -> Self {
        Self {
            options_path: options_path.into(),
            token_override: None,
            url_override: None,
            cache: RwLock::new(None),
        }
    }

    /// Options under `HA_CONF_PATH` with `SUPERVISOR_TOKEN` and
    /// `HA_WEBSOCKET_URL` taking precedence
    pub fn from_env() -> Self {
        let root = env::var(CONF_PATH_ENV).unwrap_or_else(|_| "/".to_string());
        let mut provider = Self::new(Self::options_path_under(root));
        provider.token_override = env::var(TOKEN_ENV).ok();
        provider.url_override = env::var(WEBSOCKET_URL_ENV).ok();
        provider
    }

    pub fn options_path_under(root: impl AsRef<Path>) -> PathBuf {
        root.as_ref().join("data").join("options.json")
    }

    pub fn with_token_override(mut self, token: impl Into<String>) -> Self {
        self.token_override = Some(token.into());
        self
    }

    pub fn with_url_override(mut self, url: impl Into<String>) -> Self {
        self.url_override = Some(url.into());
        self
    }

    pub fn options_path(&self) -> &Path {
        &self.options_path
    }

    /// Cached options, reading the file on first use
    ///
    /// A missing or unreadable file yields defaults and is retried next time.
    pub async fn options(&self) -> AddonOptions {
        let cached = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(cached) = cached {
            return cached;
        }

        let content = match tokio::fs::read_to_string(&self.options_path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("No add-on options at {:?}: {}", self.options_path, e);
                return AddonOptions::default();
            }
        };

        let options: AddonOptions = match serde_json::from_str(&content) {
            Ok(options) => options,
            Err(e) => {
                warn!("Ignoring malformed add-on options {:?}: {}", self.options_path, e);
                return AddonOptions::default();
            }
        };

        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(options.clone());
        options
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[async_trait]
impl CredentialProvider for AddonOptionsProvider {
    async fn connection_config(&self) -> SyncResult<ConnectionConfig> {
        let options = self.options().await;

        let access_token = non_empty(self.token_override.as_deref())
            .or_else(|| non_empty(options.ha_access_token.as_deref()))
            .ok_or_else(|| {
                SyncError::CredentialUnavailable(format!(
                    "{} environment variable is not set and no access token is configured",
                    TOKEN_ENV
                ))
            })?
            .to_string();

        let url = non_empty(self.url_override.as_deref())
            .or_else(|| non_empty(options.ha_websocket_url.as_deref()))
            .map(websocket_url)
            .unwrap_or_else(|| DEFAULT_WEBSOCKET_URL.to_string());

        let entity_domains = options
            .ha_entity_domains
            .filter(|domains| !domains.is_empty())
            .unwrap_or_else(default_entity_domains);

        Ok(ConnectionConfig {
            access_token,
            websocket_url: url,
            entity_domains,
        })
    }

    fn invalidate(&self) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Fixed credentials
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    config: ConnectionConfig,
}

impl StaticCredentials {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn connection_config(&self) -> SyncResult<ConnectionConfig> {
        Ok(self.config.clone())
    }
}
