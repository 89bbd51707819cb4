//! Registry sync state machine
//!
//! [`SyncMachine`] holds no I/O. It consumes hub frames and returns the
//! frames to send back, which keeps every ordering rule testable without a
//! socket. The engine task drives it.
//!
//! ```text
//! Idle → Connecting → AwaitingAuth → Authenticated → Synced
//!                 ↘          ↘              ↘           ↘
//!                  Error / Disconnected (from any state)
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use ha_registries::{
    AreaRegistry, CompiledEntity, DeviceRegistry, EntityRegistry, Registries,
};

use crate::credentials::ConnectionConfig;
use crate::error::{SyncError, SyncResult};
use crate::wire::{
    decode, is_valid_entity, registry_requests, registry_result, IncomingMessage, MessageKind,
    OutgoingMessage, RegistryKind, WirePayload,
};

/// Lifecycle of one sync session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Connecting,
    AwaitingAuth,
    Authenticated,
    Synced,
    Disconnected,
    Error,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Connecting => "connecting",
            SyncState::AwaitingAuth => "awaiting_auth",
            SyncState::Authenticated => "authenticated",
            SyncState::Synced => "synced",
            SyncState::Disconnected => "disconnected",
            SyncState::Error => "error",
        }
    }

    /// No further frames will be processed
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Disconnected | SyncState::Error)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable engine state
///
/// `entities` is the last successful join. It stays in place after the
/// connection drops, with `connected` false and `error` set.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot {
    pub state: SyncState,
    pub connected: bool,
    pub error: Option<String>,
    pub entities: Arc<Vec<CompiledEntity>>,
    /// Number of joins completed so far
    pub generation: u64,
}

impl SyncSnapshot {
    /// A join has completed at least once
    pub fn has_entities(&self) -> bool {
        self.generation > 0
    }
}

impl Default for SyncSnapshot {
    fn default() -> Self {
        Self {
            state: SyncState::Idle,
            connected: false,
            error: None,
            entities: Arc::new(Vec::new()),
            generation: 0,
        }
    }
}

/// Sans-IO registry sync
#[derive(Debug)]
pub struct SyncMachine {
    state: SyncState,
    connected: bool,
    error: Option<String>,
    access_token: String,
    entity_domains: Vec<String>,
    allowlist: HashSet<String>,
    registries: Registries,
    compiled: Arc<Vec<CompiledEntity>>,
    generation: u64,
}

impl SyncMachine {
    pub fn new(allowlist: HashSet<String>) -> Self {
        Self {
            state: SyncState::Idle,
            connected: false,
            error: None,
            access_token: String::new(),
            entity_domains: Vec::new(),
            allowlist,
            registries: Registries::new(),
            compiled: Arc::new(Vec::new()),
            generation: 0,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn entities(&self) -> Arc<Vec<CompiledEntity>> {
        Arc::clone(&self.compiled)
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            state: self.state,
            connected: self.connected,
            error: self.error.clone(),
            entities: self.entities(),
            generation: self.generation,
        }
    }

    /// Credentials obtained, about to open the transport
    pub fn begin_connect(&mut self, config: &ConnectionConfig) {
        self.access_token = config.access_token.clone();
        self.entity_domains = config.entity_domains.clone();
        self.state = SyncState::Connecting;
        info!("Connecting to Home Assistant at {}", config.websocket_url);
    }

    /// The provider could not supply credentials; no connection is attempted
    pub fn credentials_failed(&mut self, error: &SyncError) {
        warn!("Credential lookup failed: {}", error);
        self.state = SyncState::Error;
        self.error = Some(error.to_string());
    }

    /// Transport opened
    pub fn connected(&mut self) {
        debug!("WebSocket connected, waiting for auth_required");
        self.connected = true;
        self.error = None;
        self.state = SyncState::AwaitingAuth;
    }

    /// Decode and handle one frame; malformed frames are dropped
    pub fn handle_frame(&mut self, payload: &WirePayload) -> Vec<OutgoingMessage> {
        match decode(payload) {
            Ok(message) => self.handle_message(&message),
            Err(e) => {
                warn!("Dropping undecodable frame: {}", e);
                Vec::new()
            }
        }
    }

    /// Handle one decoded frame, returning the frames to send in order
    pub fn handle_message(&mut self, message: &IncomingMessage) -> Vec<OutgoingMessage> {
        match message.kind {
            MessageKind::AuthRequired if self.state == SyncState::AwaitingAuth => {
                debug!("Hub requested authentication");
                vec![OutgoingMessage::Auth {
                    access_token: self.access_token.clone(),
                }]
            }
            MessageKind::AuthOk if self.state == SyncState::AwaitingAuth => {
                info!("Authenticated with Home Assistant");
                self.state = SyncState::Authenticated;
                registry_requests()
            }
            MessageKind::AuthInvalid if self.state == SyncState::AwaitingAuth => {
                let error = SyncError::AuthInvalid(message.failure_reason());
                warn!("{}", error);
                self.state = SyncState::Error;
                self.error = Some(error.to_string());
                Vec::new()
            }
            MessageKind::Result if self.is_authenticated() => {
                if let Some(kind) = registry_result(message) {
                    self.apply_registry_result(kind, message);
                } else {
                    debug!("Ignoring result for unknown request {:?}", message.id);
                }
                Vec::new()
            }
            kind => {
                debug!("Ignoring {} message in state {}", kind.as_str(), self.state);
                Vec::new()
            }
        }
    }

    /// Re-issue the registry queries on the live connection
    pub fn reload(&self) -> SyncResult<Vec<OutgoingMessage>> {
        if self.connected && self.is_authenticated() {
            debug!("Reloading registries");
            Ok(registry_requests())
        } else {
            Err(SyncError::NotConnected)
        }
    }

    /// Replace the published allowlist, re-joining if a join has happened
    pub fn set_allowlist(&mut self, allowlist: HashSet<String>) {
        self.allowlist = allowlist;
        if self.generation > 0 {
            self.rejoin();
        }
    }

    /// Transport failed or the hub went away
    pub fn transport_failed(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.connected = false;
        if self.generation > 0 {
            warn!("Connection lost, keeping last registry snapshot: {}", message);
            self.state = SyncState::Synced;
        } else {
            warn!("Connection failed before first sync: {}", message);
            self.state = SyncState::Error;
        }
        self.error = Some(message);
    }

    /// Closed by the owner
    pub fn closed(&mut self) {
        self.connected = false;
        if self.state != SyncState::Error {
            self.state = SyncState::Disconnected;
        }
        info!("Registry sync closed");
    }

    /// The session should end after the current frame
    pub fn wants_close(&self) -> bool {
        self.state == SyncState::Error
    }

    fn is_authenticated(&self) -> bool {
        matches!(self.state, SyncState::Authenticated | SyncState::Synced)
    }

    fn apply_registry_result(&mut self, kind: RegistryKind, message: &IncomingMessage) {
        if message.is_failure() {
            warn!(
                "{} query failed, keeping previous data: {}",
                kind.as_str(),
                message.failure_reason()
            );
            return;
        }

        let Some(records) = message.records() else {
            warn!("{} reply carried no record list", kind.as_str());
            return;
        };

        match kind {
            RegistryKind::Devices => {
                let devices = DeviceRegistry::from_records(records, |_| true);
                debug!("Received {} devices", devices.len());
                self.registries.replace_devices(devices);
            }
            RegistryKind::Entities => {
                let domains = &self.entity_domains;
                let entities =
                    EntityRegistry::from_records(records, |r: &Value| is_valid_entity(r, domains));
                debug!(
                    "Received {} entities ({} after domain filter)",
                    records.len(),
                    entities.len()
                );
                self.registries.replace_entities(entities);
            }
            RegistryKind::Areas => {
                let areas = AreaRegistry::from_records(records, |_| true);
                debug!("Received {} areas", areas.len());
                self.registries.replace_areas(areas);
            }
        }

        self.rejoin();
    }

    fn rejoin(&mut self) {
        let Some(compiled) = self.registries.compile(&self.allowlist) else {
            return;
        };

        self.generation += 1;
        info!(
            "Compiled {} entities (join #{})",
            compiled.len(),
            self.generation
        );
        self.compiled = Arc::new(compiled);
        self.state = SyncState::Synced;
    }
}
