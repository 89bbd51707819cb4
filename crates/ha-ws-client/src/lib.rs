//! Home Assistant registry sync client
//!
//! Connects to the hub's websocket API, authenticates, queries the device,
//! entity and area registries and keeps a joined [`CompiledEntity`] list
//! up to date:
//!
//! - [`wire`] - message types and the JSON frame codec
//! - [`credentials`] - token and URL lookup from the add-on environment
//! - [`transport`] - the duplex connection seam and its websocket implementation
//! - [`sync`] - the I/O-free state machine
//! - [`engine`] - the tokio task driving a session
//!
//! # Example
//!
//! ```ignore
//! use std::collections::HashSet;
//! use std::sync::Arc;
//! use ha_ws_client::{AddonOptionsProvider, SyncEngine, WsConnector};
//!
//! let handle = SyncEngine::spawn(
//!     Arc::new(AddonOptionsProvider::from_env()),
//!     Arc::new(WsConnector::default()),
//!     HashSet::new(),
//! );
//! let snapshot = handle.wait_until_ready().await?;
//! println!("{} entities", snapshot.entities.len());
//! ```
//!
//! [`CompiledEntity`]: ha_registries::CompiledEntity

pub mod credentials;
pub mod engine;
pub mod error;
pub mod sync;
pub mod transport;
pub mod wire;

pub use credentials::{
    default_entity_domains, websocket_url, AddonOptions, AddonOptionsProvider, ConnectionConfig,
    CredentialProvider, StaticCredentials, CONF_PATH_ENV, DEFAULT_ENTITY_DOMAINS,
    DEFAULT_WEBSOCKET_URL, TOKEN_ENV, WEBSOCKET_URL_ENV,
};
pub use engine::{SyncEngine, SyncHandle};
pub use error::{SyncError, SyncResult, WireError};
pub use sync::{SyncMachine, SyncSnapshot, SyncState};
pub use transport::{Connector, Transport, WsConnector, WsTransport, DEFAULT_CONNECT_TIMEOUT};
pub use wire::{
    decode, encode, is_area_result, is_auth_invalid, is_auth_ok, is_auth_required,
    is_device_result, is_entity_result, is_valid_entity, registry_requests, registry_result,
    IncomingMessage, MessageKind, OutgoingMessage, RegistryKind, WirePayload,
};
