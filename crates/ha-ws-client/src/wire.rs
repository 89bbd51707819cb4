//! Hub message codec
//!
//! Every frame is a single JSON object with a `type` field. The client
//! only understands the handshake messages and registry list replies;
//! anything else decodes to [`MessageKind::Other`] and is ignored.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ha_registries::entity_domain;

use crate::error::WireError;

/// Message `type` values this client knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "auth_required")]
    AuthRequired,
    #[serde(rename = "auth_ok")]
    AuthOk,
    #[serde(rename = "auth_invalid")]
    AuthInvalid,
    #[serde(rename = "auth")]
    Auth,
    #[serde(rename = "result")]
    Result,
    #[serde(rename = "config/device_registry/list")]
    DeviceRegistryList,
    #[serde(rename = "config/entity_registry/list")]
    EntityRegistryList,
    #[serde(rename = "config/area_registry/list")]
    AreaRegistryList,
    #[serde(other)]
    Other,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::AuthRequired => "auth_required",
            MessageKind::AuthOk => "auth_ok",
            MessageKind::AuthInvalid => "auth_invalid",
            MessageKind::Auth => "auth",
            MessageKind::Result => "result",
            MessageKind::DeviceRegistryList => "config/device_registry/list",
            MessageKind::EntityRegistryList => "config/entity_registry/list",
            MessageKind::AreaRegistryList => "config/area_registry/list",
            MessageKind::Other => "other",
        }
    }
}

/// Error object attached to a failed `result`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResultError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Decoded inbound frame
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IncomingMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub result: Option<Value>,
    /// Reason text on `auth_invalid`
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<ResultError>,
    #[serde(default)]
    pub ha_version: Option<String>,
}

impl IncomingMessage {
    /// Record list carried by a `result`, if any
    pub fn records(&self) -> Option<&[Value]> {
        self.result
            .as_ref()
            .and_then(Value::as_array)
            .map(Vec::as_slice)
    }

    /// A `result` explicitly marked as failed
    pub fn is_failure(&self) -> bool {
        self.kind == MessageKind::Result && self.success == Some(false)
    }

    /// Human readable reason for a failed result or rejected auth
    pub fn failure_reason(&self) -> String {
        self.error
            .as_ref()
            .map(|e| e.message.clone())
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

/// Outbound frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    #[serde(rename = "auth")]
    Auth { access_token: String },

    #[serde(rename = "config/device_registry/list")]
    DeviceRegistryList { id: u64 },

    #[serde(rename = "config/entity_registry/list")]
    EntityRegistryList { id: u64 },

    #[serde(rename = "config/area_registry/list")]
    AreaRegistryList { id: u64 },
}

impl OutgoingMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            OutgoingMessage::Auth { .. } => MessageKind::Auth,
            OutgoingMessage::DeviceRegistryList { .. } => MessageKind::DeviceRegistryList,
            OutgoingMessage::EntityRegistryList { .. } => MessageKind::EntityRegistryList,
            OutgoingMessage::AreaRegistryList { .. } => MessageKind::AreaRegistryList,
        }
    }

    /// Request id, absent for the auth frame
    pub fn id(&self) -> Option<u64> {
        match self {
            OutgoingMessage::Auth { .. } => None,
            OutgoingMessage::DeviceRegistryList { id }
            | OutgoingMessage::EntityRegistryList { id }
            | OutgoingMessage::AreaRegistryList { id } => Some(*id),
        }
    }
}

/// The three registries queried after authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryKind {
    Devices,
    Entities,
    Areas,
}

impl RegistryKind {
    /// Query order after `auth_ok`
    pub const ALL: [RegistryKind; 3] = [
        RegistryKind::Devices,
        RegistryKind::Entities,
        RegistryKind::Areas,
    ];

    /// Fixed request id used to correlate the reply
    pub fn request_id(&self) -> u64 {
        match self {
            RegistryKind::Devices => 2,
            RegistryKind::Entities => 3,
            RegistryKind::Areas => 4,
        }
    }

    pub fn from_request_id(id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.request_id() == id)
    }

    pub fn request(&self) -> OutgoingMessage {
        let id = self.request_id();
        match self {
            RegistryKind::Devices => OutgoingMessage::DeviceRegistryList { id },
            RegistryKind::Entities => OutgoingMessage::EntityRegistryList { id },
            RegistryKind::Areas => OutgoingMessage::AreaRegistryList { id },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryKind::Devices => "devices",
            RegistryKind::Entities => "entities",
            RegistryKind::Areas => "areas",
        }
    }
}

/// All three registry queries, in send order
pub fn registry_requests() -> Vec<OutgoingMessage> {
    RegistryKind::ALL.iter().map(RegistryKind::request).collect()
}

/// Raw frame payload as delivered by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WirePayload {
    Text(String),
    Binary(Vec<u8>),
    /// A frame delivered in fragments, to be concatenated
    Chunks(Vec<Vec<u8>>),
}

impl WirePayload {
    pub fn as_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            WirePayload::Text(text) => Cow::Borrowed(text.as_bytes()),
            WirePayload::Binary(bytes) => Cow::Borrowed(bytes),
            WirePayload::Chunks(chunks) => Cow::Owned(chunks.concat()),
        }
    }
}

impl From<String> for WirePayload {
    fn from(text: String) -> Self {
        WirePayload::Text(text)
    }
}

impl From<&str> for WirePayload {
    fn from(text: &str) -> Self {
        WirePayload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for WirePayload {
    fn from(bytes: Vec<u8>) -> Self {
        WirePayload::Binary(bytes)
    }
}

impl From<Vec<Vec<u8>>> for WirePayload {
    fn from(chunks: Vec<Vec<u8>>) -> Self {
        WirePayload::Chunks(chunks)
    }
}

/// Decode one frame
pub fn decode(payload: &WirePayload) -> Result<IncomingMessage, WireError> {
    serde_json::from_slice(&payload.as_bytes()).map_err(|e| WireError::Decode { source: e })
}

/// Encode one frame as JSON text
pub fn encode(message: &OutgoingMessage) -> Result<String, WireError> {
    serde_json::to_string(message).map_err(|e| WireError::Encode { source: e })
}

pub fn is_auth_required(message: &IncomingMessage) -> bool {
    message.kind == MessageKind::AuthRequired
}

pub fn is_auth_ok(message: &IncomingMessage) -> bool {
    message.kind == MessageKind::AuthOk
}

pub fn is_auth_invalid(message: &IncomingMessage) -> bool {
    message.kind == MessageKind::AuthInvalid
}

/// Which registry a `result` answers, by request id
pub fn registry_result(message: &IncomingMessage) -> Option<RegistryKind> {
    if message.kind != MessageKind::Result {
        return None;
    }
    message.id.and_then(RegistryKind::from_request_id)
}

pub fn is_device_result(message: &IncomingMessage) -> bool {
    registry_result(message) == Some(RegistryKind::Devices)
}

pub fn is_entity_result(message: &IncomingMessage) -> bool {
    registry_result(message) == Some(RegistryKind::Entities)
}

pub fn is_area_result(message: &IncomingMessage) -> bool {
    registry_result(message) == Some(RegistryKind::Areas)
}

/// Entity record with a non-empty id whose domain is in `allowed_domains`
///
/// The domain is everything before the first `.`.
pub fn is_valid_entity(record: &Value, allowed_domains: &[String]) -> bool {
    let Some(entity_id) = record.get("entity_id").and_then(Value::as_str) else {
        return false;
    };
    if entity_id.is_empty() {
        return false;
    }
    let domain = entity_domain(entity_id);
    allowed_domains.iter().any(|allowed| allowed == domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn domains(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_decode_handshake() {
        let msg = decode(&WirePayload::from(r#"{"type":"auth_required","ha_version":"2026.1.1"}"#))
            .unwrap();
        assert!(is_auth_required(&msg));
        assert_eq!(msg.ha_version.as_deref(), Some("2026.1.1"));

        let msg = decode(&WirePayload::from(r#"{"type":"auth_ok"}"#)).unwrap();
        assert!(is_auth_ok(&msg));

        let msg = decode(&WirePayload::from(
            r#"{"type":"auth_invalid","message":"Invalid access token or password"}"#,
        ))
        .unwrap();
        assert!(is_auth_invalid(&msg));
        assert_eq!(msg.failure_reason(), "Invalid access token or password");
    }

    #[test]
    fn test_decode_binary_and_chunks() {
        let text = r#"{"type":"result","id":4,"success":true,"result":[]}"#;
        let binary = decode(&WirePayload::from(text.as_bytes().to_vec())).unwrap();
        assert!(is_area_result(&binary));

        let (head, tail) = text.split_at(10);
        let chunks = decode(&WirePayload::from(vec![
            head.as_bytes().to_vec(),
            tail.as_bytes().to_vec(),
        ]))
        .unwrap();
        assert_eq!(chunks, binary);
    }

    #[test]
    fn test_decode_malformed() {
        assert!(decode(&WirePayload::from("not json")).is_err());
        assert!(decode(&WirePayload::from(r#"{"id":2}"#)).is_err());
    }

    #[test]
    fn test_unknown_type_is_other() {
        let msg = decode(&WirePayload::from(r#"{"type":"event","id":9}"#)).unwrap();
        assert_eq!(msg.kind, MessageKind::Other);
        assert_eq!(registry_result(&msg), None);
    }

    #[test]
    fn test_result_predicates_use_request_id() {
        let device = decode(&WirePayload::from(r#"{"type":"result","id":2,"success":true,"result":[]}"#))
            .unwrap();
        let entity = decode(&WirePayload::from(r#"{"type":"result","id":3,"success":true,"result":[]}"#))
            .unwrap();
        let other = decode(&WirePayload::from(r#"{"type":"result","id":7,"success":true}"#)).unwrap();

        assert!(is_device_result(&device));
        assert!(!is_entity_result(&device));
        assert!(is_entity_result(&entity));
        assert!(!is_area_result(&entity));
        assert_eq!(registry_result(&other), None);
    }

    #[test]
    fn test_failed_result() {
        let msg = decode(&WirePayload::from(
            r#"{"type":"result","id":2,"success":false,"error":{"code":"unauthorized","message":"Unauthorized"}}"#,
        ))
        .unwrap();
        assert!(msg.is_failure());
        assert_eq!(msg.records(), None);
        assert_eq!(msg.failure_reason(), "Unauthorized");
    }

    #[test]
    fn test_encode_auth_and_requests() {
        let auth = encode(&OutgoingMessage::Auth {
            access_token: "abc.def".to_string(),
        })
        .unwrap();
        let value: Value = serde_json::from_str(&auth).unwrap();
        assert_eq!(value, json!({"type": "auth", "access_token": "abc.def"}));

        let requests: Vec<Value> = registry_requests()
            .iter()
            .map(|m| serde_json::from_str(&encode(m).unwrap()).unwrap())
            .collect();
        assert_eq!(
            requests,
            vec![
                json!({"type": "config/device_registry/list", "id": 2}),
                json!({"type": "config/entity_registry/list", "id": 3}),
                json!({"type": "config/area_registry/list", "id": 4}),
            ]
        );
    }

    #[test]
    fn test_is_valid_entity() {
        let allowed = domains(&["light", "switch"]);
        assert!(is_valid_entity(&json!({"entity_id": "light.kitchen"}), &allowed));
        assert!(!is_valid_entity(&json!({"entity_id": "sensor.temp"}), &allowed));
        assert!(!is_valid_entity(&json!({"entity_id": ""}), &allowed));
        assert!(!is_valid_entity(&json!({"entity_id": null}), &allowed));
        assert!(!is_valid_entity(&json!({"id": "x"}), &allowed));
        // Domain is the text before the first dot
        assert!(is_valid_entity(&json!({"entity_id": "switch.a.b"}), &allowed));
        assert!(!is_valid_entity(&json!({"entity_id": "lights.kitchen"}), &allowed));
    }
}
