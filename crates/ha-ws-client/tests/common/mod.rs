//! Shared fixtures for engine tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;

use ha_ws_client::{Connector, SyncError, SyncResult, Transport, WirePayload};

pub const TOKEN: &str = "test-token-12345";
pub const STEP: Duration = Duration::from_secs(5);

/// Transport backed by in-memory channels
pub struct ChannelTransport {
    inbound: mpsc::UnboundedReceiver<SyncResult<WirePayload>>,
    outbound: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, frame: String) -> SyncResult<()> {
        self.outbound
            .send(frame)
            .map_err(|_| SyncError::transport("hub gone"))
    }

    async fn recv(&mut self) -> Option<SyncResult<WirePayload>> {
        self.inbound.recv().await
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out a single prepared transport
pub struct ChannelConnector {
    transport: Mutex<Option<ChannelTransport>>,
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn connect(&self, _url: &str) -> SyncResult<Box<dyn Transport>> {
        let transport = self.transport.lock().unwrap().take();
        match transport {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(SyncError::transport("already connected")),
        }
    }
}

/// Connector whose connect always fails
pub struct RefusingConnector;

#[async_trait]
impl Connector for RefusingConnector {
    async fn connect(&self, _url: &str) -> SyncResult<Box<dyn Transport>> {
        Err(SyncError::transport("connection refused"))
    }
}

/// Test side of a [`ChannelTransport`]
pub struct MockHub {
    to_client: Option<mpsc::UnboundedSender<SyncResult<WirePayload>>>,
    from_client: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl MockHub {
    pub fn send(&self, value: Value) {
        self.send_payload(WirePayload::Text(value.to_string()));
    }

    pub fn send_payload(&self, payload: WirePayload) {
        if let Some(tx) = &self.to_client {
            tx.send(Ok(payload)).unwrap();
        }
    }

    pub fn fail(&self, message: &str) {
        if let Some(tx) = &self.to_client {
            tx.send(Err(SyncError::transport(message))).unwrap();
        }
    }

    /// Drop the inbound side, as if the hub hung up
    pub fn hang_up(&mut self) {
        self.to_client = None;
    }

    /// Stop accepting client frames; later sends fail
    pub fn stop_listening(&mut self) {
        self.from_client.close();
    }

    pub async fn recv(&mut self) -> Value {
        let frame = timeout(STEP, self.from_client.recv())
            .await
            .expect("timed out waiting for client frame")
            .expect("client side closed");
        serde_json::from_str(&frame).unwrap()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Drive the handshake up to the three registry queries
    pub async fn authenticate(&mut self) -> Vec<Value> {
        self.send(json!({"type": "auth_required", "ha_version": "2026.1.1"}));
        assert_eq!(
            self.recv().await,
            json!({"type": "auth", "access_token": TOKEN})
        );
        self.send(json!({"type": "auth_ok", "ha_version": "2026.1.1"}));
        let mut requests = Vec::new();
        for _ in 0..3 {
            requests.push(self.recv().await);
        }
        requests
    }
}

pub fn mock_link() -> (ChannelConnector, MockHub) {
    let (to_client, inbound) = mpsc::unbounded_channel();
    let (outbound, from_client) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));

    let connector = ChannelConnector {
        transport: Mutex::new(Some(ChannelTransport {
            inbound,
            outbound,
            closed: Arc::clone(&closed),
        })),
    };
    let hub = MockHub {
        to_client: Some(to_client),
        from_client,
        closed,
    };
    (connector, hub)
}

pub fn result(id: u64, records: Value) -> Value {
    json!({"id": id, "type": "result", "success": true, "result": records})
}

pub fn device_result() -> Value {
    result(
        2,
        json!([
            {"id": "dev-1", "name": "Hue Bulb", "name_by_user": null, "manufacturer": "Philips", "model": "LCT015", "area_id": "area-1"},
            {"id": "dev-2", "name": "Plug", "name_by_user": "Coffee Plug", "manufacturer": "TP-Link", "model": null, "area_id": null}
        ]),
    )
}

pub fn entity_result() -> Value {
    result(
        3,
        json!([
            {"id": "ent-1", "entity_id": "light.kitchen", "name": "Kitchen Light", "original_name": "Hue Bulb", "entity_category": null, "device_id": "dev-1", "area_id": "area-1"},
            {"id": "ent-2", "entity_id": "switch.coffee", "name": null, "original_name": "Coffee", "entity_category": null, "device_id": "dev-2", "area_id": null},
            {"id": "ent-3", "entity_id": "sensor.plug_power", "name": null, "original_name": "Power", "entity_category": "diagnostic", "device_id": "dev-2", "area_id": "area-9"},
            {"id": "ent-4", "entity_id": "person.alice", "name": "Alice", "device_id": null, "area_id": null},
            {"id": "ent-5", "entity_id": "", "name": "Broken", "device_id": null, "area_id": null}
        ]),
    )
}

pub fn area_result() -> Value {
    result(
        4,
        json!([
            {"area_id": "area-1", "name": "Kitchen", "floor_id": null},
            {"area_id": "area-2", "name": "Office", "floor_id": "ground"}
        ]),
    )
}

/// Respond to the registry queries in the order given
pub fn answer(hub: &MockHub, replies: &[Value]) {
    for reply in replies {
        hub.send(reply.clone());
    }
}
