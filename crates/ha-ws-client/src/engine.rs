//! Registry sync engine task
//!
//! [`SyncEngine::spawn`] runs one session on a tokio task: fetch
//! credentials, connect, then feed frames through a [`SyncMachine`] until
//! the connection ends or the handle closes it. State is published on a
//! `watch` channel after every step; commands arrive over `mpsc`.
//! No reconnection is attempted.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::credentials::CredentialProvider;
use crate::error::{SyncError, SyncResult};
use crate::sync::{SyncMachine, SyncSnapshot};
use crate::transport::{Connector, Transport};
use crate::wire::{encode, OutgoingMessage};

enum Command {
    Reload(oneshot::Sender<SyncResult<()>>),
    SetAllowlist(HashSet<String>),
    Close,
}

/// Spawns registry sync sessions
pub struct SyncEngine;

impl SyncEngine {
    /// Start a session on the current tokio runtime
    pub fn spawn(
        provider: Arc<dyn CredentialProvider>,
        connector: Arc<dyn Connector>,
        allowlist: HashSet<String>,
    ) -> SyncHandle {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (snapshot_tx, snapshot_rx) = watch::channel(SyncSnapshot::default());

        let session = Session {
            machine: SyncMachine::new(allowlist),
            snapshots: snapshot_tx,
        };
        let task = tokio::spawn(session.run(provider, connector, command_rx));

        SyncHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            task,
        }
    }
}

/// Owner side of a running session
pub struct SyncHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SyncSnapshot>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Latest published state
    pub fn snapshot(&self) -> SyncSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a snapshot satisfies `predicate`
    ///
    /// Fails with [`SyncError::EngineStopped`] if the session ends first.
    pub async fn wait_for<F>(&self, mut predicate: F) -> SyncResult<SyncSnapshot>
    where
        F: FnMut(&SyncSnapshot) -> bool,
    {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| SyncError::EngineStopped)?;
        Ok(snapshot.clone())
    }

    /// Wait for the first join, or for the session to fail without one
    pub async fn wait_until_ready(&self) -> SyncResult<SyncSnapshot> {
        let snapshot = self
            .wait_for(|s| s.has_entities() || s.state.is_terminal())
            .await?;
        match (&snapshot.error, snapshot.has_entities()) {
            (Some(error), false) => Err(SyncError::SessionFailed(error.clone())),
            _ => Ok(snapshot),
        }
    }

    /// Re-send the registry queries on the live connection
    pub async fn reload(&self) -> SyncResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Reload(reply_tx))
            .await
            .map_err(|_| SyncError::NotConnected)?;
        reply_rx.await.map_err(|_| SyncError::NotConnected)?
    }

    /// Replace the published allowlist used for the `shared` flag
    pub async fn set_allowlist(&self, allowlist: HashSet<String>) -> SyncResult<()> {
        self.commands
            .send(Command::SetAllowlist(allowlist))
            .await
            .map_err(|_| SyncError::EngineStopped)
    }

    /// Close the connection and wait for the task to finish
    pub async fn close(self) {
        // Fails only if the task already ended
        let _ = self.commands.send(Command::Close).await;
        if let Err(e) = self.task.await {
            error!("Sync task ended abnormally: {}", e);
        }
    }
}

struct Session {
    machine: SyncMachine,
    snapshots: watch::Sender<SyncSnapshot>,
}

impl Session {
    fn publish(&self) {
        self.snapshots.send_replace(self.machine.snapshot());
    }

    async fn run(
        mut self,
        provider: Arc<dyn CredentialProvider>,
        connector: Arc<dyn Connector>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        let config = match provider.connection_config().await {
            Ok(config) => config,
            Err(e) => {
                self.machine.credentials_failed(&e);
                self.publish();
                return;
            }
        };

        self.machine.begin_connect(&config);
        self.publish();

        let mut transport = match connector.connect(&config.websocket_url).await {
            Ok(transport) => transport,
            Err(e) => {
                self.machine.transport_failed(e.to_string());
                self.publish();
                return;
            }
        };

        self.machine.connected();
        self.publish();

        loop {
            tokio::select! {
                frame = transport.recv() => match frame {
                    Some(Ok(payload)) => {
                        let outgoing = self.machine.handle_frame(&payload);
                        if self.machine.wants_close() {
                            break;
                        }
                        if let Err(e) = send_all(&mut transport, &outgoing).await {
                            self.machine.transport_failed(e.to_string());
                            break;
                        }
                        self.publish();
                    }
                    Some(Err(e)) => {
                        self.machine.transport_failed(e.to_string());
                        break;
                    }
                    None => {
                        self.machine.transport_failed("Connection closed by Home Assistant");
                        break;
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Reload(reply)) => {
                        let result = match self.machine.reload() {
                            Ok(requests) => send_all(&mut transport, &requests).await,
                            Err(e) => Err(e),
                        };
                        let failed = match &result {
                            Err(e @ SyncError::Transport(_)) => Some(e.to_string()),
                            _ => None,
                        };
                        // Caller may have stopped waiting
                        let _ = reply.send(result);
                        if let Some(message) = failed {
                            self.machine.transport_failed(message);
                            break;
                        }
                    }
                    Some(Command::SetAllowlist(allowlist)) => {
                        self.machine.set_allowlist(allowlist);
                        self.publish();
                    }
                    Some(Command::Close) | None => {
                        self.machine.closed();
                        break;
                    }
                },
            }
        }

        // Release the transport before the final state becomes visible
        transport.close().await;
        if self.machine.is_connected() {
            self.machine.closed();
        }
        self.publish();
        info!("Registry sync session ended in state {}", self.machine.state());
    }
}

async fn send_all(
    transport: &mut Box<dyn Transport>,
    messages: &[OutgoingMessage],
) -> SyncResult<()> {
    for message in messages {
        let frame = encode(message)?;
        debug!("Sending {}", message.kind().as_str());
        transport.send(frame).await?;
    }
    Ok(())
}
