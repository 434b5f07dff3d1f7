use crate::error::CoreError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, Mutex};
use wavault_api::types::{CredentialBlob, TransportEvent};

/// One live subscription to the transport's event stream. Dropping the
/// connection tears the subscription down; the stream ending means the
/// transport is gone.
pub struct Connection {
    pub events: mpsc::Receiver<TransportEvent>,
}

/// The wire protocol, encryption and multi-device session crypto live
/// behind this seam; the pipeline only consumes events.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, creds: Option<CredentialBlob>) -> Result<Connection, CoreError>;
}

/// Scriptable in-memory transport. Each `connect` consumes the next
/// pushed script and replays it into the returned connection, then ends
/// the stream; with no script queued the connection stays open until
/// events are fed through `emit` or the transport is dropped.
#[derive(Clone, Default)]
pub struct MockTransport {
    scripts: Arc<Mutex<VecDeque<Vec<TransportEvent>>>>,
    connects: Arc<StdMutex<Vec<Option<CredentialBlob>>>>,
    open: Arc<Mutex<Vec<mpsc::Sender<TransportEvent>>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_script(&self, events: Vec<TransportEvent>) {
        let mut guard = self.scripts.lock().await;
        guard.push_back(events);
    }

    /// Feed one event into every connection left open (no script).
    pub async fn emit(&self, event: TransportEvent) {
        let guard = self.open.lock().await;
        for sender in guard.iter() {
            let _ = sender.send(event.clone()).await;
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().expect("poisoned").len()
    }

    /// Credentials observed at each connect, in order.
    pub fn connect_creds(&self) -> Vec<Option<CredentialBlob>> {
        self.connects.lock().expect("poisoned").clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, creds: Option<CredentialBlob>) -> Result<Connection, CoreError> {
        {
            let mut guard = self.connects.lock().expect("poisoned");
            guard.push(creds);
        }
        let (tx, rx) = mpsc::channel(64);
        let script = {
            let mut guard = self.scripts.lock().await;
            guard.pop_front()
        };
        match script {
            Some(events) => {
                tokio::spawn(async move {
                    for event in events {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                });
            }
            None => {
                let mut guard = self.open.lock().await;
                guard.push(tx);
            }
        }
        Ok(Connection { events: rx })
    }
}
