use crate::archive::{ArchiveWriter, LogKind, LogLine};
use crate::classify::{classify, deletion_record, Outcome};
use crate::config::CoreConfig;
use crate::creds::CredentialStore;
use crate::error::CoreError;
use crate::ids::sanitize_sender;
use crate::media::{extension_for, MediaFetcher};
use crate::pairing::{PairingArtifact, PairingSlot};
use crate::time::now_ms;
use crate::transport::{Connection, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::sleep;
use wavault_api::types::{
    CloseReason, ConnectionPhase, ConnectionUpdate, CredentialBlob, DeletionNotice, DeliveryMode,
    MessageBatch, NormalizedRecord, RecordKind, TransportEvent,
};
use wavault_api::validation::validate_record;

#[derive(Clone, Debug, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    AwaitingPairing,
    Open,
    Closed(CloseReason),
}

/// The one mutable value of the whole pipeline. Owned by the manager's
/// consumer task; nothing else writes it.
pub struct Session {
    pub creds: Option<CredentialBlob>,
    pub state: ConnectionState,
    pub pairing: Option<PairingArtifact>,
}

enum Flow {
    Continue,
    Reconnect,
    Halt,
}

enum Drive {
    Shutdown,
    Reconnect,
    Halt,
}

pub struct SessionManager {
    config: CoreConfig,
    transport: Arc<dyn Transport>,
    fetcher: Arc<dyn MediaFetcher>,
    creds: CredentialStore,
    pairing: PairingSlot,
    archive: Arc<ArchiveWriter>,
    session: Session,
    state_tx: watch::Sender<ConnectionState>,
}

impl SessionManager {
    /// Opens the stores and reloads persisted credentials. Any failure
    /// here is a startup error; there is no safe way to run without the
    /// credential store or the archive.
    pub async fn init(
        config: CoreConfig,
        transport: Arc<dyn Transport>,
        fetcher: Arc<dyn MediaFetcher>,
    ) -> Result<Self, CoreError> {
        let creds = CredentialStore::open(&config.auth_dir).await?;
        let archive = Arc::new(ArchiveWriter::open(&config.archive_dir).await?);
        let pairing = PairingSlot::new(&config.pairing_file);
        let loaded = creds.load().await?;
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Ok(Self {
            config,
            transport,
            fetcher,
            creds,
            pairing,
            archive,
            session: Session {
                creds: loaded,
                state: ConnectionState::Disconnected,
                pairing: None,
            },
            state_tx,
        })
    }

    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn archive(&self) -> Arc<ArchiveWriter> {
        self.archive.clone()
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.session.state = state.clone();
        let _ = self.state_tx.send(state);
    }

    /// Bounded reconnect loop. One connection is live at a time: the
    /// previous `Connection` is dropped before the backoff sleep, and
    /// credential writes happen on this task, so the store has a single
    /// writer across reconnects.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> Result<(), CoreError> {
        loop {
            self.set_state(ConnectionState::Connecting);
            let connected = tokio::select! {
                _ = &mut shutdown => return Ok(()),
                res = self.transport.connect(self.session.creds.clone()) => res,
            };
            match connected {
                Ok(mut connection) => match self.drive(&mut connection, &mut shutdown).await {
                    Drive::Shutdown => return Ok(()),
                    Drive::Halt => return Ok(()),
                    Drive::Reconnect => {}
                },
                Err(e) => {
                    self.archive
                        .record_error(now_ms(), "-", &format!("connect: {e}"))
                        .await;
                }
            }
            let delay = Duration::from_millis(self.config.reconnect_delay_ms);
            tokio::select! {
                _ = &mut shutdown => return Ok(()),
                _ = sleep(delay) => {}
            }
        }
    }

    async fn drive(
        &mut self,
        connection: &mut Connection,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> Drive {
        loop {
            let event = tokio::select! {
                _ = &mut *shutdown => return Drive::Shutdown,
                event = connection.events.recv() => event,
            };
            let Some(event) = event else {
                // Stream ended without a close event; treat as a drop.
                self.clear_pairing().await;
                self.set_state(ConnectionState::Closed(CloseReason {
                    status: None,
                    message: "event stream ended".to_string(),
                }));
                self.append_event("connection", "close: event stream ended")
                    .await;
                return Drive::Reconnect;
            };
            match self.handle_event(event).await {
                Flow::Continue => {}
                Flow::Reconnect => return Drive::Reconnect,
                Flow::Halt => return Drive::Halt,
            }
        }
    }

    /// Every event handler is a fault boundary: failures are recorded to
    /// the error-log and never stop delivery of subsequent events.
    async fn handle_event(&mut self, event: TransportEvent) -> Flow {
        match event {
            TransportEvent::ConnectionUpdate(update) => self.on_connection_update(update).await,
            TransportEvent::CredsUpdate(blob) => {
                self.on_creds_update(blob).await;
                Flow::Continue
            }
            TransportEvent::MessagesUpsert(batch) => {
                self.on_messages_upsert(batch).await;
                Flow::Continue
            }
            TransportEvent::MessagesDelete(notice) => {
                self.on_messages_delete(notice).await;
                Flow::Continue
            }
        }
    }

    async fn on_connection_update(&mut self, update: ConnectionUpdate) -> Flow {
        if let Some(code) = update.pairing_code.as_deref() {
            // The only path that mutates the artifact; a newer code
            // always overwrites the slot.
            match self.pairing.write(code).await {
                Ok(artifact) => {
                    self.session.pairing = Some(artifact);
                    self.set_state(ConnectionState::AwaitingPairing);
                    self.append_event("pairing", "pairing code issued").await;
                }
                Err(e) => {
                    self.archive
                        .record_error(now_ms(), "-", &format!("pairing slot: {e}"))
                        .await;
                }
            }
        }
        match update.phase {
            Some(ConnectionPhase::Open) => {
                self.clear_pairing().await;
                self.set_state(ConnectionState::Open);
                self.append_event("connection", "open").await;
                Flow::Continue
            }
            Some(ConnectionPhase::Close) => {
                // A code issued by a connection that just died is stale;
                // never leave it in the slot.
                self.clear_pairing().await;
                let reason = update.close_reason.unwrap_or_default();
                let detail = serde_json::to_string(&reason)
                    .unwrap_or_else(|_| reason.message.clone());
                self.append_event("connection", &format!("close: {detail}"))
                    .await;
                let logged_out = reason.logged_out();
                self.set_state(ConnectionState::Closed(reason));
                if logged_out && self.config.halt_when_logged_out {
                    log::warn!("session logged out remotely; re-pairing required");
                    Flow::Halt
                } else {
                    Flow::Reconnect
                }
            }
            Some(ConnectionPhase::Connecting) | None => Flow::Continue,
        }
    }

    /// Persisted before the next event is consumed; an update lost to a
    /// crash must not desynchronize local state from the remote session.
    async fn on_creds_update(&mut self, blob: CredentialBlob) {
        self.session.creds = Some(blob.clone());
        if let Err(e) = self.creds.save(&blob).await {
            self.archive
                .record_error(now_ms(), "-", &format!("creds save: {e}"))
                .await;
        }
    }

    async fn on_messages_upsert(&mut self, batch: MessageBatch) {
        if batch.delivery != DeliveryMode::Notify {
            return;
        }
        for message in &batch.messages {
            match classify(message) {
                Outcome::Skip => {}
                Outcome::Record(record) => self.archive_record(record).await,
            }
        }
    }

    async fn on_messages_delete(&mut self, notice: DeletionNotice) {
        let record = deletion_record(&notice, now_ms());
        self.archive_record(record).await;
    }

    async fn archive_record(&mut self, record: NormalizedRecord) {
        if let Err(e) = validate_record(&record) {
            self.archive
                .record_error(record.timestamp_ms, &record.sender.value, &format!("record: {e}"))
                .await;
            return;
        }
        match record.kind {
            RecordKind::Text | RecordKind::Deletion | RecordKind::Unknown => {
                let payload = record.text.as_deref().unwrap_or("unrecognized");
                let line = LogLine::new(
                    record.timestamp_ms,
                    record.sender.value.clone(),
                    record.kind.label(),
                    payload,
                );
                if let Err(e) = self.archive.append(LogKind::Message, &line).await {
                    self.archive
                        .record_error(record.timestamp_ms, &record.sender.value, &format!("append: {e}"))
                        .await;
                }
            }
            RecordKind::Media(_) => {
                // Captions get a text line of their own so text search
                // covers them.
                if let Some(caption) = record.text.as_deref() {
                    let line = LogLine::new(
                        record.timestamp_ms,
                        record.sender.value.clone(),
                        "text",
                        caption,
                    );
                    if let Err(e) = self.archive.append(LogKind::Message, &line).await {
                        self.archive
                            .record_error(
                                record.timestamp_ms,
                                &record.sender.value,
                                &format!("append: {e}"),
                            )
                            .await;
                    }
                }
                // Retrieval and persistence run concurrently with the
                // event loop; ordering only binds a blob to its own line.
                tokio::spawn(capture_media(
                    self.archive.clone(),
                    self.fetcher.clone(),
                    record,
                ));
            }
        }
    }

    /// Idempotent; clearing an already-absent artifact is not an error.
    async fn clear_pairing(&mut self) {
        self.session.pairing = None;
        if let Err(e) = self.pairing.clear().await {
            self.archive
                .record_error(now_ms(), "-", &format!("pairing clear: {e}"))
                .await;
        }
    }

    async fn append_event(&self, kind: &str, payload: &str) {
        let line = LogLine::new(now_ms(), "-", kind, payload);
        if let Err(e) = self.archive.append(LogKind::Event, &line).await {
            log::error!("event-log unwritable: {e}");
        }
    }
}

/// One media capture: fetch, persist the blob, then the log line. Either
/// a blob plus its media-log line, or an error-log line and no partial
/// file.
async fn capture_media(
    archive: Arc<ArchiveWriter>,
    fetcher: Arc<dyn MediaFetcher>,
    record: NormalizedRecord,
) {
    let Some(descriptor) = record.media.as_ref() else {
        return;
    };
    let sender = record.sender.value.as_str();
    let bytes = match fetcher.fetch(&descriptor.reference, descriptor.kind).await {
        Ok(bytes) => bytes,
        Err(e) => {
            archive
                .record_error(record.timestamp_ms, sender, &format!("retrieval: {e}"))
                .await;
            return;
        }
    };
    let ext = extension_for(descriptor.kind, descriptor.mimetype.as_deref());
    let filename = archive
        .reserve_media_filename(
            &sanitize_sender(&record.sender),
            now_ms(),
            descriptor.ephemeral,
            ext,
        )
        .await;
    if let Err(e) = archive.store_media(&bytes, &filename).await {
        archive
            .record_error(record.timestamp_ms, sender, &format!("store: {e}"))
            .await;
        return;
    }
    let line = LogLine::new(
        record.timestamp_ms,
        sender,
        record.kind.label(),
        format!("{}/{filename}", crate::archive::MEDIA_SUBDIR),
    );
    if let Err(e) = archive.append(LogKind::Media, &line).await {
        archive
            .record_error(record.timestamp_ms, sender, &format!("append: {e}"))
            .await;
    }
}
