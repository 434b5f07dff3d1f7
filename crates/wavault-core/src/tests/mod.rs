pub mod capture_tests;

use crate::config::CoreConfig;
use crate::media::MockMediaFetcher;
use crate::transport::MockTransport;
use crate::SessionManager;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;
use wavault_api::types::{
    CloseReason, ConnectionPhase, ConnectionUpdate, DeliveryMode, InboundMessage, MediaPayload,
    MediaRef, MessageBatch, MessageEnvelope, SenderId, TransportEvent, ViewOnceWrapper,
};

pub const SENDER: &str = "1234@s.whatsapp.net";

pub struct TestContext {
    pub dir: TempDir,
    pub config: CoreConfig,
    pub transport: MockTransport,
    pub fetcher: MockMediaFetcher,
}

impl TestContext {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let config = CoreConfig {
            auth_dir: dir.path().join("auth_info").display().to_string(),
            archive_dir: dir.path().join("saved").display().to_string(),
            pairing_file: dir.path().join("qr.txt").display().to_string(),
            reconnect_delay_ms: 20,
            halt_when_logged_out: true,
        };
        Self {
            dir,
            config,
            transport: MockTransport::new(),
            fetcher: MockMediaFetcher::new(),
        }
    }

    pub async fn manager(&self) -> SessionManager {
        SessionManager::init(
            self.config.clone(),
            Arc::new(self.transport.clone()),
            Arc::new(self.fetcher.clone()),
        )
        .await
        .expect("manager init")
    }

    pub fn archive_path(&self, name: &str) -> PathBuf {
        self.dir.path().join("saved").join(name)
    }

    pub fn read_log(&self, name: &str) -> String {
        std::fs::read_to_string(self.archive_path(name)).unwrap_or_default()
    }

    pub fn pairing_file_exists(&self) -> bool {
        self.dir.path().join("qr.txt").exists()
    }

    pub fn media_files(&self) -> Vec<String> {
        let dir = self.archive_path("media");
        match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

pub fn qr_update(code: &str) -> TransportEvent {
    TransportEvent::ConnectionUpdate(ConnectionUpdate {
        phase: None,
        pairing_code: Some(code.to_string()),
        close_reason: None,
    })
}

pub fn open_update() -> TransportEvent {
    TransportEvent::ConnectionUpdate(ConnectionUpdate {
        phase: Some(ConnectionPhase::Open),
        pairing_code: None,
        close_reason: None,
    })
}

pub fn close_update(status: Option<u16>, message: &str) -> TransportEvent {
    TransportEvent::ConnectionUpdate(ConnectionUpdate {
        phase: Some(ConnectionPhase::Close),
        pairing_code: None,
        close_reason: Some(CloseReason {
            status,
            message: message.to_string(),
        }),
    })
}

pub fn notify_batch(messages: Vec<InboundMessage>) -> TransportEvent {
    TransportEvent::MessagesUpsert(MessageBatch {
        delivery: DeliveryMode::Notify,
        messages,
    })
}

pub fn text_message(sender: &str, text: &str) -> InboundMessage {
    InboundMessage {
        sender: SenderId::new(sender),
        timestamp_ms: 1_700_000_000_000,
        envelope: MessageEnvelope {
            conversation: Some(text.to_string()),
            ..Default::default()
        },
    }
}

pub fn media_payload(reference: &str, mimetype: &str) -> MediaPayload {
    MediaPayload {
        reference: MediaRef::new(reference),
        mimetype: Some(mimetype.to_string()),
        caption: None,
    }
}

pub fn image_message(sender: &str, reference: &str) -> InboundMessage {
    InboundMessage {
        sender: SenderId::new(sender),
        timestamp_ms: 1_700_000_000_000,
        envelope: MessageEnvelope {
            image: Some(media_payload(reference, "image/jpeg")),
            ..Default::default()
        },
    }
}

pub fn view_once_video_message(sender: &str, reference: &str) -> InboundMessage {
    InboundMessage {
        sender: SenderId::new(sender),
        timestamp_ms: 1_700_000_000_000,
        envelope: MessageEnvelope {
            view_once_v2: Some(Box::new(ViewOnceWrapper {
                message: Some(MessageEnvelope {
                    video: Some(media_payload(reference, "video/mp4")),
                    ..Default::default()
                }),
            })),
            ..Default::default()
        },
    }
}
