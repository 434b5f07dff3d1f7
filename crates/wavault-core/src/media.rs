use crate::error::RetrievalError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use wavault_api::types::{MediaKind, MediaRef};

/// Retrieval capability supplied by the transport: decrypted bytes for
/// one media reference, or an opaque failure. Persistence stays with the
/// archive writer so retrieval and storage are independently retriable.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, reference: &MediaRef, kind: MediaKind) -> Result<Vec<u8>, RetrievalError>;
}

/// Best-effort filename label. Never a validated content type and never
/// an input to security decisions.
pub fn extension_for(kind: MediaKind, declared_mime: Option<&str>) -> &'static str {
    match kind {
        MediaKind::Image => ".jpg",
        MediaKind::Video => ".mp4",
        MediaKind::Audio => ".ogg",
        MediaKind::Document => {
            let mime = declared_mime.unwrap_or("");
            if mime.contains("pdf") {
                ".pdf"
            } else if mime.contains("zip") {
                ".zip"
            } else if mime.contains("png") {
                ".png"
            } else if mime.contains("jpeg") || mime.contains("jpg") {
                ".jpg"
            } else {
                ".bin"
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct MockMediaFetcher {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_network: Arc<Mutex<usize>>,
}

impl MockMediaFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, reference: &MediaRef, bytes: Vec<u8>) {
        let mut guard = self.blobs.lock().await;
        guard.insert(reference.value.clone(), bytes);
    }

    /// The next `count` fetches fail with a network error before any
    /// lookup happens.
    pub async fn fail_network_times(&self, count: usize) {
        let mut guard = self.fail_network.lock().await;
        *guard = count;
    }
}

#[async_trait]
impl MediaFetcher for MockMediaFetcher {
    async fn fetch(&self, reference: &MediaRef, _kind: MediaKind) -> Result<Vec<u8>, RetrievalError> {
        {
            let mut guard = self.fail_network.lock().await;
            if *guard > 0 {
                *guard -= 1;
                return Err(RetrievalError::Network("injected".to_string()));
            }
        }
        let guard = self.blobs.lock().await;
        guard
            .get(&reference.value)
            .cloned()
            .ok_or(RetrievalError::Expired)
    }
}
