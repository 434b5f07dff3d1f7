use crate::error::CoreError;
use crate::time::now_ms;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairingArtifact {
    pub code: String,
    pub issued_at_ms: u64,
}

/// Single-slot file holding the current pairing code. Absence means
/// "no pairing needed or already paired"; a stale code is never served
/// because every write overwrites the whole slot.
pub struct PairingSlot {
    path: PathBuf,
}

impl PairingSlot {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub async fn write(&self, code: &str) -> Result<PairingArtifact, CoreError> {
        fs::write(&self.path, code)
            .await
            .map_err(CoreError::persistence)?;
        Ok(PairingArtifact {
            code: code.to_string(),
            issued_at_ms: now_ms(),
        })
    }

    /// Idempotent: clearing an already-absent slot is success.
    pub async fn clear(&self) -> Result<(), CoreError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::persistence(e)),
        }
    }

    pub async fn current(&self) -> Option<String> {
        match fs::read_to_string(&self.path).await {
            Ok(code) if !code.is_empty() => Some(code),
            _ => None,
        }
    }
}
