use crate::error::CoreError;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;
use wavault_api::types::CredentialBlob;

const CREDS_FILE: &str = "creds.json";

/// Persists the opaque session authentication material. The blob is
/// written verbatim; only the transport can interpret it.
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, CoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CoreError::Startup(format!("auth dir: {e}")))?;
        Ok(Self { dir })
    }

    fn creds_path(&self) -> PathBuf {
        self.dir.join(CREDS_FILE)
    }

    /// An absent file means a fresh, unpaired session. An unreadable file
    /// is fatal: there is no safe default for half-lost credentials.
    pub async fn load(&self) -> Result<Option<CredentialBlob>, CoreError> {
        let path = self.creds_path();
        match fs::read(&path).await {
            Ok(value) => Ok(Some(CredentialBlob { value })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::Startup(format!("creds unreadable: {e}"))),
        }
    }

    /// Whole-file replace, last writer wins. The temp-then-rename dance
    /// keeps a crash from leaving a truncated blob behind.
    pub async fn save(&self, blob: &CredentialBlob) -> Result<(), CoreError> {
        let tmp = self.dir.join(format!(".creds-{}.tmp", Uuid::new_v4()));
        if let Err(e) = fs::write(&tmp, &blob.value).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(CoreError::persistence(e));
        }
        fs::rename(&tmp, self.creds_path())
            .await
            .map_err(CoreError::persistence)
    }
}
