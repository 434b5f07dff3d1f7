use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CoreConfig {
    /// Directory holding the opaque credential blob.
    pub auth_dir: String,
    /// Root of the archive: four logs plus the media blob directory.
    pub archive_dir: String,
    /// Single-slot file the presentation surface reads the pairing code from.
    pub pairing_file: String,
    /// Fixed delay between a dropped connection and the next attempt.
    pub reconnect_delay_ms: u64,
    /// Give up instead of reconnecting when the close reason says the
    /// session was logged out remotely.
    pub halt_when_logged_out: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            auth_dir: "auth_info".to_string(),
            archive_dir: "saved".to_string(),
            pairing_file: "qr.txt".to_string(),
            reconnect_delay_ms: 2000,
            halt_when_logged_out: true,
        }
    }
}
