use crate::error::CoreError;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const MEDIA_SUBDIR: &str = "media";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogKind {
    Event,
    Message,
    Media,
    Error,
}

impl LogKind {
    pub fn filename(&self) -> &'static str {
        match self {
            LogKind::Event => "events.log",
            LogKind::Message => "messages.log",
            LogKind::Media => "media.log",
            LogKind::Error => "errors.log",
        }
    }
}

/// One archive record: `timestamp | sender | kind | payload`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp_ms: u64,
    pub sender: String,
    pub kind: String,
    pub payload: String,
}

impl LogLine {
    pub fn new(
        timestamp_ms: u64,
        sender: impl Into<String>,
        kind: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            timestamp_ms,
            sender: sender.into(),
            kind: kind.into(),
            payload: payload.into(),
        }
    }

    /// One record must stay one line: delimiter and line-break bytes in
    /// field values are escaped before rendering.
    fn escape(field: &str) -> String {
        let mut out = String::with_capacity(field.len());
        for c in field.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '|' => out.push_str("\\|"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                _ => out.push(c),
            }
        }
        out
    }

    pub fn render(&self) -> String {
        format!(
            "{} | {} | {} | {}\n",
            self.timestamp_ms,
            Self::escape(&self.sender),
            Self::escape(&self.kind),
            Self::escape(&self.payload),
        )
    }
}

/// Append-only structured logs plus the media blob directory. One open
/// handle per log behind its own mutex keeps appends from interleaving;
/// each record is a single write of the whole rendered line.
pub struct ArchiveWriter {
    root: PathBuf,
    media_dir: PathBuf,
    events: Mutex<File>,
    messages: Mutex<File>,
    media: Mutex<File>,
    errors: Mutex<File>,
}

impl ArchiveWriter {
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, CoreError> {
        let root = root.as_ref().to_path_buf();
        let media_dir = root.join(MEDIA_SUBDIR);
        fs::create_dir_all(&media_dir)
            .await
            .map_err(|e| CoreError::Startup(format!("archive dir: {e}")))?;
        Ok(Self {
            events: Mutex::new(Self::open_log(&root, LogKind::Event).await?),
            messages: Mutex::new(Self::open_log(&root, LogKind::Message).await?),
            media: Mutex::new(Self::open_log(&root, LogKind::Media).await?),
            errors: Mutex::new(Self::open_log(&root, LogKind::Error).await?),
            root,
            media_dir,
        })
    }

    async fn open_log(root: &Path, kind: LogKind) -> Result<File, CoreError> {
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(root.join(kind.filename()))
            .await
            .map_err(|e| CoreError::Startup(format!("{}: {e}", kind.filename())))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    fn log(&self, kind: LogKind) -> &Mutex<File> {
        match kind {
            LogKind::Event => &self.events,
            LogKind::Message => &self.messages,
            LogKind::Media => &self.media,
            LogKind::Error => &self.errors,
        }
    }

    /// Atomic per call: the rendered line goes out in one write, so a
    /// failed append leaves no partial record behind the flush.
    pub async fn append(&self, kind: LogKind, line: &LogLine) -> Result<(), CoreError> {
        let rendered = line.render();
        let mut file = self.log(kind).lock().await;
        file.write_all(rendered.as_bytes())
            .await
            .map_err(CoreError::persistence)?;
        file.flush().await.map_err(CoreError::persistence)
    }

    /// Disk failures land in the error-log when it is still writable and
    /// fall back to the process log otherwise. Never fails the caller.
    pub async fn record_error(&self, timestamp_ms: u64, sender: &str, detail: &str) {
        let line = LogLine::new(timestamp_ms, sender, "error", detail);
        if let Err(e) = self.append(LogKind::Error, &line).await {
            log::error!("error-log unwritable ({e}); dropped entry: {detail}");
        }
    }

    /// Timestamp-qualified blob name, bumped while a blob with the same
    /// name already exists (two retrievals from one sender can complete
    /// in the same millisecond).
    pub async fn reserve_media_filename(
        &self,
        sanitized_sender: &str,
        timestamp_ms: u64,
        ephemeral: bool,
        ext: &str,
    ) -> String {
        let mut ts = timestamp_ms;
        loop {
            let name = media_filename(sanitized_sender, ts, ephemeral, ext);
            match fs::try_exists(self.media_dir.join(&name)).await {
                Ok(true) => ts += 1,
                _ => return name,
            }
        }
    }

    /// The blob is fully written and renamed into place before this
    /// returns, so a media-log line appended afterwards can never point
    /// at a missing or truncated file.
    pub async fn store_media(&self, bytes: &[u8], filename: &str) -> Result<PathBuf, CoreError> {
        let tmp = self.media_dir.join(format!(".incoming-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp).await.map_err(CoreError::persistence)?;
        let write = async {
            file.write_all(bytes).await?;
            file.sync_all().await
        };
        if let Err(e) = write.await {
            drop(file);
            let _ = fs::remove_file(&tmp).await;
            return Err(CoreError::persistence(e));
        }
        drop(file);
        let target = self.media_dir.join(filename);
        if let Err(e) = fs::rename(&tmp, &target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(CoreError::persistence(e));
        }
        Ok(target)
    }
}

/// `<sanitized-sender>_<epoch-millis>[_ephemeral]<ext>`: collision
/// resistant via the timestamp, self-describing about view-once media.
pub fn media_filename(sanitized_sender: &str, timestamp_ms: u64, ephemeral: bool, ext: &str) -> String {
    let marker = if ephemeral { "_ephemeral" } else { "" };
    format!("{sanitized_sender}_{timestamp_ms}{marker}{ext}")
}
