use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SenderId {
    pub value: String,
}

impl SenderId {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Opaque session authentication material. Stored verbatim; only the
/// transport can interpret it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialBlob {
    pub value: Vec<u8>,
}

/// Opaque handle the transport needs to retrieve one media payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub value: String,
}

impl MediaRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    Connecting,
    Open,
    Close,
}

/// Diagnostic attached to a dropped connection. The status code is the
/// transport's own vocabulary; 401 marks a remotely logged-out session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReason {
    pub status: Option<u16>,
    pub message: String,
}

impl CloseReason {
    pub const LOGGED_OUT: u16 = 401;

    pub fn logged_out(&self) -> bool {
        self.status == Some(Self::LOGGED_OUT)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionUpdate {
    pub phase: Option<ConnectionPhase>,
    pub pairing_code: Option<String>,
    pub close_reason: Option<CloseReason>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Live delivery; the only mode the capture pipeline archives.
    Notify,
    /// History backfill replayed by the transport.
    Append,
}

/// One inbound wire envelope. Field names follow the upstream protocol;
/// unknown fields are tolerated because the upstream schema grows without
/// notice.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,
    #[serde(
        default,
        rename = "extendedTextMessage",
        skip_serializing_if = "Option::is_none"
    )]
    pub extended_text: Option<ExtendedText>,
    #[serde(default, rename = "imageMessage", skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaPayload>,
    #[serde(default, rename = "videoMessage", skip_serializing_if = "Option::is_none")]
    pub video: Option<MediaPayload>,
    #[serde(default, rename = "audioMessage", skip_serializing_if = "Option::is_none")]
    pub audio: Option<MediaPayload>,
    #[serde(
        default,
        rename = "documentMessage",
        skip_serializing_if = "Option::is_none"
    )]
    pub document: Option<MediaPayload>,
    #[serde(
        default,
        rename = "viewOnceMessage",
        skip_serializing_if = "Option::is_none"
    )]
    pub view_once: Option<Box<ViewOnceWrapper>>,
    #[serde(
        default,
        rename = "viewOnceMessageV2",
        skip_serializing_if = "Option::is_none"
    )]
    pub view_once_v2: Option<Box<ViewOnceWrapper>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedText {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaPayload {
    #[serde(default, rename = "directPath")]
    pub reference: MediaRef,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewOnceWrapper {
    #[serde(default)]
    pub message: Option<MessageEnvelope>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub sender: SenderId,
    pub timestamp_ms: u64,
    pub envelope: MessageEnvelope,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageBatch {
    pub delivery: DeliveryMode,
    pub messages: Vec<InboundMessage>,
}

/// Whatever the transport reports about deleted messages, kept lossless
/// for later correlation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeletionNotice {
    #[serde(default)]
    pub sender: Option<SenderId>,
    pub detail: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TransportEvent {
    ConnectionUpdate(ConnectionUpdate),
    CredsUpdate(CredentialBlob),
    MessagesUpsert(MessageBatch),
    MessagesDelete(DeletionNotice),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Text,
    Media(MediaKind),
    Deletion,
    Unknown,
}

impl RecordKind {
    /// Kind column of an archive log line.
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Text => "text",
            RecordKind::Media(kind) => kind.as_str(),
            RecordKind::Deletion => "deleted",
            RecordKind::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MediaDescriptor {
    pub reference: MediaRef,
    pub kind: MediaKind,
    pub mimetype: Option<String>,
    pub ephemeral: bool,
}

/// The archival derivative of one inbound message. Immutable once written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NormalizedRecord {
    pub kind: RecordKind,
    pub sender: SenderId,
    pub timestamp_ms: u64,
    pub text: Option<String>,
    pub media: Option<MediaDescriptor>,
}
