use crate::ids::is_broadcast;
use wavault_api::types::{
    DeletionNotice, InboundMessage, MediaDescriptor, MediaKind, MediaPayload, MessageEnvelope,
    NormalizedRecord, RecordKind, SenderId,
};

/// Classification never fails: a message is either skipped outright or
/// yields exactly one record (unrecognized shapes become Unknown).
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Skip,
    Record(NormalizedRecord),
}

/// The envelope decoded once at the boundary. Exactly one top-level
/// payload field is expected per the protocol contract.
enum Decoded<'a> {
    Empty,
    Ambiguous(Vec<&'static str>),
    Text(&'a str),
    Media {
        kind: MediaKind,
        payload: &'a MediaPayload,
    },
    Wrapper(&'a MessageEnvelope),
    WrapperWithoutInner,
}

fn decode(envelope: &MessageEnvelope) -> Decoded<'_> {
    let mut populated: Vec<&'static str> = Vec::new();
    if envelope.conversation.is_some() {
        populated.push("conversation");
    }
    if envelope.extended_text.is_some() {
        populated.push("extendedTextMessage");
    }
    if envelope.image.is_some() {
        populated.push("imageMessage");
    }
    if envelope.video.is_some() {
        populated.push("videoMessage");
    }
    if envelope.audio.is_some() {
        populated.push("audioMessage");
    }
    if envelope.document.is_some() {
        populated.push("documentMessage");
    }
    if envelope.view_once.is_some() {
        populated.push("viewOnceMessage");
    }
    if envelope.view_once_v2.is_some() {
        populated.push("viewOnceMessageV2");
    }
    match populated.as_slice() {
        [] => Decoded::Empty,
        [_] => decode_single(envelope),
        _ => Decoded::Ambiguous(populated),
    }
}

fn decode_single(envelope: &MessageEnvelope) -> Decoded<'_> {
    if let Some(text) = envelope.conversation.as_deref() {
        return Decoded::Text(text);
    }
    if let Some(extended) = envelope.extended_text.as_ref() {
        return Decoded::Text(extended.text.as_deref().unwrap_or(""));
    }
    if let Some(payload) = envelope.image.as_ref() {
        return Decoded::Media {
            kind: MediaKind::Image,
            payload,
        };
    }
    if let Some(payload) = envelope.video.as_ref() {
        return Decoded::Media {
            kind: MediaKind::Video,
            payload,
        };
    }
    if let Some(payload) = envelope.audio.as_ref() {
        return Decoded::Media {
            kind: MediaKind::Audio,
            payload,
        };
    }
    if let Some(payload) = envelope.document.as_ref() {
        return Decoded::Media {
            kind: MediaKind::Document,
            payload,
        };
    }
    let wrapper = envelope
        .view_once
        .as_deref()
        .or(envelope.view_once_v2.as_deref());
    match wrapper.and_then(|w| w.message.as_ref()) {
        Some(inner) => Decoded::Wrapper(inner),
        None => Decoded::WrapperWithoutInner,
    }
}

pub fn classify(message: &InboundMessage) -> Outcome {
    if is_broadcast(&message.sender) {
        return Outcome::Skip;
    }
    let sender = message.sender.clone();
    let timestamp_ms = message.timestamp_ms;
    match decode(&message.envelope) {
        Decoded::Empty => Outcome::Skip,
        Decoded::Ambiguous(fields) => Outcome::Record(unknown(sender, timestamp_ms, &fields)),
        Decoded::Text(text) => Outcome::Record(text_record(sender, timestamp_ms, text)),
        Decoded::Media { kind, payload } => {
            Outcome::Record(media_record(sender, timestamp_ms, kind, payload, false))
        }
        Decoded::WrapperWithoutInner => Outcome::Record(unknown(sender, timestamp_ms, &[])),
        // One level of unwrapping only; anything nested deeper than a
        // single payload is Unknown rather than recursed into.
        Decoded::Wrapper(inner) => match decode(inner) {
            Decoded::Text(text) => Outcome::Record(text_record(sender, timestamp_ms, text)),
            Decoded::Media { kind, payload } => {
                Outcome::Record(media_record(sender, timestamp_ms, kind, payload, true))
            }
            Decoded::Ambiguous(fields) => Outcome::Record(unknown(sender, timestamp_ms, &fields)),
            Decoded::Empty | Decoded::Wrapper(_) | Decoded::WrapperWithoutInner => {
                Outcome::Record(unknown(sender, timestamp_ms, &[]))
            }
        },
    }
}

/// Deletions arrive as their own event, not through the envelope path.
/// The reference is kept lossless for later correlation.
pub fn deletion_record(notice: &DeletionNotice, timestamp_ms: u64) -> NormalizedRecord {
    let sender = notice
        .sender
        .clone()
        .unwrap_or_else(|| SenderId::new("unknown"));
    NormalizedRecord {
        kind: RecordKind::Deletion,
        sender,
        timestamp_ms,
        text: Some(notice.detail.to_string()),
        media: None,
    }
}

fn text_record(sender: SenderId, timestamp_ms: u64, text: &str) -> NormalizedRecord {
    if text.is_empty() {
        return unknown(sender, timestamp_ms, &[]);
    }
    NormalizedRecord {
        kind: RecordKind::Text,
        sender,
        timestamp_ms,
        text: Some(text.to_string()),
        media: None,
    }
}

fn media_record(
    sender: SenderId,
    timestamp_ms: u64,
    kind: MediaKind,
    payload: &MediaPayload,
    ephemeral: bool,
) -> NormalizedRecord {
    // Captions ride along on image and video payloads.
    let text = match kind {
        MediaKind::Image | MediaKind::Video => {
            payload.caption.as_ref().filter(|c| !c.is_empty()).cloned()
        }
        _ => None,
    };
    // Only documents have a meaningful declared mime; the other kinds
    // map to fixed canonical extensions.
    let mimetype = match kind {
        MediaKind::Document => payload.mimetype.clone(),
        _ => None,
    };
    NormalizedRecord {
        kind: RecordKind::Media(kind),
        sender,
        timestamp_ms,
        text,
        media: Some(MediaDescriptor {
            reference: payload.reference.clone(),
            kind,
            mimetype,
            ephemeral,
        }),
    }
}

fn unknown(sender: SenderId, timestamp_ms: u64, fields: &[&'static str]) -> NormalizedRecord {
    let text = if fields.is_empty() {
        None
    } else {
        Some(fields.join(","))
    };
    NormalizedRecord {
        kind: RecordKind::Unknown,
        sender,
        timestamp_ms,
        text,
        media: None,
    }
}
