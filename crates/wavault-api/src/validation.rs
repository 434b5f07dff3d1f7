use crate::types::*;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty field {0}")]
    Empty(&'static str),
    #[error("missing content for kind")]
    MissingContent,
    #[error("unexpected content for kind")]
    UnexpectedContent,
}

pub fn validate_sender(sender: &SenderId) -> Result<(), ValidationError> {
    if sender.value.trim().is_empty() {
        return Err(ValidationError::Empty("sender"));
    }
    Ok(())
}

/// A record is archivable when its kind and its payload agree.
pub fn validate_record(record: &NormalizedRecord) -> Result<(), ValidationError> {
    validate_sender(&record.sender)?;
    match record.kind {
        RecordKind::Text => {
            if record.text.as_ref().map(|t| t.is_empty()).unwrap_or(true) {
                return Err(ValidationError::MissingContent);
            }
            if record.media.is_some() {
                return Err(ValidationError::UnexpectedContent);
            }
        }
        RecordKind::Media(kind) => {
            let descriptor = record.media.as_ref().ok_or(ValidationError::MissingContent)?;
            if descriptor.kind != kind {
                return Err(ValidationError::UnexpectedContent);
            }
        }
        RecordKind::Deletion | RecordKind::Unknown => {
            if record.media.is_some() {
                return Err(ValidationError::UnexpectedContent);
            }
        }
    }
    Ok(())
}
