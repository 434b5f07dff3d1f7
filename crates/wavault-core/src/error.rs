use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("transport {0}")]
    Transport(String),
    #[error("retrieval {0}")]
    Retrieval(#[from] RetrievalError),
    #[error("persistence {0}")]
    Persistence(String),
    #[error("startup {0}")]
    Startup(String),
}

/// Media retrieval failure surfaced by the transport. Opaque to the
/// pipeline; every variant is recoverable per item.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("network {0}")]
    Network(String),
    #[error("reference expired")]
    Expired,
    #[error("decrypt")]
    Decrypt,
}

impl CoreError {
    pub fn persistence(err: std::io::Error) -> Self {
        CoreError::Persistence(err.to_string())
    }

    /// Only startup errors may terminate the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::Startup(_))
    }
}
