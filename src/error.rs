use thiserror::Error;

/// A repository index could not be fetched or decoded
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("Failed to read repository {source_desc}: {reason}")]
pub struct SourceReadError {
    pub source_desc: String,
    pub reason: String,
}

impl SourceReadError {
    pub fn new(source_desc: impl ToString, reason: impl ToString) -> Self {
        SourceReadError {
            source_desc: source_desc.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A byte retrieval failed
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("Error while fetching {url}: {reason}")]
pub struct TransportError {
    pub url: String,
    pub reason: String,
}

impl TransportError {
    pub fn new(url: &str, reason: impl ToString) -> Self {
        TransportError {
            url: url.to_owned(),
            reason: reason.to_string(),
        }
    }
}

/// Failure of one package in a batch payload fetch
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Checksum mismatch for {url}: expected {expected}")]
    ChecksumMismatch { url: String, expected: String },
}
