use thiserror::Error;

/// Error taxonomy shared by every siftdb crate.
///
/// `Validation` is always raised at the API boundary before any storage
/// mutation. `Extraction` aborts a single document's ingestion without
/// touching other documents. `ModelLoad` is fatal and surfaced at startup.
#[derive(Debug, Error)]
pub enum Error {
    #[error("extraction failed for {format}: {reason}")]
    Extraction { format: String, reason: String },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl Error {
    pub fn extraction(format: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Extraction { format: format.into(), reason: reason.to_string() }
    }

    pub fn validation(reason: impl std::fmt::Display) -> Self {
        Error::Validation(reason.to_string())
    }

    pub fn storage(reason: impl std::fmt::Display) -> Self {
        Error::Storage(reason.to_string())
    }

    pub fn model_load(reason: impl std::fmt::Display) -> Self {
        Error::ModelLoad(reason.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
