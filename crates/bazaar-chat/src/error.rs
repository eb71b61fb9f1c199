use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No user signed in")]
    NotSignedIn,

    #[error("No chat open")]
    NoChatOpen,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Failures reported by the message store (append, fetch, list).
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Error::Store(_) | Error::NotFound(_) | Error::Conflict(_) | Error::Json(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
