//! Pipeline error taxonomy.
//!
//! Every failure a component can hit falls into one of a small set of
//! classes, and each class has a fixed handling policy:
//!
//! | Variant | Policy |
//! |---------|--------|
//! | [`Error::TransientSource`] | retry with bounded backoff, cursor untouched |
//! | [`Error::Source`] | abort the sync run, cursor untouched |
//! | [`Error::UnsupportedFormat`] | terminal, recorded as `failed`, never auto-retried |
//! | [`Error::ExtractionService`] | terminal for the attempt, eligible for explicit retry |
//!
//! Two failure shapes are deliberately not errors: a rejected
//! conditional write (the registry reports the lost race as a value and
//! the loser exits without side effects), and duplicate deliveries of
//! change records or completion callbacks (absorbed by the registry's
//! idempotent writes).

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rate limiting or a server-side hiccup at the change source.
    /// Carries the `Retry-After` hint when the source provided one.
    #[error("transient source error: {message}")]
    TransientSource {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Non-transient change-source failure (auth, bad partition, protocol).
    #[error("source error: {0}")]
    Source(String),

    /// The declared file type has no extraction path.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The extraction step itself failed (bad bytes, service-side failure).
    #[error("extraction failed: {0}")]
    ExtractionService(String),

    /// Object-store operation failed.
    #[error("object store error for '{key}': {message}")]
    Store { key: String, message: String },

    /// Chunking invoked with an unusable window/overlap combination.
    #[error("invalid chunking parameters: {0}")]
    Chunking(String),

    #[error(transparent)]
    Registry(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("twin serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// True for errors the caller should retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientSource { .. })
    }

    pub fn store(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Store {
            key: key.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
