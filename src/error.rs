// src/error.rs
use thiserror::Error;

/// Errors produced by the ingestion pipeline and its collaborators.
///
/// Duplicate post URLs are not represented here: the store reports them as
/// [`crate::ingest::types::InsertOutcome::Duplicate`].
#[derive(Debug, Error)]
pub enum GatorError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed feed: {0}")]
    MalformedFeed(String),

    #[error("unable to parse time: {input}")]
    TimeParse { input: String },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Storage failure from a backend that is not sqlx-based.
    #[error("storage error: {0}")]
    StorageUnavailable(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, GatorError>;

impl GatorError {
    /// Errors that only affect a single feed item; ingestion skips the item
    /// and moves on.
    pub fn is_item_level(&self) -> bool {
        matches!(self, GatorError::TimeParse { .. })
    }

    /// Errors that abort the current feed but leave the scheduler running.
    pub fn is_feed_level(&self) -> bool {
        matches!(
            self,
            GatorError::InvalidInput(_)
                | GatorError::Network { .. }
                | GatorError::MalformedFeed(_)
                | GatorError::Storage(_)
                | GatorError::StorageUnavailable(_)
        )
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GatorError::InvalidInput(_) => "invalid_input",
            GatorError::Network { .. } => "network",
            GatorError::MalformedFeed(_) => "malformed_feed",
            GatorError::TimeParse { .. } => "time_parse",
            GatorError::Storage(_) | GatorError::StorageUnavailable(_) => "storage",
            GatorError::Config(_) => "config",
        }
    }
}
