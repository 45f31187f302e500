use thiserror::Error;

use crate::feed::FetchError;

/// Failures that abort a snapshot build. None of them leave a partial
/// snapshot behind.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The feed could not be retrieved (network, HTTP status, timeout).
    #[error("Fetching feed '{feed}' failed: {reason}")]
    Fetch {
        feed: String,
        #[source]
        reason: FetchError,
    },

    /// The feed was retrieved but is not a readable RSS document.
    #[error("Decoding feed '{feed}' failed: {reason}")]
    Decode {
        feed: String,
        #[source]
        reason: FetchError,
    },

    /// An item carried a publication date that is not RFC 2822.
    #[error("Feed '{feed}' has an unparseable pubDate {raw:?}: {reason}")]
    TimestampParse {
        feed: String,
        raw: String,
        #[source]
        reason: chrono::ParseError,
    },

    #[error("Serializing snapshot failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BuildError {
    pub(crate) fn from_fetch(feed: &str, reason: FetchError) -> Self {
        let feed = feed.to_string();
        if reason.is_decode() {
            BuildError::Decode { feed, reason }
        } else {
            BuildError::Fetch { feed, reason }
        }
    }
}

/// Failures reported to a reader. They never affect the published snapshot.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No snapshot has been published yet.
    #[error("No snapshot has been published yet")]
    NotReady,

    #[error("Malformed cutoff {raw:?}, expected YYYYMMDDHHMMSS+HHMM: {reason}")]
    MalformedCutoff {
        raw: String,
        #[source]
        reason: chrono::ParseError,
    },

    #[error("Serializing response failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
