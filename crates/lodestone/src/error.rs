//! Error types for the gateway cache.

use thiserror::Error;

use crate::entity::EntityKind;

/// Errors surfaced by cache lookups, caller-initiated fetches and event decoding.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A derived relationship needs an entity that is not cached, and no
    /// fetch was requested.
    #[error("{kind} {id} is not cached")]
    NotCached { kind: EntityKind, id: String },

    /// The fetch collaborator failed.
    #[error("failed to fetch {kind} {id}: {source}")]
    FetchFailed {
        kind: EntityKind,
        id: String,
        #[source]
        source: FetchError,
    },

    /// Registering an entity as a side effect of event processing failed.
    #[error("failed to register {kind} {id}: {reason}")]
    RegistrationFailed {
        kind: EntityKind,
        id: String,
        reason: String,
    },

    /// An event payload is missing a field required by its kind.
    #[error("malformed {event} event: {reason}")]
    MalformedEvent { event: String, reason: String },

    /// JSON decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CacheError {
    pub(crate) fn not_cached(kind: EntityKind, id: impl ToString) -> Self {
        Self::NotCached {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn malformed(event: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            event: event.into(),
            reason: reason.into(),
        }
    }
}

/// Transport-level errors from the fetch collaborator.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The remote object does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    /// Response body could not be decoded.
    #[error("invalid response: {0}")]
    Json(#[from] serde_json::Error),

    /// No transport is configured or it refused the request.
    #[error("fetch unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_fetch_failed_preserves_source() {
        let err = CacheError::FetchFailed {
            kind: EntityKind::Guild,
            id: "g1".to_string(),
            source: FetchError::Unavailable("offline".to_string()),
        };

        assert_eq!(
            err.to_string(),
            "failed to fetch guild g1: fetch unavailable: offline"
        );
        let source = err.source().expect("source is kept");
        assert_eq!(source.to_string(), "fetch unavailable: offline");
    }

    #[test]
    fn test_not_cached_message() {
        let err = CacheError::not_cached(EntityKind::Channel, "c1");
        assert_eq!(err.to_string(), "channel c1 is not cached");
    }
}
