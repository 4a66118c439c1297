//! Error types for the TeamCity client.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers distinguish "the
//! server has no such build" from "the round-trip failed". Decode failures
//! keep a bounded prefix of the raw body so a login page or proxy error shows
//! up in the message without flooding logs.

use thiserror::Error;

/// Longest raw-body prefix kept in [`ApiError::Decode`], in characters.
pub const MAX_BODY_EXCERPT: usize = 1000;

/// Errors returned by `TeamCityClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The request payload could not be serialized to JSON.
    #[error("serializing request body: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The response body could not be decoded into the expected type.
    #[error("json decode failed: {reason} ({body:?})")]
    Decode { reason: String, body: String },

    /// The server returned no entity where one was expected.
    #[error("{0} not found")]
    NotFound(&'static str),
}

impl ApiError {
    pub(crate) fn decode(err: serde_json::Error, body: &[u8]) -> Self {
        ApiError::Decode {
            reason: err.to_string(),
            body: truncate(&String::from_utf8_lossy(body), MAX_BODY_EXCERPT),
        }
    }
}

/// Failures raised by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Errors raised while loading a `ClientConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid timeout {0:?}: expected a whole number of seconds")]
    InvalidTimeout(String),
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("", 10), "");
    }

    #[test]
    fn truncate_cuts_on_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abcdef", 3), "abc");
    }

    #[test]
    fn decode_error_bounds_the_body() {
        let body = "x".repeat(5000);
        let err = serde_json::from_str::<u32>(&body).unwrap_err();
        match ApiError::decode(err, body.as_bytes()) {
            ApiError::Decode { reason, body } => {
                assert!(!reason.is_empty());
                assert_eq!(body.len(), MAX_BODY_EXCERPT);
            }
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn not_found_message_names_the_entity() {
        assert_eq!(ApiError::NotFound("build").to_string(), "build not found");
    }
}
