//! Shared error type.
//!
//! The error is `Clone` because a task outcome is published once and then
//! handed to every awaiter of that task; all payloads are plain strings.

use std::time::Duration;

/// Errors produced by resolvers and the task runner.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// Identity is neither a hex fingerprint nor a valid email address.
    #[error("parse address: {0}")]
    ParseAddress(String),

    /// Transport, DNS, or non-2xx response from an upstream service.
    #[error("fetching {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Invalid OpenPGP armor or packet stream.
    #[error("read key: {0}")]
    Decode(String),

    /// Proof source fetched successfully but lacked the fingerprint marker.
    #[error("fingerprint not found")]
    NoFingerprint,

    /// Task exceeded its deadline.
    #[error("task timed out after {0:?}")]
    Timeout(Duration),

    /// Explicit or root-context cancellation.
    #[error("task cancelled")]
    Cancelled,

    /// A panic crossed the task boundary and was converted.
    #[error("task panicked: {0}")]
    Panic(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    /// Build a fetch error from any displayable transport failure.
    pub fn fetch(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result alias used across the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;
