//! Typed errors for identifier handling and individual load attempts.
//!
//! Neither type ever aborts a resolution. An [`IsbnError`] means
//! "skip identifier-based candidates"; an [`AttemptError`] means "this
//! candidate failed, move on". Terminal exhaustion is not an error at all:
//! it is reported as [`ResolutionResult::Failure`](crate::models::ResolutionResult).
//!
//! Application-level failures (config, catalog files, server bind) use
//! `anyhow` instead.

use serde::Serialize;
use thiserror::Error;

/// A malformed or unconvertible ISBN.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IsbnError {
    #[error("ISBN is empty")]
    Empty,
    #[error("ISBN must have 10 or 13 characters, got {0}")]
    InvalidLength(usize),
    #[error("ISBN contains an invalid character at position {0}")]
    InvalidCharacter(usize),
    #[error("ISBN check digit mismatch: expected '{expected}', found '{found}'")]
    CheckDigitMismatch { expected: char, found: char },
    #[error("ISBN cannot be converted to the requested form")]
    NotConvertible,
}

/// Why a single candidate attempt failed.
///
/// `Timeout` and `DecodeFailure` drive the same control flow in the
/// resolver; they stay distinct so diagnostics can tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptError {
    #[error("timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("fetch failed: {reason}")]
    Fetch { reason: String },
    #[error("decode failed: {reason}")]
    DecodeFailure { reason: String },
}

impl AttemptError {
    pub fn fetch(reason: impl Into<String>) -> Self {
        AttemptError::Fetch {
            reason: reason.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        AttemptError::DecodeFailure {
            reason: reason.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AttemptError::Timeout { .. })
    }
}
