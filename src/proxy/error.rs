//! Typed errors for the verification components

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Raised when a raw candidate line cannot become a proxy identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown proxy scheme: {0}")]
    UnknownScheme(String),
    #[error("not a host:port pair: {0}")]
    Malformed(String),
    #[error("invalid port in {0}")]
    InvalidPort(String),
}

/// The caller's own public address could not be determined.
///
/// Fatal to a run: without it there is no way to tell an anonymizing proxy
/// from one that forwards the real address.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity unavailable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("identity unavailable: no answer from {url} within {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("identity unavailable: {url} answered {status}")]
    Status { url: String, status: StatusCode },
    #[error("identity unavailable: malformed answer from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

/// Why a single probe classified its candidate as dead
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("could not build client: {0}")]
    Client(reqwest::Error),
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP status: {0}")]
    Status(StatusCode),
    #[error("response is not JSON (content-type: {0})")]
    NotJson(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("proxy leaks caller address (origin: {0})")]
    LeaksIdentity(String),
    #[error("too slow: {elapsed:?} over {limit:?}")]
    TooSlow { elapsed: Duration, limit: Duration },
}

impl ProbeError {
    /// True for failures caused by the clock rather than the proxy's answer
    pub fn is_timeout(&self) -> bool {
        match self {
            ProbeError::Timeout(_) | ProbeError::TooSlow { .. } => true,
            ProbeError::Transport(e) => e.is_timeout(),
            _ => false,
        }
    }
}
