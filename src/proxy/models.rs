//! Proxy data models

use crate::proxy::error::{ParseError, ProbeError};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::Duration;

/// Proxy protocol enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    #[default]
    Http,
    Socks4,
    Socks5,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [Protocol::Http, Protocol::Socks4, Protocol::Socks5];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Socks4 => "socks4",
            Protocol::Socks5 => "socks5",
        }
    }

    /// Scheme handed to the HTTP client when dialling through a proxy of
    /// this protocol. SOCKS5 uses `socks5h` so the proxy resolves hostnames.
    pub fn dial_scheme(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Socks4 => "socks4",
            Protocol::Socks5 => "socks5h",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "socks4" => Ok(Protocol::Socks4),
            "socks5" | "socks5h" => Ok(Protocol::Socks5),
            _ => Err(ParseError::UnknownScheme(s.to_string())),
        }
    }
}

/// A single proxy candidate, identified by its canonical `protocol://host:port` form.
///
/// Equality, hashing and ordering all go through the canonical string, so two
/// identifiers are the same entity exactly when their canonical forms match.
/// The host is kept as given; nothing is resolved.
#[derive(Debug, Clone)]
pub struct ProxyId {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    canonical: String,
}

impl ProxyId {
    pub fn new(protocol: Protocol, host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let canonical = format!("{}://{}:{}", protocol, host, port);
        Self {
            protocol,
            host,
            port,
            canonical,
        }
    }

    /// Canonical `protocol://host:port` form
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// URL handed to the HTTP client's proxy configuration
    pub fn dial_url(&self) -> String {
        format!("{}://{}:{}", self.protocol.dial_scheme(), self.host, self.port)
    }
}

impl fmt::Display for ProxyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl PartialEq for ProxyId {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for ProxyId {}

impl Hash for ProxyId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for ProxyId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProxyId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

/// A deduplicated set of proxy identifiers.
///
/// Used for the source snapshot, the cache and the alive set alike.
pub type ProxySet = HashSet<ProxyId>;

/// Work computed by the planner for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkBatch {
    /// Previously alive proxies, re-verified every run
    pub recheck: ProxySet,
    /// Newly arrived proxies not already known alive
    pub fresh: ProxySet,
}

impl WorkBatch {
    pub fn is_empty(&self) -> bool {
        self.recheck.is_empty() && self.fresh.is_empty()
    }

    pub fn len(&self) -> usize {
        self.recheck.len() + self.fresh.len()
    }
}

/// Successful probe outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alive {
    /// Slowest round-trip observed while probing
    pub latency: Duration,
}

/// Result of proxy check operation
#[derive(Debug)]
pub enum ProxyCheckStatus {
    Working(Alive),
    /// The probe ran and rejected the candidate
    Failed(ProbeError),
    /// The probe task itself died (panicked or was cancelled)
    Faulted(String),
}

/// Detailed result of a proxy check
#[derive(Debug)]
pub struct ProxyCheckResult {
    pub proxy: ProxyId,
    pub status: ProxyCheckStatus,
}

impl ProxyCheckResult {
    pub fn is_working(&self) -> bool {
        matches!(self.status, ProxyCheckStatus::Working(_))
    }

    pub fn response_time(&self) -> Option<Duration> {
        match &self.status {
            ProxyCheckStatus::Working(alive) => Some(alive.latency),
            _ => None,
        }
    }
}
