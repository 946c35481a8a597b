//! Candidate normalizer turning raw list lines into proxy identifiers

use crate::proxy::error::ParseError;
use crate::proxy::models::{Protocol, ProxyId, ProxySet};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::debug;

/// `[scheme://]host:port[/]`, host being a bracketed IPv6 literal or anything without `:` or `/`
static CANDIDATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:([A-Za-z][A-Za-z0-9+.-]*)://)?(\[[^\]]+\]|[^:/\s]+):(\d{1,5})/?$")
        .expect("Invalid candidate regex")
});

/// Parser for proxy list lines
pub struct ProxyParser;

impl ProxyParser {
    /// Normalize a single candidate.
    ///
    /// Accepts `host:port` (tagged with `default_protocol`) or
    /// `scheme://host:port` (tagged with the scheme). Normalizing an already
    /// canonical string yields the identical identifier.
    pub fn normalize(raw: &str, default_protocol: Protocol) -> Result<ProxyId, ParseError> {
        let raw = raw.trim();
        let caps = CANDIDATE_REGEX
            .captures(raw)
            .ok_or_else(|| ParseError::Malformed(raw.to_string()))?;

        let protocol = match caps.get(1) {
            Some(scheme) => scheme.as_str().parse()?,
            None => default_protocol,
        };

        let port: u16 = caps[3]
            .parse()
            .map_err(|_| ParseError::InvalidPort(raw.to_string()))?;
        if port == 0 {
            return Err(ParseError::InvalidPort(raw.to_string()));
        }

        Ok(ProxyId::new(protocol, &caps[2], port))
    }

    /// Parse one line of a list, skipping blanks and `#` comments
    pub fn parse_line(line: &str, default_protocol: Protocol) -> Option<ProxyId> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        match Self::normalize(line, default_protocol) {
            Ok(proxy) => Some(proxy),
            Err(e) => {
                debug!("skipping candidate: {}", e);
                None
            }
        }
    }

    /// Parse a whole list into a deduplicated set
    pub fn parse_string(content: &str, default_protocol: Protocol) -> ProxySet {
        content
            .lines()
            .filter_map(|line| Self::parse_line(line, default_protocol))
            .collect()
    }

    /// Parse a list file. A missing file is an empty set, not an error.
    pub fn parse_file<P: AsRef<Path>>(
        path: P,
        default_protocol: Protocol,
    ) -> std::io::Result<ProxySet> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse_string(&content, default_protocol)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProxySet::new()),
            Err(e) => Err(e),
        }
    }
}
