//! Proxy Sieve - differential proxy list verifier
//!
//! Keeps a continuously refreshed pool of working, anonymizing proxies
//! (HTTP, SOCKS4, SOCKS5). Each run fetches raw candidate lists, works out
//! which candidates actually need probing compared to the previous run,
//! probes them with bounded concurrency and persists the survivors.

pub mod logging;
pub mod pipeline;
pub mod proxy;
pub mod store;

pub use pipeline::{Pipeline, RunSummary};
pub use proxy::*;
pub use store::{AliveLayout, ResultStore};

use std::path::PathBuf;
use std::time::Duration;

/// Application result type
pub type Result<T> = anyhow::Result<T>;

/// Default URL used both as identity oracle and first probe target
pub const DEFAULT_CHECK_URL: &str = "http://httpbin.org/ip";

/// Default HTTPS target for the hardened second round-trip
pub const DEFAULT_TUNNEL_URL: &str = "https://postman-echo.com/get";

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;
const DEFAULT_CONCURRENCY: usize = 100;
const DEFAULT_PROGRESS_INTERVAL: usize = 500;
const DEFAULT_LATENCY_RATIO: f64 = 0.9;

/// How strictly a single candidate is probed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeMode {
    /// One plain HTTP round-trip with the anonymity check
    #[default]
    Baseline,
    /// Adds content-type and latency checks plus an HTTPS round-trip
    Hardened,
}

/// Run configuration.
///
/// Built once and handed to every component; nothing reads ambient state.
#[derive(Debug, Clone)]
pub struct Config {
    /// Echo endpoint reporting the caller's address in an `origin` field
    pub check_url: String,
    /// HTTPS endpoint used by the hardened probe's second round-trip
    pub tunnel_url: String,
    /// Per round-trip timeout (`T`)
    pub timeout: Duration,
    /// Timeout for downloading a source list
    pub fetch_timeout: Duration,
    /// Maximum probes in flight per batch (`W`)
    pub concurrency: usize,
    /// Log progress every this many completed probes
    pub progress_interval: usize,
    pub mode: ProbeMode,
    /// Fraction of `timeout` a hardened round-trip may take
    pub latency_ratio: f64,
    pub layout: AliveLayout,
    /// Directory holding the alive and cache files
    pub data_dir: PathBuf,
    /// Remote lists to fetch candidates from
    pub sources: Vec<ProxySource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_url: DEFAULT_CHECK_URL.to_string(),
            tunnel_url: DEFAULT_TUNNEL_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            mode: ProbeMode::default(),
            latency_ratio: DEFAULT_LATENCY_RATIO,
            layout: AliveLayout::default(),
            data_dir: PathBuf::from("."),
            sources: ProxySource::defaults(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check_url(mut self, url: impl Into<String>) -> Self {
        self.check_url = url.into();
        self
    }

    pub fn with_tunnel_url(mut self, url: impl Into<String>) -> Self {
        self.tunnel_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_mode(mut self, mode: ProbeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_latency_ratio(mut self, ratio: f64) -> Self {
        self.latency_ratio = ratio;
        self
    }

    pub fn with_layout(mut self, layout: AliveLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_sources(mut self, sources: Vec<ProxySource>) -> Self {
        self.sources = sources;
        self
    }

    /// Longest a hardened round-trip may take before it counts as unreliable
    pub fn latency_limit(&self) -> Duration {
        self.timeout.mul_f64(self.latency_ratio)
    }
}
