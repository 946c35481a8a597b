//! Source fetcher downloading remote proxy lists
//!
//! Each source is a plain-text list, one candidate per line, either bare
//! `host:port` (tagged with the source's protocol) or `scheme://host:port`.
//! A failing source contributes nothing; it never fails the whole fetch.

use crate::proxy::models::{Protocol, ProxySet};
use crate::proxy::parser::ProxyParser;
use crate::{Config, Result};
use anyhow::{anyhow, Context};
use reqwest::Client;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Default user agent for HTTP requests
const DEFAULT_USER_AGENT: &str = concat!("proxy-sieve/", env!("CARGO_PKG_VERSION"));

/// Result of crawling a single source
#[derive(Debug, Clone)]
pub struct CrawlResult {
    /// The source that was crawled
    pub source: ProxySource,
    /// Proxies extracted from the source
    pub proxies: ProxySet,
    /// Error message if crawling failed
    pub error: Option<String>,
}

impl CrawlResult {
    pub fn success(source: ProxySource, proxies: ProxySet) -> Self {
        Self {
            source,
            proxies,
            error: None,
        }
    }

    pub fn failure(source: ProxySource, error: String) -> Self {
        Self {
            source,
            proxies: ProxySet::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A remote list and the protocol its bare entries belong to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySource {
    pub protocol: Protocol,
    pub url: String,
}

impl ProxySource {
    pub fn new(protocol: Protocol, url: impl Into<String>) -> Self {
        Self {
            protocol,
            url: url.into(),
        }
    }

    /// The TheSpeedX lists, one per protocol
    pub fn defaults() -> Vec<ProxySource> {
        vec![
            ProxySource::new(
                Protocol::Http,
                "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/http.txt",
            ),
            ProxySource::new(
                Protocol::Socks4,
                "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/socks4.txt",
            ),
            ProxySource::new(
                Protocol::Socks5,
                "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/socks5.txt",
            ),
        ]
    }
}

impl fmt::Display for ProxySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.protocol, self.url)
    }
}

/// Parses `PROTOCOL=URL`, the command line form of a source
impl FromStr for ProxySource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (protocol, url) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected PROTOCOL=URL, got {}", s))?;
        let protocol: Protocol = protocol.trim().parse()?;
        let url = url.trim();
        if url.is_empty() {
            return Err(anyhow!("empty URL for {} source", protocol));
        }
        Ok(ProxySource::new(protocol, url))
    }
}

/// Downloads and merges all configured sources
pub struct ProxyCrawler {
    sources: Vec<ProxySource>,
    client: Client,
}

impl ProxyCrawler {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .context("building fetch client")?;

        Ok(Self {
            sources: config.sources.clone(),
            client,
        })
    }

    pub fn sources(&self) -> &[ProxySource] {
        &self.sources
    }

    /// Fetch and parse proxies from a single source
    pub async fn crawl_source(&self, source: &ProxySource) -> Result<ProxySet> {
        let response = self
            .client
            .get(&source.url)
            .send()
            .await?
            .error_for_status()?;
        let content = response.text().await?;
        Ok(ProxyParser::parse_string(&content, source.protocol))
    }

    /// Fetch every source, returning a result for each
    pub async fn crawl_sources_with_results(&self) -> Vec<CrawlResult> {
        let mut results = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            info!("fetching {} list ...", source.protocol);
            let result = match self.crawl_source(source).await {
                Ok(proxies) => {
                    info!("   -> {} candidates from {}", proxies.len(), source.url);
                    CrawlResult::success(source.clone(), proxies)
                }
                Err(e) => {
                    warn!("failed to fetch {} list from {}: {:#}", source.protocol, source.url, e);
                    CrawlResult::failure(source.clone(), format!("{:#}", e))
                }
            };
            results.push(result);
        }

        results
    }

    /// Union of every source that could be fetched
    pub async fn fetch_sources(&self) -> ProxySet {
        self.crawl_sources_with_results()
            .await
            .into_iter()
            .flat_map(|result| result.proxies)
            .collect()
    }
}
