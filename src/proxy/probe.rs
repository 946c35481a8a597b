//! Liveness and anonymity probe for a single proxy

use crate::proxy::error::ProbeError;
use crate::proxy::identity::EchoResponse;
use crate::proxy::models::{Alive, ProxyId};
use crate::{Config, ProbeMode};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Proxy as ReqwestProxy};
use std::time::{Duration, Instant};

/// Verifies one candidate.
///
/// Every way a proxy can fail is an `Err` variant; nothing else escapes.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, candidate: &ProxyId, self_ip: &str) -> Result<Alive, ProbeError>;
}

/// A response that made it back through the proxy with a success status
struct RoundTrip {
    content_type: Option<String>,
    body: Bytes,
    elapsed: Duration,
}

/// Probe issuing real HTTP round-trips through the candidate.
///
/// `timeout` bounds the whole probe, so the hardened round-trips share one
/// budget on top of each being held to `latency_limit`.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    check_url: String,
    tunnel_url: String,
    timeout: Duration,
    latency_limit: Duration,
    mode: ProbeMode,
}

impl HttpProbe {
    pub fn new(config: &Config) -> Self {
        Self {
            check_url: config.check_url.clone(),
            tunnel_url: config.tunnel_url.clone(),
            timeout: config.timeout,
            latency_limit: config.latency_limit(),
            mode: config.mode,
        }
    }

    /// Create a client that sends everything through the candidate
    fn create_client(&self, candidate: &ProxyId) -> Result<Client, ProbeError> {
        let proxy = ReqwestProxy::all(candidate.dial_url()).map_err(ProbeError::Client)?;

        Client::builder()
            .proxy(proxy)
            .timeout(self.timeout)
            .build()
            .map_err(ProbeError::Client)
    }

    async fn round_trip(&self, client: &Client, url: &str) -> Result<RoundTrip, ProbeError> {
        let start = Instant::now();

        let request = async {
            let response = client
                .get(url)
                .send()
                .await
                .map_err(ProbeError::Transport)?;

            let status = response.status();
            if !status.is_success() {
                return Err(ProbeError::Status(status));
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.bytes().await.map_err(ProbeError::Transport)?;

            Ok((content_type, body))
        };

        let (content_type, body) = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;

        Ok(RoundTrip {
            content_type,
            body,
            elapsed: start.elapsed(),
        })
    }

    /// Content-type and latency checks applied to every hardened round-trip
    fn require_strict(&self, trip: &RoundTrip) -> Result<(), ProbeError> {
        let content_type = trip.content_type.as_deref().unwrap_or("");
        if !content_type.to_ascii_lowercase().contains("json") {
            return Err(ProbeError::NotJson(content_type.to_string()));
        }
        if trip.elapsed > self.latency_limit {
            return Err(ProbeError::TooSlow {
                elapsed: trip.elapsed,
                limit: self.latency_limit,
            });
        }
        Ok(())
    }

    /// Plain HTTP round-trip to the echo endpoint with the anonymity check
    async fn check_origin(
        &self,
        client: &Client,
        self_ip: &str,
    ) -> Result<Duration, ProbeError> {
        let trip = self.round_trip(client, &self.check_url).await?;
        if self.mode == ProbeMode::Hardened {
            self.require_strict(&trip)?;
        }

        let echo: EchoResponse = serde_json::from_slice(&trip.body)
            .map_err(|e| ProbeError::Malformed(e.to_string()))?;
        if echo.origin.contains(self_ip) {
            return Err(ProbeError::LeaksIdentity(echo.origin));
        }

        Ok(trip.elapsed)
    }

    /// HTTPS round-trip proving the candidate can tunnel TLS
    async fn check_tunnel(&self, client: &Client) -> Result<Duration, ProbeError> {
        let trip = self.round_trip(client, &self.tunnel_url).await?;
        self.require_strict(&trip)?;

        let body: serde_json::Value = serde_json::from_slice(&trip.body)
            .map_err(|e| ProbeError::Malformed(e.to_string()))?;
        if !body.is_object() {
            return Err(ProbeError::Malformed("expected a JSON object".to_string()));
        }

        Ok(trip.elapsed)
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, candidate: &ProxyId, self_ip: &str) -> Result<Alive, ProbeError> {
        let client = self.create_client(candidate)?;

        let legs = async {
            let mut latency = self.check_origin(&client, self_ip).await?;
            if self.mode == ProbeMode::Hardened {
                latency = latency.max(self.check_tunnel(&client).await?);
            }
            Ok::<_, ProbeError>(Alive { latency })
        };

        tokio::time::timeout(self.timeout, legs)
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
    }
}
