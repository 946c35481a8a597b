//! Resolves the caller's own public address, the anonymity oracle for a run

use crate::proxy::error::IdentityError;
use crate::Config;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Body shape of the echo endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct EchoResponse {
    pub origin: String,
}

/// Looks up the public address once per run with a direct, unproxied request
pub struct IdentityResolver {
    client: Client,
    url: String,
    timeout: Duration,
}

impl IdentityResolver {
    pub fn new(config: &Config) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .no_proxy()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            url: config.check_url.clone(),
            timeout: config.timeout,
        })
    }

    /// Fetch the echo endpoint and return its `origin` field
    pub async fn resolve_self_ip(&self) -> Result<String, IdentityError> {
        let request = async {
            let response = self.client.get(&self.url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(IdentityError::Status {
                    url: self.url.clone(),
                    status,
                });
            }
            let body = response.bytes().await?;
            Ok(body)
        };

        let body = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| IdentityError::Timeout {
                url: self.url.clone(),
                timeout: self.timeout,
            })??;

        let echo: EchoResponse =
            serde_json::from_slice(&body).map_err(|e| IdentityError::Malformed {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        let origin = echo.origin.trim().to_string();
        if origin.is_empty() {
            return Err(IdentityError::Malformed {
                url: self.url.clone(),
                reason: "empty origin".to_string(),
            });
        }

        debug!("resolved own address {} via {}", origin, self.url);
        Ok(origin)
    }
}
