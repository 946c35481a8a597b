//! Concurrent batch checker fanning probes out over a bounded pool

use crate::proxy::models::{ProxyCheckResult, ProxyCheckStatus, ProxyId, ProxySet};
use crate::proxy::probe::{HttpProbe, Probe};
use crate::Config;
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Runs probes over whole batches with at most `concurrency` in flight
#[derive(Clone)]
pub struct ProxyChecker {
    probe: Arc<dyn Probe>,
    concurrency: usize,
    progress_interval: usize,
}

impl ProxyChecker {
    /// Create a checker probing over real HTTP
    pub fn new(config: &Config) -> Self {
        Self::with_probe(Arc::new(HttpProbe::new(config)), config)
    }

    /// Create a checker around any probe implementation
    pub fn with_probe(probe: Arc<dyn Probe>, config: &Config) -> Self {
        Self {
            probe,
            concurrency: config.concurrency.max(1),
            progress_interval: config.progress_interval,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Check a single proxy
    pub async fn check_proxy(&self, proxy: &ProxyId, self_ip: &str) -> ProxyCheckResult {
        let status = match self.probe.probe(proxy, self_ip).await {
            Ok(alive) => ProxyCheckStatus::Working(alive),
            Err(e) => ProxyCheckStatus::Failed(e),
        };
        ProxyCheckResult {
            proxy: proxy.clone(),
            status,
        }
    }

    /// One spawned task per candidate, pulled lazily so no more than
    /// `concurrency` exist at once. Results arrive in completion order.
    fn check_stream(
        &self,
        proxies: Vec<ProxyId>,
        self_ip: Arc<str>,
    ) -> impl Stream<Item = ProxyCheckResult> {
        let checker = self.clone();

        stream::iter(proxies)
            .map(move |proxy| {
                let checker = checker.clone();
                let self_ip = Arc::clone(&self_ip);
                let target = proxy.clone();
                let handle =
                    tokio::spawn(async move { checker.check_proxy(&target, &self_ip).await });

                async move {
                    handle.await.unwrap_or_else(|e| ProxyCheckResult {
                        proxy,
                        status: ProxyCheckStatus::Faulted(e.to_string()),
                    })
                }
            })
            .buffer_unordered(self.concurrency)
    }

    /// Check multiple proxies concurrently and keep every result
    pub async fn check_proxies(
        &self,
        proxies: Vec<ProxyId>,
        self_ip: &Arc<str>,
    ) -> Vec<ProxyCheckResult> {
        if proxies.is_empty() {
            return Vec::new();
        }

        let total = proxies.len();
        let results = self.check_stream(proxies, Arc::clone(self_ip));
        tokio::pin!(results);

        let mut collected = Vec::with_capacity(total);
        while let Some(result) = results.next().await {
            match &result.status {
                ProxyCheckStatus::Working(alive) => {
                    debug!("{} alive ({:?})", result.proxy, alive.latency)
                }
                ProxyCheckStatus::Failed(e) => debug!("{} dead: {}", result.proxy, e),
                ProxyCheckStatus::Faulted(reason) => {
                    error!("probe task for {} failed: {}", result.proxy, reason)
                }
            }

            collected.push(result);
            let done = collected.len();
            if self.progress_interval > 0 && done % self.progress_interval == 0 {
                info!("progress: {}/{} ...", done, total);
            }
        }

        collected
    }

    /// Check a batch and return exactly the candidates found alive
    pub async fn check_batch(&self, candidates: &ProxySet, self_ip: &Arc<str>) -> ProxySet {
        if candidates.is_empty() {
            return ProxySet::new();
        }

        self.check_proxies(candidates.iter().cloned().collect(), self_ip)
            .await
            .into_iter()
            .filter(|r| r.is_working())
            .map(|r| r.proxy)
            .collect()
    }

    /// Check proxies and separate into good and bad results
    pub async fn check_and_separate(
        &self,
        proxies: Vec<ProxyId>,
        self_ip: &Arc<str>,
    ) -> (Vec<ProxyCheckResult>, Vec<ProxyCheckResult>) {
        self.check_proxies(proxies, self_ip)
            .await
            .into_iter()
            .partition(|r| r.is_working())
    }
}
