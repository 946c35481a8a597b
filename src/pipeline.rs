//! One differential verification run, start to finish

use crate::proxy::{
    effective_snapshot, plan, IdentityResolver, ProxyChecker, ProxyCrawler, ProxySet, WorkBatch,
};
use crate::store::ResultStore;
use crate::{Config, Result};
use anyhow::Context;
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::info;

/// What a completed run did
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub self_ip: String,
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    /// Size of the snapshot persisted as the next cache
    pub snapshot: usize,
    pub rechecked: usize,
    pub fresh: usize,
    /// Final alive set, as persisted
    pub alive: ProxySet,
}

impl RunSummary {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished - self.started
    }
}

/// Wires the resolver, fetcher, planner, checker and store together
pub struct Pipeline {
    resolver: IdentityResolver,
    crawler: ProxyCrawler,
    checker: ProxyChecker,
    store: ResultStore,
}

impl Pipeline {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            resolver: IdentityResolver::new(config).context("building identity client")?,
            crawler: ProxyCrawler::new(config)?,
            checker: ProxyChecker::new(config),
            store: ResultStore::new(config),
        })
    }

    /// Replace the checker, e.g. one wrapping a different probe
    pub fn with_checker(mut self, checker: ProxyChecker) -> Self {
        self.checker = checker;
        self
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Fetch the sources and compute this run's work without probing anything
    pub async fn plan(&self) -> Result<(ProxySet, WorkBatch)> {
        let prev_alive = self.store.load_alive()?;
        let prev_cache = self.store.load_cache()?;
        info!(
            "previous run: {} alive, {} cached",
            prev_alive.len(),
            prev_cache.len()
        );

        info!("fetching {} source lists", self.crawler.sources().len());
        let snapshot = effective_snapshot(self.crawler.fetch_sources().await, &prev_cache);
        let batch = plan(&snapshot, &prev_cache, &prev_alive);
        Ok((snapshot, batch))
    }

    /// Run the whole cycle.
    ///
    /// Fails without touching persisted state when the own address cannot be
    /// resolved. Fails after probing when persisting fails.
    pub async fn run(&self) -> Result<RunSummary> {
        let started = Local::now();

        let self_ip: Arc<str> = self
            .resolver
            .resolve_self_ip()
            .await
            .context("cannot verify anonymity without own address")?
            .into();
        info!("own address: {}", self_ip);

        let (snapshot, batch) = self.plan().await?;
        info!("recheck: {} previously alive", batch.recheck.len());
        info!("fresh: {} new since last run", batch.fresh.len());

        let mut alive = self.checker.check_batch(&batch.recheck, &self_ip).await;
        info!("recheck done: {}/{} still alive", alive.len(), batch.recheck.len());

        let alive_fresh = self.checker.check_batch(&batch.fresh, &self_ip).await;
        info!("fresh done: {}/{} alive", alive_fresh.len(), batch.fresh.len());
        alive.extend(alive_fresh);

        self.store
            .persist(&alive, &snapshot)
            .context("persisting results")?;

        let summary = RunSummary {
            self_ip: self_ip.to_string(),
            started,
            finished: Local::now(),
            snapshot: snapshot.len(),
            rechecked: batch.recheck.len(),
            fresh: batch.fresh.len(),
            alive,
        };
        info!(
            "done: {} alive out of {} checked in {}s",
            summary.alive.len(),
            summary.rechecked + summary.fresh,
            summary.elapsed().num_seconds()
        );

        Ok(summary)
    }
}
