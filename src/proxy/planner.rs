//! Differential set planner deciding which candidates a run must probe

use crate::proxy::models::{ProxySet, WorkBatch};
use tracing::warn;

/// Pick the snapshot a run plans against.
///
/// A fetch that produced nothing at all falls back to the previous cache,
/// which turns the run into a pure re-check of the alive set.
pub fn effective_snapshot(fetched: ProxySet, cache: &ProxySet) -> ProxySet {
    if fetched.is_empty() {
        warn!("no candidates fetched from any source, reusing cached list");
        cache.clone()
    } else {
        fetched
    }
}

/// Split the work for one run into two disjoint batches.
///
/// * `fresh` is `(source - cache) - alive`: only candidates that appeared
///   since the last snapshot and are not already known alive.
/// * `recheck` is `alive` in full: liveness is never assumed to carry over.
pub fn plan(source: &ProxySet, cache: &ProxySet, alive: &ProxySet) -> WorkBatch {
    let fresh = source
        .iter()
        .filter(|proxy| !cache.contains(*proxy) && !alive.contains(*proxy))
        .cloned()
        .collect();

    WorkBatch {
        recheck: alive.clone(),
        fresh,
    }
}
