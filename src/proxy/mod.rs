//! Proxy module for normalizing, planning and verifying proxies
//!
//! This module provides functionality for:
//! - Normalizing raw list lines into protocol-tagged identifiers
//! - Fetching candidate lists from remote sources
//! - Resolving the caller's own address as an anonymity oracle
//! - Planning which candidates need probing this run
//! - Probing candidates with bounded concurrency

pub mod checker;
pub mod crawler;
pub mod error;
pub mod identity;
pub mod models;
pub mod parser;
pub mod planner;
pub mod probe;

pub use checker::ProxyChecker;
pub use crawler::{CrawlResult, ProxyCrawler, ProxySource};
pub use error::{IdentityError, ParseError, ProbeError};
pub use identity::IdentityResolver;
pub use models::{
    Alive, Protocol, ProxyCheckResult, ProxyCheckStatus, ProxyId, ProxySet, WorkBatch,
};
pub use parser::ProxyParser;
pub use planner::{effective_snapshot, plan};
pub use probe::{HttpProbe, Probe};
