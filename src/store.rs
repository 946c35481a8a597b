//! Flat-file result store for the alive set and the source snapshot

use crate::proxy::models::{Protocol, ProxyId, ProxySet};
use crate::proxy::parser::ProxyParser;
use crate::{Config, Result};
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const ALIVE_FILE: &str = "alive.txt";
const CACHE_FILE: &str = "list_cache.txt";

/// How the alive set is laid out on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AliveLayout {
    /// One sorted `alive.txt`
    #[default]
    Flat,
    /// One sorted `alive_<protocol>.txt` per protocol
    PerProtocol,
}

/// Reads and writes the state carried from one run to the next.
///
/// Every write fully replaces its file. The alive set and the cache are two
/// separate writes; a crash between them leaves them out of step.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
    layout: AliveLayout,
}

impl ResultStore {
    pub fn new(config: &Config) -> Self {
        Self::with_layout(&config.data_dir, config.layout)
    }

    pub fn with_layout(dir: impl AsRef<Path>, layout: AliveLayout) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            layout,
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.dir.join(CACHE_FILE)
    }

    pub fn alive_path(&self) -> PathBuf {
        self.dir.join(ALIVE_FILE)
    }

    pub fn protocol_path(&self, protocol: Protocol) -> PathBuf {
        self.dir.join(format!("alive_{}.txt", protocol))
    }

    /// Previous run's snapshot; missing means empty
    pub fn load_cache(&self) -> Result<ProxySet> {
        read_set(&self.cache_path(), Protocol::Http)
    }

    /// Proxies verified alive by the previous run; missing means empty
    pub fn load_alive(&self) -> Result<ProxySet> {
        match self.layout {
            AliveLayout::Flat => read_set(&self.alive_path(), Protocol::Http),
            AliveLayout::PerProtocol => {
                let mut alive = ProxySet::new();
                for protocol in Protocol::ALL {
                    alive.extend(read_set(&self.protocol_path(protocol), protocol)?);
                }
                Ok(alive)
            }
        }
    }

    /// Overwrite the alive set
    pub fn save_alive(&self, alive: &ProxySet) -> Result<()> {
        match self.layout {
            AliveLayout::Flat => write_list(&self.alive_path(), alive.iter()),
            AliveLayout::PerProtocol => {
                for protocol in Protocol::ALL {
                    let subset = alive.iter().filter(|p| p.protocol == protocol);
                    write_list(&self.protocol_path(protocol), subset)?;
                }
                Ok(())
            }
        }
    }

    /// Overwrite the cache with this run's snapshot
    pub fn save_cache(&self, snapshot: &ProxySet) -> Result<()> {
        write_list(&self.cache_path(), snapshot.iter())
    }

    /// Write the alive set, then the snapshot
    pub fn persist(&self, alive: &ProxySet, snapshot: &ProxySet) -> Result<()> {
        self.save_alive(alive)?;
        self.save_cache(snapshot)
    }
}

fn read_set(path: &Path, default_protocol: Protocol) -> Result<ProxySet> {
    let set = ProxyParser::parse_file(path, default_protocol)
        .with_context(|| format!("reading {}", path.display()))?;
    debug!("loaded {} entries from {}", set.len(), path.display());
    Ok(set)
}

/// Overwrite `path` with the proxies sorted, one canonical identifier per line
pub fn write_list<'a>(
    path: &Path,
    proxies: impl Iterator<Item = &'a ProxyId>,
) -> Result<()> {
    let mut lines: Vec<&str> = proxies.map(|p| p.as_str()).collect();
    lines.sort_unstable();
    lines.dedup();

    let mut content = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    debug!("wrote {}", path.display());
    Ok(())
}
