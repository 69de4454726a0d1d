//! Process-wide hostname to address cache

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

/// Hostname to address mapping shared by every resolution service.
///
/// Call sites only see this trait, so eviction or expiry can be added by a
/// new implementation.
pub trait DnsCache: Send + Sync {
    /// Returns the cached address for `hostname`, if any.
    fn find(&self, hostname: &str) -> Option<String>;

    /// Stores `address` for `hostname`, replacing any previous entry.
    fn put(&self, hostname: &str, address: &str);

    /// Number of cached hostnames.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unbounded in-memory cache without expiry.
#[derive(Debug, Default)]
pub struct InMemoryDnsCache {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryDnsCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DnsCache for InMemoryDnsCache {
    fn find(&self, hostname: &str) -> Option<String> {
        self.entries.read().get(hostname).cloned()
    }

    fn put(&self, hostname: &str, address: &str) {
        self.entries
            .write()
            .insert(hostname.to_string(), address.to_string());
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// Returns the process-wide DNS cache.
pub fn global_dns_cache() -> Arc<dyn DnsCache> {
    static GLOBAL: OnceLock<Arc<InMemoryDnsCache>> = OnceLock::new();
    let cache = GLOBAL.get_or_init(|| Arc::new(InMemoryDnsCache::new()));
    Arc::clone(cache) as Arc<dyn DnsCache>
}
