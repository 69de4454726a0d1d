//! System (getaddrinfo) resolver engines.
//!
//! [`SystemResolver`] resolves inline. [`AsyncSystemResolver`] runs the same
//! lookup on Tokio's blocking pool and reports progress through polling, so
//! the owning command never waits on it.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::{DnsError, ResolverEngine, ResolverStatus};
use crate::config::DnsConfig;

/// Creates the resolver engine selected by `config`.
///
/// # Errors
///
/// - `DnsError::RuntimeUnavailable` - If async resolution is configured outside a Tokio runtime
pub fn resolver_engine(config: &DnsConfig) -> Result<Box<dyn ResolverEngine>, DnsError> {
    if config.async_dns {
        Ok(Box::new(AsyncSystemResolver::from_current()?))
    } else {
        Ok(Box::new(SystemResolver::new()))
    }
}

/// Resolves `hostname` through getaddrinfo, preferring an IPv4 result.
fn lookup_address(hostname: &str) -> Result<IpAddr, String> {
    tracing::debug!(host = %hostname, "resolving via getaddrinfo");
    let addrs: Vec<SocketAddr> = (hostname, 0u16)
        .to_socket_addrs()
        .map_err(|e| e.to_string())?
        .collect();

    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .map(SocketAddr::ip)
        .ok_or_else(|| "no addresses returned by getaddrinfo".to_string())
}

/// Terminal result shared by both engines.
#[derive(Debug, Default)]
struct LookupState {
    address: Option<String>,
    error: Option<String>,
}

impl LookupState {
    fn record(&mut self, result: Result<IpAddr, String>) -> ResolverStatus {
        match result {
            Ok(ip) => {
                self.address = Some(ip.to_string());
                ResolverStatus::Success
            }
            Err(reason) => {
                self.error = Some(reason);
                ResolverStatus::Error
            }
        }
    }
}

/// Blocking resolver: `resolve` returns with a terminal status.
#[derive(Debug)]
pub struct SystemResolver {
    status: ResolverStatus,
    state: LookupState,
}

impl SystemResolver {
    pub fn new() -> Self {
        Self {
            status: ResolverStatus::Ready,
            state: LookupState::default(),
        }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverEngine for SystemResolver {
    fn resolve(&mut self, hostname: &str) {
        self.status = self.state.record(lookup_address(hostname));
    }

    fn status(&mut self) -> ResolverStatus {
        self.status
    }

    fn address(&self) -> Option<String> {
        self.state.address.clone()
    }

    fn error(&self) -> Option<String> {
        self.state.error.clone()
    }

    fn reset(&mut self) {
        self.status = ResolverStatus::Ready;
        self.state = LookupState::default();
    }

    fn set_address(&mut self, address: String) {
        self.state.address = Some(address);
    }
}

/// Non-blocking resolver backed by Tokio's blocking pool.
///
/// `resolve` only submits the lookup; `status` polls the task once and
/// returns `InProgress` until it has an answer.
#[derive(Debug)]
pub struct AsyncSystemResolver {
    runtime: Handle,
    status: ResolverStatus,
    state: LookupState,
    lookup: Option<JoinHandle<Result<IpAddr, String>>>,
}

impl AsyncSystemResolver {
    /// Creates a resolver submitting lookups to `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            status: ResolverStatus::Ready,
            state: LookupState::default(),
            lookup: None,
        }
    }

    /// Creates a resolver bound to the runtime of the calling context.
    ///
    /// # Errors
    ///
    /// - `DnsError::RuntimeUnavailable` - If called outside a Tokio runtime
    pub fn from_current() -> Result<Self, DnsError> {
        let runtime = Handle::try_current().map_err(|_| DnsError::RuntimeUnavailable)?;
        Ok(Self::new(runtime))
    }

    fn abort_lookup(&mut self) {
        if let Some(lookup) = self.lookup.take() {
            lookup.abort();
        }
    }
}

impl ResolverEngine for AsyncSystemResolver {
    fn resolve(&mut self, hostname: &str) {
        self.abort_lookup();
        let host = hostname.to_string();
        self.lookup = Some(self.runtime.spawn_blocking(move || lookup_address(&host)));
        self.status = ResolverStatus::InProgress;
    }

    fn status(&mut self) -> ResolverStatus {
        if self.status != ResolverStatus::InProgress {
            return self.status;
        }

        let Some(lookup) = self.lookup.as_mut() else {
            return self.status;
        };

        if let Some(joined) = lookup.now_or_never() {
            self.lookup = None;
            let result = joined.unwrap_or_else(|e| Err(format!("lookup task failed: {e}")));
            self.status = self.state.record(result);
        }

        self.status
    }

    fn address(&self) -> Option<String> {
        self.state.address.clone()
    }

    fn error(&self) -> Option<String> {
        self.state.error.clone()
    }

    fn reset(&mut self) {
        self.abort_lookup();
        self.status = ResolverStatus::Ready;
        self.state = LookupState::default();
    }

    fn set_address(&mut self, address: String) {
        self.state.address = Some(address);
    }
}

impl Drop for AsyncSystemResolver {
    fn drop(&mut self) {
        self.abort_lookup();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_system_resolver_resolves_localhost() {
        let mut resolver = SystemResolver::new();
        assert_eq!(resolver.status(), ResolverStatus::Ready);

        resolver.resolve("localhost");

        assert_eq!(resolver.status(), ResolverStatus::Success);
        let ip: IpAddr = resolver.address().unwrap().parse().unwrap();
        assert!(ip.is_loopback());
    }

    #[test]
    fn test_system_resolver_reports_error_and_resets() {
        let mut resolver = SystemResolver::new();

        // Interior NUL bytes are rejected before any lookup is attempted.
        resolver.resolve("bad\0host");

        assert_eq!(resolver.status(), ResolverStatus::Error);
        assert!(resolver.error().is_some());
        assert!(resolver.address().is_none());

        resolver.reset();
        assert_eq!(resolver.status(), ResolverStatus::Ready);
        assert!(resolver.error().is_none());
    }

    #[test]
    fn test_resolver_engine_requires_runtime_for_async() {
        let result = resolver_engine(&DnsConfig { async_dns: true });
        assert!(matches!(result, Err(DnsError::RuntimeUnavailable)));

        assert!(resolver_engine(&DnsConfig { async_dns: false }).is_ok());
    }

    #[tokio::test]
    async fn test_async_resolver_polls_to_completion() {
        let mut resolver = AsyncSystemResolver::from_current().unwrap();

        resolver.resolve("localhost");
        assert_ne!(resolver.status(), ResolverStatus::Ready);

        let status = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let status = resolver.status();
                if status != ResolverStatus::InProgress {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(status, ResolverStatus::Success);
        assert!(resolver.address().is_some());
    }

    #[tokio::test]
    async fn test_async_resolver_reset_abandons_lookup() {
        let mut resolver = AsyncSystemResolver::from_current().unwrap();

        resolver.resolve("localhost");
        resolver.reset();

        assert_eq!(resolver.status(), ResolverStatus::Ready);
        assert!(resolver.address().is_none());
    }
}
