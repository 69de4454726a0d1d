//! Cached, non-blocking hostname resolution for a single owning command.

use std::net::IpAddr;
use std::sync::Arc;

use super::{DnsCache, DnsError, ResolverEngine, ResolverStatus};
use crate::engine::{CommandId, ResolverCheckGuard, ResolverChecks};

/// Result of one [`NameResolutionService::resolve_step`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    /// Address is known; the caller may use it immediately
    Resolved(String),
    /// Lookup outstanding; call again on a later step
    Pending,
    /// Lookup failed; the hostname will not be retried by this service
    Failed(DnsError),
}

/// Resolution service owned by exactly one command.
///
/// Wraps a resolver engine with the shared cache. While an asynchronous
/// lookup is outstanding the owner stays registered in [`ResolverChecks`];
/// the registration is dropped on completion, reset, release, or when the
/// service itself is dropped.
pub struct NameResolutionService {
    engine: Box<dyn ResolverEngine>,
    cache: Arc<dyn DnsCache>,
    checks: ResolverChecks,
    owner: CommandId,
    registration: Option<ResolverCheckGuard>,
}

impl NameResolutionService {
    /// Creates a service resolving on behalf of `owner`.
    pub fn new(
        engine: Box<dyn ResolverEngine>,
        cache: Arc<dyn DnsCache>,
        checks: ResolverChecks,
        owner: CommandId,
    ) -> Self {
        Self {
            engine,
            cache,
            checks,
            owner,
            registration: None,
        }
    }

    /// Advances resolution of `hostname` without blocking.
    ///
    /// Literal IP addresses and cached hostnames resolve immediately without
    /// touching the engine's lookup. Otherwise the first call issues the
    /// lookup; an asynchronous engine then reports `Pending` until a later
    /// call observes its terminal state. Successful lookups are written to
    /// the cache before being returned.
    pub fn resolve_step(&mut self, hostname: &str) -> ResolveOutcome {
        if hostname.parse::<IpAddr>().is_ok() {
            return ResolveOutcome::Resolved(hostname.to_string());
        }

        if let Some(address) = self.cache.find(hostname) {
            tracing::info!(
                "{} - DNS cache hit: {} -> {}",
                self.owner,
                hostname,
                address
            );
            self.engine.set_address(address.clone());
            return ResolveOutcome::Resolved(address);
        }

        let mut status = self.engine.status();
        if status == ResolverStatus::Ready {
            tracing::info!("{} - Resolving hostname {}", self.owner, hostname);
            self.engine.resolve(hostname);
            status = self.engine.status();
        }

        match status {
            ResolverStatus::Ready | ResolverStatus::InProgress => {
                if self.registration.is_none() {
                    self.registration = Some(self.checks.register(self.owner));
                }
                ResolveOutcome::Pending
            }
            ResolverStatus::Success => {
                self.registration = None;
                match self.engine.address() {
                    Some(address) => {
                        tracing::info!(
                            "{} - Name resolution complete: {} -> {}",
                            self.owner,
                            hostname,
                            address
                        );
                        self.cache.put(hostname, &address);
                        ResolveOutcome::Resolved(address)
                    }
                    None => ResolveOutcome::Failed(DnsError::ResolutionFailed {
                        hostname: hostname.to_string(),
                        reason: "resolver reported success without an address".to_string(),
                    }),
                }
            }
            ResolverStatus::Error => {
                self.registration = None;
                ResolveOutcome::Failed(DnsError::ResolutionFailed {
                    hostname: hostname.to_string(),
                    reason: self
                        .engine
                        .error()
                        .unwrap_or_else(|| "unknown error".to_string()),
                })
            }
        }
    }

    /// Returns the engine to `Ready` and drops any registration.
    ///
    /// Must be called after every completed resolution before the next hostname.
    pub fn reset(&mut self) {
        self.engine.reset();
        self.registration = None;
    }

    /// Drops the async registration without touching the engine.
    pub fn release(&mut self) {
        self.registration = None;
    }

    /// True while the owner is registered as waiting on a lookup.
    pub fn is_pending(&self) -> bool {
        self.registration.is_some()
    }

    pub fn owner(&self) -> CommandId {
        self.owner
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;
    use crate::dns::InMemoryDnsCache;
    use crate::test_mocks::ScriptedResolver;

    fn service_with(
        resolver: ScriptedResolver,
    ) -> (NameResolutionService, Arc<InMemoryDnsCache>, ResolverChecks) {
        let cache = Arc::new(InMemoryDnsCache::new());
        let checks = ResolverChecks::new();
        let service = NameResolutionService::new(
            Box::new(resolver),
            Arc::clone(&cache) as Arc<dyn DnsCache>,
            checks.clone(),
            CommandId::new(11),
        );
        (service, cache, checks)
    }

    #[test]
    fn test_literal_address_bypasses_engine_and_cache() {
        let resolver = ScriptedResolver::immediate();
        let lookups = resolver.lookup_counter();
        let (mut service, cache, _) = service_with(resolver);

        assert_eq!(
            service.resolve_step("192.0.2.5"),
            ResolveOutcome::Resolved("192.0.2.5".to_string())
        );
        assert_eq!(
            service.resolve_step("2001:db8::1"),
            ResolveOutcome::Resolved("2001:db8::1".to_string())
        );
        assert_eq!(lookups.get(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_hit_never_touches_engine() {
        let resolver = ScriptedResolver::immediate();
        let lookups = resolver.lookup_counter();
        let (mut service, cache, _) = service_with(resolver);
        cache.put("router.example.org", "198.51.100.7");

        for _ in 0..3 {
            assert_eq!(
                service.resolve_step("router.example.org"),
                ResolveOutcome::Resolved("198.51.100.7".to_string())
            );
            service.reset();
        }
        assert_eq!(lookups.get(), 0);
    }

    #[test]
    fn test_sync_resolution_writes_through_to_cache() {
        let resolver = ScriptedResolver::immediate().answer("node.example.org", "203.0.113.4");
        let (mut service, cache, checks) = service_with(resolver);

        let outcome = service.resolve_step("node.example.org");

        assert_eq!(outcome, ResolveOutcome::Resolved("203.0.113.4".to_string()));
        assert_eq!(cache.find("node.example.org").as_deref(), Some("203.0.113.4"));
        assert!(checks.is_empty());
    }

    #[test]
    fn test_async_resolution_registers_until_terminal() {
        let resolver = ScriptedResolver::deferred(2).answer("node.example.org", "203.0.113.4");
        let lookups = resolver.lookup_counter();
        let (mut service, cache, checks) = service_with(resolver);

        assert_eq!(service.resolve_step("node.example.org"), ResolveOutcome::Pending);
        assert!(checks.contains(CommandId::new(11)));
        assert!(service.is_pending());

        assert_eq!(service.resolve_step("node.example.org"), ResolveOutcome::Pending);
        assert_eq!(checks.len(), 1);

        assert_eq!(
            service.resolve_step("node.example.org"),
            ResolveOutcome::Resolved("203.0.113.4".to_string())
        );
        assert!(checks.is_empty());
        assert_eq!(lookups.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failure_is_terminal_and_not_cached() {
        let resolver = ScriptedResolver::immediate();
        let (mut service, cache, checks) = service_with(resolver);

        let outcome = service.resolve_step("bad.invalid");

        assert!(matches!(
            outcome,
            ResolveOutcome::Failed(DnsError::ResolutionFailed { ref hostname, .. })
                if hostname == "bad.invalid"
        ));
        assert!(cache.is_empty());
        assert!(checks.is_empty());
    }

    #[test]
    fn test_dropping_service_releases_registration() {
        let resolver = ScriptedResolver::deferred(5).answer("slow.example.org", "192.0.2.9");
        let (mut service, _, checks) = service_with(resolver);

        assert_eq!(service.resolve_step("slow.example.org"), ResolveOutcome::Pending);
        assert_eq!(checks.len(), 1);

        drop(service);
        assert!(checks.is_empty());
    }

    proptest! {
        #[test]
        fn prop_each_hostname_is_looked_up_once(
            hosts in prop::collection::vec("[a-z]{1,6}\\.example\\.org", 1..12),
        ) {
            let mut resolver = ScriptedResolver::immediate();
            for (i, host) in hosts.iter().enumerate() {
                resolver = resolver.answer(host.as_str(), format!("192.0.2.{}", i % 250 + 1));
            }
            let lookups = resolver.lookup_counter();
            let (mut service, cache, _) = service_with(resolver);

            for host in hosts.iter().chain(hosts.iter()) {
                let outcome = service.resolve_step(host);
                prop_assert!(matches!(outcome, ResolveOutcome::Resolved(_)));
                service.reset();
            }

            let distinct: HashSet<&String> = hosts.iter().collect();
            prop_assert_eq!(lookups.get(), distinct.len());
            prop_assert_eq!(cache.len(), distinct.len());
        }
    }
}
