//! Hostname resolution
//!
//! A [`ResolverEngine`] performs one lookup at a time and exposes its
//! progress as a polled [`ResolverStatus`]. [`NameResolutionService`] wraps an
//! engine with the process-wide [`DnsCache`] and hands commands a single
//! non-blocking `resolve_step` call.

pub mod cache;
pub mod service;
pub mod system;

pub use cache::{DnsCache, InMemoryDnsCache, global_dns_cache};
pub use service::{NameResolutionService, ResolveOutcome};
pub use system::{AsyncSystemResolver, SystemResolver, resolver_engine};

/// Progress of a resolver engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverStatus {
    /// No lookup issued since the last reset
    Ready,
    /// Lookup issued and not yet answered
    InProgress,
    /// Lookup produced an address
    Success,
    /// Lookup failed
    Error,
}

/// Engine translating a hostname into an address, synchronously or not.
///
/// An engine instance serves one hostname at a time and must be `reset`
/// before the next lookup.
pub trait ResolverEngine: Send {
    /// Starts resolving `hostname`. Synchronous engines finish before returning.
    fn resolve(&mut self, hostname: &str);

    /// Polls the current status without blocking.
    fn status(&mut self) -> ResolverStatus;

    /// Resolved address, available in `Success` state.
    fn address(&self) -> Option<String>;

    /// Failure description, available in `Error` state.
    fn error(&self) -> Option<String>;

    /// Returns to `Ready`, abandoning any outstanding lookup.
    fn reset(&mut self);

    /// Records an address obtained elsewhere (a cache hit) as this engine's result.
    fn set_address(&mut self, address: String);
}

/// Errors surfaced by name resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DnsError {
    #[error("Name resolution for {hostname} failed: {reason}")]
    ResolutionFailed { hostname: String, reason: String },

    #[error("Resolver returned an unusable address: {address}")]
    InvalidAddress { address: String },

    #[error("Asynchronous resolution requires a Tokio runtime")]
    RuntimeUnavailable,
}
