//! Undertow Core - cooperative command scheduling for BitTorrent control flow
//!
//! This crate provides the non-blocking control layer of the client: a
//! cooperative command queue, a cached hostname resolution service, the DHT
//! entry-point bootstrap command and the tracker announce watcher. Transport,
//! storage and the peer wire protocol are supplied by collaborators.

pub mod config;
pub mod dht;
pub mod dns;
pub mod engine;
pub mod peers;
pub mod runtime;
pub mod tracing_setup;
pub mod tracker;

#[cfg(test)]
mod test_mocks;

// Re-export main types for convenient access
pub use config::UndertowConfig;
pub use dht::{DhtError, EntryPoint, EntryPointResolveCommand};
pub use dns::{DnsError, NameResolutionService, ResolveOutcome};
pub use engine::{Command, CommandId, HaltSignal, Scheduler, StepContext};
pub use peers::{Peer, PeerPool, PeerStorage};
pub use runtime::BtRuntime;
pub use tracker::{TrackerError, TrackerWatcherCommand};

/// Core errors that can bubble up from any Undertow subsystem.
///
/// Commands never surface these past their own step; they appear at
/// construction and configuration boundaries.
#[derive(Debug, thiserror::Error)]
pub enum UndertowError {
    #[error("DNS error: {0}")]
    Dns(#[from] DnsError),

    #[error("DHT error: {0}")]
    Dht(#[from] DhtError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UndertowError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            UndertowError::Dns(DnsError::ResolutionFailed { hostname, .. }) => {
                format!("Could not resolve {hostname}")
            }
            UndertowError::Dns(_) => "Name resolution error occurred".to_string(),
            UndertowError::Dht(_) => "DHT bootstrap error occurred".to_string(),
            UndertowError::Tracker(TrackerError::NoTrackers) => {
                "Torrent has no usable trackers".to_string()
            }
            UndertowError::Tracker(_) => "Tracker error occurred".to_string(),
            UndertowError::Configuration { reason } => format!("Invalid configuration: {reason}"),
            UndertowError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            UndertowError::Configuration { .. }
                | UndertowError::Dht(DhtError::InvalidEntryPoint { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, UndertowError>;
