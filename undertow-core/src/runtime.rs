//! Per-download runtime state shared by the download's commands.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Halt flags and peer demand of one download.
///
/// A graceful halt lets trackers receive a `stopped` announce; a force halt
/// abandons outstanding work as soon as it can.
#[derive(Debug)]
pub struct BtRuntime {
    halt: AtomicBool,
    force_halt: AtomicBool,
    min_peers: usize,
    connections: AtomicUsize,
}

impl BtRuntime {
    pub fn new(min_peers: usize) -> Self {
        Self {
            halt: AtomicBool::new(false),
            force_halt: AtomicBool::new(false),
            min_peers,
            connections: AtomicUsize::new(0),
        }
    }

    pub fn request_halt(&self) {
        self.halt.store(true, Ordering::SeqCst);
    }

    /// Force halt implies a graceful halt.
    pub fn request_force_halt(&self) {
        self.force_halt.store(true, Ordering::SeqCst);
        self.request_halt();
    }

    pub fn is_halt(&self) -> bool {
        self.halt.load(Ordering::SeqCst)
    }

    pub fn is_force_halt_requested(&self) -> bool {
        self.force_halt.load(Ordering::SeqCst)
    }

    pub fn min_peers(&self) -> usize {
        self.min_peers
    }

    /// Records the number of currently connected peers.
    pub fn set_connections(&self, connections: usize) {
        self.connections.store(connections, Ordering::SeqCst);
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn less_than_min_peers(&self) -> bool {
        self.connections() < self.min_peers
    }

    /// Peers to connect to before reaching the minimum; zero while halting.
    pub fn peers_needed(&self) -> usize {
        if self.is_halt() {
            return 0;
        }
        self.min_peers.saturating_sub(self.connections())
    }
}
