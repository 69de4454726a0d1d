//! Known peers of one download and the hook that connects to them

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::{Command, CommandId};

/// A peer learned from a tracker or another source.
///
/// `used_by` holds the id of the connection command that took the peer;
/// a peer with no owner is available.
#[derive(Debug)]
pub struct Peer {
    addr: SocketAddr,
    used_by: Mutex<Option<CommandId>>,
}

impl Peer {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            used_by: Mutex::new(None),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Marks the peer as taken by `owner`.
    pub fn set_used_by(&self, owner: CommandId) {
        *self.used_by.lock() = Some(owner);
    }

    /// Returns the peer to the pool of available peers.
    pub fn release(&self) {
        *self.used_by.lock() = None;
    }

    pub fn used_by(&self) -> Option<CommandId> {
        *self.used_by.lock()
    }

    pub fn is_unused(&self) -> bool {
        self.used_by.lock().is_none()
    }
}

/// Storage of known peers for one download.
pub trait PeerStorage: Send + Sync {
    /// Adds a peer. Returns false if the address is already known or the
    /// storage is full.
    fn add_peer(&self, addr: SocketAddr) -> bool;

    /// Oldest peer that no command has taken yet.
    fn get_unused_peer(&self) -> Option<Arc<Peer>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Creates the command that initiates a connection to a peer.
pub trait PeerConnector: Send + Sync {
    fn create_connect_command(&self, id: CommandId, peer: Arc<Peer>) -> Box<dyn Command>;
}

#[derive(Debug, Default)]
struct PeerPoolInner {
    peers: Vec<Arc<Peer>>,
    known: HashSet<SocketAddr>,
}

/// In-memory [`PeerStorage`] deduplicating by address, bounded in size.
#[derive(Debug)]
pub struct PeerPool {
    inner: Mutex<PeerPoolInner>,
    capacity: usize,
}

impl PeerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(PeerPoolInner::default()),
            capacity,
        }
    }

    /// Number of peers not taken by any command.
    pub fn unused_count(&self) -> usize {
        self.inner
            .lock()
            .peers
            .iter()
            .filter(|peer| peer.is_unused())
            .count()
    }

    /// Snapshot of every known peer in insertion order.
    pub fn peers(&self) -> Vec<Arc<Peer>> {
        self.inner.lock().peers.clone()
    }
}

impl PeerStorage for PeerPool {
    fn add_peer(&self, addr: SocketAddr) -> bool {
        let mut inner = self.inner.lock();
        if inner.peers.len() >= self.capacity || !inner.known.insert(addr) {
            return false;
        }
        inner.peers.push(Arc::new(Peer::new(addr)));
        tracing::trace!("Added peer {} ({} known)", addr, inner.peers.len());
        true
    }

    fn get_unused_peer(&self) -> Option<Arc<Peer>> {
        self.inner
            .lock()
            .peers
            .iter()
            .find(|peer| peer.is_unused())
            .cloned()
    }

    fn len(&self) -> usize {
        self.inner.lock().peers.len()
    }
}
