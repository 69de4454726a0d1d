use std::fmt;
use std::net::SocketAddr;

use rand::Rng as _;

use super::error::DhtError;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub [u8; 20]);

impl NodeId {
    pub fn generate() -> Self {
        let mut id = [0u8; 20];
        rand::rng().fill(&mut id);
        Self(id)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DhtError> {
        if bytes.len() != 20 {
            return Err(DhtError::InvalidNodeId);
        }
        let mut id = [0u8; 20];
        id.copy_from_slice(bytes);
        Ok(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}..)", hex::encode(&self.0[..2]))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A remote DHT node as far as task creation is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhtNode {
    pub id: NodeId,
    pub addr: SocketAddr,
}

impl DhtNode {
    pub fn new(id: NodeId, addr: SocketAddr) -> Self {
        Self { id, addr }
    }

    /// Node whose id is not known yet, such as a bootstrap router.
    ///
    /// Gets a random placeholder id until the node answers.
    pub fn with_unknown_id(addr: SocketAddr) -> Self {
        Self::new(NodeId::generate(), addr)
    }
}

/// Identity of this client in the DHT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalNode {
    id: NodeId,
}

impl LocalNode {
    pub fn new(id: NodeId) -> Self {
        Self { id }
    }

    pub fn generate() -> Self {
        Self::new(NodeId::generate())
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

/// Bootstrap address as configured: hostname or literal IP plus port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryPoint {
    pub host: String,
    pub port: u16,
}

impl EntryPoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parses `host:port`, accepting `[v6]:port` for IPv6 literals.
    pub fn parse(value: &str) -> Result<Self, DhtError> {
        let invalid = || DhtError::InvalidEntryPoint {
            value: value.to_string(),
        };

        let (host, port) = value.rsplit_once(':').ok_or_else(invalid)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;

        Ok(Self::new(host, port))
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Entry point whose host has been turned into an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedEntryPoint {
    pub addr: SocketAddr,
}
