use thiserror::Error;

use crate::dns::DnsError;

#[derive(Debug, Error)]
pub enum DhtError {
    #[error("name resolution error: {0}")]
    Dns(#[from] DnsError),

    #[error("invalid entry point: {value}")]
    InvalidEntryPoint { value: String },

    #[error("invalid node id length")]
    InvalidNodeId,

    #[error("task queue full ({capacity} tasks)")]
    TaskQueueFull { capacity: usize },
}
