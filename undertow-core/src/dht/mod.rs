//! DHT bootstrap (BEP-5)
//!
//! Resolves the configured entry points and seeds the DHT task queue with
//! ping, node lookup and bucket refresh tasks. Routing table maintenance
//! itself belongs to the task queue's consumer.

mod bootstrap;
mod error;
mod node;
mod task;

pub use bootstrap::EntryPointResolveCommand;
pub use error::DhtError;
pub use node::{DhtNode, EntryPoint, LocalNode, NodeId, ResolvedEntryPoint};
pub use task::{DefaultDhtTaskFactory, DhtTask, DhtTaskFactory, DhtTaskQueue, PeriodicTaskQueue};
