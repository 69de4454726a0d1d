use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use super::error::DhtError;
use super::node::{DhtNode, NodeId};

/// Maintenance work for the DHT task queue's consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhtTask {
    /// Ping a node so it can enter the routing table
    Ping { node: DhtNode, timeout: Duration },
    /// Iterative lookup of the nodes closest to `target`
    NodeLookup { target: NodeId },
    /// Refresh buckets that have gone quiet
    BucketRefresh,
}

/// Builds DHT tasks.
pub trait DhtTaskFactory: Send + Sync {
    fn create_ping_task(&self, node: DhtNode, timeout: Duration) -> DhtTask;

    fn create_node_lookup_task(&self, target: NodeId) -> DhtTask;

    fn create_bucket_refresh_task(&self) -> DhtTask;
}

/// Receives periodic DHT tasks.
pub trait DhtTaskQueue: Send + Sync {
    /// # Errors
    ///
    /// - `DhtError::TaskQueueFull` - If the queue cannot take more tasks
    fn add_periodic_task(&self, task: DhtTask) -> Result<(), DhtError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDhtTaskFactory;

impl DhtTaskFactory for DefaultDhtTaskFactory {
    fn create_ping_task(&self, node: DhtNode, timeout: Duration) -> DhtTask {
        DhtTask::Ping { node, timeout }
    }

    fn create_node_lookup_task(&self, target: NodeId) -> DhtTask {
        DhtTask::NodeLookup { target }
    }

    fn create_bucket_refresh_task(&self) -> DhtTask {
        DhtTask::BucketRefresh
    }
}

/// Bounded in-memory FIFO of periodic tasks.
#[derive(Debug)]
pub struct PeriodicTaskQueue {
    tasks: Mutex<VecDeque<DhtTask>>,
    capacity: usize,
}

impl PeriodicTaskQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Removes and returns the oldest task.
    pub fn pop(&self) -> Option<DhtTask> {
        self.tasks.lock().pop_front()
    }

    /// Removes and returns every queued task, oldest first.
    pub fn drain(&self) -> Vec<DhtTask> {
        self.tasks.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl DhtTaskQueue for PeriodicTaskQueue {
    fn add_periodic_task(&self, task: DhtTask) -> Result<(), DhtError> {
        let mut tasks = self.tasks.lock();
        if tasks.len() >= self.capacity {
            return Err(DhtError::TaskQueueFull {
                capacity: self.capacity,
            });
        }
        tracing::trace!("Queued periodic DHT task {:?}", task);
        tasks.push_back(task);
        Ok(())
    }
}
