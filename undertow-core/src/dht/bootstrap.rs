//! Entry point resolution command that seeds the DHT.

use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use super::error::DhtError;
use super::node::{DhtNode, EntryPoint, LocalNode, ResolvedEntryPoint};
use super::task::{DhtTaskFactory, DhtTaskQueue};
use crate::config::DhtConfig;
use crate::dns::{DnsError, NameResolutionService, ResolveOutcome};
use crate::engine::{Command, CommandId, StepContext};

/// Default timeout handed to entry point ping tasks.
const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves DHT entry points one at a time and pings each resolved node.
///
/// The command owns its resolution service, so at most one hostname is in
/// flight. When an asynchronous lookup is pending the step ends and the
/// command is polled again on a later pass. Entries that fail to resolve
/// are dropped. Once the list is exhausted, a self lookup and a bucket
/// refresh are scheduled if bootstrapping is enabled and anything resolved.
pub struct EntryPointResolveCommand {
    resolver: NameResolutionService,
    entry_points: VecDeque<EntryPoint>,
    resolved: Vec<ResolvedEntryPoint>,
    bootstrap_enabled: bool,
    ping_timeout: Duration,
    task_queue: Arc<dyn DhtTaskQueue>,
    task_factory: Arc<dyn DhtTaskFactory>,
    local_node: LocalNode,
}

impl EntryPointResolveCommand {
    /// Creates the command; its id is the resolver's owner id.
    ///
    /// Bootstrapping starts disabled.
    pub fn new(
        resolver: NameResolutionService,
        entry_points: Vec<EntryPoint>,
        task_queue: Arc<dyn DhtTaskQueue>,
        task_factory: Arc<dyn DhtTaskFactory>,
        local_node: LocalNode,
    ) -> Self {
        Self {
            resolver,
            entry_points: entry_points.into(),
            resolved: Vec::new(),
            bootstrap_enabled: false,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            task_queue,
            task_factory,
            local_node,
        }
    }

    /// Creates the command from the DHT section of the configuration.
    pub fn from_config(
        config: &DhtConfig,
        resolver: NameResolutionService,
        task_queue: Arc<dyn DhtTaskQueue>,
        task_factory: Arc<dyn DhtTaskFactory>,
        local_node: LocalNode,
    ) -> Self {
        Self::new(
            resolver,
            config.entry_points.clone(),
            task_queue,
            task_factory,
            local_node,
        )
        .with_bootstrap_enabled(config.bootstrap_enabled)
        .with_ping_timeout(config.ping_timeout)
    }

    pub fn with_bootstrap_enabled(mut self, enabled: bool) -> Self {
        self.bootstrap_enabled = enabled;
        self
    }

    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Entry points resolved so far, in resolution order.
    pub fn resolved_entry_points(&self) -> &[ResolvedEntryPoint] {
        &self.resolved
    }

    /// Entry points still waiting to be resolved.
    pub fn remaining_entry_points(&self) -> usize {
        self.entry_points.len()
    }

    /// Records a resolved entry and pings it.
    fn accept_entry(&mut self, entry: &EntryPoint, address: &str) -> Result<(), DhtError> {
        let ip: IpAddr = address.parse().map_err(|_| DnsError::InvalidAddress {
            address: address.to_string(),
        })?;
        let resolved = ResolvedEntryPoint {
            addr: SocketAddr::new(ip, entry.port),
        };

        let node = DhtNode::with_unknown_id(resolved.addr);
        self.task_queue
            .add_periodic_task(self.task_factory.create_ping_task(node, self.ping_timeout))?;

        tracing::debug!("{} - Added ping task for entry point {}", self.id(), resolved.addr);
        self.resolved.push(resolved);
        Ok(())
    }

    fn schedule_bootstrap(&self) -> Result<(), DhtError> {
        self.task_queue
            .add_periodic_task(self.task_factory.create_node_lookup_task(self.local_node.id()))?;
        self.task_queue
            .add_periodic_task(self.task_factory.create_bucket_refresh_task())?;
        tracing::info!(
            "{} - Scheduled DHT bootstrap from {} entry points",
            self.id(),
            self.resolved.len()
        );
        Ok(())
    }
}

impl Command for EntryPointResolveCommand {
    fn id(&self) -> CommandId {
        self.resolver.owner()
    }

    fn name(&self) -> &'static str {
        "dht-entry-point-resolve"
    }

    fn execute(&mut self, ctx: &mut StepContext<'_>) -> bool {
        if ctx.is_halted() {
            self.resolver.release();
            return true;
        }

        while let Some(entry) = self.entry_points.front().cloned() {
            match self.resolver.resolve_step(&entry.host) {
                ResolveOutcome::Pending => return false,
                ResolveOutcome::Resolved(address) => {
                    self.entry_points.pop_front();
                    self.resolver.reset();
                    if let Err(e) = self.accept_entry(&entry, &address) {
                        tracing::error!("{} - Dropping entry point {}: {}", self.id(), entry, e);
                    }
                }
                ResolveOutcome::Failed(e) => {
                    tracing::error!("{} - Dropping entry point {}: {}", self.id(), entry, e);
                    self.entry_points.pop_front();
                    self.resolver.reset();
                }
            }
        }

        if self.bootstrap_enabled && !self.resolved.is_empty() {
            if let Err(e) = self.schedule_bootstrap() {
                tracing::error!("{} - DHT bootstrap not scheduled: {}", self.id(), e);
            }
        }

        true
    }
}
