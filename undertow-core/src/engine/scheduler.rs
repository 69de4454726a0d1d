//! FIFO command queue driven one step at a time.

use std::collections::VecDeque;

use super::commands::{Command, CommandId, CommandIdCounter, HaltSignal, ResolverChecks};
use crate::config::SchedulerConfig;

/// View of the scheduler handed to a command while it executes a step.
///
/// Commands created through [`StepContext::add_command`] join the queue
/// after the step ends, ahead of the command that created them.
pub struct StepContext<'a> {
    halt: &'a HaltSignal,
    ids: &'a CommandIdCounter,
    resolver_checks: &'a ResolverChecks,
    spawned: Vec<Box<dyn Command>>,
}

impl<'a> StepContext<'a> {
    /// Creates a context for stepping a command outside [`Scheduler`].
    pub fn new(
        halt: &'a HaltSignal,
        ids: &'a CommandIdCounter,
        resolver_checks: &'a ResolverChecks,
    ) -> Self {
        Self {
            halt,
            ids,
            resolver_checks,
            spawned: Vec::new(),
        }
    }

    /// Commands added during the step, in creation order.
    pub fn into_spawned(self) -> Vec<Box<dyn Command>> {
        self.spawned
    }

    /// True once a halt was requested or all downloads finished.
    pub fn is_halted(&self) -> bool {
        self.halt.is_halted()
    }

    /// Queues a new command; it becomes eligible on the following pass.
    pub fn add_command(&mut self, command: Box<dyn Command>) {
        self.spawned.push(command);
    }

    /// Allocates a fresh unique command id.
    pub fn next_command_id(&self) -> CommandId {
        self.ids.next_id()
    }

    pub fn resolver_checks(&self) -> &ResolverChecks {
        self.resolver_checks
    }
}

/// Outcome of one pass over the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Commands executed during the pass
    pub executed: usize,
    /// Commands that reported completion and left the queue
    pub completed: usize,
}

/// Single-threaded cooperative scheduler.
///
/// Holds every runnable command in one FIFO queue. A pass runs exactly the
/// commands that were queued when it started, so commands spawned or
/// requeued during the pass wait for the next one.
pub struct Scheduler {
    queue: VecDeque<Box<dyn Command>>,
    halt: HaltSignal,
    ids: CommandIdCounter,
    resolver_checks: ResolverChecks,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Creates an empty scheduler.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            queue: VecDeque::new(),
            halt: HaltSignal::new(),
            ids: CommandIdCounter::new(),
            resolver_checks: ResolverChecks::new(),
            config,
        }
    }

    /// Appends a command to the tail of the queue.
    pub fn add_command(&mut self, command: Box<dyn Command>) {
        tracing::trace!("Queued {} {}", command.name(), command.id());
        self.queue.push_back(command);
    }

    /// Allocates a fresh unique command id.
    pub fn next_command_id(&self) -> CommandId {
        self.ids.next_id()
    }

    /// Shared id allocator for components that create commands outside a step.
    pub fn command_ids(&self) -> CommandIdCounter {
        self.ids.clone()
    }

    /// Shared halt signal observed by every command.
    pub fn halt_signal(&self) -> HaltSignal {
        self.halt.clone()
    }

    /// Registry of commands waiting on async resolution.
    pub fn resolver_checks(&self) -> ResolverChecks {
        self.resolver_checks.clone()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Executes one step of `command`.
    ///
    /// Commands spawned during the step are appended first, then the command
    /// itself if it is not complete. Returns whether the command completed.
    pub fn run_once(&mut self, mut command: Box<dyn Command>) -> bool {
        let mut ctx = StepContext::new(&self.halt, &self.ids, &self.resolver_checks);
        let completed = command.execute(&mut ctx);
        let spawned = ctx.into_spawned();

        for new_command in spawned {
            self.add_command(new_command);
        }

        if completed {
            tracing::trace!("{} {} completed", command.name(), command.id());
        } else {
            self.queue.push_back(command);
        }

        completed
    }

    /// Runs every command that was queued when the pass started, once.
    pub fn run_pass(&mut self) -> PassStats {
        let mut stats = PassStats::default();
        let queued = self.queue.len();

        for _ in 0..queued {
            let Some(command) = self.queue.pop_front() else {
                break;
            };
            stats.executed += 1;
            if self.run_once(command) {
                stats.completed += 1;
            }
        }

        stats
    }

    /// Runs passes until the queue drains or `max_passes` is reached.
    ///
    /// Returns the number of passes executed.
    pub fn run_until_idle(&mut self, max_passes: usize) -> usize {
        let mut passes = 0;
        while !self.queue.is_empty() && passes < max_passes {
            self.run_pass();
            passes += 1;
        }
        passes
    }

    /// Drives the queue until every command has completed.
    ///
    /// Between passes the loop yields to the runtime while resolutions are
    /// outstanding so their lookups can progress, and otherwise pauses for
    /// the configured pass interval.
    pub async fn run(&mut self) {
        tracing::debug!("Command engine started with {} commands", self.queue.len());

        while !self.queue.is_empty() {
            self.run_pass();

            if self.queue.is_empty() {
                break;
            }

            if !self.resolver_checks.is_empty() || self.config.pass_interval.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.config.pass_interval).await;
            }
        }

        tracing::debug!("Command engine stopped");
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
