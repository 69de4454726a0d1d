//! Command definitions and the shared handles commands observe.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use super::scheduler::StepContext;

/// Unique identity of a command within one scheduler.
///
/// Ids are handed out monotonically and never reused. Peers record the id
/// of the connection command that took them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandId(u64);

impl CommandId {
    /// Creates CommandId from its raw value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CUID#{}", self.0)
    }
}

/// Allocator for fresh command ids, shared by everything feeding one scheduler.
#[derive(Debug, Clone)]
pub struct CommandIdCounter {
    next: Arc<AtomicU64>,
}

impl CommandIdCounter {
    /// Creates a counter whose first id is 1.
    pub fn new() -> Self {
        Self {
            next: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocates the next unused id.
    pub fn next_id(&self) -> CommandId {
        CommandId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for CommandIdCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// A schedulable unit of work.
///
/// `execute` performs one non-blocking step and returns `true` once the
/// command is done. Returning `false` puts the command back at the tail of
/// the queue; it will run again on the next pass.
pub trait Command: Send {
    /// Identity used for logging and async resolution registrations.
    fn id(&self) -> CommandId;

    /// Short name for logs.
    fn name(&self) -> &'static str {
        "command"
    }

    /// Runs one step. Returns `true` when the command is complete.
    fn execute(&mut self, ctx: &mut StepContext<'_>) -> bool;
}

/// Global halt/finished condition polled at the start of every step.
///
/// Cloning shares the underlying flags.
#[derive(Debug, Clone, Default)]
pub struct HaltSignal {
    halt_requested: Arc<AtomicBool>,
    downloads_finished: Arc<AtomicBool>,
}

impl HaltSignal {
    /// Creates a signal with neither condition set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every command to wind down.
    pub fn request_halt(&self) {
        self.halt_requested.store(true, Ordering::SeqCst);
    }

    /// Records that every download handled by the engine has finished.
    pub fn mark_downloads_finished(&self) {
        self.downloads_finished.store(true, Ordering::SeqCst);
    }

    pub fn is_halt_requested(&self) -> bool {
        self.halt_requested.load(Ordering::SeqCst)
    }

    /// True once a halt was requested or all downloads finished.
    pub fn is_halted(&self) -> bool {
        self.is_halt_requested() || self.downloads_finished.load(Ordering::SeqCst)
    }
}

/// Registry of commands waiting on an asynchronous name resolution.
///
/// An owner stays registered while any of its [`ResolverCheckGuard`]s is alive.
#[derive(Debug, Clone, Default)]
pub struct ResolverChecks {
    waiting: Arc<Mutex<HashMap<CommandId, usize>>>,
}

impl ResolverChecks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `owner` as waiting on a resolution.
    ///
    /// Registering an id that is already waiting does not add a second entry.
    pub fn register(&self, owner: CommandId) -> ResolverCheckGuard {
        let mut waiting = self.waiting.lock();
        let guards = waiting.entry(owner).or_insert(0);
        *guards += 1;
        if *guards == 1 {
            tracing::trace!("{} registered for name resolver check", owner);
        }
        drop(waiting);
        ResolverCheckGuard {
            checks: self.clone(),
            owner,
        }
    }

    pub fn contains(&self, owner: CommandId) -> bool {
        self.waiting.lock().contains_key(&owner)
    }

    pub fn len(&self) -> usize {
        self.waiting.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.lock().is_empty()
    }

    fn release(&self, owner: CommandId) {
        let mut waiting = self.waiting.lock();
        let Some(guards) = waiting.get_mut(&owner) else {
            return;
        };
        *guards -= 1;
        if *guards == 0 {
            waiting.remove(&owner);
            tracing::trace!("{} released name resolver check", owner);
        }
    }
}

/// Scoped registration in [`ResolverChecks`]; dropping it deregisters.
#[derive(Debug)]
pub struct ResolverCheckGuard {
    checks: ResolverChecks,
    owner: CommandId,
}

impl ResolverCheckGuard {
    pub fn owner(&self) -> CommandId {
        self.owner
    }
}

impl Drop for ResolverCheckGuard {
    fn drop(&mut self) {
        self.checks.release(self.owner);
    }
}
