//! Cooperative command engine
//!
//! Every unit of work is a [`Command`] whose `execute` runs one
//! non-blocking step. The [`Scheduler`] keeps a FIFO queue of commands and
//! requeues any command that reports it is not finished yet, so waiting on
//! I/O is expressed as "come back on a later pass" instead of blocking.

pub mod commands;
pub mod scheduler;

pub use commands::{
    Command, CommandId, CommandIdCounter, HaltSignal, ResolverCheckGuard, ResolverChecks,
};
pub use scheduler::{PassStats, Scheduler, StepContext};
