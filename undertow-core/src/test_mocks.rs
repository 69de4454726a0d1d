//! Mock collaborators for unit tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::dns::{ResolverEngine, ResolverStatus};
use crate::engine::{
    Command, CommandId, CommandIdCounter, HaltSignal, ResolverChecks, StepContext,
};
use crate::peers::{Peer, PeerConnector};
use crate::tracker::{
    AnnouncePolicy, AnnounceSession, AnnounceSessionFactory, SessionOptions, TrackerError,
};

/// Shared count of lookups issued by a [`ScriptedResolver`].
#[derive(Debug, Clone, Default)]
pub struct LookupCounter(Arc<AtomicUsize>);

impl LookupCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Resolver engine answering from a fixed table.
///
/// Each lookup stays in progress for `delay` status polls before it
/// settles. Hosts missing from the table fail.
pub struct ScriptedResolver {
    answers: HashMap<String, String>,
    delay: usize,
    polls_left: usize,
    host: Option<String>,
    status: ResolverStatus,
    address: Option<String>,
    error: Option<String>,
    lookups: LookupCounter,
}

impl ScriptedResolver {
    /// Lookups settle inside `resolve`.
    pub fn immediate() -> Self {
        Self::deferred(0)
    }

    /// Lookups settle on the `delay + 1`th status poll.
    pub fn deferred(delay: usize) -> Self {
        Self {
            answers: HashMap::new(),
            delay,
            polls_left: 0,
            host: None,
            status: ResolverStatus::Ready,
            address: None,
            error: None,
            lookups: LookupCounter::default(),
        }
    }

    pub fn answer(mut self, host: impl Into<String>, address: impl Into<String>) -> Self {
        self.answers.insert(host.into(), address.into());
        self
    }

    pub fn lookup_counter(&self) -> LookupCounter {
        self.lookups.clone()
    }

    fn settle(&mut self) {
        let host = self.host.take().unwrap_or_default();
        match self.answers.get(&host) {
            Some(address) => {
                self.address = Some(address.clone());
                self.status = ResolverStatus::Success;
            }
            None => {
                self.error = Some(format!("no answer scripted for {host}"));
                self.status = ResolverStatus::Error;
            }
        }
    }
}

impl ResolverEngine for ScriptedResolver {
    fn resolve(&mut self, hostname: &str) {
        self.lookups.0.fetch_add(1, Ordering::SeqCst);
        self.host = Some(hostname.to_string());
        self.polls_left = self.delay;
        self.status = ResolverStatus::InProgress;
    }

    fn status(&mut self) -> ResolverStatus {
        if self.status == ResolverStatus::InProgress {
            if self.polls_left == 0 {
                self.settle();
            } else {
                self.polls_left -= 1;
            }
        }
        self.status
    }

    fn address(&self) -> Option<String> {
        self.address.clone()
    }

    fn error(&self) -> Option<String> {
        self.error.clone()
    }

    fn reset(&mut self) {
        self.status = ResolverStatus::Ready;
        self.host = None;
        self.address = None;
        self.error = None;
    }

    fn set_address(&mut self, address: String) {
        self.address = Some(address);
    }
}

/// Scheduler handles for stepping a command by hand.
pub struct StepHarness {
    pub halt: HaltSignal,
    pub ids: CommandIdCounter,
    pub checks: ResolverChecks,
}

impl StepHarness {
    pub fn new() -> Self {
        Self {
            halt: HaltSignal::new(),
            ids: CommandIdCounter::new(),
            checks: ResolverChecks::new(),
        }
    }

    /// Runs one step, discarding spawned commands.
    pub fn step(&self, command: &mut dyn Command) -> bool {
        self.step_collect(command).0
    }

    /// Runs one step and returns the commands it spawned.
    pub fn step_collect(&self, command: &mut dyn Command) -> (bool, Vec<Box<dyn Command>>) {
        let mut ctx = StepContext::new(&self.halt, &self.ids, &self.checks);
        let completed = command.execute(&mut ctx);
        (completed, ctx.into_spawned())
    }
}

/// Command that completes on its first step.
pub struct NoopCommand {
    pub id: CommandId,
    pub label: &'static str,
}

impl Command for NoopCommand {
    fn id(&self) -> CommandId {
        self.id
    }

    fn name(&self) -> &'static str {
        self.label
    }

    fn execute(&mut self, _ctx: &mut StepContext<'_>) -> bool {
        true
    }
}

/// Counters recorded by [`MockAnnouncePolicy`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PolicyCalls {
    pub starts: usize,
    pub successes: usize,
    pub failures: usize,
    pub resets: usize,
    pub responses: usize,
}

/// Announce policy whose answers are set by the test.
pub struct MockAnnouncePolicy {
    pub ready: bool,
    pub no_more: bool,
    pub url: Result<String, String>,
    /// Failure reason returned by `process_announce_response`
    pub reject_response: Option<String>,
    /// `all_failed` becomes true after this many failures since the last reset
    pub tiers: usize,
    pub calls: PolicyCalls,
    pub last_response: Option<Vec<u8>>,
    failures_since_reset: usize,
}

impl MockAnnouncePolicy {
    pub fn new() -> Self {
        Self {
            ready: true,
            no_more: false,
            url: Ok("http://tracker.example.org/announce".to_string()),
            reject_response: None,
            tiers: 1,
            calls: PolicyCalls::default(),
            last_response: None,
            failures_since_reset: 0,
        }
    }
}

impl AnnouncePolicy for MockAnnouncePolicy {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn no_more_announce(&self) -> bool {
        self.no_more
    }

    fn announce_start(&mut self) {
        self.calls.starts += 1;
    }

    fn announce_success(&mut self) {
        self.calls.successes += 1;
    }

    fn announce_failure(&mut self) {
        self.calls.failures += 1;
        self.failures_since_reset += 1;
    }

    fn all_failed(&self) -> bool {
        self.failures_since_reset >= self.tiers
    }

    fn reset(&mut self) {
        self.calls.resets += 1;
        self.failures_since_reset = 0;
    }

    fn announce_url(&mut self) -> Result<String, TrackerError> {
        self.url
            .clone()
            .map_err(|message| TrackerError::ProtocolError { message })
    }

    fn process_announce_response(&mut self, response: &[u8]) -> Result<(), TrackerError> {
        self.calls.responses += 1;
        self.last_response = Some(response.to_vec());
        match &self.reject_response {
            Some(message) => Err(TrackerError::ProtocolError {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Announce session whose progress is driven by the test.
#[derive(Default)]
pub struct MockSession {
    pub finished: AtomicBool,
    pub remaining: AtomicUsize,
    pub halt_requested: AtomicBool,
    pub output: Mutex<Bytes>,
}

impl MockSession {
    /// Marks the fetch as done with `body` and its command gone.
    pub fn complete_with(&self, body: &'static [u8]) {
        *self.output.lock() = Bytes::from_static(body);
        self.finished.store(true, Ordering::SeqCst);
        self.remaining.store(0, Ordering::SeqCst);
    }

    /// Marks the fetch command as gone without a response.
    pub fn abandon(&self) {
        self.remaining.store(0, Ordering::SeqCst);
    }
}

impl AnnounceSession for MockSession {
    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    fn remaining_commands(&self) -> usize {
        self.remaining.load(Ordering::SeqCst)
    }

    fn read_output(&self) -> Result<Bytes, TrackerError> {
        Ok(self.output.lock().clone())
    }

    fn request_halt(&self) {
        self.halt_requested.store(true, Ordering::SeqCst);
    }

    fn create_initial_command(&self, id: CommandId) -> Box<dyn Command> {
        self.remaining.fetch_add(1, Ordering::SeqCst);
        Box::new(NoopCommand {
            id,
            label: "mock-announce-fetch",
        })
    }
}

/// Session factory handing out [`MockSession`]s and keeping them for inspection.
#[derive(Default)]
pub struct MockSessionFactory {
    pub sessions: Mutex<Vec<(String, Arc<MockSession>)>>,
    pub fail: AtomicBool,
}

impl MockSessionFactory {
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn last_session(&self) -> Option<Arc<MockSession>> {
        self.sessions
            .lock()
            .last()
            .map(|(_, session)| Arc::clone(session))
    }
}

impl AnnounceSessionFactory for MockSessionFactory {
    fn create_session(
        &self,
        url: &str,
        options: SessionOptions,
    ) -> Result<Arc<dyn AnnounceSession>, TrackerError> {
        assert_eq!(options, SessionOptions::announce());
        if self.fail.load(Ordering::SeqCst) {
            return Err(TrackerError::FetchFailed {
                url: url.to_string(),
                reason: "session refused".to_string(),
            });
        }
        let session = Arc::new(MockSession::default());
        self.sessions
            .lock()
            .push((url.to_string(), Arc::clone(&session)));
        Ok(session)
    }
}

/// Connector recording which peers it was asked to connect to.
#[derive(Default)]
pub struct MockPeerConnector {
    pub connected: Mutex<Vec<(CommandId, SocketAddr)>>,
}

impl PeerConnector for MockPeerConnector {
    fn create_connect_command(&self, id: CommandId, peer: Arc<Peer>) -> Box<dyn Command> {
        self.connected.lock().push((id, peer.addr()));
        Box::new(NoopCommand {
            id,
            label: "mock-peer-connect",
        })
    }
}
