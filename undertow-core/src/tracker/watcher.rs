//! Long-lived command driving announces for one download

use std::sync::Arc;

use super::policy::{AnnouncePolicy, SharedAnnouncePolicy};
use super::session::{AnnounceSession, AnnounceSessionFactory, SessionOptions};
use crate::engine::{Command, CommandId, StepContext};
use crate::peers::{PeerConnector, PeerStorage};
use crate::runtime::BtRuntime;

/// Watches the announce session of one download.
///
/// Idle until the policy is ready, then creates a session and submits its
/// initial command. Once the session finishes, the response goes to the
/// policy and connection commands are spawned for the peers still needed.
/// At most one session exists at a time.
pub struct TrackerWatcherCommand {
    id: CommandId,
    runtime: Arc<BtRuntime>,
    policy: SharedAnnouncePolicy,
    peers: Arc<dyn PeerStorage>,
    session_factory: Arc<dyn AnnounceSessionFactory>,
    connector: Arc<dyn PeerConnector>,
    session: Option<Arc<dyn AnnounceSession>>,
}

impl TrackerWatcherCommand {
    pub fn new(
        id: CommandId,
        runtime: Arc<BtRuntime>,
        policy: SharedAnnouncePolicy,
        peers: Arc<dyn PeerStorage>,
        session_factory: Arc<dyn AnnounceSessionFactory>,
        connector: Arc<dyn PeerConnector>,
    ) -> Self {
        Self {
            id,
            runtime,
            policy,
            peers,
            session_factory,
            connector,
            session: None,
        }
    }

    /// True while an announce session is outstanding.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Completion decision under a force halt.
    fn on_force_halt(&self) -> bool {
        match &self.session {
            None => true,
            Some(session) if session.remaining_commands() == 0 || session.is_finished() => true,
            Some(session) => {
                session.request_halt();
                false
            }
        }
    }

    fn start_announce(&mut self, policy: &mut dyn AnnouncePolicy, ctx: &mut StepContext<'_>) {
        let session = policy.announce_url().and_then(|url| {
            let session = self
                .session_factory
                .create_session(&url, SessionOptions::announce())?;
            tracing::info!("{} - Announcing to {}", self.id, url);
            Ok(session)
        });

        match session {
            Ok(session) => {
                let command = session.create_initial_command(ctx.next_command_id());
                tracing::debug!("{} - Added tracker request command {}", self.id, command.id());
                ctx.add_command(command);
                policy.announce_start();
                self.session = Some(session);
            }
            Err(e) => {
                tracing::error!("{} - Could not start announce: {}", self.id, e);
                Self::record_failure(policy);
            }
        }
    }

    fn finish_announce(
        &mut self,
        policy: &mut dyn AnnouncePolicy,
        session: &dyn AnnounceSession,
        ctx: &mut StepContext<'_>,
    ) {
        let outcome = session
            .read_output()
            .and_then(|body| policy.process_announce_response(&body));

        match outcome {
            Ok(()) => {
                policy.announce_success();
                policy.reset();
            }
            Err(e) => {
                tracing::error!("{} - Announce response rejected: {}", self.id, e);
                Self::record_failure(policy);
            }
        }

        self.connect_peers(ctx);
        self.session = None;
    }

    fn record_failure(policy: &mut dyn AnnouncePolicy) {
        policy.announce_failure();
        if policy.all_failed() {
            policy.reset();
        }
    }

    /// Spawns connection commands for unused peers, up to the number needed.
    fn connect_peers(&self, ctx: &mut StepContext<'_>) {
        let needed = self.runtime.peers_needed();
        for _ in 0..needed {
            let Some(peer) = self.peers.get_unused_peer() else {
                break;
            };
            let id = ctx.next_command_id();
            peer.set_used_by(id);
            ctx.add_command(self.connector.create_connect_command(id, peer));
            tracing::debug!("{} - Adding new command {}", self.id, id);
        }
    }
}

impl Command for TrackerWatcherCommand {
    fn id(&self) -> CommandId {
        self.id
    }

    fn name(&self) -> &'static str {
        "tracker-watcher"
    }

    fn execute(&mut self, ctx: &mut StepContext<'_>) -> bool {
        if ctx.is_halted() {
            if let Some(session) = self.session.take() {
                session.request_halt();
            }
            return true;
        }

        if self.runtime.is_force_halt_requested() {
            return self.on_force_halt();
        }

        let policy = Arc::clone(&self.policy);
        let mut policy = policy.lock();

        if policy.no_more_announce() {
            tracing::debug!("{} - No more announce", self.id);
            return true;
        }

        match self.session.clone() {
            None => {
                if policy.is_ready() {
                    self.start_announce(&mut *policy, ctx);
                }
            }
            Some(session) if session.is_finished() => {
                self.finish_announce(&mut *policy, session.as_ref(), ctx);
            }
            Some(session) if session.remaining_commands() == 0 => {
                tracing::warn!("{} - Announce session ended without a response", self.id);
                self.session = None;
                Self::record_failure(&mut *policy);
            }
            Some(_) => {}
        }

        false
    }
}
