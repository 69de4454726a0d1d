//! Announce sessions: one tracker fetch driven as scheduler commands.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::FutureExt as _;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::error::TrackerError;
use crate::config::TrackerConfig;
use crate::engine::{Command, CommandId, StepContext};

/// How an announce session stores and checks its download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Keep the body in memory instead of writing it to disk
    pub retain_in_memory: bool,
    pub file_allocation: bool,
    /// Look for an existing local copy before fetching
    pub pre_local_file_check: bool,
    pub label: &'static str,
}

impl SessionOptions {
    /// Options for tracker announces: in memory, no disk work.
    pub fn announce() -> Self {
        Self {
            retain_in_memory: true,
            file_allocation: false,
            pre_local_file_check: false,
            label: "[tracker.announce]",
        }
    }
}

/// A download of one announce URL.
pub trait AnnounceSession: Send + Sync {
    /// True once the body has been fully received.
    fn is_finished(&self) -> bool;

    /// Commands of this session still alive in the scheduler.
    fn remaining_commands(&self) -> usize;

    /// Received body.
    ///
    /// # Errors
    ///
    /// - `TrackerError::FetchFailed` - If the session has not finished successfully
    fn read_output(&self) -> Result<Bytes, TrackerError>;

    /// Asks the session's commands to stop at their next step.
    fn request_halt(&self);

    /// Creates the command that starts the fetch.
    fn create_initial_command(&self, id: CommandId) -> Box<dyn Command>;
}

pub trait AnnounceSessionFactory: Send + Sync {
    /// # Errors
    ///
    /// - `TrackerError::InvalidUrl` - If `url` is not a valid URL
    fn create_session(
        &self,
        url: &str,
        options: SessionOptions,
    ) -> Result<Arc<dyn AnnounceSession>, TrackerError>;
}

/// Creates [`HttpAnnounceSession`]s sharing one HTTP client.
#[derive(Debug, Clone)]
pub struct HttpSessionFactory {
    client: reqwest::Client,
}

impl HttpSessionFactory {
    /// Builds the HTTP client from tracker configuration.
    ///
    /// # Errors
    ///
    /// - `TrackerError::Http` - If the client cannot be built
    pub fn new(config: &TrackerConfig) -> Result<Self, TrackerError> {
        let client = reqwest::Client::builder()
            .timeout(config.tracker_timeout)
            .user_agent(config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl AnnounceSessionFactory for HttpSessionFactory {
    fn create_session(
        &self,
        url: &str,
        options: SessionOptions,
    ) -> Result<Arc<dyn AnnounceSession>, TrackerError> {
        let url = url::Url::parse(url)?;
        tracing::info!("Creating tracker announce session {} for {}", options.label, url);
        Ok(Arc::new(HttpAnnounceSession {
            url,
            client: self.client.clone(),
            state: Arc::new(Mutex::new(FetchState::default())),
        }))
    }
}

#[derive(Debug, Default)]
struct FetchState {
    remaining: usize,
    finished: bool,
    halt_requested: bool,
    body: BytesMut,
    error: Option<String>,
}

/// Single GET of an announce URL with the body kept in memory.
pub struct HttpAnnounceSession {
    url: url::Url,
    client: reqwest::Client,
    state: Arc<Mutex<FetchState>>,
}

impl AnnounceSession for HttpAnnounceSession {
    fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    fn remaining_commands(&self) -> usize {
        self.state.lock().remaining
    }

    fn read_output(&self) -> Result<Bytes, TrackerError> {
        let state = self.state.lock();
        if !state.finished {
            return Err(TrackerError::FetchFailed {
                url: self.url.to_string(),
                reason: state
                    .error
                    .clone()
                    .unwrap_or_else(|| "download not finished".to_string()),
            });
        }
        Ok(state.body.clone().freeze())
    }

    fn request_halt(&self) {
        self.state.lock().halt_requested = true;
    }

    fn create_initial_command(&self, id: CommandId) -> Box<dyn Command> {
        self.state.lock().remaining += 1;
        Box::new(AnnounceFetchCommand {
            id,
            url: self.url.clone(),
            client: self.client.clone(),
            state: Arc::clone(&self.state),
            fetch: None,
        })
    }
}

/// Fetches an announce URL on the Tokio runtime and polls the result.
pub struct AnnounceFetchCommand {
    id: CommandId,
    url: url::Url,
    client: reqwest::Client,
    state: Arc<Mutex<FetchState>>,
    fetch: Option<JoinHandle<Result<Bytes, String>>>,
}

impl AnnounceFetchCommand {
    fn start(&mut self) -> Result<(), String> {
        let runtime = Handle::try_current().map_err(|e| format!("no Tokio runtime: {e}"))?;
        let request = self.client.get(self.url.clone());
        self.fetch = Some(runtime.spawn(async move {
            let response = request.send().await.map_err(|e| e.to_string())?;
            let status = response.status();
            if !status.is_success() {
                return Err(format!("tracker returned HTTP {status}"));
            }
            response.bytes().await.map_err(|e| e.to_string())
        }));
        tracing::debug!("{} - Requesting {}", self.id, self.url);
        Ok(())
    }

    fn fail(&self, reason: String) {
        tracing::warn!("{} - Announce to {} failed: {}", self.id, self.url, reason);
        self.state.lock().error = Some(reason);
    }
}

impl Command for AnnounceFetchCommand {
    fn id(&self) -> CommandId {
        self.id
    }

    fn name(&self) -> &'static str {
        "tracker-announce-fetch"
    }

    fn execute(&mut self, ctx: &mut StepContext<'_>) -> bool {
        if ctx.is_halted() || self.state.lock().halt_requested {
            return true;
        }

        let Some(fetch) = self.fetch.as_mut() else {
            if let Err(reason) = self.start() {
                self.fail(reason);
                return true;
            }
            return false;
        };

        let Some(joined) = fetch.now_or_never() else {
            return false;
        };
        self.fetch = None;

        match joined.unwrap_or_else(|e| Err(format!("fetch task failed: {e}"))) {
            Ok(body) => {
                tracing::debug!("{} - Received {} byte announce response", self.id, body.len());
                let mut state = self.state.lock();
                state.body.extend_from_slice(&body);
                state.finished = true;
            }
            Err(reason) => self.fail(reason),
        }
        true
    }
}

impl Drop for AnnounceFetchCommand {
    fn drop(&mut self) {
        if let Some(fetch) = self.fetch.take() {
            fetch.abort();
        }
        let mut state = self.state.lock();
        state.remaining = state.remaining.saturating_sub(1);
    }
}
