/// Errors raised while building announces or handling tracker responses.
///
/// The watcher turns every one of these into an announce failure.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Protocol error: {message}")]
    ProtocolError { message: String },

    #[error("Tracker returned failure: {reason}")]
    TrackerFailure { reason: String },

    #[error("Announce to {url} failed: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("No tracker left to announce to")]
    NoTrackers,

    #[error("Invalid announce URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
