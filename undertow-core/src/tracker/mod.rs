//! BitTorrent tracker announce control
//!
//! [`TrackerWatcherCommand`] owns at most one [`AnnounceSession`] at a time and
//! consults an [`AnnouncePolicy`] for timing, URLs and response handling.
//! [`HttpSessionFactory`] performs the fetch itself over HTTP.

mod announce_list;
mod error;
mod policy;
mod session;
mod watcher;

pub use announce_list::{AnnounceEvent, AnnounceList};
pub use error::TrackerError;
pub use policy::{
    AnnounceParams, AnnouncePolicy, AnnounceResponse, DefaultAnnouncePolicy, InfoHash,
    SharedAnnouncePolicy, TransferStats, parse_announce_response, parse_compact_peers,
};
pub use session::{
    AnnounceFetchCommand, AnnounceSession, AnnounceSessionFactory, HttpAnnounceSession,
    HttpSessionFactory, SessionOptions,
};
pub use watcher::TrackerWatcherCommand;
