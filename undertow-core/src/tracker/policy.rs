//! Announce timing, URL construction and response handling

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::announce_list::{AnnounceEvent, AnnounceList};
use super::error::TrackerError;
use crate::config::TrackerConfig;
use crate::peers::PeerStorage;
use crate::runtime::BtRuntime;

/// Decides when to announce and interprets tracker answers.
///
/// The policy owns the announce counters: the number of trackers in
/// flight and the count of failed tries.
pub trait AnnouncePolicy: Send {
    /// True when a new announce should be sent now.
    fn is_ready(&self) -> bool;

    /// True when no further announce will ever be sent.
    fn no_more_announce(&self) -> bool;

    /// Records that an announce went out.
    fn announce_start(&mut self);

    fn announce_success(&mut self);

    fn announce_failure(&mut self);

    /// True when every tracker failed since the last reset.
    fn all_failed(&self) -> bool;

    /// Restarts the announce interval and returns to the first tracker.
    fn reset(&mut self);

    /// Builds the URL of the next announce.
    ///
    /// # Errors
    ///
    /// - `TrackerError::NoTrackers` - If no tracker is left to try
    /// - `TrackerError::InvalidUrl` - If the tracker URL does not parse
    fn announce_url(&mut self) -> Result<String, TrackerError>;

    /// Applies a raw announce response.
    ///
    /// # Errors
    ///
    /// - `TrackerError::ProtocolError` - If the body is not a valid announce response
    /// - `TrackerError::TrackerFailure` - If the tracker answered with a failure reason
    fn process_announce_response(&mut self, response: &[u8]) -> Result<(), TrackerError>;
}

/// Announce policy shared between the watcher and the download's other commands.
pub type SharedAnnouncePolicy = Arc<Mutex<dyn AnnouncePolicy>>;

/// 20-byte SHA-1 identifying a torrent.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({self})")
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Byte counters reported with every announce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub uploaded: u64,
    pub downloaded: u64,
    pub left: u64,
}

/// Parsed tracker announce response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceResponse {
    /// Seconds until the next regular announce
    pub interval: Option<u32>,
    /// Minimum seconds between announces
    pub min_interval: Option<u32>,
    pub tracker_id: Option<String>,
    /// Seeders in the swarm
    pub complete: u32,
    /// Leechers in the swarm
    pub incomplete: u32,
    pub peers: Vec<SocketAddr>,
    pub warning_message: Option<String>,
}

/// Parses compact IPv4 peer entries, six bytes each.
///
/// # Errors
///
/// - `TrackerError::ProtocolError` - If the length is not a multiple of six
pub fn parse_compact_peers(peer_bytes: &[u8]) -> Result<Vec<SocketAddr>, TrackerError> {
    if !peer_bytes.len().is_multiple_of(6) {
        return Err(TrackerError::ProtocolError {
            message: "Invalid compact peer data length".to_string(),
        });
    }

    Ok(peer_bytes
        .chunks(6)
        .map(|chunk| {
            let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
            let port = u16::from_be_bytes([chunk[4], chunk[5]]);
            SocketAddr::V4(SocketAddrV4::new(ip, port))
        })
        .collect())
}

/// Parses a bencoded announce response.
///
/// # Errors
///
/// - `TrackerError::ProtocolError` - If the body is not a bencoded dictionary
/// - `TrackerError::TrackerFailure` - If the tracker sent a failure reason
pub fn parse_announce_response(response_bytes: &[u8]) -> Result<AnnounceResponse, TrackerError> {
    let parsed =
        bencode_rs::Value::parse(response_bytes).map_err(|e| TrackerError::ProtocolError {
            message: format!("Failed to parse tracker response: {e:?}"),
        })?;

    let Some(bencode_rs::Value::Dictionary(dict)) = parsed.first() else {
        return Err(TrackerError::ProtocolError {
            message: "Invalid tracker response format".to_string(),
        });
    };

    if let Some(bencode_rs::Value::Bytes(reason)) = dict.get(b"failure reason".as_slice()) {
        return Err(TrackerError::TrackerFailure {
            reason: String::from_utf8_lossy(reason).to_string(),
        });
    }

    let integer = |key: &[u8]| match dict.get(key) {
        Some(bencode_rs::Value::Integer(val)) => u32::try_from(*val).ok(),
        _ => None,
    };
    let text = |key: &[u8]| match dict.get(key) {
        Some(bencode_rs::Value::Bytes(bytes)) => Some(String::from_utf8_lossy(bytes).to_string()),
        _ => None,
    };

    let peers = match dict.get(b"peers".as_slice()) {
        Some(bencode_rs::Value::Bytes(peer_data)) => parse_compact_peers(peer_data)?,
        _ => Vec::new(),
    };

    Ok(AnnounceResponse {
        interval: integer(b"interval".as_slice()),
        min_interval: integer(b"min interval".as_slice()),
        tracker_id: text(b"tracker id".as_slice()),
        complete: integer(b"complete".as_slice()).unwrap_or(0),
        incomplete: integer(b"incomplete".as_slice()).unwrap_or(0),
        peers,
        warning_message: text(b"warning message".as_slice()),
    })
}

/// Identity of the download being announced.
#[derive(Debug, Clone)]
pub struct AnnounceParams {
    pub info_hash: InfoHash,
    pub peer_id: [u8; 20],
    /// Listening port; omitted from the URL when zero
    pub port: u16,
}

/// Announce policy over a tiered tracker list.
pub struct DefaultAnnouncePolicy {
    params: AnnounceParams,
    announce_list: AnnounceList,
    runtime: Arc<BtRuntime>,
    peers: Arc<dyn PeerStorage>,
    stats: TransferStats,
    trackers: usize,
    tracker_num_try: usize,
    interval: Duration,
    min_interval: Duration,
    user_interval: Option<Duration>,
    prev_announce: Option<Instant>,
    tracker_id: Option<String>,
    num_want: u32,
}

impl DefaultAnnouncePolicy {
    pub fn new(
        params: AnnounceParams,
        announce_list: AnnounceList,
        runtime: Arc<BtRuntime>,
        peers: Arc<dyn PeerStorage>,
        config: &TrackerConfig,
    ) -> Self {
        Self {
            params,
            announce_list,
            runtime,
            peers,
            stats: TransferStats::default(),
            trackers: 0,
            tracker_num_try: 0,
            interval: config.default_announce_interval,
            min_interval: config.default_announce_interval,
            user_interval: config.user_announce_interval,
            prev_announce: None,
            tracker_id: None,
            num_want: config.num_want,
        }
    }

    /// Updates the counters sent with the next announce.
    pub fn set_transfer_stats(&mut self, stats: TransferStats) {
        self.stats = stats;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn tracker_id(&self) -> Option<&str> {
        self.tracker_id.as_deref()
    }

    pub fn trackers_in_flight(&self) -> usize {
        self.trackers
    }

    pub fn tracker_num_try(&self) -> usize {
        self.tracker_num_try
    }

    fn interval_elapsed(&self) -> bool {
        let wait = self.user_interval.unwrap_or(self.min_interval);
        self.prev_announce.is_none_or(|prev| prev.elapsed() >= wait)
    }

    fn is_stopped_announce_ready(&self) -> bool {
        self.trackers == 0
            && self.runtime.is_halt()
            && self.announce_list.count_stopped_allowed_tiers() > 0
    }

    fn is_completed_announce_ready(&self) -> bool {
        self.trackers == 0
            && self.stats.left == 0
            && self.announce_list.count_completed_allowed_tiers() > 0
    }

    fn is_default_announce_ready(&self) -> bool {
        self.trackers == 0 && self.interval_elapsed() && !self.announce_list.all_tiers_failed()
    }

    fn num_want(&self) -> u32 {
        if self.runtime.is_halt() || !self.runtime.less_than_min_peers() {
            0
        } else {
            self.num_want
        }
    }
}

impl AnnouncePolicy for DefaultAnnouncePolicy {
    fn is_ready(&self) -> bool {
        self.is_stopped_announce_ready()
            || self.is_completed_announce_ready()
            || self.is_default_announce_ready()
    }

    fn no_more_announce(&self) -> bool {
        self.trackers == 0
            && self.runtime.is_halt()
            && self.announce_list.count_stopped_allowed_tiers() == 0
    }

    fn announce_start(&mut self) {
        self.trackers += 1;
    }

    fn announce_success(&mut self) {
        self.trackers = 0;
        self.announce_list.announce_success();
    }

    fn announce_failure(&mut self) {
        self.trackers = 0;
        self.tracker_num_try += 1;
        self.announce_list.announce_failure();
    }

    fn all_failed(&self) -> bool {
        self.announce_list.all_tiers_failed()
    }

    fn reset(&mut self) {
        self.prev_announce = Some(Instant::now());
        self.announce_list.reset_tier();
        self.tracker_num_try = 0;
    }

    fn announce_url(&mut self) -> Result<String, TrackerError> {
        if self.is_stopped_announce_ready() {
            self.announce_list.move_to_stopped_allowed_tier();
            self.announce_list.set_event(AnnounceEvent::Stopped);
        } else if self.is_completed_announce_ready() {
            self.announce_list.move_to_completed_allowed_tier();
            self.announce_list.set_event(AnnounceEvent::Completed);
        } else if self.announce_list.all_tiers_failed() {
            return Err(TrackerError::NoTrackers);
        }

        let base = self.announce_list.current_url().ok_or(TrackerError::NoTrackers)?;
        let parsed = url::Url::parse(base)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TrackerError::ProtocolError {
                message: format!("Unsupported tracker scheme: {}", parsed.scheme()),
            });
        }

        let mut query = format!(
            "info_hash={}&peer_id={}&uploaded={}&downloaded={}&left={}&compact=1&numwant={}&no_peer_id=1",
            urlencoding::encode_binary(self.params.info_hash.as_bytes()),
            urlencoding::encode_binary(&self.params.peer_id),
            self.stats.uploaded,
            self.stats.downloaded,
            self.stats.left,
            self.num_want(),
        );
        if self.params.port > 0 {
            query.push_str(&format!("&port={}", self.params.port));
        }
        if let Some(event) = self
            .announce_list
            .current_event()
            .and_then(AnnounceEvent::as_query_value)
        {
            query.push_str(&format!("&event={event}"));
        }
        if let Some(tracker_id) = &self.tracker_id {
            query.push_str(&format!("&trackerid={}", urlencoding::encode(tracker_id)));
        }

        let separator = if base.contains('?') { '&' } else { '?' };
        Ok(format!("{base}{separator}{query}"))
    }

    fn process_announce_response(&mut self, response: &[u8]) -> Result<(), TrackerError> {
        let response = parse_announce_response(response)?;

        if let Some(warning) = &response.warning_message {
            tracing::warn!("Tracker warning: {}", warning);
        }
        if let Some(tracker_id) = response.tracker_id {
            self.tracker_id = Some(tracker_id);
        }
        if let Some(interval) = response.interval.filter(|&secs| secs > 0) {
            self.interval = Duration::from_secs(u64::from(interval));
        }
        if let Some(min_interval) = response.min_interval.filter(|&secs| secs > 0) {
            self.min_interval = Duration::from_secs(u64::from(min_interval));
        }
        if self.min_interval > self.interval {
            self.min_interval = self.interval;
        }

        let added = response
            .peers
            .iter()
            .filter(|addr| self.peers.add_peer(**addr))
            .count();
        tracing::debug!(
            "Announce response: interval {:?}, {} seeders, {} leechers, {} peers ({} new)",
            self.interval,
            response.complete,
            response.incomplete,
            response.peers.len(),
            added
        );

        Ok(())
    }
}
