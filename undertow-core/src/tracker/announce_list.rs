//! Tiered tracker list (BEP 12) with per-tier announce events

use std::collections::VecDeque;

/// Event a tier will send with its next announce.
///
/// `Downloading`, `Seeding` and `Halted` send no event parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceEvent {
    Started,
    Downloading,
    Stopped,
    Completed,
    Seeding,
    Halted,
}

impl AnnounceEvent {
    /// Value of the `event` query parameter, if any.
    pub fn as_query_value(self) -> Option<&'static str> {
        match self {
            AnnounceEvent::Started => Some("started"),
            AnnounceEvent::Stopped => Some("stopped"),
            AnnounceEvent::Completed => Some("completed"),
            AnnounceEvent::Downloading | AnnounceEvent::Seeding | AnnounceEvent::Halted => None,
        }
    }

    /// Event after a successful announce.
    fn next(self) -> Self {
        match self {
            AnnounceEvent::Started => AnnounceEvent::Downloading,
            AnnounceEvent::Stopped => AnnounceEvent::Halted,
            AnnounceEvent::Completed => AnnounceEvent::Seeding,
            other => other,
        }
    }

    /// Event once every URL of a tier failed: a pending `stopped` or
    /// `completed` is given up.
    fn next_if_after_started(self) -> Self {
        match self {
            AnnounceEvent::Stopped => AnnounceEvent::Halted,
            AnnounceEvent::Completed => AnnounceEvent::Seeding,
            other => other,
        }
    }

    /// Tiers that have announced `started` still owe a `stopped`.
    fn allows_stopped(self) -> bool {
        matches!(
            self,
            AnnounceEvent::Downloading
                | AnnounceEvent::Stopped
                | AnnounceEvent::Completed
                | AnnounceEvent::Seeding
        )
    }

    fn allows_completed(self) -> bool {
        matches!(self, AnnounceEvent::Downloading | AnnounceEvent::Completed)
    }
}

#[derive(Debug, Clone)]
struct AnnounceTier {
    event: AnnounceEvent,
    urls: VecDeque<String>,
}

/// Ordered tiers of tracker URLs and a cursor over them.
///
/// Failures advance the cursor through the current tier and then to the
/// next one; success promotes the working URL to the front of its tier and
/// returns the cursor to the first tier.
#[derive(Debug, Clone)]
pub struct AnnounceList {
    tiers: Vec<AnnounceTier>,
    tier: usize,
    url: usize,
}

impl AnnounceList {
    /// Builds the list from tiers of URLs, dropping empty tiers.
    pub fn new(tiers: Vec<Vec<String>>) -> Self {
        let tiers = tiers
            .into_iter()
            .filter(|urls| !urls.is_empty())
            .map(|urls| AnnounceTier {
                event: AnnounceEvent::Started,
                urls: urls.into(),
            })
            .collect();
        Self {
            tiers,
            tier: 0,
            url: 0,
        }
    }

    /// Single tier holding one URL.
    pub fn single(url: impl Into<String>) -> Self {
        Self::new(vec![vec![url.into()]])
    }

    pub fn count_tiers(&self) -> usize {
        self.tiers.len()
    }

    /// URL under the cursor, `None` once every tier failed.
    pub fn current_url(&self) -> Option<&str> {
        self.tiers
            .get(self.tier)
            .and_then(|tier| tier.urls.get(self.url))
            .map(String::as_str)
    }

    /// Event of the tier under the cursor.
    pub fn current_event(&self) -> Option<AnnounceEvent> {
        self.tiers.get(self.tier).map(|tier| tier.event)
    }

    /// Sets the event of the tier under the cursor.
    pub fn set_event(&mut self, event: AnnounceEvent) {
        if let Some(tier) = self.tiers.get_mut(self.tier) {
            tier.event = event;
        }
    }

    pub fn announce_success(&mut self) {
        let Some(tier) = self.tiers.get_mut(self.tier) else {
            return;
        };
        tier.event = tier.event.next();
        if let Some(url) = tier.urls.remove(self.url) {
            tier.urls.push_front(url);
        }
        self.reset_tier();
    }

    /// Advances past the URL under the cursor. Leaving a tier drops the
    /// `stopped` or `completed` event it still had to send.
    pub fn announce_failure(&mut self) {
        let Some(tier) = self.tiers.get_mut(self.tier) else {
            return;
        };
        self.url += 1;
        if self.url >= tier.urls.len() {
            tier.event = tier.event.next_if_after_started();
            self.tier += 1;
            self.url = 0;
        }
    }

    pub fn all_tiers_failed(&self) -> bool {
        self.tier >= self.tiers.len()
    }

    /// Returns the cursor to the first URL of the first tier.
    pub fn reset_tier(&mut self) {
        self.tier = 0;
        self.url = 0;
    }

    pub fn count_stopped_allowed_tiers(&self) -> usize {
        self.tiers
            .iter()
            .filter(|tier| tier.event.allows_stopped())
            .count()
    }

    pub fn count_completed_allowed_tiers(&self) -> usize {
        self.tiers
            .iter()
            .filter(|tier| tier.event.allows_completed())
            .count()
    }

    /// Moves the cursor to the first tier, from the current one on, that
    /// still owes a `stopped` announce.
    pub fn move_to_stopped_allowed_tier(&mut self) {
        self.move_to_tier(AnnounceEvent::allows_stopped);
    }

    pub fn move_to_completed_allowed_tier(&mut self) {
        self.move_to_tier(AnnounceEvent::allows_completed);
    }

    fn move_to_tier(&mut self, allowed: fn(AnnounceEvent) -> bool) {
        let start = if self.all_tiers_failed() { 0 } else { self.tier };
        let found = (start..self.tiers.len())
            .chain(0..start)
            .find(|&index| allowed(self.tiers[index].event));
        if let Some(index) = found {
            if index != self.tier {
                self.url = 0;
            }
            self.tier = index;
        }
    }
}
