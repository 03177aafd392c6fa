//! Player profiles and liveness tracking for the matchmaking server
//!
//! This module owns everything the server knows about a player outside of a
//! particular match:
//! - Display name and win/loss/tie record
//! - Lifecycle status (idle, queued, playing, awaiting a result)
//! - Last time the player polled, used by the watchdog to detect disconnects
//!
//! Players are never removed. A player that finishes a match or is reclaimed
//! by the watchdog simply returns to `Idle`.

use crate::store::{Document, StoreError, PLAYERS};
use chrono::{DateTime, Utc};
use serde_json::Value;
use shared::{PlayerStatus, PlayerView, Record};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// A known player and their current lifecycle state
#[derive(Debug, Clone)]
pub struct PlayerProfile {
    /// Opaque identifier handed to the client on first announce
    pub id: String,
    pub display_name: String,
    pub record: Record,
    pub status: PlayerStatus,
    /// Monotonic time of the last poll, used for staleness
    pub last_seen: Instant,
    /// Wall-clock time of the last poll, used for persistence
    pub last_seen_at: DateTime<Utc>,
}

impl PlayerProfile {
    /// Creates a fresh idle profile with an empty record.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, now: Instant) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            record: Record::default(),
            status: PlayerStatus::Idle,
            last_seen: now,
            last_seen_at: Utc::now(),
        }
    }

    /// Rebuilds a profile from its persisted document.
    ///
    /// Only the durable fields (display name and record) are taken from the
    /// document. Status always restarts at `Idle` since the live state
    /// machine is never restored from the store.
    pub fn from_document(id: &str, document: &Document, now: Instant) -> Result<Self, StoreError> {
        let malformed = |reason: &str| StoreError::Malformed {
            collection: PLAYERS.to_string(),
            key: id.to_string(),
            reason: reason.to_string(),
        };

        let display_name = document
            .get("displayName")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("missing displayName"))?;

        let record = match document.get("record").and_then(Value::as_str) {
            Some(raw) => raw
                .parse::<Record>()
                .map_err(|e| malformed(&e.to_string()))?,
            None => Record::default(),
        };

        let mut profile = Self::new(id, display_name, now);
        profile.record = record;
        Ok(profile)
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_seen = now;
        self.last_seen_at = Utc::now();
    }

    /// True if the player has not polled within `timeout` of `now`.
    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }

    /// Full persisted shape of the profile.
    pub fn to_document(&self) -> Document {
        let mut document = self.liveness_document();
        document.insert("displayName".into(), Value::from(self.display_name.clone()));
        document.insert("record".into(), Value::from(self.record.to_string()));
        document
    }

    /// Partial document carrying only status and liveness, for merge writes.
    pub fn liveness_document(&self) -> Document {
        let mut document = Document::new();
        document.insert("status".into(), Value::from(self.status.as_str()));
        document.insert("lastSeen".into(), Value::from(self.last_seen_at.to_rfc3339()));
        document
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            player_id: self.id.clone(),
            display_name: self.display_name.clone(),
            record: self.record,
            status: self.status,
        }
    }
}

/// Record field update for a merge write after statistics change.
pub fn record_document(record: &Record) -> Document {
    let mut document = Document::new();
    document.insert("record".into(), Value::from(record.to_string()));
    document
}

/// All players the server has seen, keyed by identifier
#[derive(Debug, Default)]
pub struct PlayerDirectory {
    players: HashMap<String, PlayerProfile>,
}

impl PlayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, player_id: &str) -> Option<&PlayerProfile> {
        self.players.get(player_id)
    }

    pub fn get_mut(&mut self, player_id: &str) -> Option<&mut PlayerProfile> {
        self.players.get_mut(player_id)
    }

    /// Inserts or replaces a profile.
    pub fn insert(&mut self, profile: PlayerProfile) {
        self.players.insert(profile.id.clone(), profile);
    }

    /// Refreshes a player's liveness. Returns false for unknown players.
    pub fn touch(&mut self, player_id: &str, now: Instant) -> bool {
        match self.players.get_mut(player_id) {
            Some(profile) => {
                profile.touch(now);
                true
            }
            None => false,
        }
    }

    /// Sets a player's status, returning the previous one.
    pub fn set_status(&mut self, player_id: &str, status: PlayerStatus) -> Option<PlayerStatus> {
        self.players
            .get_mut(player_id)
            .map(|profile| std::mem::replace(&mut profile.status, status))
    }

    pub fn status(&self, player_id: &str) -> Option<PlayerStatus> {
        self.players.get(player_id).map(|profile| profile.status)
    }

    /// Identifiers of non-idle players that have not polled within `timeout`.
    pub fn stale_players(&self, now: Instant, timeout: Duration) -> Vec<String> {
        let mut stale: Vec<&PlayerProfile> = self
            .players
            .values()
            .filter(|profile| profile.status != PlayerStatus::Idle)
            .filter(|profile| profile.is_stale(now, timeout))
            .collect();

        // Oldest first so sweeps handle players in the order they went quiet
        stale.sort_by_key(|profile| profile.last_seen);
        stale.into_iter().map(|profile| profile.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
