//! The matchmaking service: one ownership boundary around all live state
//!
//! The player directory, queue, match registry and result ledger are only
//! reachable through [`MatchmakingService`]. Every operation makes its state
//! change under the single state lock, which makes pairing, move resolution
//! and statistics application atomic with respect to each other.
//!
//! In-memory state is authoritative. The document store receives mirrors:
//! - Announce must persist the player document before any state changes.
//!   A store failure aborts the announce and leaves memory untouched.
//! - Statistics updates must persist before a player is marked credited.
//!   A failure leaves the player uncredited so a later fetch or sweep retries.
//! - Everything else (status, liveness, match archive) is best-effort. These
//!   writes are collected in an [`Outbox`] and sent once the lock is released,
//!   and failures are only logged.
//!
//! Every store call is bounded by [`ServiceConfig::store_timeout`]; a call that
//! runs out of time fails like an unavailable backend.

use crate::directory::{record_document, PlayerDirectory, PlayerProfile};
use crate::error::{MatchmakingError, Result};
use crate::ledger::ResultLedger;
use crate::queue::{MatchQueue, QueueEntry};
use crate::registry::{MatchRegistry, MoveOutcome};
use crate::store::{Document, DocumentStore, StoreError, MATCHES, PLAYERS};
use chrono::Utc;
use log::{error, info, warn};
use serde_json::Value;
use shared::{
    MatchResult, Move, PlayerStatus, PlayerView, RESULT_RETENTION_SECS, STORE_TIMEOUT_MS,
    WATCHDOG_INTERVAL_MS,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Sweep period, and the silence after which a player counts as stale
    pub watchdog_interval: Duration,
    /// How long a result waits for its second fetch before it is reclaimed
    pub result_retention: Duration,
    /// Upper bound on any single document store call
    pub store_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            watchdog_interval: Duration::from_millis(WATCHDOG_INTERVAL_MS),
            result_retention: Duration::from_secs(RESULT_RETENTION_SECS),
            store_timeout: Duration::from_millis(STORE_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnounceOutcome {
    /// Player is waiting in the queue (or was just paired off it)
    Queued { player_id: String },
    /// Player reconnected while their match was still live
    Reattached { player_id: String, match_id: String },
}

impl AnnounceOutcome {
    pub fn player_id(&self) -> &str {
        match self {
            AnnounceOutcome::Queued { player_id } => player_id,
            AnnounceOutcome::Reattached { player_id, .. } => player_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPoll {
    Matched(String),
    NoMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStats {
    pub queued: usize,
    pub active_matches: usize,
    pub pending_results: usize,
    pub players: usize,
}

#[derive(Debug, Default)]
pub(crate) struct MatchmakingState {
    pub(crate) directory: PlayerDirectory,
    pub(crate) queue: MatchQueue,
    pub(crate) registry: MatchRegistry,
    pub(crate) ledger: ResultLedger,
}

/// Best-effort writes gathered under the state lock and sent after it is
/// released, in the order they were recorded.
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    writes: Vec<(&'static str, String, Document)>,
}

impl Outbox {
    pub(crate) fn push(&mut self, collection: &'static str, key: &str, document: Document) {
        self.writes.push((collection, key.to_string(), document));
    }

    /// Queues the player's current status and liveness.
    pub(crate) fn player(&mut self, directory: &PlayerDirectory, player_id: &str) {
        if let Some(profile) = directory.get(player_id) {
            self.push(PLAYERS, player_id, profile.liveness_document());
        }
    }
}

pub struct MatchmakingService {
    pub(crate) state: Mutex<MatchmakingState>,
    store: Arc<dyn DocumentStore>,
    config: ServiceConfig,
}

impl MatchmakingService {
    pub fn new(store: Arc<dyn DocumentStore>, config: ServiceConfig) -> Self {
        Self {
            state: Mutex::new(MatchmakingState::default()),
            store,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Registers a player (creating an identifier when none is supplied) and
    /// puts them in the queue, pairing as many waiting players as possible.
    ///
    /// A returning player whose match is still live is reattached instead of
    /// queued. A returning player who never fetched their last result
    /// acknowledges it by announcing again.
    pub async fn announce(
        &self,
        display_name: &str,
        existing_player_id: Option<&str>,
    ) -> Result<AnnounceOutcome> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(MatchmakingError::MissingField("username"));
        }

        let existing = existing_player_id
            .map(str::trim)
            .filter(|id| !id.is_empty());
        let player_id = existing
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let now = Instant::now();
        let mut outbox = Outbox::default();
        let mut state = self.state.lock().await;

        let known = state.directory.get(&player_id).cloned();
        let mut profile = match known {
            Some(profile) => profile,
            None if existing.is_some() => self.hydrate(&player_id, display_name, now).await?,
            None => PlayerProfile::new(&player_id, display_name, now),
        };
        profile.display_name = display_name.to_string();
        profile.touch(now);

        let live_match = state
            .registry
            .find_by_player(&player_id)
            .map(|current| current.id.clone());
        let unfetched = match live_match {
            Some(_) => None,
            None => state.ledger.unfetched_for(&player_id),
        };

        profile.status = match live_match {
            Some(_) => PlayerStatus::Playing,
            None => PlayerStatus::Queued,
        };

        if let Err(e) = self
            .store_set(PLAYERS, &player_id, profile.to_document(), true)
            .await
        {
            error!("Error storing player data for {}: {}", player_id, e);
            return Err(e.into());
        }

        state.directory.insert(profile);

        if let Some(match_id) = live_match {
            info!("{} rejoined existing match ({})", player_id, match_id);
            return Ok(AnnounceOutcome::Reattached {
                player_id,
                match_id,
            });
        }

        if let Some(match_id) = unfetched {
            info!("{} moved on from unfetched result ({})", player_id, match_id);
            let ready = state
                .ledger
                .record_query(&match_id, &player_id)
                .map(|pending| pending.fully_queried())
                .unwrap_or(false);
            if ready {
                self.settle_result(&mut state, &match_id).await;
            }
        }

        if state
            .queue
            .enqueue(QueueEntry::new(player_id.clone(), display_name))
        {
            if let Some(position) = state.queue.position(&player_id) {
                info!("queued up {} ({}), {} ahead", display_name, player_id, position);
            }
        }

        Self::pair_waiting(&mut state, &mut outbox, now);

        drop(state);
        self.flush(outbox).await;

        Ok(AnnounceOutcome::Queued { player_id })
    }

    /// Loads a returning player's durable fields from the store. A document
    /// that cannot be parsed is replaced by a fresh profile.
    async fn hydrate(&self, player_id: &str, display_name: &str, now: Instant) -> Result<PlayerProfile> {
        match self.store_get(PLAYERS, player_id).await {
            Ok(Some(document)) => match PlayerProfile::from_document(player_id, &document, now) {
                Ok(profile) => {
                    info!("{} exists in the store ({})", display_name, player_id);
                    Ok(profile)
                }
                Err(e) => {
                    warn!("Ignoring stored data for {}, starting fresh: {}", player_id, e);
                    Ok(PlayerProfile::new(player_id, display_name, now))
                }
            },
            Ok(None) => Ok(PlayerProfile::new(player_id, display_name, now)),
            Err(e) => {
                error!("Error retrieving player data for {}: {}", player_id, e);
                Err(e.into())
            }
        }
    }

    /// Non-blocking check for the player's match. Refreshes liveness.
    pub async fn poll_match(&self, player_id: &str) -> Result<MatchPoll> {
        let now = Instant::now();
        let mut outbox = Outbox::default();
        let mut state = self.state.lock().await;

        if !state.directory.touch(player_id, now) {
            return Ok(MatchPoll::NoMatch);
        }
        outbox.player(&state.directory, player_id);

        let poll = match state.registry.find_by_player(player_id) {
            Some(current) => MatchPoll::Matched(current.id.clone()),
            None => MatchPoll::NoMatch,
        };

        drop(state);
        self.flush(outbox).await;
        Ok(poll)
    }

    /// Records a move. The move is validated before any state is touched.
    pub async fn submit_move(
        &self,
        player_id: &str,
        match_id: &str,
        choice: &str,
    ) -> Result<MoveOutcome> {
        if player_id.is_empty() {
            return Err(MatchmakingError::MissingField("uuid"));
        }
        if match_id.is_empty() {
            return Err(MatchmakingError::MissingField("matchId"));
        }
        let choice: Move = choice.parse()?;

        let now = Instant::now();
        let mut outbox = Outbox::default();
        let mut state = self.state.lock().await;

        if state.directory.touch(player_id, now) {
            outbox.player(&state.directory, player_id);
        }

        let outcome = match state.registry.submit_move(match_id, player_id, choice) {
            Ok(outcome) => outcome,
            Err(e) => {
                drop(state);
                self.flush(outbox).await;
                return Err(e);
            }
        };

        if let MoveOutcome::Resolved(result) = &outcome {
            state.ledger.insert(result.clone(), now);
            for slot in result.slots() {
                state
                    .directory
                    .set_status(&slot.player_id, PlayerStatus::AwaitingResult);
                outbox.player(&state.directory, &slot.player_id);
            }
            outbox.push(MATCHES, match_id, resolved_match_document(result));
        }

        drop(state);
        self.flush(outbox).await;
        Ok(outcome)
    }

    /// Returns a result to one of its participants.
    ///
    /// Once both participants have fetched it, statistics are applied and the
    /// result is retired. Later fetches get `ResultNotFound`.
    pub async fn fetch_result(&self, match_id: &str, player_id: &str) -> Result<MatchResult> {
        if match_id.is_empty() {
            return Err(MatchmakingError::MissingField("matchId"));
        }
        if player_id.is_empty() {
            return Err(MatchmakingError::MissingField("uuid"));
        }

        let now = Instant::now();
        let mut outbox = Outbox::default();
        let mut state = self.state.lock().await;

        state.directory.touch(player_id, now);

        let (result, ready) = match state.ledger.record_query(match_id, player_id) {
            Ok(pending) => (pending.result.clone(), pending.fully_queried()),
            Err(e) => {
                outbox.player(&state.directory, player_id);
                drop(state);
                self.flush(outbox).await;
                return Err(e);
            }
        };

        if state.directory.status(player_id) == Some(PlayerStatus::AwaitingResult) {
            state.directory.set_status(player_id, PlayerStatus::Idle);
        }
        outbox.player(&state.directory, player_id);

        if ready {
            self.settle_result(&mut state, match_id).await;
        }

        drop(state);
        self.flush(outbox).await;
        Ok(result)
    }

    pub async fn player(&self, player_id: &str) -> Option<PlayerView> {
        let state = self.state.lock().await;
        state.directory.get(player_id).map(PlayerProfile::view)
    }

    pub async fn stats(&self) -> ServiceStats {
        let state = self.state.lock().await;
        ServiceStats {
            queued: state.queue.len(),
            active_matches: state.registry.len(),
            pending_results: state.ledger.len(),
            players: state.directory.len(),
        }
    }

    /// Pairs the two oldest queue entries until fewer than two remain.
    fn pair_waiting(state: &mut MatchmakingState, outbox: &mut Outbox, now: Instant) {
        while let Some((first, second)) = state.queue.dequeue_front_pair() {
            let match_id = state.registry.create(first, second, now);

            let Some(created) = state.registry.get(&match_id) else {
                continue;
            };
            let players = [
                created.player1.player_id.clone(),
                created.player2.player_id.clone(),
            ];
            let document = created_match_document(&match_id, &players);

            for player_id in &players {
                state.directory.set_status(player_id, PlayerStatus::Playing);
                outbox.player(&state.directory, player_id);
            }
            outbox.push(MATCHES, &match_id, document);
        }
    }

    /// Credits every participant not yet credited for `match_id` and retires
    /// the result once all are. Returns true if the result was retired.
    ///
    /// The statistics write stays inside the critical section so a player is
    /// only marked credited once the store has the new record.
    pub(crate) async fn settle_result(&self, state: &mut MatchmakingState, match_id: &str) -> bool {
        let owed = match state.ledger.get(match_id) {
            Some(pending) => pending.uncredited(),
            None => return false,
        };

        for (player_id, outcome) in owed {
            let Some(profile) = state.directory.get(&player_id) else {
                warn!("No profile for {} in match {}, skipping statistics", player_id, match_id);
                if let Some(pending) = state.ledger.get_mut(match_id) {
                    pending.mark_credited(&player_id);
                }
                continue;
            };

            let mut record = profile.record;
            record.apply(outcome);

            match self
                .store_set(PLAYERS, &player_id, record_document(&record), true)
                .await
            {
                Ok(()) => {
                    if let Some(profile) = state.directory.get_mut(&player_id) {
                        profile.record = record;
                    }
                    if let Some(pending) = state.ledger.get_mut(match_id) {
                        pending.mark_credited(&player_id);
                    }
                    info!("Updated player statistics for {}: {}", player_id, record);
                }
                Err(e) => {
                    warn!(
                        "Statistics for {} in match {} not applied, will retry: {}",
                        player_id, match_id, e
                    );
                }
            }
        }

        let applied = state
            .ledger
            .get(match_id)
            .map_or(false, |pending| pending.stats_applied());
        if applied {
            state.ledger.remove(match_id);
            info!("Match concluded and results deleted for match ID: {}", match_id);
        }
        applied
    }

    /// Sends best-effort writes. Must be called without the state lock held.
    /// Failures are logged and otherwise ignored.
    pub(crate) async fn flush(&self, outbox: Outbox) {
        for (collection, key, document) in outbox.writes {
            if let Err(e) = self.store_set(collection, &key, document, true).await {
                warn!("Error sending data to {}/{}: {}", collection, key, e);
            }
        }
    }

    async fn store_get(&self, collection: &str, key: &str) -> std::result::Result<Option<Document>, StoreError> {
        match timeout(self.config.store_timeout, self.store.get(collection, key)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "read of {}/{} timed out",
                collection, key
            ))),
        }
    }

    async fn store_set(
        &self,
        collection: &str,
        key: &str,
        document: Document,
        merge: bool,
    ) -> std::result::Result<(), StoreError> {
        match timeout(
            self.config.store_timeout,
            self.store.set(collection, key, document, merge),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "write of {}/{} timed out",
                collection, key
            ))),
        }
    }
}

fn created_match_document(match_id: &str, players: &[String; 2]) -> Document {
    let mut document = Document::new();
    document.insert("matchId".into(), Value::from(match_id));
    document.insert("player1Id".into(), Value::from(players[0].clone()));
    document.insert("player2Id".into(), Value::from(players[1].clone()));
    document.insert("status".into(), Value::from("playing"));
    document.insert("createdAt".into(), Value::from(Utc::now().to_rfc3339()));
    document
}

fn resolved_match_document(result: &MatchResult) -> Document {
    let mut document = Document::new();
    document.insert("status".into(), Value::from("resolved"));
    document.insert("player1Choice".into(), Value::from(result.player1.choice.as_str()));
    document.insert("player2Choice".into(), Value::from(result.player2.choice.as_str()));
    for (field, outcome) in [
        ("player1Outcome", result.player1.outcome),
        ("player2Outcome", result.player2.outcome),
    ] {
        if let Ok(value) = serde_json::to_value(outcome) {
            document.insert(field.into(), value);
        }
    }
    if let Ok(value) = serde_json::to_value(result.winner) {
        document.insert("winner".into(), value);
    }
    document.insert("resolvedAt".into(), Value::from(Utc::now().to_rfc3339()));
    document
}

pub(crate) fn abandoned_match_document() -> Document {
    let mut document = Document::new();
    document.insert("status".into(), Value::from("abandoned"));
    document.insert("abandonedAt".into(), Value::from(Utc::now().to_rfc3339()));
    document
}
