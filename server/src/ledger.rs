//! Completed match results awaiting delivery
//!
//! Each result tracks which participants have fetched it and which have had
//! their statistics credited. Crediting is tracked per player so a backend
//! failure halfway through never causes a second increment on retry.

use crate::error::{MatchmakingError, Result};
use shared::{MatchResult, Outcome};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct PendingResult {
    pub result: MatchResult,
    /// Distinct participants that have fetched the result
    pub queried_by: HashSet<String>,
    /// Participants whose record already includes this match
    credited: HashSet<String>,
    pub created_at: Instant,
}

impl PendingResult {
    pub fn new(result: MatchResult, now: Instant) -> Self {
        Self {
            result,
            queried_by: HashSet::new(),
            credited: HashSet::new(),
            created_at: now,
        }
    }

    pub fn fully_queried(&self) -> bool {
        self.result
            .slots()
            .iter()
            .all(|slot| self.queried_by.contains(&slot.player_id))
    }

    pub fn has_queried(&self, player_id: &str) -> bool {
        self.queried_by.contains(player_id)
    }

    pub fn mark_credited(&mut self, player_id: &str) {
        self.credited.insert(player_id.to_string());
    }

    /// True once every participant has been credited.
    pub fn stats_applied(&self) -> bool {
        self.result
            .slots()
            .iter()
            .all(|slot| self.credited.contains(&slot.player_id))
    }

    /// Participants still owed a statistics update, with their outcome.
    pub fn uncredited(&self) -> Vec<(String, Outcome)> {
        self.result
            .slots()
            .iter()
            .filter(|slot| !self.credited.contains(&slot.player_id))
            .map(|slot| (slot.player_id.clone(), slot.outcome))
            .collect()
    }

    pub fn is_expired(&self, now: Instant, retention: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > retention
    }
}

#[derive(Debug, Default)]
pub struct ResultLedger {
    results: HashMap<String, PendingResult>,
}

impl ResultLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, result: MatchResult, now: Instant) {
        self.results
            .insert(result.match_id.clone(), PendingResult::new(result, now));
    }

    pub fn get(&self, match_id: &str) -> Option<&PendingResult> {
        self.results.get(match_id)
    }

    pub fn get_mut(&mut self, match_id: &str) -> Option<&mut PendingResult> {
        self.results.get_mut(match_id)
    }

    /// Records that `player_id` has fetched the result. Repeat fetches are
    /// absorbed by set semantics.
    pub fn record_query(&mut self, match_id: &str, player_id: &str) -> Result<&PendingResult> {
        let pending = self
            .results
            .get_mut(match_id)
            .ok_or_else(|| MatchmakingError::ResultNotFound(match_id.to_string()))?;

        if !pending.result.involves(player_id) {
            return Err(MatchmakingError::UnknownPlayerInMatch {
                match_id: match_id.to_string(),
                player_id: player_id.to_string(),
            });
        }

        pending.queried_by.insert(player_id.to_string());
        Ok(pending)
    }

    /// Match id of a result `player_id` took part in but has not fetched.
    pub fn unfetched_for(&self, player_id: &str) -> Option<String> {
        self.results
            .values()
            .find(|pending| pending.result.involves(player_id) && !pending.has_queried(player_id))
            .map(|pending| pending.result.match_id.clone())
    }

    /// Results ready to be settled: fetched by both players, or past retention.
    pub fn settleable(&self, now: Instant, retention: Duration) -> Vec<String> {
        let mut ready: Vec<&PendingResult> = self
            .results
            .values()
            .filter(|pending| pending.fully_queried() || pending.is_expired(now, retention))
            .collect();
        ready.sort_by_key(|pending| pending.created_at);
        ready
            .into_iter()
            .map(|pending| pending.result.match_id.clone())
            .collect()
    }

    pub fn remove(&mut self, match_id: &str) -> Option<PendingResult> {
        self.results.remove(match_id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Move;

    fn ledger_with_result(now: Instant) -> ResultLedger {
        let mut ledger = ResultLedger::new();
        ledger.insert(
            MatchResult::new("m1", ("p1", Move::Paper), ("p2", Move::Rock)),
            now,
        );
        ledger
    }

    #[test]
    fn test_record_query_set_semantics() {
        let mut ledger = ledger_with_result(Instant::now());

        ledger.record_query("m1", "p1").unwrap();
        let pending = ledger.record_query("m1", "p1").unwrap();
        assert_eq!(pending.queried_by.len(), 1);
        assert!(!pending.fully_queried());

        let pending = ledger.record_query("m1", "p2").unwrap();
        assert!(pending.fully_queried());
    }

    #[test]
    fn test_record_query_errors() {
        let mut ledger = ledger_with_result(Instant::now());

        let err = ledger.record_query("missing", "p1").unwrap_err();
        assert!(matches!(err, MatchmakingError::ResultNotFound(_)));

        let err = ledger.record_query("m1", "p3").unwrap_err();
        assert!(matches!(err, MatchmakingError::UnknownPlayerInMatch { .. }));
        assert!(ledger.get("m1").unwrap().queried_by.is_empty());
    }

    #[test]
    fn test_crediting_is_per_player() {
        let mut ledger = ledger_with_result(Instant::now());
        let pending = ledger.get_mut("m1").unwrap();

        assert_eq!(pending.uncredited().len(), 2);
        pending.mark_credited("p1");
        pending.mark_credited("p1");
        assert!(!pending.stats_applied());
        assert_eq!(pending.uncredited(), vec![("p2".to_string(), Outcome::Loss)]);

        pending.mark_credited("p2");
        assert!(pending.stats_applied());
        assert!(pending.uncredited().is_empty());
    }

    #[test]
    fn test_settleable_by_queries_or_expiry() {
        let start = Instant::now();
        let retention = Duration::from_secs(60);
        let mut ledger = ledger_with_result(start);
        ledger.insert(
            MatchResult::new("m2", ("p3", Move::Rock), ("p4", Move::Rock)),
            start,
        );

        assert!(ledger.settleable(start, retention).is_empty());

        ledger.record_query("m2", "p3").unwrap();
        ledger.record_query("m2", "p4").unwrap();
        assert_eq!(ledger.settleable(start, retention), vec!["m2".to_string()]);

        let later = start + Duration::from_secs(61);
        let mut ready = ledger.settleable(later, retention);
        ready.sort();
        assert_eq!(ready, vec!["m1".to_string(), "m2".to_string()]);
    }

    #[test]
    fn test_unfetched_for() {
        let mut ledger = ledger_with_result(Instant::now());

        assert_eq!(ledger.unfetched_for("p1"), Some("m1".to_string()));
        ledger.record_query("m1", "p1").unwrap();
        assert_eq!(ledger.unfetched_for("p1"), None);
        assert_eq!(ledger.unfetched_for("p2"), Some("m1".to_string()));
        assert_eq!(ledger.unfetched_for("p9"), None);
    }
}
