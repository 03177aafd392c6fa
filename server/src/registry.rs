//! Active matches and move resolution
//!
//! A match lives here from the moment two queued players are paired until
//! both slots carry a move. The second move resolves the match and removes
//! it in the same call, so callers never observe a resolved match that is
//! still registered.

use crate::error::{MatchmakingError, Result};
use crate::queue::QueueEntry;
use log::{debug, info};
use shared::{MatchResult, Move};
use std::collections::HashMap;
use tokio::time::Instant;
use uuid::Uuid;

/// One of the two player positions in a match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub player_id: String,
    pub display_name: String,
    pub choice: Option<Move>,
}

impl From<QueueEntry> for Slot {
    fn from(entry: QueueEntry) -> Self {
        Self {
            player_id: entry.player_id,
            display_name: entry.display_name,
            choice: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Match {
    pub id: String,
    pub player1: Slot,
    pub player2: Slot,
    pub created_at: Instant,
}

impl Match {
    pub fn involves(&self, player_id: &str) -> bool {
        self.player1.player_id == player_id || self.player2.player_id == player_id
    }

    /// The slot opposite `player_id`, if they are in this match.
    pub fn opponent_of(&self, player_id: &str) -> Option<&Slot> {
        if self.player1.player_id == player_id {
            Some(&self.player2)
        } else if self.player2.player_id == player_id {
            Some(&self.player1)
        } else {
            None
        }
    }

    fn slot_mut(&mut self, player_id: &str) -> Option<&mut Slot> {
        if self.player1.player_id == player_id {
            Some(&mut self.player1)
        } else if self.player2.player_id == player_id {
            Some(&mut self.player2)
        } else {
            None
        }
    }

    /// The result, once both slots hold a move.
    fn resolution(&self) -> Option<MatchResult> {
        match (self.player1.choice, self.player2.choice) {
            (Some(choice1), Some(choice2)) => Some(MatchResult::new(
                self.id.clone(),
                (self.player1.player_id.clone(), choice1),
                (self.player2.player_id.clone(), choice2),
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The move is on record and the opponent has not moved yet. A second
    /// submission from the same player is ignored and reports
    /// `already_recorded`.
    Recorded { already_recorded: bool },
    /// Both moves are in; the match has been removed from the registry.
    Resolved(MatchResult),
}

#[derive(Debug, Default)]
pub struct MatchRegistry {
    matches: HashMap<String, Match>,
    /// player id -> match id
    by_player: HashMap<String, String>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new match for two dequeued players and returns its id.
    pub fn create(&mut self, player1: QueueEntry, player2: QueueEntry, now: Instant) -> String {
        let id = Uuid::new_v4().to_string();
        let new_match = Match {
            id: id.clone(),
            player1: player1.into(),
            player2: player2.into(),
            created_at: now,
        };

        self.by_player
            .insert(new_match.player1.player_id.clone(), id.clone());
        self.by_player
            .insert(new_match.player2.player_id.clone(), id.clone());

        info!(
            "Match found for {} and {}. Match ID: {}",
            new_match.player1.player_id, new_match.player2.player_id, id
        );
        self.matches.insert(id.clone(), new_match);
        id
    }

    pub fn get(&self, match_id: &str) -> Option<&Match> {
        self.matches.get(match_id)
    }

    pub fn find_by_player(&self, player_id: &str) -> Option<&Match> {
        self.by_player
            .get(player_id)
            .and_then(|match_id| self.matches.get(match_id))
    }

    pub fn remove(&mut self, match_id: &str) -> Option<Match> {
        let removed = self.matches.remove(match_id)?;
        self.by_player.remove(&removed.player1.player_id);
        self.by_player.remove(&removed.player2.player_id);
        Some(removed)
    }

    pub fn remove_by_player(&mut self, player_id: &str) -> Option<Match> {
        let match_id = self.by_player.get(player_id)?.clone();
        self.remove(&match_id)
    }

    /// Records `choice` for `player_id` and resolves the match when both
    /// moves are present.
    pub fn submit_move(
        &mut self,
        match_id: &str,
        player_id: &str,
        choice: Move,
    ) -> Result<MoveOutcome> {
        let current = self
            .matches
            .get_mut(match_id)
            .ok_or_else(|| MatchmakingError::MatchNotFound(match_id.to_string()))?;

        let slot = current
            .slot_mut(player_id)
            .ok_or_else(|| MatchmakingError::UnknownPlayerInMatch {
                match_id: match_id.to_string(),
                player_id: player_id.to_string(),
            })?;

        if let Some(recorded) = slot.choice {
            if recorded != choice {
                debug!(
                    "Ignoring {} from {} in match {}, {} already recorded",
                    choice, player_id, match_id, recorded
                );
            }
            return Ok(MoveOutcome::Recorded {
                already_recorded: true,
            });
        }

        slot.choice = Some(choice);
        debug!("{} chose {} in match {}", player_id, choice, match_id);

        match current.resolution() {
            Some(result) => {
                self.remove(match_id);
                info!(
                    "Match {} resolved: {} vs {}",
                    match_id, result.player1.choice, result.player2.choice
                );
                Ok(MoveOutcome::Resolved(result))
            }
            None => Ok(MoveOutcome::Recorded {
                already_recorded: false,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
