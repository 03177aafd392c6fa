use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const WATCHDOG_INTERVAL_MS: u64 = 2_000;
pub const RESULT_RETENTION_SECS: u64 = 60;
pub const STORE_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid move '{0}', expected rock, paper or scissors")]
pub struct ParseMoveError(pub String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid record '{0}', expected wins/losses/ties")]
pub struct ParseRecordError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

impl Move {
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    pub fn as_str(self) -> &'static str {
        match self {
            Move::Rock => "rock",
            Move::Paper => "paper",
            Move::Scissors => "scissors",
        }
    }

    /// The move this one defeats.
    pub fn beats(self) -> Move {
        match self {
            Move::Rock => Move::Scissors,
            Move::Scissors => Move::Paper,
            Move::Paper => Move::Rock,
        }
    }

    /// Outcome for the player throwing `self` against `other`.
    pub fn against(self, other: Move) -> Outcome {
        if self == other {
            Outcome::Draw
        } else if self.beats() == other {
            Outcome::Win
        } else {
            Outcome::Loss
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Move {
    type Err = ParseMoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rock" => Ok(Move::Rock),
            "paper" => Ok(Move::Paper),
            "scissors" => Ok(Move::Scissors),
            _ => Err(ParseMoveError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

/// Tagged form of a match outcome, seen from the match rather than a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Player1,
    Player2,
    Tie,
}

/// Resolves a pair of moves into per-slot outcomes and the tagged winner.
pub fn resolve(player1: Move, player2: Move) -> (Outcome, Outcome, Winner) {
    match player1.against(player2) {
        Outcome::Win => (Outcome::Win, Outcome::Loss, Winner::Player1),
        Outcome::Loss => (Outcome::Loss, Outcome::Win, Winner::Player2),
        Outcome::Draw => (Outcome::Draw, Outcome::Draw, Winner::Tie),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Idle,
    Queued,
    Playing,
    AwaitingResult,
}

impl PlayerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerStatus::Idle => "idle",
            PlayerStatus::Queued => "queued",
            PlayerStatus::Playing => "playing",
            PlayerStatus::AwaitingResult => "awaiting_result",
        }
    }
}

/// Win/loss/tie record, persisted as `"wins/losses/ties"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

impl Record {
    pub fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Win => self.wins = self.wins.saturating_add(1),
            Outcome::Loss => self.losses = self.losses.saturating_add(1),
            Outcome::Draw => self.ties = self.ties.saturating_add(1),
        }
    }

    pub fn games_played(&self) -> u32 {
        self.wins
            .saturating_add(self.losses)
            .saturating_add(self.ties)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.wins, self.losses, self.ties)
    }
}

impl FromStr for Record {
    type Err = ParseRecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        if parts.len() != 3 {
            return Err(ParseRecordError(s.to_string()));
        }

        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| ParseRecordError(s.to_string()))
        };

        Ok(Record {
            wins: parse(parts[0])?,
            losses: parse(parts[1])?,
            ties: parse(parts[2])?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotResult {
    pub player_id: String,
    pub choice: Move,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub match_id: String,
    pub player1: SlotResult,
    pub player2: SlotResult,
    pub winner: Winner,
}

impl MatchResult {
    pub fn new(
        match_id: impl Into<String>,
        player1: (impl Into<String>, Move),
        player2: (impl Into<String>, Move),
    ) -> Self {
        let (outcome1, outcome2, winner) = resolve(player1.1, player2.1);
        Self {
            match_id: match_id.into(),
            player1: SlotResult {
                player_id: player1.0.into(),
                choice: player1.1,
                outcome: outcome1,
            },
            player2: SlotResult {
                player_id: player2.0.into(),
                choice: player2.1,
                outcome: outcome2,
            },
            winner,
        }
    }

    pub fn involves(&self, player_id: &str) -> bool {
        self.player1.player_id == player_id || self.player2.player_id == player_id
    }

    /// The participant's own slot followed by their opponent's.
    pub fn sides(&self, player_id: &str) -> Option<(&SlotResult, &SlotResult)> {
        if self.player1.player_id == player_id {
            Some((&self.player1, &self.player2))
        } else if self.player2.player_id == player_id {
            Some((&self.player2, &self.player1))
        } else {
            None
        }
    }

    pub fn slots(&self) -> [&SlotResult; 2] {
        [&self.player1, &self.player2]
    }
}

// HTTP request and response bodies

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub username: Option<String>,
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ConnectResponse {
    Waiting { player_id: String },
    Playing { player_id: String, match_id: String },
}

impl ConnectResponse {
    pub fn player_id(&self) -> &str {
        match self {
            ConnectResponse::Waiting { player_id } => player_id,
            ConnectResponse::Playing { player_id, .. } => player_id,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollQuery {
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PollMatchResponse {
    Matched { match_id: String },
    NoMatch,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub uuid: Option<String>,
    pub match_id: Option<String>,
    pub choice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MoveResponse {
    Recorded { already_recorded: bool },
    Resolved { result: MatchResult },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsQuery {
    pub match_id: Option<String>,
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ResultResponse {
    Found { result: MatchResult },
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub player_id: String,
    pub display_name: String,
    pub record: Record,
    pub status: PlayerStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub queued: usize,
    pub active_matches: usize,
    pub pending_results: usize,
    pub players: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_table() {
        let cases = [
            (Move::Rock, Move::Rock, Outcome::Draw, Outcome::Draw),
            (Move::Rock, Move::Scissors, Outcome::Win, Outcome::Loss),
            (Move::Scissors, Move::Rock, Outcome::Loss, Outcome::Win),
            (Move::Paper, Move::Rock, Outcome::Win, Outcome::Loss),
            (Move::Rock, Move::Paper, Outcome::Loss, Outcome::Win),
            (Move::Scissors, Move::Paper, Outcome::Win, Outcome::Loss),
            (Move::Paper, Move::Scissors, Outcome::Loss, Outcome::Win),
            (Move::Paper, Move::Paper, Outcome::Draw, Outcome::Draw),
            (Move::Scissors, Move::Scissors, Outcome::Draw, Outcome::Draw),
        ];

        for (m1, m2, o1, o2) in cases {
            let (r1, r2, _) = resolve(m1, m2);
            assert_eq!((r1, r2), (o1, o2), "{} vs {}", m1, m2);
        }
    }

    #[test]
    fn test_winner_tag() {
        assert_eq!(resolve(Move::Rock, Move::Scissors).2, Winner::Player1);
        assert_eq!(resolve(Move::Rock, Move::Paper).2, Winner::Player2);
        assert_eq!(resolve(Move::Paper, Move::Paper).2, Winner::Tie);
    }

    #[test]
    fn test_move_parsing() {
        assert_eq!("rock".parse::<Move>(), Ok(Move::Rock));
        assert_eq!(" Paper ".parse::<Move>(), Ok(Move::Paper));
        assert_eq!("SCISSORS".parse::<Move>(), Ok(Move::Scissors));
        assert!("lizard".parse::<Move>().is_err());
        assert!("".parse::<Move>().is_err());
    }

    #[test]
    fn test_record_round_trip_and_apply() {
        let mut record: Record = "3/1/2".parse().unwrap();
        assert_eq!(record, Record { wins: 3, losses: 1, ties: 2 });

        record.apply(Outcome::Win);
        record.apply(Outcome::Draw);
        assert_eq!(record.to_string(), "4/1/3");
        assert_eq!(record.games_played(), 8);

        assert!("1/2".parse::<Record>().is_err());
        assert!("a/b/c".parse::<Record>().is_err());
    }

    #[test]
    fn test_record_saturates_at_max() {
        let mut record: Record = "4294967295/0/4294967295".parse().unwrap();
        record.apply(Outcome::Win);
        record.apply(Outcome::Draw);

        assert_eq!(record.wins, u32::MAX);
        assert_eq!(record.ties, u32::MAX);
        assert_eq!(record.games_played(), u32::MAX);
        assert_eq!(record.to_string(), "4294967295/0/4294967295");
    }

    #[test]
    fn test_match_result_lookup() {
        let result = MatchResult::new("m1", ("alice", Move::Rock), ("bob", Move::Scissors));

        assert!(result.involves("alice"));
        assert!(!result.involves("carol"));
        let (mine, theirs) = result.sides("bob").unwrap();
        assert_eq!(mine.outcome, Outcome::Loss);
        assert_eq!(theirs.choice, Move::Rock);
        assert_eq!(result.sides("alice").unwrap().0.outcome, Outcome::Win);
        assert!(result.sides("carol").is_none());
    }

    #[test]
    fn test_wire_shapes() {
        let response = PollMatchResponse::Matched {
            match_id: "m1".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({"status": "matched", "matchId": "m1"})
        );
        assert_eq!(
            serde_json::to_value(PollMatchResponse::NoMatch).unwrap(),
            serde_json::json!({"status": "noMatch"})
        );

        let result = MatchResult::new("m1", ("alice", Move::Rock), ("bob", Move::Rock));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["winner"], "tie");
        assert_eq!(value["player1"]["playerId"], "alice");
        assert_eq!(value["player1"]["choice"], "rock");
        assert_eq!(value["player1"]["outcome"], "Draw");

        let request: MoveRequest =
            serde_json::from_str(r#"{"uuid":"p1","matchId":"m1","choice":"rock"}"#).unwrap();
        assert_eq!(request.match_id.as_deref(), Some("m1"));
    }
}
