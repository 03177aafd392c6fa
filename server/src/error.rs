use crate::store::StoreError;
use shared::ParseMoveError;
use thiserror::Error;

/// Coarse classification used to decide how an error reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown player, match or result. Benign for polling callers.
    NotFound,
    /// Malformed or missing request data. No state was touched.
    InvalidInput,
    /// The request conflicts with the current state of a match.
    StateConflict,
    /// The document store failed. In-memory state is unchanged.
    BackendUnavailable,
}

#[derive(Debug, Error)]
pub enum MatchmakingError {
    #[error("player {0} not found")]
    PlayerNotFound(String),

    #[error("match {0} not found")]
    MatchNotFound(String),

    #[error("no result for match {0}")]
    ResultNotFound(String),

    #[error("player {player_id} is not part of match {match_id}")]
    UnknownPlayerInMatch { match_id: String, player_id: String },

    #[error(transparent)]
    InvalidMove(#[from] ParseMoveError),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error(transparent)]
    Backend(#[from] StoreError),
}

impl MatchmakingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MatchmakingError::PlayerNotFound(_)
            | MatchmakingError::MatchNotFound(_)
            | MatchmakingError::ResultNotFound(_) => ErrorKind::NotFound,
            MatchmakingError::InvalidMove(_) | MatchmakingError::MissingField(_) => {
                ErrorKind::InvalidInput
            }
            MatchmakingError::UnknownPlayerInMatch { .. } => ErrorKind::StateConflict,
            MatchmakingError::Backend(_) => ErrorKind::BackendUnavailable,
        }
    }
}

pub type Result<T> = std::result::Result<T, MatchmakingError>;
