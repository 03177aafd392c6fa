use crate::network::{ClientError, RpsClient};
use log::{debug, info, warn};
use shared::{
    ConnectResponse, MatchResult, Move, MoveResponse, Outcome, PollMatchResponse, ResultResponse,
    WATCHDOG_INTERVAL_MS,
};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct MatchSettings {
    /// Delay between polls. Must stay under the server's watchdog interval
    /// or the player is dropped while waiting.
    pub poll_interval: Duration,
    /// Polls allowed for each waiting phase before giving up
    pub max_polls: u32,
    /// Times to queue again after the opponent abandons the match
    pub max_rejoins: u32,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(WATCHDOG_INTERVAL_MS / 4),
            max_polls: 240,
            max_rejoins: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    pub match_id: String,
    pub choice: Move,
    pub opponent_choice: Move,
    pub outcome: Outcome,
    pub result: MatchResult,
}

/// Plays one full match: announce, wait for an opponent, move, then fetch
/// the result so the server can credit both records.
///
/// If the server drops the match because the opponent went silent, the
/// player announces again and plays against the next opponent.
pub async fn play_match(
    client: &mut RpsClient,
    username: &str,
    choice: Move,
    settings: &MatchSettings,
) -> Result<MatchReport, ClientError> {
    let mut abandoned = String::new();

    for _ in 0..=settings.max_rejoins {
        let match_id = match client.announce(username).await? {
            ConnectResponse::Playing { match_id, .. } => {
                info!("Rejoined match {}", match_id);
                match_id
            }
            ConnectResponse::Waiting { .. } => wait_for_match(client, settings).await?,
        };

        if let MoveResponse::Recorded { already_recorded: true } =
            client.submit_move(&match_id, choice).await?
        {
            debug!("Move for match {} was already on record", match_id);
        }

        match wait_for_result(client, &match_id, settings).await? {
            Some(result) => return report(client, match_id, result),
            None => {
                warn!("Match {} was abandoned, queueing again", match_id);
                abandoned = match_id;
            }
        }
    }

    Err(ClientError::Abandoned(abandoned))
}

fn report(client: &RpsClient, match_id: String, result: MatchResult) -> Result<MatchReport, ClientError> {
    let player_id = client.player_id().ok_or(ClientError::NotConnected)?;
    let (mine, theirs) = result.sides(player_id).ok_or_else(|| ClientError::Rejected {
        status: 409,
        message: format!("player {} is not part of match {}", player_id, match_id),
    })?;

    let report = MatchReport {
        choice: mine.choice,
        opponent_choice: theirs.choice,
        outcome: mine.outcome,
        match_id,
        result: result.clone(),
    };
    info!(
        "{} vs {}: {:?}",
        report.choice, report.opponent_choice, report.outcome
    );
    Ok(report)
}

async fn wait_for_match(client: &RpsClient, settings: &MatchSettings) -> Result<String, ClientError> {
    for _ in 0..settings.max_polls {
        match client.poll_match().await? {
            PollMatchResponse::Matched { match_id } => {
                info!("Match found: {}", match_id);
                return Ok(match_id);
            }
            PollMatchResponse::NoMatch => sleep(settings.poll_interval).await,
        }
    }
    Err(ClientError::TimedOut("an opponent"))
}

/// Polls for the result. Returns `None` once the match is neither live nor
/// resolved, which means the server abandoned it.
async fn wait_for_result(
    client: &RpsClient,
    match_id: &str,
    settings: &MatchSettings,
) -> Result<Option<MatchResult>, ClientError> {
    for _ in 0..settings.max_polls {
        if let ResultResponse::Found { result } = client.fetch_result(match_id).await? {
            return Ok(Some(result));
        }

        if client.poll_match().await? == PollMatchResponse::NoMatch {
            // The opponent may have moved between the two requests
            return match client.fetch_result(match_id).await? {
                ResultResponse::Found { result } => Ok(Some(result)),
                ResultResponse::NotFound => Ok(None),
            };
        }

        sleep(settings.poll_interval).await;
    }
    Err(ClientError::TimedOut("the match result"))
}

/// Picks a uniformly random move.
pub fn random_move<R: rand::Rng + ?Sized>(rng: &mut R) -> Move {
    Move::ALL[rng.gen_range(0..Move::ALL.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio_test::assert_err;

    #[test]
    fn test_default_poll_interval_beats_watchdog() {
        let settings = MatchSettings::default();
        assert!(settings.poll_interval < Duration::from_millis(WATCHDOG_INTERVAL_MS));
    }

    #[test]
    fn test_random_move_covers_all_choices() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            seen.insert(random_move(&mut rng));
        }
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let mut client = RpsClient::new("127.0.0.1:9");
        let settings = MatchSettings {
            poll_interval: Duration::from_millis(1),
            max_polls: 1,
            ..MatchSettings::default()
        };

        let err = assert_err!(play_match(&mut client, "alice", Move::Rock, &settings).await);
        assert!(matches!(err, ClientError::Http(_)));
    }
}
