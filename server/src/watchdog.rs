//! Liveness watchdog
//!
//! Clients have no way to say goodbye; they simply stop polling. The
//! watchdog sweeps on a fixed interval and treats any non-idle player that
//! has been silent for longer than that interval as disconnected:
//! - Queued players are removed from the queue
//! - Playing players lose their match, and their opponent is released too
//! - Players awaiting a result are marked idle (the result has its own
//!   retention window)
//!
//! The same sweep settles results that both players fetched but whose
//! statistics could not be written yet, and reclaims results past retention.

use crate::service::{abandoned_match_document, MatchmakingService, Outbox};
use crate::store::MATCHES;
use log::{debug, info};
use shared::PlayerStatus;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// What a single sweep changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Players removed from the queue
    pub dequeued: Vec<String>,
    /// Matches removed because a participant went silent
    pub abandoned_matches: Vec<String>,
    /// Players released from waiting on a result
    pub released: Vec<String>,
    /// Results retired by this sweep
    pub retired_results: Vec<String>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.dequeued.is_empty()
            && self.abandoned_matches.is_empty()
            && self.released.is_empty()
            && self.retired_results.is_empty()
    }
}

impl MatchmakingService {
    /// Runs one watchdog pass against the current time.
    pub async fn sweep(&self) -> SweepReport {
        let now = Instant::now();
        let timeout = self.config().watchdog_interval;
        let retention = self.config().result_retention;
        let mut report = SweepReport::default();
        let mut outbox = Outbox::default();

        let mut state = self.state.lock().await;

        for player_id in state.directory.stale_players(now, timeout) {
            // Status is re-read: an earlier kick in this pass may have
            // already released this player as someone's opponent.
            match state.directory.status(&player_id) {
                Some(PlayerStatus::Queued) => {
                    state.queue.remove(&player_id);
                    info!("kicked {} from playing queue", player_id);
                    report.dequeued.push(player_id.clone());
                }
                Some(PlayerStatus::Playing) => {
                    if let Some(abandoned) = state.registry.remove_by_player(&player_id) {
                        info!("remove match {}, {} stopped polling", abandoned.id, player_id);

                        if let Some(opponent) = abandoned.opponent_of(&player_id) {
                            state
                                .directory
                                .set_status(&opponent.player_id, PlayerStatus::Idle);
                            info!("kicked {} from playing match ({})", opponent.player_id, abandoned.id);
                            outbox.player(&state.directory, &opponent.player_id);
                        }

                        outbox.push(MATCHES, &abandoned.id, abandoned_match_document());
                        report.abandoned_matches.push(abandoned.id);
                    }
                }
                Some(PlayerStatus::AwaitingResult) => {
                    info!("kicked {} from waiting for match results", player_id);
                    report.released.push(player_id.clone());
                }
                Some(PlayerStatus::Idle) | None => continue,
            }

            state.directory.set_status(&player_id, PlayerStatus::Idle);
            outbox.player(&state.directory, &player_id);
        }

        for match_id in state.ledger.settleable(now, retention) {
            if self.settle_result(&mut state, &match_id).await {
                report.retired_results.push(match_id);
            }
        }

        drop(state);
        self.flush(outbox).await;

        report
    }
}

/// Spawns the recurring sweep. It runs until the runtime shuts down.
pub fn spawn_watchdog(service: Arc<MatchmakingService>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(service.config().watchdog_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // The first tick fires immediately
        interval.tick().await;

        loop {
            interval.tick().await;

            let report = service.sweep().await;
            if !report.is_empty() {
                debug!("Watchdog sweep: {:?}", report);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{MatchPoll, ServiceConfig};
    use crate::store::{DocumentStore, MemoryStore, PLAYERS};
    use shared::Record;
    use std::time::Duration;

    fn service() -> (Arc<MatchmakingService>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = MatchmakingService::new(store.clone(), ServiceConfig::default());
        (Arc::new(service), store)
    }

    async fn matched(service: &MatchmakingService) -> String {
        service.announce("alice", Some("a")).await.unwrap();
        service.announce("bob", Some("b")).await.unwrap();
        match service.poll_match("a").await.unwrap() {
            MatchPoll::Matched(id) => id,
            MatchPoll::NoMatch => panic!("players were not paired"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_ignores_fresh_players() {
        let (service, _) = service();
        service.announce("alice", Some("a")).await.unwrap();

        tokio::time::advance(Duration::from_millis(1_500)).await;
        let report = service.sweep().await;

        assert!(report.is_empty());
        assert_eq!(service.stats().await.queued, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_queued_player_is_dequeued() {
        let (service, store) = service();
        service.announce("alice", Some("a")).await.unwrap();

        tokio::time::advance(Duration::from_millis(2_500)).await;
        let report = service.sweep().await;

        assert_eq!(report.dequeued, vec!["a".to_string()]);
        assert_eq!(service.stats().await.queued, 0);
        assert_eq!(service.player("a").await.unwrap().status, PlayerStatus::Idle);

        let document = store.get(PLAYERS, "a").await.unwrap().unwrap();
        assert_eq!(document["status"], "idle");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_player_abandons_match() {
        let (service, store) = service();
        let match_id = matched(&service).await;

        // Bob keeps polling, Alice goes quiet
        tokio::time::advance(Duration::from_millis(1_500)).await;
        service.poll_match("b").await.unwrap();
        tokio::time::advance(Duration::from_millis(1_000)).await;

        let report = service.sweep().await;
        assert_eq!(report.abandoned_matches, vec![match_id.clone()]);

        assert_eq!(service.stats().await.active_matches, 0);
        assert_eq!(service.player("a").await.unwrap().status, PlayerStatus::Idle);
        assert_eq!(service.player("b").await.unwrap().status, PlayerStatus::Idle);
        assert_eq!(service.poll_match("b").await.unwrap(), MatchPoll::NoMatch);

        let archived = store.get(MATCHES, &match_id).await.unwrap().unwrap();
        assert_eq!(archived["status"], "abandoned");
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_players_silent_abandons_once() {
        let (service, _) = service();
        let match_id = matched(&service).await;

        tokio::time::advance(Duration::from_secs(3)).await;
        let report = service.sweep().await;

        assert_eq!(report.abandoned_matches, vec![match_id]);
        assert_eq!(service.player("a").await.unwrap().status, PlayerStatus::Idle);
        assert_eq!(service.player("b").await.unwrap().status, PlayerStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_awaiting_result_player_released_but_result_kept() {
        let (service, _) = service();
        let match_id = matched(&service).await;
        service.submit_move("a", &match_id, "rock").await.unwrap();
        service.submit_move("b", &match_id, "rock").await.unwrap();

        tokio::time::advance(Duration::from_secs(3)).await;
        let report = service.sweep().await;

        let mut released = report.released.clone();
        released.sort();
        assert_eq!(released, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(service.stats().await.pending_results, 1);
        assert_eq!(service.player("a").await.unwrap().status, PlayerStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retention_reclaims_half_fetched_result_once() {
        let (service, _) = service();
        let match_id = matched(&service).await;
        service.submit_move("a", &match_id, "paper").await.unwrap();
        service.submit_move("b", &match_id, "rock").await.unwrap();
        service.fetch_result(&match_id, "a").await.unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(service.sweep().await.retired_results.is_empty());

        tokio::time::advance(Duration::from_secs(31)).await;
        let report = service.sweep().await;
        assert_eq!(report.retired_results, vec![match_id.clone()]);
        assert_eq!(service.stats().await.pending_results, 0);

        assert_eq!(
            service.player("a").await.unwrap().record,
            Record { wins: 1, losses: 0, ties: 0 }
        );
        assert_eq!(
            service.player("b").await.unwrap().record,
            Record { wins: 0, losses: 1, ties: 0 }
        );

        // Nothing left to apply on later sweeps or fetches
        assert!(service.sweep().await.retired_results.is_empty());
        assert!(service.fetch_result(&match_id, "b").await.is_err());
        assert_eq!(service.player("b").await.unwrap().record.losses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_watchdog_reclaims_queue() {
        let store = Arc::new(MemoryStore::new());
        let config = ServiceConfig {
            watchdog_interval: Duration::from_millis(100),
            ..ServiceConfig::default()
        };
        let service = Arc::new(MatchmakingService::new(store, config));
        let handle = spawn_watchdog(Arc::clone(&service));

        service.announce("alice", Some("a")).await.unwrap();
        assert_eq!(service.stats().await.queued, 1);

        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(service.stats().await.queued, 0);
        assert_eq!(service.player("a").await.unwrap().status, PlayerStatus::Idle);
        handle.abort();
    }
}
