//! HTTP surface for game clients
//!
//! Thin axum handlers that parse requests, call the matchmaking service and
//! shape JSON responses. Unknown players and results are benign negative
//! answers on the polling routes rather than errors.

use crate::error::{ErrorKind, MatchmakingError};
use crate::registry::MoveOutcome;
use crate::service::{AnnounceOutcome, MatchPoll, MatchmakingService};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{info, warn};
use shared::{
    ConnectRequest, ConnectResponse, ErrorBody, HealthResponse, MoveRequest, MoveResponse,
    PlayerView, PollMatchResponse, PollQuery, ResultResponse, ResultsQuery,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MatchmakingService>,
}

pub fn build_router(service: Arc<MatchmakingService>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/connect", post(connect_handler))
        .route("/startgame", get(startgame_handler))
        .route("/move", post(move_handler))
        .route("/results", get(results_handler))
        .route("/players/:player_id", get(player_handler))
        .with_state(AppState { service })
}

/// Serves the router on an already bound listener until the server stops.
pub async fn serve(listener: TcpListener, service: Arc<MatchmakingService>) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Server is running on {}", addr);
    }
    axum::serve(listener, build_router(service)).await
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.service.stats().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        queued: stats.queued,
        active_matches: stats.active_matches,
        pending_results: stats.pending_results,
        players: stats.players,
    })
}

pub async fn connect_handler(
    State(state): State<AppState>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<ConnectResponse>, ApiError> {
    let username = request
        .username
        .ok_or(MatchmakingError::MissingField("username"))?;

    let response = match state
        .service
        .announce(&username, request.uuid.as_deref())
        .await?
    {
        AnnounceOutcome::Queued { player_id } => ConnectResponse::Waiting { player_id },
        AnnounceOutcome::Reattached {
            player_id,
            match_id,
        } => ConnectResponse::Playing {
            player_id,
            match_id,
        },
    };
    Ok(Json(response))
}

pub async fn startgame_handler(
    State(state): State<AppState>,
    Query(query): Query<PollQuery>,
) -> Result<Json<PollMatchResponse>, ApiError> {
    let player_id = query.uuid.ok_or(MatchmakingError::MissingField("uuid"))?;

    let response = match state.service.poll_match(&player_id).await? {
        MatchPoll::Matched(match_id) => PollMatchResponse::Matched { match_id },
        MatchPoll::NoMatch => PollMatchResponse::NoMatch,
    };
    Ok(Json(response))
}

pub async fn move_handler(
    State(state): State<AppState>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<MoveResponse>, ApiError> {
    let player_id = request.uuid.ok_or(MatchmakingError::MissingField("uuid"))?;
    let match_id = request
        .match_id
        .ok_or(MatchmakingError::MissingField("matchId"))?;
    let choice = request
        .choice
        .ok_or(MatchmakingError::MissingField("choice"))?;

    let response = match state
        .service
        .submit_move(&player_id, &match_id, &choice)
        .await?
    {
        MoveOutcome::Recorded { already_recorded } => MoveResponse::Recorded { already_recorded },
        MoveOutcome::Resolved(result) => MoveResponse::Resolved { result },
    };
    Ok(Json(response))
}

pub async fn results_handler(
    State(state): State<AppState>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<ResultResponse>, ApiError> {
    let match_id = query
        .match_id
        .ok_or(MatchmakingError::MissingField("matchId"))?;
    let player_id = query.uuid.ok_or(MatchmakingError::MissingField("uuid"))?;

    match state.service.fetch_result(&match_id, &player_id).await {
        Ok(result) => Ok(Json(ResultResponse::Found { result })),
        Err(MatchmakingError::ResultNotFound(_)) => Ok(Json(ResultResponse::NotFound)),
        Err(e) => Err(e.into()),
    }
}

pub async fn player_handler(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Json<PlayerView>, ApiError> {
    state
        .service
        .player(&player_id)
        .await
        .map(Json)
        .ok_or_else(|| MatchmakingError::PlayerNotFound(player_id).into())
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<MatchmakingError> for ApiError {
    fn from(err: MatchmakingError) -> Self {
        let status = match err.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::StateConflict => StatusCode::CONFLICT,
            ErrorKind::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("request failed ({}): {}", self.status, self.message);
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceConfig;
    use crate::store::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> Router {
        let service = MatchmakingService::new(Arc::new(MemoryStore::new()), ServiceConfig::default());
        build_router(Arc::new(service))
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_uri(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn parse<T: DeserializeOwned>(value: Value) -> T {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_connect_requires_username() {
        let router = router();
        let (status, body) = send(&router, post_json("/connect", json!({}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "username is required");
    }

    #[tokio::test]
    async fn test_connect_and_poll() {
        let router = router();

        let (status, body) = send(&router, post_json("/connect", json!({"username": "alice"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "waiting");
        let alice = parse::<ConnectResponse>(body).player_id().to_string();

        let (_, body) = send(&router, get_uri(&format!("/startgame?uuid={}", alice))).await;
        assert_eq!(parse::<PollMatchResponse>(body), PollMatchResponse::NoMatch);

        send(&router, post_json("/connect", json!({"username": "bob", "uuid": "bob-1"}))).await;

        let (_, body) = send(&router, get_uri(&format!("/startgame?uuid={}", alice))).await;
        assert!(matches!(parse::<PollMatchResponse>(body), PollMatchResponse::Matched { .. }));

        let (_, body) = send(&router, get_uri("/health")).await;
        let health: HealthResponse = parse(body);
        assert_eq!(health.active_matches, 1);
        assert_eq!(health.players, 2);
    }

    #[tokio::test]
    async fn test_poll_unknown_player_is_benign() {
        let router = router();
        let (status, body) = send(&router, get_uri("/startgame?uuid=ghost")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "noMatch"}));
    }

    #[tokio::test]
    async fn test_move_errors_map_to_status_codes() {
        let router = router();
        send(&router, post_json("/connect", json!({"username": "alice", "uuid": "a"}))).await;
        send(&router, post_json("/connect", json!({"username": "bob", "uuid": "b"}))).await;
        send(&router, post_json("/connect", json!({"username": "carol", "uuid": "c"}))).await;

        let (_, body) = send(&router, get_uri("/startgame?uuid=a")).await;
        let match_id = match parse::<PollMatchResponse>(body) {
            PollMatchResponse::Matched { match_id } => match_id,
            PollMatchResponse::NoMatch => panic!("expected a match"),
        };

        let (status, _) = send(
            &router,
            post_json("/move", json!({"uuid": "a", "matchId": match_id, "choice": "lizard"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &router,
            post_json("/move", json!({"uuid": "a", "matchId": "nope", "choice": "rock"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &router,
            post_json("/move", json!({"uuid": "c", "matchId": match_id, "choice": "rock"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&router, post_json("/move", json!({"uuid": "a"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_move_and_results_flow() {
        let router = router();
        send(&router, post_json("/connect", json!({"username": "alice", "uuid": "a"}))).await;
        send(&router, post_json("/connect", json!({"username": "bob", "uuid": "b"}))).await;
        let (_, body) = send(&router, get_uri("/startgame?uuid=b")).await;
        let match_id = body["matchId"].as_str().unwrap().to_string();

        let (_, body) = send(
            &router,
            post_json("/move", json!({"uuid": "a", "matchId": match_id, "choice": "paper"})),
        )
        .await;
        assert_eq!(body, json!({"status": "recorded", "alreadyRecorded": false}));

        let (_, body) = send(
            &router,
            post_json("/move", json!({"uuid": "b", "matchId": match_id, "choice": "scissors"})),
        )
        .await;
        assert_eq!(body["status"], "resolved");
        assert_eq!(body["result"]["winner"], "player2");

        let uri = format!("/results?matchId={}&uuid=a", match_id);
        let (_, body) = send(&router, get_uri(&uri)).await;
        assert_eq!(body["status"], "found");
        assert_eq!(body["result"]["player1"]["outcome"], "Loss");

        let uri = format!("/results?matchId={}&uuid=b", match_id);
        let (_, body) = send(&router, get_uri(&uri)).await;
        assert_eq!(body["result"]["player2"]["outcome"], "Win");

        let (_, body) = send(&router, get_uri(&uri)).await;
        assert_eq!(body, json!({"status": "notFound"}));

        let (status, body) = send(&router, get_uri("/players/b")).await;
        assert_eq!(status, StatusCode::OK);
        let bob: PlayerView = parse(body);
        assert_eq!(bob.record.wins, 1);
    }

    #[tokio::test]
    async fn test_unknown_player_lookup() {
        let router = router();
        let (status, body) = send(&router, get_uri("/players/ghost")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "player ghost not found");
    }
}
