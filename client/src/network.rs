use log::{debug, info};
use serde::de::DeserializeOwned;
use shared::{
    ConnectRequest, ConnectResponse, ErrorBody, MoveRequest, MoveResponse, Move,
    PollMatchResponse, ResultResponse,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("client has not announced itself yet")]
    NotConnected,

    #[error("gave up waiting for {0}")]
    TimedOut(&'static str),

    #[error("match {0} was abandoned by the opponent")]
    Abandoned(String),
}

/// HTTP client for the matchmaking server. Remembers the player id handed
/// out on the first announce and reuses it afterwards.
pub struct RpsClient {
    http: reqwest::Client,
    base_url: String,
    player_id: Option<String>,
}

impl RpsClient {
    pub fn new(server: &str) -> Self {
        let server = server.trim_end_matches('/');
        let base_url = if server.starts_with("http://") || server.starts_with("https://") {
            server.to_string()
        } else {
            format!("http://{}", server)
        };

        Self {
            http: reqwest::Client::new(),
            base_url,
            player_id: None,
        }
    }

    /// Reuses a known player id, so the server treats this as a returning player.
    pub fn with_player_id(mut self, player_id: impl Into<String>) -> Self {
        self.player_id = Some(player_id.into());
        self
    }

    pub fn player_id(&self) -> Option<&str> {
        self.player_id.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn require_player_id(&self) -> Result<&str, ClientError> {
        self.player_id.as_deref().ok_or(ClientError::NotConnected)
    }

    pub async fn announce(&mut self, username: &str) -> Result<ConnectResponse, ClientError> {
        let request = ConnectRequest {
            username: Some(username.to_string()),
            uuid: self.player_id.clone(),
        };

        let response = self
            .http
            .post(format!("{}/connect", self.base_url))
            .json(&request)
            .send()
            .await?;
        let connected: ConnectResponse = read_json(response).await?;

        info!("Announced as {} ({})", username, connected.player_id());
        self.player_id = Some(connected.player_id().to_string());
        Ok(connected)
    }

    pub async fn poll_match(&self) -> Result<PollMatchResponse, ClientError> {
        let player_id = self.require_player_id()?;
        let response = self
            .http
            .get(format!("{}/startgame", self.base_url))
            .query(&[("uuid", player_id)])
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn submit_move(&self, match_id: &str, choice: Move) -> Result<MoveResponse, ClientError> {
        let request = MoveRequest {
            uuid: Some(self.require_player_id()?.to_string()),
            match_id: Some(match_id.to_string()),
            choice: Some(choice.to_string()),
        };

        debug!("Submitting {} for match {}", choice, match_id);
        let response = self
            .http
            .post(format!("{}/move", self.base_url))
            .json(&request)
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn fetch_result(&self, match_id: &str) -> Result<ResultResponse, ClientError> {
        let player_id = self.require_player_id()?;
        let response = self
            .http
            .get(format!("{}/results", self.base_url))
            .query(&[("matchId", match_id), ("uuid", player_id)])
            .send()
            .await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };
    Err(ClientError::Rejected {
        status: status.as_u16(),
        message,
    })
}
