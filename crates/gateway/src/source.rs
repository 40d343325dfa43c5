//! Snapshot source: the upstream scorebot API.

use async_trait::async_trait;
use board_core::{Game, Meta};
use tracing::debug;

use crate::error::{GatewayError, Result};

/// Where snapshots come from. The collection only ever sees this seam;
/// tests script it, production talks HTTP through [`ScorebotClient`].
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// The game index: identification and timing for every known game.
    async fn list(&self) -> Result<Vec<Meta>>;

    /// One complete snapshot of one game.
    async fn fetch(&self, id: u64) -> Result<Game>;
}

/// Scorebot REST API client.
#[derive(Debug, Clone)]
pub struct ScorebotClient {
    http: reqwest::Client,
    base: String,
}

impl ScorebotClient {
    /// Create a client against `base`, with `timeout` applied per
    /// request.
    pub fn new(base: impl Into<String>, timeout: std::time::Duration) -> Result<Self> {
        let mut base = base.into();
        if !base.contains("://") {
            base = format!("http://{base}");
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_owned(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{path}", self.base);
        debug!("fetching {url}");
        let response = self.http.get(&url).send().await?;
        if response.status().as_u16() >= 400 {
            return Err(GatewayError::UpstreamStatus(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SnapshotSource for ScorebotClient {
    async fn list(&self) -> Result<Vec<Meta>> {
        self.get_json("api/games/").await
    }

    async fn fetch(&self, id: u64) -> Result<Game> {
        self.get_json(&format!("api/scoreboard/{id}/")).await
    }
}
