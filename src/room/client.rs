//! HTTP client for the room service
//!
//! Room creation, video search and queue/seek mutations go over plain HTTP;
//! the push channel and play/pause/next controls live in
//! [`RoomSession`](crate::room::RoomSession).

use crate::room::{RoomCreated, RoomId, Video};
use crate::utils::config::ServerConfig;
use crate::utils::error::{Result, WatchRoomError};
use log::{debug, info};
use reqwest::{Client, Response, StatusCode};
use url::Url;

/// Request/response side of the room service
#[derive(Clone)]
pub struct RoomClient {
    http: Client,
    base_url: Url,
    config: ServerConfig,
}

impl RoomClient {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        let http = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `POST /api/v1/rooms`
    pub async fn create_room(&self) -> Result<RoomId> {
        let url = self.endpoint("/api/v1/rooms", &[])?;
        let resp = self.http.post(url).send().await?;
        let created: RoomCreated = check_status(resp).await?.json().await?;

        info!("Created room {}", created.id);
        Ok(created.id)
    }

    /// `GET /api/v1/videos?name=<query>`, results in relevance order
    pub async fn search_videos(&self, query: &str) -> Result<Vec<Video>> {
        let url = self.endpoint("/api/v1/videos", &[("name", query)])?;
        let resp = self.http.get(url).send().await?;
        let videos: Option<Vec<Video>> = check_status(resp).await?.json().await?;
        let videos = videos.unwrap_or_default();

        debug!("Search '{}' returned {} videos", query, videos.len());
        Ok(videos)
    }

    /// `POST /api/v1/rooms/queue?id=<room>`
    pub async fn add_to_queue(&self, room: &RoomId, video: &Video) -> Result<()> {
        let url = self.endpoint("/api/v1/rooms/queue", &[("id", room.as_str())])?;
        let resp = self.http.post(url).json(video).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    /// `DELETE /api/v1/rooms/delete?id=<room>&idx=<index>`
    pub async fn remove_from_queue(&self, room: &RoomId, index: usize) -> Result<()> {
        let idx = index.to_string();
        let url = self.endpoint("/api/v1/rooms/delete", &[("id", room.as_str()), ("idx", &idx)])?;
        let resp = self.http.delete(url).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    /// `POST /api/v1/rooms/seek?id=<room>&pos=<seconds>`
    pub async fn seek(&self, room: &RoomId, position: f64) -> Result<()> {
        let pos = format_position(position);
        let url = self.endpoint("/api/v1/rooms/seek", &[("id", room.as_str()), ("pos", &pos)])?;
        let resp = self.http.post(url).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    /// WebSocket URL of a room's push channel
    pub fn push_url(&self, room: &RoomId) -> Result<Url> {
        let scheme = if self.base_url.scheme() == "https" { "wss" } else { "ws" };
        let host = self.base_url.host_str()
            .ok_or_else(|| WatchRoomError::Config(format!("Base URL has no host: {}", self.base_url)))?;
        let authority = match self.base_url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let mut url = Url::parse(&format!("{}://{}/ws/room", scheme, authority))?;
        url.query_pairs_mut().append_pair("id", room.as_str());
        Ok(url)
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.join(path)?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }
}

/// Positions go on the wire with two decimals
fn format_position(position: f64) -> String {
    format!("{:.2}", position.max(0.0))
}

async fn check_status(resp: Response) -> Result<Response> {
    if resp.status() == StatusCode::OK {
        return Ok(resp);
    }

    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(WatchRoomError::Status { status, body })
}
