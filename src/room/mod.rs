//! Room model and room service collaborators
//!
//! Snapshot types exchanged with the room service, video identity
//! extraction, and the HTTP/WebSocket client that produces snapshots and
//! consumes commands.

pub mod client;
pub mod provider;
pub mod push;
pub mod session;

pub use client::RoomClient;
pub use provider::{extract_video_id, VideoId};
pub use push::{PushHub, Subscription, ROOM_STATE_EVENT};
pub use session::{RoomService, RoomSession};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Room identifier issued by the room service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A queue entry. Identified by its URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub url: String,
    pub title: String,
    /// Whole seconds, as reported by the search service
    pub duration: i64,
}

impl Video {
    pub fn new<U: Into<String>, T: Into<String>>(url: U, title: T, duration: i64) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            duration,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration.max(0) as f64
    }

    /// Provider id, `None` when the URL shape is not recognised
    pub fn video_id(&self) -> Option<VideoId> {
        extract_video_id(&self.url)
    }
}

/// Server-authoritative room snapshot
///
/// Always a full state, never a delta. The client never edits one; every
/// local change is inferred from a newer snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomState {
    pub id: RoomId,
    #[serde(default)]
    pub current: Option<Video>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub queue: Vec<Video>,
    #[serde(default)]
    pub playing: bool,
    /// Seconds into `current`
    #[serde(default)]
    pub position: f64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RoomState {
    /// Snapshot with nothing playing and an empty queue
    pub fn empty(id: RoomId) -> Self {
        Self {
            id,
            current: None,
            queue: Vec::new(),
            playing: false,
            position: 0.0,
            updated_at: None,
        }
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current.as_ref().map(|v| v.url.as_str())
    }
}

/// The service encodes an empty queue as `null`
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<Video>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Video>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Response body of room creation
#[derive(Debug, Clone, Deserialize)]
pub struct RoomCreated {
    pub id: RoomId,
}

/// Commands the engine can ask the room service to perform
///
/// All of them are fire-and-forget: their effect is observed only through
/// the next pushed snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomCommand {
    AddToQueue(Video),
    RemoveFromQueue(usize),
    TogglePlayPause,
    SkipNext,
    Seek(f64),
}

/// Control message written to the push socket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlMessage {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ControlMessage {
    pub fn play() -> Self {
        Self { kind: "play".to_string() }
    }

    pub fn pause() -> Self {
        Self { kind: "pause".to_string() }
    }

    pub fn next() -> Self {
        Self { kind: "next".to_string() }
    }
}
