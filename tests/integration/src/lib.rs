//! Integration test utilities for WatchRoom
//!
//! This module provides common utilities for integration testing including:
//! - A scriptable media widget and factory
//! - A mock room service
//! - Snapshot builders

use async_trait::async_trait;
use mockall::mock;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use watchroom::player::{MediaWidget, WidgetEventSink, WidgetFactory};
use watchroom::room::{RoomId, RoomService, RoomState, Video, VideoId};
use watchroom::utils::Result;

pub const ROOM: &str = "it-room";
pub const SONG_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
pub const OTHER_URL: &str = "https://youtu.be/9bZkp7q19f0";
pub const VIMEO_URL: &str = "https://vimeo.com/76979871";

mock! {
    pub Service {}

    #[async_trait]
    impl RoomService for Service {
        async fn add_to_queue(&self, video: &Video) -> Result<()>;
        async fn remove_from_queue(&self, index: usize) -> Result<()>;
        async fn toggle_play_pause(&self) -> Result<()>;
        async fn skip_next(&self) -> Result<()>;
        async fn seek(&self, position: f64) -> Result<()>;
        async fn search_videos(&self, query: &str) -> Result<Vec<Video>>;
    }
}

/// Builder for room snapshots
pub struct SnapshotBuilder {
    state: RoomState,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self {
            state: RoomState::empty(RoomId::new(ROOM)),
        }
    }

    pub fn current(mut self, url: &str, duration: i64) -> Self {
        self.state.current = Some(Video::new(url, format!("Track {}", url.len()), duration));
        self
    }

    pub fn queued(mut self, url: &str, title: &str) -> Self {
        self.state.queue.push(Video::new(url, title, 180));
        self
    }

    pub fn position(mut self, position: f64) -> Self {
        self.state.position = position;
        self
    }

    pub fn playing(mut self, playing: bool) -> Self {
        self.state.playing = playing;
        self
    }

    pub fn build(self) -> RoomState {
        self.state
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// What the widget was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Load(String, f64),
    Cue(String, f64),
    Play,
    Pause,
    Seek(f64),
}

/// Shared record of widget calls plus the position it reports
#[derive(Debug, Default)]
pub struct WidgetRecord {
    pub calls: Vec<Call>,
    pub position: f64,
    pub created: usize,
}

impl WidgetRecord {
    pub fn loads(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Load(id, _) | Call::Cue(id, _) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }
}

pub struct ScriptedWidget {
    record: Arc<Mutex<WidgetRecord>>,
}

impl ScriptedWidget {
    fn push(&self, call: Call) -> Result<()> {
        let mut record = self.record.lock();
        match &call {
            Call::Load(_, at) | Call::Cue(_, at) | Call::Seek(at) => record.position = *at,
            _ => {}
        }
        record.calls.push(call);
        Ok(())
    }
}

impl MediaWidget for ScriptedWidget {
    fn load_video(&mut self, id: &VideoId, start: f64) -> Result<()> {
        self.push(Call::Load(id.to_string(), start))
    }

    fn cue_video(&mut self, id: &VideoId, start: f64) -> Result<()> {
        self.push(Call::Cue(id.to_string(), start))
    }

    fn play(&mut self) -> Result<()> {
        self.push(Call::Play)
    }

    fn pause(&mut self) -> Result<()> {
        self.push(Call::Pause)
    }

    fn seek_to(&mut self, position: f64) -> Result<()> {
        self.push(Call::Seek(position))
    }

    fn current_time(&mut self) -> Result<f64> {
        Ok(self.record.lock().position)
    }
}

/// Factory handing out [`ScriptedWidget`]s over one shared record
#[derive(Default)]
pub struct ScriptedFactory {
    pub record: Arc<Mutex<WidgetRecord>>,
}

impl ScriptedFactory {
    pub fn new() -> (Arc<Self>, Arc<Mutex<WidgetRecord>>) {
        let factory = Arc::new(Self::default());
        let record = Arc::clone(&factory.record);
        (factory, record)
    }
}

#[async_trait]
impl WidgetFactory for ScriptedFactory {
    async fn create(&self, _events: WidgetEventSink) -> Result<Box<dyn MediaWidget>> {
        self.record.lock().created += 1;
        Ok(Box::new(ScriptedWidget {
            record: Arc::clone(&self.record),
        }))
    }
}

/// Let spawned tasks and the widget thread run until `done` holds or the
/// budget runs out
pub async fn settle<F: Fn() -> bool>(done: F) -> bool {
    for _ in 0..2000 {
        if done() {
            return true;
        }
        tokio::task::yield_now().await;
        // The widget thread is not driven by the runtime
        std::thread::sleep(Duration::from_micros(500));
    }
    done()
}
