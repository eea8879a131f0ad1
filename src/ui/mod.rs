//! Terminal front-end
//!
//! Maps typed commands onto room commands and pointer gestures, and keeps
//! the last search results around so they can be queued by number.

pub mod input;
pub mod render;

pub use input::{parse, UserAction, HELP};
pub use render::{QueueLine, RenderModel};

use crate::room::{RoomCommand, RoomService, Video};
use crate::sync::{PointerEvent, RoomView, Timeline};
use crate::utils::error::{Result, WatchRoomError};
use crate::utils::format_time;
use log::warn;
use std::sync::Arc;

/// Virtual timeline used for percentage seeks
const SEEK_TIMELINE: Timeline = Timeline { left: 0.0, width: 100.0 };

/// Whether the input loop should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Frontend {
    service: Arc<dyn RoomService>,
    room: RoomView,
    results: Vec<Video>,
}

impl Frontend {
    pub fn new(service: Arc<dyn RoomService>, room: RoomView) -> Self {
        Self {
            service,
            room,
            results: Vec::new(),
        }
    }

    pub fn room(&self) -> &RoomView {
        &self.room
    }

    pub fn results(&self) -> &[Video] {
        &self.results
    }

    /// Handle one input line, returning text to print
    pub async fn handle_line(&mut self, line: &str) -> (Flow, Option<String>) {
        let action = match parse(line) {
            Ok(Some(action)) => action,
            Ok(None) => return (Flow::Continue, None),
            Err(e) => return (Flow::Continue, Some(format!("{} (type 'help')", e))),
        };

        match self.apply(action).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Command failed: {}", e);
                (Flow::Continue, Some(e.to_string()))
            }
        }
    }

    async fn apply(&mut self, action: UserAction) -> Result<(Flow, Option<String>)> {
        let output = match action {
            UserAction::TogglePlayPause => {
                self.room.command(RoomCommand::TogglePlayPause)?;
                None
            }
            UserAction::Next => {
                self.room.command(RoomCommand::SkipNext)?;
                None
            }
            UserAction::Search(query) => Some(self.search(&query).await),
            UserAction::Add(number) => {
                let video = self
                    .results
                    .get(number - 1)
                    .cloned()
                    .ok_or_else(|| WatchRoomError::InvalidInput(format!("no search result {}", number)))?;
                let title = video.title.clone();
                self.room.command(RoomCommand::AddToQueue(video))?;
                Some(format!("Queued {}", title))
            }
            UserAction::Remove(number) => {
                self.room.command(RoomCommand::RemoveFromQueue(number - 1))?;
                None
            }
            UserAction::Seek(percent) => {
                self.room.pointer(PointerEvent::Down { x: percent, timeline: SEEK_TIMELINE })?;
                self.room.pointer(PointerEvent::Up { x: percent })?;
                None
            }
            UserAction::Show => Some(self.render()),
            UserAction::Help => Some(HELP.to_string()),
            UserAction::Quit => return Ok((Flow::Quit, None)),
        };
        Ok((Flow::Continue, output))
    }

    async fn search(&mut self, query: &str) -> String {
        match self.service.search_videos(query).await {
            Ok(results) => {
                self.results = results;
                list_results(&self.results)
            }
            Err(e) => {
                warn!("Search for '{}' failed: {}", query, e);
                let message = format!("Search failed: {}", e);
                let _ = self.room.notice(message.clone());
                message
            }
        }
    }

    /// Full text rendering of the room as it is now
    pub fn render(&self) -> String {
        let views = self.room.views();
        let model = RenderModel::from_view(&views.borrow());
        model.to_string()
    }

    /// Leave the room
    pub async fn close(self) {
        self.room.leave().await;
    }
}

fn list_results(results: &[Video]) -> String {
    if results.is_empty() {
        return "No results".to_string();
    }
    results
        .iter()
        .enumerate()
        .map(|(i, v)| format!("{:>3}. {} ({})", i + 1, v.title, format_time(v.duration_seconds())))
        .collect::<Vec<_>>()
        .join("\n")
}
