//! Text rendering of the engine view

use crate::player::{AdapterKind, WidgetStatus};
use crate::sync::EngineView;
use crate::utils::format_time;
use chrono::Local;
use std::fmt;

/// Width of the textual progress bar, in cells
const BAR_WIDTH: usize = 30;

/// One queued track, numbered from 1
#[derive(Debug, Clone, PartialEq)]
pub struct QueueLine {
    pub number: usize,
    pub title: String,
    pub duration: String,
}

/// Display-ready strings for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct RenderModel {
    pub room_id: String,
    pub title: String,
    pub status: &'static str,
    pub elapsed: String,
    pub total: String,
    /// Percent of the track played, within [0, 100]
    pub progress: f64,
    pub seeking: bool,
    pub placeholder: Option<String>,
    pub queue: Vec<QueueLine>,
    pub updated: Option<String>,
    pub notice: Option<String>,
}

impl RenderModel {
    pub fn from_view(view: &EngineView) -> Self {
        let duration = view.current.as_ref().map_or(0.0, |v| v.duration_seconds());
        let position = view.playback.display_position;

        let progress = if duration > 0.0 {
            (position / duration * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        let placeholder = match (&view.adapter, &view.widget_status) {
            (AdapterKind::UnsupportedPlaceholder, _) => view.placeholder.map(str::to_string),
            (AdapterKind::SupportedProvider, WidgetStatus::Failed(reason)) => {
                Some(format!("Player unavailable: {}", reason))
            }
            _ => None,
        };

        Self {
            room_id: view.room_id.as_ref().map(|id| id.to_string()).unwrap_or_default(),
            title: view
                .current
                .as_ref()
                .map_or_else(|| "Nothing is playing".to_string(), |v| v.title.clone()),
            status: if view.playing { "Playing" } else { "Paused" },
            elapsed: format_time(position),
            total: format_time(duration),
            progress,
            seeking: view.playback.seeking,
            placeholder,
            queue: view
                .queue
                .iter()
                .enumerate()
                .map(|(i, v)| QueueLine {
                    number: i + 1,
                    title: v.title.clone(),
                    duration: format_time(v.duration_seconds()),
                })
                .collect(),
            updated: view
                .updated_at
                .map(|at| at.with_timezone(&Local).format("%H:%M:%S").to_string()),
            notice: view.notice.clone(),
        }
    }

    /// Single status line, redrawn in place while playing
    pub fn status_line(&self) -> String {
        let filled = (self.progress / 100.0 * BAR_WIDTH as f64).round() as usize;
        let bar: String = (0..BAR_WIDTH).map(|i| if i < filled { '#' } else { '-' }).collect();
        let marker = if self.seeking { " (seeking)" } else { "" };
        format!("{} [{}] {} / {}{}", self.status, bar, self.elapsed, self.total, marker)
    }
}

impl fmt::Display for RenderModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Room {}", self.room_id)?;
        writeln!(f, "Now: {}", self.title)?;
        if let Some(placeholder) = &self.placeholder {
            writeln!(f, "  {}", placeholder)?;
        }
        writeln!(f, "{}", self.status_line())?;

        if self.queue.is_empty() {
            writeln!(f, "Queue is empty")?;
        } else {
            writeln!(f, "Queue:")?;
            for line in &self.queue {
                writeln!(f, "  {}. {} ({})", line.number, line.title, line.duration)?;
            }
        }

        if let Some(updated) = &self.updated {
            writeln!(f, "Updated {}", updated)?;
        }
        if let Some(notice) = &self.notice {
            writeln!(f, "! {}", notice)?;
        }
        Ok(())
    }
}
