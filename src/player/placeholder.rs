//! Adapter for tracks no widget can play

use crate::player::{AdapterKind, PlayerAdapter, WidgetStatus};
use crate::room::VideoId;
use crate::utils::error::Result;

/// Why the placeholder is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderReason {
    NothingPlaying,
    Unsupported,
}

/// Renders a message and ignores every playback request
pub struct UnsupportedPlaceholder {
    reason: PlaceholderReason,
    status: WidgetStatus,
}

impl UnsupportedPlaceholder {
    pub fn new() -> Self {
        Self {
            reason: PlaceholderReason::NothingPlaying,
            status: WidgetStatus::Idle,
        }
    }

    pub fn set_reason(&mut self, reason: PlaceholderReason) {
        self.reason = reason;
    }

    pub fn reason(&self) -> PlaceholderReason {
        self.reason
    }

    pub fn message(&self) -> &'static str {
        match self.reason {
            PlaceholderReason::NothingPlaying => "Nothing is playing",
            PlaceholderReason::Unsupported => "Video is not supported by this player",
        }
    }
}

impl Default for UnsupportedPlaceholder {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerAdapter for UnsupportedPlaceholder {
    fn kind(&self) -> AdapterKind {
        AdapterKind::UnsupportedPlaceholder
    }

    fn status(&self) -> &WidgetStatus {
        &self.status
    }

    fn load(&mut self, _id: &VideoId, _start: f64, _autoplay: bool) -> Result<bool> {
        Ok(false)
    }

    fn set_playing(&mut self, _playing: bool) -> Result<()> {
        Ok(())
    }

    fn correct_if_drifted(&mut self, _target: f64, _tolerance: f64) -> Result<()> {
        Ok(())
    }

    fn request_position(&mut self) -> bool {
        false
    }

    fn accept_position(&self, _epoch: u64) -> bool {
        false
    }

    fn on_ready(&mut self) {}

    fn on_load_error(&mut self, _message: &str) {}

    fn release(&mut self) {}
}
