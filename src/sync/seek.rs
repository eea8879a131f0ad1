//! Timeline scrub gesture
//!
//! While the pointer is down the display follows it without talking to the
//! room. Releasing it issues exactly one seek.

use crate::sync::Timeline;
use log::debug;

/// Gesture state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekState {
    Idle,
    Dragging {
        timeline: Timeline,
        duration: f64,
        scrub: f64,
    },
}

#[derive(Debug)]
pub struct SeekController {
    state: SeekState,
}

impl SeekController {
    pub fn new() -> Self {
        Self { state: SeekState::Idle }
    }

    pub fn state(&self) -> SeekState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, SeekState::Dragging { .. })
    }

    /// Start a gesture; returns the preview position
    ///
    /// Nothing happens without a track of positive duration or with a
    /// collapsed timeline.
    pub fn pointer_down(&mut self, x: f64, timeline: Timeline, duration: Option<f64>) -> Option<f64> {
        let duration = duration.filter(|d| *d > 0.0)?;
        if timeline.width <= 0.0 {
            return None;
        }

        let scrub = timeline.ratio(x) * duration;
        debug!("Scrub started at {:.2}s", scrub);
        self.state = SeekState::Dragging { timeline, duration, scrub };
        Some(scrub)
    }

    /// Follow the pointer; returns the new preview position
    pub fn pointer_move(&mut self, x: f64) -> Option<f64> {
        match &mut self.state {
            SeekState::Dragging { timeline, duration, scrub } => {
                *scrub = timeline.ratio(x) * *duration;
                Some(*scrub)
            }
            SeekState::Idle => None,
        }
    }

    /// End the gesture; returns the position to seek to
    pub fn pointer_up(&mut self, x: f64) -> Option<f64> {
        match self.state {
            SeekState::Dragging { timeline, duration, .. } => {
                self.state = SeekState::Idle;
                let target = timeline.ratio(x) * duration;
                debug!("Scrub released at {:.2}s", target);
                Some(target)
            }
            SeekState::Idle => None,
        }
    }

    /// Abandon the gesture without seeking
    pub fn cancel(&mut self) -> bool {
        let was_dragging = self.is_dragging();
        self.state = SeekState::Idle;
        was_dragging
    }
}

impl Default for SeekController {
    fn default() -> Self {
        Self::new()
    }
}
