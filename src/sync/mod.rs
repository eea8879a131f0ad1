//! Playback synchronization engine
//!
//! Everything the client does to keep its player aligned with the room runs
//! on one event loop ([`SyncEngine`]). Snapshots, timer ticks, pointer input,
//! widget notifications and user commands all arrive as [`EngineEvent`]s, so
//! no two of them ever interleave.

pub mod dispatcher;
pub mod engine;
pub mod reconciler;
pub mod room_view;
pub mod seek;
pub mod store;
pub mod ticker;

pub use dispatcher::CommandDispatcher;
pub use engine::{EngineView, SyncEngine};
pub use reconciler::{Reconciler, Reconciliation};
pub use room_view::RoomView;
pub use seek::SeekController;
pub use store::StateStore;
pub use ticker::{PeriodicTimer, PositionTicker, ScheduledTask};

use crate::player::WidgetEvent;
use crate::room::{RoomCommand, RoomState};
use tokio::sync::mpsc;

/// Channel feeding the engine
pub type EngineSender = mpsc::UnboundedSender<EngineEvent>;

/// Receiving side of [`EngineSender`]
pub type EngineReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Inputs of the engine loop
#[derive(Debug)]
pub enum EngineEvent {
    /// A room snapshot from the push channel
    Snapshot(RoomState),

    /// Position ticker fired
    Tick { generation: u64 },

    /// Widget correction timer fired
    CorrectionTick { generation: u64 },

    /// Timeline pointer input
    Pointer(PointerEvent),

    /// Media widget notification
    Widget(WidgetEvent),

    /// User command for the room service
    Command(RoomCommand),

    /// Message to show the user
    Notice(String),

    /// Tear the engine down
    Shutdown,
}

/// Client-local playback view, never sent to the service
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LocalPlaybackView {
    /// Position shown to the user, in seconds
    pub display_position: f64,

    /// A scrub gesture is in progress
    pub seeking: bool,
}

/// Horizontal extent of the rendered timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeline {
    pub left: f64,
    pub width: f64,
}

impl Timeline {
    pub fn new(left: f64, width: f64) -> Self {
        Self { left, width }
    }

    /// Fraction of the timeline at `x`, clamped to [0, 1]
    pub fn ratio(&self, x: f64) -> f64 {
        if self.width <= 0.0 {
            return 0.0;
        }
        ((x - self.left) / self.width).clamp(0.0, 1.0)
    }
}

/// Pointer input on the timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down { x: f64, timeline: Timeline },
    Move { x: f64 },
    Up { x: f64 },
}
