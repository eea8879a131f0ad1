//! Player capability abstraction for WatchRoom
//!
//! The sync engine never talks to a media widget directly. It drives a
//! [`PlayerAdapter`], which is either a [`SupportedProvider`] wrapping a real
//! widget or an [`UnsupportedPlaceholder`] that only carries a message.

mod loader;
#[cfg(unix)]
pub mod mpv;
mod placeholder;
mod provider;
mod worker;

pub use loader::ApiLoader;
pub use placeholder::{PlaceholderReason, UnsupportedPlaceholder};
pub use provider::SupportedProvider;

use crate::room::VideoId;
use crate::utils::error::{Result, WatchRoomError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Capabilities the sync engine relies on
pub trait PlayerAdapter: Send {
    /// Which variant this is
    fn kind(&self) -> AdapterKind;

    /// Widget health, for rendering
    fn status(&self) -> &WidgetStatus;

    /// Load or cue `id` at `start`.
    ///
    /// Returns `Ok(false)` when `id` is already the loaded track; the
    /// widget is not touched in that case.
    fn load(&mut self, id: &VideoId, start: f64, autoplay: bool) -> Result<bool>;

    /// Play or pause the loaded media. Idempotent, never reloads.
    fn set_playing(&mut self, playing: bool) -> Result<()>;

    /// Seek to `target` only if the widget is more than `tolerance` away.
    ///
    /// The check runs off the engine loop; a failed seek comes back as
    /// [`WidgetEvent::CommandFailed`].
    fn correct_if_drifted(&mut self, target: f64, tolerance: f64) -> Result<()>;

    /// Ask the widget for its position.
    ///
    /// The answer arrives later as [`WidgetEvent::Position`]. Returns false
    /// when there is nothing to ask.
    fn request_position(&mut self) -> bool;

    /// Whether a position tagged with `epoch` still describes the loaded media
    fn accept_position(&self, epoch: u64) -> bool;

    /// The widget finished loading the current media
    fn on_ready(&mut self);

    /// The widget failed to load; non-fatal
    fn on_load_error(&mut self, message: &str);

    /// Stop using the loaded media (the adapter is being deselected)
    fn release(&mut self);
}

/// Adapter variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    SupportedProvider,
    UnsupportedPlaceholder,
}

/// Widget lifecycle as seen by the adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetStatus {
    /// Nothing loaded
    Idle,

    /// Widget being created or media loading
    Loading,

    /// Media loaded and controllable
    Ready,

    /// Creation or load failed
    Failed(String),
}

/// External, capability-limited media widget
///
/// Mirrors what an embeddable player typically offers: load (autoplay),
/// cue (paused), play, pause, absolute seek and a position query.
pub trait MediaWidget: Send {
    fn load_video(&mut self, id: &VideoId, start: f64) -> Result<()>;

    fn cue_video(&mut self, id: &VideoId, start: f64) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn seek_to(&mut self, position: f64) -> Result<()>;

    fn current_time(&mut self) -> Result<f64>;
}

/// Notifications flowing from a widget back into the engine
pub enum WidgetEvent {
    /// Asynchronous widget creation finished
    Attached(Box<dyn MediaWidget>),

    /// Media finished loading
    Ready,

    /// Creation or media load failed
    LoadError(String),

    /// A play, pause or seek call failed
    CommandFailed(String),

    /// Answer to [`PlayerAdapter::request_position`]
    Position { epoch: u64, position: f64 },
}

impl fmt::Debug for WidgetEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidgetEvent::Attached(_) => f.write_str("Attached(..)"),
            WidgetEvent::Ready => f.write_str("Ready"),
            WidgetEvent::LoadError(msg) => f.debug_tuple("LoadError").field(msg).finish(),
            WidgetEvent::CommandFailed(msg) => f.debug_tuple("CommandFailed").field(msg).finish(),
            WidgetEvent::Position { epoch, position } => f
                .debug_struct("Position")
                .field("epoch", epoch)
                .field("position", position)
                .finish(),
        }
    }
}

/// Where widget events are delivered
#[derive(Clone)]
pub struct WidgetEventSink(Arc<dyn Fn(WidgetEvent) + Send + Sync>);

impl WidgetEventSink {
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(WidgetEvent) + Send + Sync + 'static,
    {
        Self(Arc::new(deliver))
    }

    pub fn emit(&self, event: WidgetEvent) {
        (self.0)(event);
    }
}

/// Creates widgets on demand
#[async_trait]
pub trait WidgetFactory: Send + Sync {
    async fn create(&self, events: WidgetEventSink) -> Result<Box<dyn MediaWidget>>;
}

/// Factory used when no widget backend is available
pub struct NoWidgetFactory;

#[async_trait]
impl WidgetFactory for NoWidgetFactory {
    async fn create(&self, _events: WidgetEventSink) -> Result<Box<dyn MediaWidget>> {
        Err(WatchRoomError::widget_error("media widget disabled"))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording widget shared by the adapter and engine tests

    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum WidgetCall {
        Load(String, f64),
        Cue(String, f64),
        Play,
        Pause,
        Seek(f64),
    }

    #[derive(Default)]
    pub struct WidgetLog {
        pub calls: Vec<WidgetCall>,
        pub position: f64,
        pub fail_next: bool,
        /// Loads block on this until its sender is dropped
        pub stall: Option<crossbeam_channel::Receiver<()>>,
    }

    impl WidgetLog {
        pub fn loads(&self) -> usize {
            self.calls
                .iter()
                .filter(|c| matches!(c, WidgetCall::Load(..) | WidgetCall::Cue(..)))
                .count()
        }

        pub fn seeks(&self) -> Vec<f64> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    WidgetCall::Seek(p) => Some(*p),
                    _ => None,
                })
                .collect()
        }
    }

    pub struct RecordingWidget {
        pub log: Arc<Mutex<WidgetLog>>,
    }

    impl RecordingWidget {
        fn record(&mut self, call: WidgetCall) -> Result<()> {
            if matches!(call, WidgetCall::Load(..) | WidgetCall::Cue(..)) {
                let stall = self.log.lock().stall.clone();
                if let Some(gate) = stall {
                    let _ = gate.recv();
                }
            }

            let mut log = self.log.lock();
            if log.fail_next {
                log.fail_next = false;
                return Err(WatchRoomError::widget_error("scripted failure"));
            }
            match &call {
                WidgetCall::Load(_, start) | WidgetCall::Cue(_, start) => log.position = *start,
                WidgetCall::Seek(pos) => log.position = *pos,
                _ => {}
            }
            log.calls.push(call);
            Ok(())
        }
    }

    impl MediaWidget for RecordingWidget {
        fn load_video(&mut self, id: &VideoId, start: f64) -> Result<()> {
            self.record(WidgetCall::Load(id.to_string(), start))
        }

        fn cue_video(&mut self, id: &VideoId, start: f64) -> Result<()> {
            self.record(WidgetCall::Cue(id.to_string(), start))
        }

        fn play(&mut self) -> Result<()> {
            self.record(WidgetCall::Play)
        }

        fn pause(&mut self) -> Result<()> {
            self.record(WidgetCall::Pause)
        }

        fn seek_to(&mut self, position: f64) -> Result<()> {
            self.record(WidgetCall::Seek(position))
        }

        fn current_time(&mut self) -> Result<f64> {
            Ok(self.log.lock().position)
        }
    }

    /// Hands out recording widgets sharing one log
    #[derive(Default)]
    pub struct RecordingFactory {
        pub log: Arc<Mutex<WidgetLog>>,
    }

    #[async_trait]
    impl WidgetFactory for RecordingFactory {
        async fn create(&self, _events: WidgetEventSink) -> Result<Box<dyn MediaWidget>> {
            Ok(Box::new(RecordingWidget { log: Arc::clone(&self.log) }))
        }
    }
}
