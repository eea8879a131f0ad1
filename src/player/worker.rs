//! Dedicated thread owning a media widget
//!
//! Widget calls may block on IPC round trips. They run here, in order, and
//! whatever the engine needs back (positions, failures) comes home as a
//! [`WidgetEvent`].

use crate::player::{MediaWidget, WidgetEvent, WidgetEventSink};
use crate::room::VideoId;
use crate::utils::error::{Result, WatchRoomError};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, warn};
use std::thread;
use std::time::Duration;

/// Work queued for the widget thread
#[derive(Debug)]
pub(crate) enum WidgetRequest {
    Load { id: VideoId, start: f64, autoplay: bool },
    SetPlaying(bool),
    CorrectIfDrifted { target: f64, tolerance: f64 },
    ReportPosition { epoch: u64 },
    Flush(Sender<()>),
}

pub(crate) struct WidgetWorker {
    requests: Sender<WidgetRequest>,
}

impl WidgetWorker {
    /// Move `widget` onto its own thread; the thread ends when the worker drops
    pub fn spawn(widget: Box<dyn MediaWidget>, events: WidgetEventSink) -> Result<Self> {
        let (requests, rx) = unbounded();
        thread::Builder::new()
            .name("media-widget".to_string())
            .spawn(move || run(widget, rx, events))?;
        Ok(Self { requests })
    }

    pub fn send(&self, request: WidgetRequest) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| WatchRoomError::widget_error("widget thread has stopped"))
    }

    /// Block until every request queued so far has run
    pub fn flush(&self, timeout: Duration) -> bool {
        let (done_tx, done_rx) = bounded(1);
        if self.send(WidgetRequest::Flush(done_tx)).is_err() {
            return false;
        }
        done_rx.recv_timeout(timeout).is_ok()
    }
}

fn run(mut widget: Box<dyn MediaWidget>, requests: Receiver<WidgetRequest>, events: WidgetEventSink) {
    for request in requests.iter() {
        match request {
            WidgetRequest::Load { id, start, autoplay } => {
                let loaded = if autoplay {
                    widget.load_video(&id, start)
                } else {
                    widget.cue_video(&id, start)
                };
                if let Err(e) = loaded {
                    events.emit(WidgetEvent::LoadError(e.to_string()));
                }
            }
            WidgetRequest::SetPlaying(playing) => {
                let applied = if playing { widget.play() } else { widget.pause() };
                if let Err(e) = applied {
                    events.emit(WidgetEvent::CommandFailed(format!("play/pause: {}", e)));
                }
            }
            WidgetRequest::CorrectIfDrifted { target, tolerance } => match widget.current_time() {
                Ok(current) if (current - target).abs() > tolerance => {
                    debug!("Widget at {:.2}s, seeking to {:.2}s", current, target);
                    if let Err(e) = widget.seek_to(target) {
                        events.emit(WidgetEvent::CommandFailed(format!("seek: {}", e)));
                    }
                }
                Ok(_) => {}
                Err(e) => debug!("Skipping drift check: {}", e),
            },
            WidgetRequest::ReportPosition { epoch } => match widget.current_time() {
                Ok(position) => events.emit(WidgetEvent::Position { epoch, position }),
                Err(e) => debug!("Widget position unavailable: {}", e),
            },
            WidgetRequest::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    // Leave the media paused for whoever owns the widget next
    if let Err(e) = widget.pause() {
        warn!("Could not pause widget on shutdown: {}", e);
    }
    debug!("Widget thread terminated");
}
