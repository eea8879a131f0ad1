//! Adapter driving a real media widget
//!
//! The widget is created lazily on the first load and arrives later through
//! [`WidgetEvent::Attached`](crate::player::WidgetEvent). A load requested in
//! the meantime is parked and applied on attach, at the latest known start
//! position. Once attached, the widget lives on its own thread and every
//! call to it is queued there, so nothing here waits on the widget.

use crate::player::worker::{WidgetRequest, WidgetWorker};
use crate::player::{AdapterKind, MediaWidget, PlayerAdapter, WidgetEvent, WidgetEventSink, WidgetFactory, WidgetStatus};
use crate::room::VideoId;
use crate::utils::error::Result;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Load waiting for the widget
#[derive(Debug, Clone)]
struct PendingLoad {
    id: VideoId,
    start: f64,
}

pub struct SupportedProvider {
    factory: Arc<dyn WidgetFactory>,
    events: WidgetEventSink,
    worker: Option<WidgetWorker>,
    creating: bool,
    loaded: Option<VideoId>,
    pending: Option<PendingLoad>,

    /// Bumped on every load and release; tags position reports
    epoch: u64,

    /// Play state the room wants
    desired_playing: bool,

    /// Play state last pushed to the widget
    applied_playing: Option<bool>,

    status: WidgetStatus,
}

impl SupportedProvider {
    pub fn new(factory: Arc<dyn WidgetFactory>, events: WidgetEventSink) -> Self {
        Self {
            factory,
            events,
            worker: None,
            creating: false,
            loaded: None,
            pending: None,
            epoch: 0,
            desired_playing: false,
            applied_playing: None,
            status: WidgetStatus::Idle,
        }
    }

    /// Track currently loaded (or parked) in the widget
    pub fn loaded(&self) -> Option<&VideoId> {
        self.loaded.as_ref()
    }

    pub fn has_widget(&self) -> bool {
        self.worker.is_some()
    }

    /// Wait until every widget call queued so far has run.
    ///
    /// Returns false on timeout or when there is no widget.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.worker.as_ref().is_some_and(|worker| worker.flush(timeout))
    }

    /// Take ownership of a freshly created widget
    pub fn attach(&mut self, widget: Box<dyn MediaWidget>) {
        self.creating = false;
        self.applied_playing = None;

        match WidgetWorker::spawn(widget, self.events.clone()) {
            Ok(worker) => {
                info!("Media widget attached");
                self.worker = Some(worker);
            }
            Err(e) => {
                self.pending = None;
                self.loaded = None;
                self.fail(&e.to_string());
                return;
            }
        }

        match self.pending.take() {
            Some(pending) => {
                if let Err(e) = self.apply_load(&pending.id, pending.start) {
                    self.fail(&e.to_string());
                }
            }
            None => self.status = WidgetStatus::Idle,
        }
    }

    fn spawn_widget(&mut self) {
        if self.creating {
            return;
        }
        self.creating = true;

        debug!("Creating media widget");
        let factory = Arc::clone(&self.factory);
        let events = self.events.clone();
        tokio::spawn(async move {
            match factory.create(events.clone()).await {
                Ok(widget) => events.emit(WidgetEvent::Attached(widget)),
                Err(e) => events.emit(WidgetEvent::LoadError(e.to_string())),
            }
        });
    }

    fn apply_load(&mut self, id: &VideoId, start: f64) -> Result<()> {
        let Some(worker) = self.worker.as_ref() else {
            return Ok(());
        };

        self.status = WidgetStatus::Loading;
        worker.send(WidgetRequest::Load {
            id: id.clone(),
            start,
            autoplay: self.desired_playing,
        })?;
        self.applied_playing = Some(self.desired_playing);
        Ok(())
    }

    fn fail(&mut self, message: &str) {
        error!("Media widget failure: {}", message);
        self.status = WidgetStatus::Failed(message.to_string());
    }
}

impl PlayerAdapter for SupportedProvider {
    fn kind(&self) -> AdapterKind {
        AdapterKind::SupportedProvider
    }

    fn status(&self) -> &WidgetStatus {
        &self.status
    }

    fn load(&mut self, id: &VideoId, start: f64, autoplay: bool) -> Result<bool> {
        if self.loaded.as_ref() == Some(id) {
            return Ok(false);
        }

        self.loaded = Some(id.clone());
        self.desired_playing = autoplay;
        self.epoch += 1;

        if self.worker.is_some() {
            if let Err(e) = self.apply_load(id, start) {
                self.fail(&e.to_string());
                return Err(e);
            }
        } else {
            self.status = WidgetStatus::Loading;
            self.pending = Some(PendingLoad { id: id.clone(), start });
            self.spawn_widget();
        }
        Ok(true)
    }

    fn set_playing(&mut self, playing: bool) -> Result<()> {
        self.desired_playing = playing;
        if self.applied_playing == Some(playing) {
            return Ok(());
        }

        let Some(worker) = self.worker.as_ref() else {
            return Ok(());
        };
        if self.loaded.is_none() {
            return Ok(());
        }

        worker.send(WidgetRequest::SetPlaying(playing))?;
        self.applied_playing = Some(playing);
        Ok(())
    }

    fn correct_if_drifted(&mut self, target: f64, tolerance: f64) -> Result<()> {
        if let Some(pending) = self.pending.as_mut() {
            pending.start = target.max(0.0);
            return Ok(());
        }

        match (self.worker.as_ref(), self.loaded.is_some()) {
            (Some(worker), true) => worker.send(WidgetRequest::CorrectIfDrifted { target, tolerance }),
            _ => Ok(()),
        }
    }

    fn request_position(&mut self) -> bool {
        match (self.worker.as_ref(), self.loaded.is_some()) {
            (Some(worker), true) => worker.send(WidgetRequest::ReportPosition { epoch: self.epoch }).is_ok(),
            _ => false,
        }
    }

    fn accept_position(&self, epoch: u64) -> bool {
        self.loaded.is_some() && epoch == self.epoch
    }

    fn on_ready(&mut self) {
        if self.status == WidgetStatus::Ready {
            return;
        }
        self.status = WidgetStatus::Ready;

        // The widget may have started in the wrong state if play/pause
        // changed while it was loading
        let desired = self.desired_playing;
        self.applied_playing = None;
        if let Err(e) = self.set_playing(desired) {
            warn!("Could not apply play state after load: {}", e);
        }
    }

    fn on_load_error(&mut self, message: &str) {
        if self.worker.is_none() {
            self.creating = false;
            self.pending = None;
            self.loaded = None;
        }
        self.fail(message);
    }

    fn release(&mut self) {
        if let Some(worker) = self.worker.as_ref() {
            if self.applied_playing == Some(true) {
                match worker.send(WidgetRequest::SetPlaying(false)) {
                    Ok(()) => self.applied_playing = Some(false),
                    Err(e) => warn!("Failed to pause released widget: {}", e),
                }
            }
        }

        self.loaded = None;
        self.pending = None;
        self.epoch += 1;
        self.desired_playing = false;
        self.status = WidgetStatus::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::testing::{RecordingFactory, RecordingWidget, WidgetCall, WidgetLog};
    use crate::player::NoWidgetFactory;
    use crate::room::extract_video_id;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    const FLUSH: Duration = Duration::from_secs(2);

    fn video(id: &str) -> VideoId {
        extract_video_id(&format!("https://youtu.be/{}", id)).unwrap()
    }

    fn attached() -> (SupportedProvider, Arc<Mutex<WidgetLog>>, mpsc::UnboundedReceiver<WidgetEvent>) {
        let log = Arc::new(Mutex::new(WidgetLog::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        let mut provider = SupportedProvider::new(
            Arc::new(NoWidgetFactory),
            WidgetEventSink::new(move |event| {
                let _ = tx.send(event);
            }),
        );
        provider.attach(Box::new(RecordingWidget { log: Arc::clone(&log) }));
        (provider, log, rx)
    }

    #[test]
    fn test_load_once_per_track() {
        let (mut provider, log, _events) = attached();
        let id = video("dQw4w9WgXcQ");

        assert!(provider.load(&id, 5.0, true).unwrap());
        assert!(!provider.load(&id, 9.0, true).unwrap());
        assert!(!provider.load(&id, 0.0, false).unwrap());
        assert!(provider.flush(FLUSH));

        assert_eq!(log.lock().loads(), 1);
        assert_eq!(log.lock().calls[0], WidgetCall::Load("dQw4w9WgXcQ".to_string(), 5.0));
    }

    #[test]
    fn test_paused_room_cues() {
        let (mut provider, log, _events) = attached();
        provider.load(&video("dQw4w9WgXcQ"), 12.0, false).unwrap();
        assert!(provider.flush(FLUSH));
        assert_eq!(log.lock().calls, vec![WidgetCall::Cue("dQw4w9WgXcQ".to_string(), 12.0)]);
    }

    #[test]
    fn test_set_playing_is_idempotent() {
        let (mut provider, log, _events) = attached();
        provider.load(&video("dQw4w9WgXcQ"), 0.0, false).unwrap();

        provider.set_playing(false).unwrap();
        provider.set_playing(true).unwrap();
        provider.set_playing(true).unwrap();
        provider.set_playing(false).unwrap();
        assert!(provider.flush(FLUSH));

        let calls = log.lock().calls.clone();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1], WidgetCall::Play);
        assert_eq!(calls[2], WidgetCall::Pause);
        assert_eq!(log.lock().loads(), 1);
    }

    #[test]
    fn test_correct_if_drifted_respects_tolerance() {
        let (mut provider, log, _events) = attached();
        provider.load(&video("dQw4w9WgXcQ"), 10.0, true).unwrap();

        provider.correct_if_drifted(10.2, 0.3).unwrap();
        provider.correct_if_drifted(10.5, 0.3).unwrap();
        assert!(provider.flush(FLUSH));
        assert_eq!(log.lock().seeks(), vec![10.5]);
    }

    #[tokio::test]
    async fn test_widget_failure_marks_status() {
        let (mut provider, log, mut events) = attached();
        log.lock().fail_next = true;

        provider.load(&video("dQw4w9WgXcQ"), 0.0, true).unwrap();
        match events.recv().await {
            Some(WidgetEvent::LoadError(msg)) => provider.on_load_error(&msg),
            other => panic!("Expected load error, got {:?}", other),
        }
        assert!(matches!(provider.status(), WidgetStatus::Failed(_)));
    }

    #[test]
    fn test_ready_reapplies_play_state() {
        let (mut provider, log, _events) = attached();
        provider.load(&video("dQw4w9WgXcQ"), 0.0, true).unwrap();
        provider.on_ready();
        assert!(provider.flush(FLUSH));

        assert_eq!(provider.status(), &WidgetStatus::Ready);
        assert_eq!(log.lock().calls.last(), Some(&WidgetCall::Play));
    }

    #[test]
    fn test_release_pauses_and_forgets_track() {
        let (mut provider, log, _events) = attached();
        let id = video("dQw4w9WgXcQ");
        provider.load(&id, 0.0, true).unwrap();

        provider.release();
        assert!(provider.flush(FLUSH));
        assert_eq!(log.lock().calls.last(), Some(&WidgetCall::Pause));
        assert!(provider.loaded().is_none());

        // Selecting the track again reloads it
        assert!(provider.load(&id, 30.0, true).unwrap());
        assert!(provider.flush(FLUSH));
        assert_eq!(log.lock().loads(), 2);
    }

    #[tokio::test]
    async fn test_position_reports_are_tagged_per_load() {
        let (mut provider, log, mut events) = attached();
        assert!(!provider.request_position());

        provider.load(&video("dQw4w9WgXcQ"), 0.0, true).unwrap();
        log.lock().position = 42.0;
        assert!(provider.request_position());

        let epoch = match events.recv().await {
            Some(WidgetEvent::Position { epoch, position }) => {
                assert_eq!(position, 42.0);
                epoch
            }
            other => panic!("Expected position, got {:?}", other),
        };
        assert!(provider.accept_position(epoch));

        // A report that was in flight across a track change is stale
        provider.load(&video("9bZkp7q19f0"), 0.0, true).unwrap();
        assert!(!provider.accept_position(epoch));
    }

    #[tokio::test]
    async fn test_lazy_widget_applies_parked_load() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let factory = RecordingFactory::default();
        let log = Arc::clone(&factory.log);
        let mut provider = SupportedProvider::new(
            Arc::new(factory),
            WidgetEventSink::new(move |event| {
                let _ = tx.send(event);
            }),
        );

        let id = video("dQw4w9WgXcQ");
        assert!(provider.load(&id, 3.0, true).unwrap());
        assert!(!provider.has_widget());
        assert_eq!(provider.status(), &WidgetStatus::Loading);

        // Position updates while the widget is still being created
        provider.correct_if_drifted(7.5, 0.3).unwrap();

        match rx.recv().await {
            Some(WidgetEvent::Attached(widget)) => provider.attach(widget),
            other => panic!("Expected attach, got {:?}", other),
        }

        assert!(provider.flush(FLUSH));
        assert_eq!(log.lock().calls, vec![WidgetCall::Load("dQw4w9WgXcQ".to_string(), 7.5)]);
    }

    #[tokio::test]
    async fn test_creation_failure_allows_retry() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut provider = SupportedProvider::new(
            Arc::new(NoWidgetFactory),
            WidgetEventSink::new(move |event| {
                let _ = tx.send(event);
            }),
        );

        let id = video("dQw4w9WgXcQ");
        provider.load(&id, 0.0, true).unwrap();

        match rx.recv().await {
            Some(WidgetEvent::LoadError(msg)) => provider.on_load_error(&msg),
            other => panic!("Expected load error, got {:?}", other),
        }
        assert!(matches!(provider.status(), WidgetStatus::Failed(_)));
        assert!(provider.loaded().is_none());

        assert!(provider.load(&id, 0.0, true).unwrap());
    }
}
