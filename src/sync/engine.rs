//! The sync engine event loop
//!
//! [`SyncEngine`] owns every piece of client playback state: the stored
//! snapshot, the local view, the scrub gesture, both timers and the player
//! adapters. It is driven one [`EngineEvent`] at a time, either through
//! [`SyncEngine::run`] or directly through [`SyncEngine::handle`] in tests.

use crate::player::{
    AdapterKind, PlaceholderReason, PlayerAdapter, SupportedProvider, UnsupportedPlaceholder, WidgetEvent,
    WidgetEventSink, WidgetFactory, WidgetStatus,
};
use crate::room::{RoomCommand, RoomId, RoomState, Video};
use crate::sync::reconciler::{self, Reconciler, Reconciliation};
use crate::sync::seek::SeekController;
use crate::sync::store::StateStore;
use crate::sync::ticker::{PeriodicTimer, PositionTicker};
use crate::sync::{EngineEvent, EngineReceiver, EngineSender, LocalPlaybackView, PointerEvent};
use crate::utils::config::SyncConfig;
use crate::utils::error::WatchRoomError;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Everything a front-end needs to draw the room
#[derive(Debug, Clone, PartialEq)]
pub struct EngineView {
    pub room_id: Option<RoomId>,
    pub current: Option<Video>,
    pub queue: Vec<Video>,
    pub playing: bool,
    pub updated_at: Option<DateTime<Utc>>,
    pub playback: LocalPlaybackView,
    pub adapter: AdapterKind,
    pub widget_status: WidgetStatus,
    pub placeholder: Option<&'static str>,
    pub notice: Option<String>,
}

impl Default for EngineView {
    fn default() -> Self {
        Self {
            room_id: None,
            current: None,
            queue: Vec::new(),
            playing: false,
            updated_at: None,
            playback: LocalPlaybackView::default(),
            adapter: AdapterKind::UnsupportedPlaceholder,
            widget_status: WidgetStatus::Idle,
            placeholder: Some("Nothing is playing"),
            notice: None,
        }
    }
}

pub struct SyncEngine {
    config: SyncConfig,
    store: StateStore,
    view: LocalPlaybackView,
    reconciler: Reconciler,
    seek: SeekController,
    ticker: PositionTicker,
    correction: PeriodicTimer,
    provider: SupportedProvider,
    placeholder: UnsupportedPlaceholder,
    active: AdapterKind,
    events: EngineSender,
    outbox: mpsc::UnboundedSender<RoomCommand>,
    notice: Option<String>,
    running: bool,
}

impl SyncEngine {
    /// Build an engine and the receiver its loop consumes
    ///
    /// Seeks and other user commands are forwarded to `outbox`.
    pub fn new(
        config: SyncConfig,
        factory: Arc<dyn WidgetFactory>,
        outbox: mpsc::UnboundedSender<RoomCommand>,
    ) -> (Self, EngineReceiver) {
        let (events, receiver) = mpsc::unbounded_channel();

        let widget_events = events.clone();
        let sink = WidgetEventSink::new(move |event| {
            let _ = widget_events.send(EngineEvent::Widget(event));
        });

        let engine = Self {
            reconciler: Reconciler::new(config.reconcile_threshold),
            ticker: PositionTicker::new(config.tick_interval()),
            correction: PeriodicTimer::correction(config.correction_interval()),
            config,
            store: StateStore::new(),
            view: LocalPlaybackView::default(),
            seek: SeekController::new(),
            provider: SupportedProvider::new(factory, sink),
            placeholder: UnsupportedPlaceholder::new(),
            active: AdapterKind::UnsupportedPlaceholder,
            events,
            outbox,
            notice: None,
            running: true,
        };

        (engine, receiver)
    }

    /// Sender for feeding events into this engine
    pub fn sender(&self) -> EngineSender {
        self.events.clone()
    }

    pub fn view(&self) -> &LocalPlaybackView {
        &self.view
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn active_kind(&self) -> AdapterKind {
        self.active
    }

    pub fn provider(&self) -> &SupportedProvider {
        &self.provider
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_running()
    }

    pub fn is_correcting(&self) -> bool {
        self.correction.is_running()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Drive the engine until shutdown, publishing a view after every event
    pub async fn run(mut self, mut events: EngineReceiver, views: watch::Sender<EngineView>) {
        info!("Sync engine started");
        views.send_replace(self.render());

        while let Some(event) = events.recv().await {
            if !self.handle(event) {
                break;
            }
            views.send_if_modified(|current| {
                let next = self.render();
                if *current == next {
                    false
                } else {
                    *current = next;
                    true
                }
            });
        }

        self.shutdown();
        info!("Sync engine stopped");
    }

    /// Process one event; returns false once the engine is shut down
    pub fn handle(&mut self, event: EngineEvent) -> bool {
        if !self.running {
            return false;
        }

        match event {
            EngineEvent::Snapshot(snapshot) => self.ingest(snapshot),
            EngineEvent::Tick { generation } => {
                self.ticker.on_tick(generation, &mut self.view);
            }
            EngineEvent::CorrectionTick { generation } => {
                if self.correction.accept(generation) {
                    self.adapter_mut().request_position();
                }
            }
            EngineEvent::Pointer(pointer) => self.pointer(pointer),
            EngineEvent::Widget(event) => self.widget_event(event),
            EngineEvent::Command(command) => self.dispatch(command),
            EngineEvent::Notice(message) => self.notice = Some(message),
            EngineEvent::Shutdown => {
                self.shutdown();
                return false;
            }
        }
        true
    }

    /// Stop timers, drop any gesture and release the widget
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;

        self.ticker.stop();
        self.correction.stop();
        self.seek.cancel();
        self.view.seeking = false;
        self.provider.release();
        self.store.clear();
        debug!("Sync engine shut down");
    }

    /// Snapshot of what should be on screen
    pub fn render(&self) -> EngineView {
        EngineView {
            room_id: self.store.room_id().cloned(),
            current: self.store.current().cloned(),
            queue: self.store.queue().to_vec(),
            playing: self.store.playing(),
            updated_at: self.store.updated_at(),
            playback: self.view,
            adapter: self.active,
            widget_status: self.adapter().status().clone(),
            placeholder: match self.active {
                AdapterKind::UnsupportedPlaceholder => Some(self.placeholder.message()),
                AdapterKind::SupportedProvider => None,
            },
            notice: self.notice.clone(),
        }
    }

    fn adapter(&self) -> &dyn PlayerAdapter {
        match self.active {
            AdapterKind::SupportedProvider => &self.provider,
            AdapterKind::UnsupportedPlaceholder => &self.placeholder,
        }
    }

    fn adapter_mut(&mut self) -> &mut dyn PlayerAdapter {
        match self.active {
            AdapterKind::SupportedProvider => &mut self.provider,
            AdapterKind::UnsupportedPlaceholder => &mut self.placeholder,
        }
    }

    fn ingest(&mut self, snapshot: RoomState) {
        let previous = self.store.ingest(snapshot.clone());
        let outcome = self.reconciler.reconcile(previous.as_ref(), &snapshot, &mut self.view);
        debug!("Snapshot reconciled: {:?}", outcome);

        match outcome {
            Reconciliation::TrackChanged => {
                if self.seek.cancel() {
                    info!("Track changed during scrub, gesture dropped");
                }
                self.view.seeking = false;
                self.select_adapter(&snapshot);
                self.refresh_timers(true);
            }
            _ => {
                self.sync_adapter(previous.as_ref(), &snapshot);
                self.refresh_timers(false);
            }
        }
    }

    /// Pick the adapter for a new track and hand it the track
    fn select_adapter(&mut self, snapshot: &RoomState) {
        let Some(video) = snapshot.current.as_ref() else {
            self.use_placeholder(PlaceholderReason::NothingPlaying);
            return;
        };

        let Some(id) = video.video_id() else {
            info!("No player for {}", video.url);
            self.use_placeholder(PlaceholderReason::Unsupported);
            return;
        };

        self.active = AdapterKind::SupportedProvider;
        let start = self.view.display_position;
        match self.provider.load(&id, start, snapshot.playing) {
            Ok(true) => info!("Loading \"{}\" at {:.2}s", video.title, start),
            // Same media under another URL; only align it
            Ok(false) => {
                self.sync_adapter(None, snapshot);
            }
            Err(e) => self.widget_failure("load", e),
        }
    }

    fn use_placeholder(&mut self, reason: PlaceholderReason) {
        if self.active == AdapterKind::SupportedProvider {
            self.provider.release();
        }
        self.active = AdapterKind::UnsupportedPlaceholder;
        self.placeholder.set_reason(reason);
    }

    /// Push a same-track snapshot's play state and position to the adapter
    ///
    /// Each is only pushed when it changed from the previous snapshot.
    fn sync_adapter(&mut self, previous: Option<&RoomState>, snapshot: &RoomState) {
        if previous.map(|p| p.playing) != Some(snapshot.playing) {
            let playing = snapshot.playing;
            if let Err(e) = self.adapter_mut().set_playing(playing) {
                self.widget_failure("play/pause", e);
            }
        }

        if previous.map(|p| p.position) != Some(snapshot.position) {
            let tolerance = self.config.seek_tolerance;
            if let Err(e) = self.adapter_mut().correct_if_drifted(snapshot.position, tolerance) {
                self.widget_failure("seek", e);
            }
        }
    }

    /// Apply a widget position report if it still belongs to the live loop
    fn correct_from_widget(&mut self, epoch: u64, position: f64) {
        if !self.correction.is_running() || !self.adapter().accept_position(epoch) {
            return;
        }
        if reconciler::apply_widget_position(&mut self.view, position, self.config.correction_threshold) {
            debug!("Display corrected to widget position {:.2}s", position);
        }
    }

    /// Start or stop the timers to match the current state
    fn refresh_timers(&mut self, restart: bool) {
        let should_tick = self.store.playing() && self.store.current().is_some() && !self.view.seeking;
        self.ticker.ensure(should_tick, restart, &self.events);

        let should_correct = should_tick && self.active == AdapterKind::SupportedProvider;
        self.correction.ensure(should_correct, restart, &self.events);
    }

    fn pointer(&mut self, pointer: PointerEvent) {
        match pointer {
            PointerEvent::Down { x, timeline } => {
                let duration = self.store.current().map(Video::duration_seconds);
                if let Some(scrub) = self.seek.pointer_down(x, timeline, duration) {
                    self.view.seeking = true;
                    self.view.display_position = scrub;
                }
            }
            PointerEvent::Move { x } => {
                if let Some(scrub) = self.seek.pointer_move(x) {
                    self.view.display_position = scrub;
                }
            }
            PointerEvent::Up { x } => {
                if let Some(target) = self.seek.pointer_up(x) {
                    self.view.seeking = false;
                    self.view.display_position = target;
                    info!("Seeking room to {:.2}s", target);
                    self.dispatch(RoomCommand::Seek(target));
                }
            }
        }
        self.refresh_timers(false);
    }

    fn widget_event(&mut self, event: WidgetEvent) {
        match event {
            WidgetEvent::Attached(widget) => self.provider.attach(widget),
            WidgetEvent::Ready => self.provider.on_ready(),
            WidgetEvent::LoadError(message) => {
                self.provider.on_load_error(&message);
                self.notice = Some(format!("Player error: {}", message));
            }
            WidgetEvent::CommandFailed(message) => {
                warn!("Widget call failed: {}", message);
                self.notice = Some(format!("Player error: {}", message));
            }
            WidgetEvent::Position { epoch, position } => self.correct_from_widget(epoch, position),
        }
    }

    fn dispatch(&mut self, command: RoomCommand) {
        if self.outbox.send(command).is_err() {
            warn!("Command dispatcher is gone, dropping command");
            self.notice = Some("Not connected to the room".to_string());
        }
    }

    fn widget_failure(&mut self, action: &str, error: WatchRoomError) {
        warn!("Widget {} failed: {}", action, error);
        self.notice = Some(format!("Player error: {}", error));
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
