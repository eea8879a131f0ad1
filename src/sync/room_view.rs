//! Lifecycle of one entered room
//!
//! Entering a room wires the push hub, engine loop and command dispatcher
//! together. Leaving disposes the push subscription once and shuts the
//! engine down, after which nothing from the old room reaches the player.

use crate::player::WidgetFactory;
use crate::room::{PushHub, RoomCommand, RoomService, RoomState, Subscription, ROOM_STATE_EVENT};
use crate::sync::{CommandDispatcher, EngineEvent, EngineSender, EngineView, PointerEvent, SyncEngine};
use crate::utils::config::SyncConfig;
use crate::utils::error::{Result, WatchRoomError};
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub struct RoomView {
    events: EngineSender,
    views: watch::Receiver<EngineView>,
    subscription: Option<Subscription>,
    engine: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl RoomView {
    /// Start syncing against a room, beginning with its initial snapshot
    pub fn enter(
        config: SyncConfig,
        factory: Arc<dyn WidgetFactory>,
        service: Arc<dyn RoomService>,
        hub: &PushHub,
        initial: RoomState,
    ) -> Self {
        info!("Entering room {}", initial.id);

        let (outbox, commands) = mpsc::unbounded_channel();
        let (engine, receiver) = SyncEngine::new(config, factory, outbox);
        let events = engine.sender();

        // Initial snapshot goes first so it is never overtaken by a push
        let _ = events.send(EngineEvent::Snapshot(initial));

        let push_events = events.clone();
        let subscription = hub.subscribe(ROOM_STATE_EVENT, move |state| {
            let _ = push_events.send(EngineEvent::Snapshot(state.clone()));
        });

        let (views_tx, views) = watch::channel(EngineView::default());
        let engine = tokio::spawn(engine.run(receiver, views_tx));
        let dispatcher = CommandDispatcher::new(service, events.clone()).spawn(commands);

        Self {
            events,
            views,
            subscription: Some(subscription),
            engine,
            dispatcher,
        }
    }

    /// Latest published view, updated after every engine event
    pub fn views(&self) -> watch::Receiver<EngineView> {
        self.views.clone()
    }

    pub fn command(&self, command: RoomCommand) -> Result<()> {
        self.send(EngineEvent::Command(command))
    }

    pub fn pointer(&self, pointer: PointerEvent) -> Result<()> {
        self.send(EngineEvent::Pointer(pointer))
    }

    pub fn notice<S: Into<String>>(&self, message: S) -> Result<()> {
        self.send(EngineEvent::Notice(message.into()))
    }

    fn send(&self, event: EngineEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| WatchRoomError::Internal("sync engine has stopped".to_string()))
    }

    /// Leave the room and wait for the engine to wind down
    pub async fn leave(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.dispose();
        }

        let _ = self.events.send(EngineEvent::Shutdown);
        if let Err(e) = (&mut self.engine).await {
            debug!("Engine task ended abnormally: {}", e);
        }
        self.dispatcher.abort();
        info!("Left room");
    }
}

impl Drop for RoomView {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.dispose();
            let _ = self.events.send(EngineEvent::Shutdown);
        }
    }
}
