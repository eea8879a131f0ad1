//! Engine timers
//!
//! Timers do no work themselves. They post events into the engine loop,
//! tagged with a generation, so a tick that was already queued when its
//! timer got replaced is recognised as stale and dropped.

use crate::sync::{EngineEvent, EngineSender, LocalPlaybackView};
use log::trace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Shared stop flag for a scheduled task
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Repeating background task, cancelled on drop
///
/// Cancellation is cooperative: the task checks its token after each sleep
/// and exits without firing again.
pub struct ScheduledTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Run `fire` every `interval` until cancelled or until it returns false
    pub fn spawn<F>(interval: Duration, mut fire: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if task_token.is_cancelled() || !fire() {
                    break;
                }
            }
        });

        Self { token, handle }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Timer posting a generation-tagged event at a fixed period
pub struct PeriodicTimer {
    name: &'static str,
    interval: Duration,
    generation: u64,
    make_event: fn(u64) -> EngineEvent,
    task: Option<ScheduledTask>,
}

impl PeriodicTimer {
    pub fn new(name: &'static str, interval: Duration, make_event: fn(u64) -> EngineEvent) -> Self {
        Self {
            name,
            interval,
            generation: 0,
            make_event,
            task: None,
        }
    }

    /// Timer driving the widget correction loop
    pub fn correction(interval: Duration) -> Self {
        Self::new("correction", interval, |generation| EngineEvent::CorrectionTick { generation })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a fresh run, cancelling any previous one
    pub fn start(&mut self, events: &EngineSender) {
        self.stop();
        self.generation += 1;

        let generation = self.generation;
        let make_event = self.make_event;
        let events = events.clone();
        trace!("Starting {} timer, generation {}", self.name, generation);
        self.task = Some(ScheduledTask::spawn(self.interval, move || {
            events.send(make_event(generation)).is_ok()
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            trace!("Stopping {} timer, generation {}", self.name, self.generation);
            task.cancel();
        }
    }

    /// Bring the timer in line with whether it should be running
    ///
    /// `restart` forces a fresh run even if one is active.
    pub fn ensure(&mut self, should_run: bool, restart: bool, events: &EngineSender) {
        match (should_run, self.is_running()) {
            (true, true) if restart => self.start(events),
            (true, false) => self.start(events),
            (false, true) => self.stop(),
            _ => {}
        }
    }

    /// Whether a tick with `generation` belongs to the live run
    pub fn accept(&self, generation: u64) -> bool {
        self.is_running() && generation == self.generation
    }
}

/// Advances the displayed position while the room is playing
pub struct PositionTicker {
    timer: PeriodicTimer,
}

impl PositionTicker {
    pub fn new(interval: Duration) -> Self {
        Self {
            timer: PeriodicTimer::new("position", interval, |generation| EngineEvent::Tick { generation }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }

    pub fn generation(&self) -> u64 {
        self.timer.generation()
    }

    pub fn ensure(&mut self, should_run: bool, restart: bool, events: &EngineSender) {
        self.timer.ensure(should_run, restart, events);
    }

    pub fn stop(&mut self) {
        self.timer.stop();
    }

    /// Apply a tick to the view; stale generations are ignored
    pub fn on_tick(&self, generation: u64, view: &mut LocalPlaybackView) -> bool {
        if !self.timer.accept(generation) {
            return false;
        }
        view.display_position += self.timer.interval().as_secs_f64();
        true
    }
}
