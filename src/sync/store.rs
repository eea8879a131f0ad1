//! Holder of the latest authoritative room snapshot

use crate::room::{RoomId, RoomState, Video};
use chrono::{DateTime, Utc};

/// Last snapshot received for the current room
///
/// Snapshots are whole-state replacements; nothing is merged.
#[derive(Debug, Default)]
pub struct StateStore {
    snapshot: Option<RoomState>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored snapshot, returning the previous one
    pub fn ingest(&mut self, snapshot: RoomState) -> Option<RoomState> {
        self.snapshot.replace(snapshot)
    }

    pub fn snapshot(&self) -> Option<&RoomState> {
        self.snapshot.as_ref()
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.snapshot.as_ref().map(|s| &s.id)
    }

    pub fn current(&self) -> Option<&Video> {
        self.snapshot.as_ref()?.current.as_ref()
    }

    /// Upcoming tracks, empty before the first snapshot
    pub fn queue(&self) -> &[Video] {
        self.snapshot.as_ref().map(|s| s.queue.as_slice()).unwrap_or(&[])
    }

    pub fn playing(&self) -> bool {
        self.snapshot.as_ref().is_some_and(|s| s.playing)
    }

    /// Authoritative position of the last snapshot, zero before one arrives
    pub fn position(&self) -> f64 {
        self.snapshot.as_ref().map_or(0.0, |s| s.position)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.as_ref()?.updated_at
    }

    /// Duration of the current track in seconds, zero without one
    pub fn duration(&self) -> f64 {
        self.current().map_or(0.0, Video::duration_seconds)
    }

    /// Forget the room (leaving it)
    pub fn clear(&mut self) {
        self.snapshot = None;
    }
}
