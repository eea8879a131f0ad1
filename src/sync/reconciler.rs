//! Snapshot reconciliation
//!
//! Decides how the client's displayed position reacts to a new authoritative
//! snapshot. The local ticker is trusted for small differences; large ones
//! snap to the room.

use crate::room::RoomState;
use crate::sync::LocalPlaybackView;
use log::debug;

/// Default display drift, in seconds, beyond which a snapshot wins
pub const RECONCILE_THRESHOLD: f64 = 2.5;

/// Default drift, in seconds, beyond which the widget's own clock wins
pub const CORRECTION_THRESHOLD: f64 = 1.0;

/// What a snapshot did to the local view
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reconciliation {
    /// Current track identity changed; display reset to the snapshot
    TrackChanged,

    /// Same track, display snapped to the snapshot
    Snapped { drift: f64 },

    /// Same track, local display kept
    Kept { drift: f64 },

    /// A scrub is in progress; display untouched
    Deferred,
}

pub struct Reconciler {
    threshold: f64,
}

impl Reconciler {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Apply `snapshot` to `view`, given the snapshot it replaces
    pub fn reconcile(
        &self,
        previous: Option<&RoomState>,
        snapshot: &RoomState,
        view: &mut LocalPlaybackView,
    ) -> Reconciliation {
        if track_changed(previous, snapshot) {
            view.display_position = if snapshot.current.is_some() {
                snapshot.position.max(0.0)
            } else {
                0.0
            };
            return Reconciliation::TrackChanged;
        }

        if view.seeking {
            return Reconciliation::Deferred;
        }

        let drift = (snapshot.position - view.display_position).abs();
        if drift > self.threshold {
            debug!(
                "Display at {:.2}s drifted {:.2}s from room, snapping",
                view.display_position, drift
            );
            view.display_position = snapshot.position;
            Reconciliation::Snapped { drift }
        } else {
            Reconciliation::Kept { drift }
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(RECONCILE_THRESHOLD)
    }
}

/// Whether the current track's identity differs between two snapshots
///
/// Identity is the track URL; going from no track to a track (or back)
/// counts as a change.
pub fn track_changed(previous: Option<&RoomState>, next: &RoomState) -> bool {
    previous.and_then(RoomState::current_url) != next.current_url()
}

/// Let the widget's reported position override the display
///
/// Returns whether the display was moved.
pub fn apply_widget_position(view: &mut LocalPlaybackView, widget_position: f64, threshold: f64) -> bool {
    if view.seeking || (widget_position - view.display_position).abs() <= threshold {
        return false;
    }
    view.display_position = widget_position;
    true
}
