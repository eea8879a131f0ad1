//! WatchRoom: keeps a local player in step with a shared watch room
//!
//! The room service is authoritative. This crate receives its snapshots,
//! estimates the playback position between them and drives a media widget
//! to match.

pub mod player;
pub mod room;
pub mod sync;
pub mod ui;
pub mod utils;
