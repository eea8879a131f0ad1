//! End-to-end scenarios for the sync engine
//!
//! These tests drive a real room view (engine loop, dispatcher and push
//! subscription) with scripted snapshots, a scripted widget and a mocked
//! room service:
//! - Position estimation between snapshots
//! - Track changes and widget loading
//! - Scrub gestures and seek commands
//! - Error notices and teardown

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use watchroom::player::AdapterKind;
use watchroom::room::{PushHub, RoomCommand, ROOM_STATE_EVENT};
use watchroom::sync::{EngineView, PointerEvent, RoomView, Timeline};
use watchroom::utils::{SyncConfig, WatchRoomError};
use watchroom_integration_tests::{
    settle, Call, MockService, ScriptedFactory, SnapshotBuilder, WidgetRecord, OTHER_URL, SONG_URL, VIMEO_URL,
};

fn timeline() -> Timeline {
    Timeline::new(0.0, 100.0)
}

fn enter(service: MockService, hub: &PushHub, initial: SnapshotBuilder) -> (RoomView, Arc<Mutex<WidgetRecord>>) {
    let (factory, record) = ScriptedFactory::new();
    let room = RoomView::enter(SyncConfig::default(), factory, Arc::new(service), hub, initial.build());
    (room, record)
}

async fn current_url(views: &mut watch::Receiver<EngineView>, url: &str) -> EngineView {
    views
        .wait_for(|v| v.current.as_ref().map(|c| c.url.as_str()) == Some(url))
        .await
        .expect("engine running")
        .clone()
}

#[tokio::test(start_paused = true)]
async fn test_position_advances_between_snapshots() {
    let hub = PushHub::new();
    let initial = SnapshotBuilder::new().current(SONG_URL, 212).position(54.0).playing(true);
    let (room, _record) = enter(MockService::new(), &hub, initial);
    let mut views = room.views();

    let view = views
        .wait_for(|v| v.playback.display_position >= 55.0)
        .await
        .unwrap()
        .clone();
    assert!((view.playback.display_position - 55.0).abs() < 1e-9);

    // A snapshot within the threshold does not move the estimate
    let close = SnapshotBuilder::new().current(SONG_URL, 212).position(56.0).playing(true).build();
    hub.publish(ROOM_STATE_EVENT, &close);
    tokio::task::yield_now().await;
    assert!(views.borrow().playback.display_position < 56.0);

    // A far one snaps
    let far = SnapshotBuilder::new().current(SONG_URL, 212).position(150.0).playing(true).build();
    hub.publish(ROOM_STATE_EVENT, &far);
    let view = views
        .wait_for(|v| v.playback.display_position >= 150.0)
        .await
        .unwrap()
        .clone();
    assert!(view.playback.display_position < 151.0);

    room.leave().await;
}

#[tokio::test(start_paused = true)]
async fn test_paused_room_holds_position() {
    let hub = PushHub::new();
    let initial = SnapshotBuilder::new().current(SONG_URL, 212).position(30.0).playing(false);
    let (room, _record) = enter(MockService::new(), &hub, initial);
    let mut views = room.views();

    views.wait_for(|v| v.room_id.is_some()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(views.borrow().playback.display_position, 30.0);
    assert!(!views.borrow().playing);

    room.leave().await;
}

#[tokio::test(start_paused = true)]
async fn test_track_changes_load_each_track_once() {
    let hub = PushHub::new();
    let initial = SnapshotBuilder::new().current(SONG_URL, 212).position(10.0).playing(true);
    let (room, record) = enter(MockService::new(), &hub, initial);
    let mut views = room.views();

    current_url(&mut views, SONG_URL).await;
    assert!(settle(|| record.lock().loads().len() == 1).await);

    // Same track, new position and state: no reload
    for (position, playing) in [(12.0, true), (40.0, false), (40.0, true)] {
        let state = SnapshotBuilder::new().current(SONG_URL, 212).position(position).playing(playing).build();
        hub.publish(ROOM_STATE_EVENT, &state);
    }
    views.wait_for(|v| v.playback.display_position >= 40.0).await.unwrap();
    settle(|| record.lock().calls.contains(&Call::Seek(40.0))).await;
    assert_eq!(record.lock().loads().len(), 1);

    let next = SnapshotBuilder::new().current(OTHER_URL, 253).position(0.0).playing(true).build();
    hub.publish(ROOM_STATE_EVENT, &next);
    let view = current_url(&mut views, OTHER_URL).await;
    assert!(view.playback.display_position < 1.0);
    assert!(settle(|| record.lock().loads().len() == 2).await);

    // Unsupported track: placeholder takes over and the widget is paused
    let clip = SnapshotBuilder::new().current(VIMEO_URL, 60).playing(true).build();
    hub.publish(ROOM_STATE_EVENT, &clip);
    let view = current_url(&mut views, VIMEO_URL).await;
    assert_eq!(view.adapter, AdapterKind::UnsupportedPlaceholder);
    assert_eq!(view.placeholder, Some("Video is not supported by this player"));
    assert!(settle(|| record.lock().calls.last() == Some(&Call::Pause)).await);

    // Coming back to a released track loads it again
    let again = SnapshotBuilder::new().current(SONG_URL, 212).position(5.0).playing(true).build();
    hub.publish(ROOM_STATE_EVENT, &again);
    current_url(&mut views, SONG_URL).await;
    assert!(settle(|| record.lock().loads().len() == 3).await);

    let record = record.lock();
    assert_eq!(record.loads(), vec!["dQw4w9WgXcQ", "9bZkp7q19f0", "dQw4w9WgXcQ"]);
    assert_eq!(record.created, 1);
    drop(record);

    room.leave().await;
}

#[tokio::test(start_paused = true)]
async fn test_scrub_sends_exactly_one_seek() {
    let hub = PushHub::new();
    let seeks = Arc::new(Mutex::new(Vec::new()));

    let mut service = MockService::new();
    let recorded = Arc::clone(&seeks);
    service.expect_seek().times(1).returning(move |position| {
        recorded.lock().push(position);
        Ok(())
    });

    let initial = SnapshotBuilder::new().current(SONG_URL, 200).position(20.0).playing(true);
    let (room, _record) = enter(service, &hub, initial);
    let mut views = room.views();
    current_url(&mut views, SONG_URL).await;

    room.pointer(PointerEvent::Down { x: 25.0, timeline: timeline() }).unwrap();
    views.wait_for(|v| v.playback.seeking).await.unwrap();

    room.pointer(PointerEvent::Move { x: 75.0 }).unwrap();
    let view = views.wait_for(|v| v.playback.display_position == 150.0).await.unwrap().clone();
    assert!(view.playback.seeking);

    // Snapshots during the gesture leave the scrub alone
    let during = SnapshotBuilder::new().current(SONG_URL, 200).position(21.0).playing(true).build();
    hub.publish(ROOM_STATE_EVENT, &during);
    tokio::task::yield_now().await;
    assert_eq!(views.borrow().playback.display_position, 150.0);

    room.pointer(PointerEvent::Up { x: 60.0 }).unwrap();
    views.wait_for(|v| !v.playback.seeking).await.unwrap();
    assert!(settle(|| !seeks.lock().is_empty()).await);

    // Stray release after the gesture is ignored
    room.pointer(PointerEvent::Up { x: 10.0 }).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(*seeks.lock(), vec![120.0]);
    room.leave().await;
}

#[tokio::test(start_paused = true)]
async fn test_command_failure_becomes_notice() {
    let hub = PushHub::new();
    let mut service = MockService::new();
    service
        .expect_skip_next()
        .times(1)
        .returning(|| Err(WatchRoomError::NotConnected));

    let (room, _record) = enter(service, &hub, SnapshotBuilder::new());
    let mut views = room.views();

    room.command(RoomCommand::SkipNext).unwrap();
    let view = views.wait_for(|v| v.notice.is_some()).await.unwrap().clone();
    assert_eq!(view.notice.as_deref(), Some("Skipping failed: ws connection is closed"));

    // Local state is untouched by the failure
    assert!(view.current.is_none());
    assert_eq!(view.playback.display_position, 0.0);

    room.leave().await;
}

#[tokio::test(start_paused = true)]
async fn test_leaving_detaches_from_push() {
    let hub = PushHub::new();
    let initial = SnapshotBuilder::new().current(SONG_URL, 212).playing(true).queued(OTHER_URL, "Next up");
    let (room, _record) = enter(MockService::new(), &hub, initial);
    let mut views = room.views();

    let view = current_url(&mut views, SONG_URL).await;
    assert_eq!(view.queue.len(), 1);
    assert_eq!(hub.subscriber_count(), 1);

    room.leave().await;
    assert_eq!(hub.subscriber_count(), 0);

    let late = SnapshotBuilder::new().current(OTHER_URL, 253).build();
    assert_eq!(hub.publish(ROOM_STATE_EVENT, &late), 0);
}
