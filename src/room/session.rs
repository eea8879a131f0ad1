//! Live room session: push channel plus command sink
//!
//! A session owns the WebSocket of one room. Its reader task publishes each
//! snapshot through the [`PushHub`] and remembers the latest one, which the
//! commands consult the same way the service expects a client to (play vs
//! pause, seek without a track, auto-start after the first enqueue).

use crate::room::{ControlMessage, PushHub, RoomClient, RoomId, RoomState, Video, ROOM_STATE_EVENT};
use crate::utils::error::{Result, WatchRoomError};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Command sink of the room service, as seen by the sync engine
#[async_trait]
pub trait RoomService: Send + Sync {
    async fn add_to_queue(&self, video: &Video) -> Result<()>;

    async fn remove_from_queue(&self, index: usize) -> Result<()>;

    /// Pause when the latest snapshot is playing, play otherwise
    async fn toggle_play_pause(&self) -> Result<()>;

    async fn skip_next(&self) -> Result<()>;

    async fn seek(&self, position: f64) -> Result<()>;

    /// Results in the service's relevance order
    async fn search_videos(&self, query: &str) -> Result<Vec<Video>>;
}

/// Connection to one room
pub struct RoomSession {
    client: RoomClient,
    room_id: RoomId,
    latest: Arc<RwLock<RoomState>>,
    hub: PushHub,
    outgoing: mpsc::UnboundedSender<Message>,
    connected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    // Ends on its own once the Close frame is flushed or the sender drops
    _writer: JoinHandle<()>,
}

impl RoomSession {
    /// Dial the room's push channel and wait for the initial snapshot
    ///
    /// To switch rooms use [`reconnect`](Self::reconnect), which closes this
    /// session before dialing the next one.
    pub async fn connect(client: RoomClient, room_id: RoomId) -> Result<(Self, RoomState)> {
        let url = client.push_url(&room_id)?;
        info!("Connecting to room {} at {}", room_id, url);

        let (ws_stream, _) = tokio::time::timeout(client.config().connect_timeout(), connect_async(url.as_str()))
            .await
            .map_err(|_| WatchRoomError::Timeout(format!("dialing {}", url)))??;

        let (write, mut read) = ws_stream.split();

        let initial = tokio::time::timeout(client.config().first_state_timeout(), read_snapshot(&mut read))
            .await
            .map_err(|_| WatchRoomError::Timeout("waiting for the initial room state".to_string()))??;

        info!(
            "Joined room {}: {} queued, current {:?}",
            room_id,
            initial.queue.len(),
            initial.current.as_ref().map(|v| v.title.as_str())
        );

        let latest = Arc::new(RwLock::new(initial.clone()));
        let hub = PushHub::new();
        let connected = Arc::new(AtomicBool::new(true));
        let (outgoing, rx) = mpsc::unbounded_channel();

        let _writer = tokio::spawn(writer_task(write, rx, Arc::clone(&connected)));
        let reader = tokio::spawn(reader_task(read, Arc::clone(&latest), hub.clone(), Arc::clone(&connected)));

        let session = Self {
            client,
            room_id,
            latest,
            hub,
            outgoing,
            connected,
            reader,
            _writer,
        };

        Ok((session, initial))
    }

    /// Close this session, then join `room_id` with the same client
    pub async fn reconnect(self, room_id: RoomId) -> Result<(Self, RoomState)> {
        self.close();
        let client = self.client.clone();
        drop(self);
        Self::connect(client, room_id).await
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Hub delivering every snapshot after the initial one
    pub fn push(&self) -> &PushHub {
        &self.hub
    }

    pub fn latest(&self) -> RoomState {
        self.latest.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Close the socket and stop the background tasks
    pub fn close(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            let _ = self.outgoing.send(Message::Close(None));
            info!("Leaving room {}", self.room_id);
        }
        self.reader.abort();
    }

    fn send_control(&self, message: ControlMessage) -> Result<()> {
        if !self.is_connected() {
            return Err(WatchRoomError::NotConnected);
        }

        let text = serde_json::to_string(&message)?;
        debug!("Sending control message {}", text);
        self.outgoing
            .send(Message::Text(text))
            .map_err(|_| WatchRoomError::NotConnected)
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl RoomService for RoomSession {
    async fn add_to_queue(&self, video: &Video) -> Result<()> {
        self.client.add_to_queue(&self.room_id, video).await?;

        // An idle room does not start on its own
        let idle = self.latest.read().current.is_none();
        if idle {
            self.skip_next().await?;
        }
        Ok(())
    }

    async fn remove_from_queue(&self, index: usize) -> Result<()> {
        self.client.remove_from_queue(&self.room_id, index).await
    }

    async fn toggle_play_pause(&self) -> Result<()> {
        let playing = self.latest.read().playing;
        let message = if playing { ControlMessage::pause() } else { ControlMessage::play() };
        self.send_control(message)
    }

    async fn skip_next(&self) -> Result<()> {
        self.send_control(ControlMessage::next())
    }

    async fn seek(&self, position: f64) -> Result<()> {
        let has_track = self.latest.read().current.is_some();
        if !has_track {
            return Ok(());
        }
        self.client.seek(&self.room_id, position).await
    }

    async fn search_videos(&self, query: &str) -> Result<Vec<Video>> {
        self.client.search_videos(query).await
    }
}

/// Read frames until the first snapshot
async fn read_snapshot(read: &mut SplitStream<WsStream>) -> Result<RoomState> {
    while let Some(frame) = read.next().await {
        match frame? {
            Message::Text(text) => return Ok(serde_json::from_str(&text)?),
            Message::Close(_) => break,
            _ => {}
        }
    }
    Err(WatchRoomError::WebSocket("connection closed before the initial room state".to_string()))
}

async fn reader_task(
    mut read: SplitStream<WsStream>,
    latest: Arc<RwLock<RoomState>>,
    hub: PushHub,
    connected: Arc<AtomicBool>,
) {
    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<RoomState>(&text) {
                Ok(state) => {
                    *latest.write() = state.clone();
                    hub.publish(ROOM_STATE_EVENT, &state);
                }
                Err(e) => warn!("Skipping malformed room state: {}", e),
            },
            Ok(Message::Close(_)) => {
                info!("Room socket closed by server");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!("Room socket error: {}", e);
                break;
            }
        }
    }

    connected.store(false, Ordering::Release);
    debug!("Room reader terminated");
}

async fn writer_task(
    mut write: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    connected: Arc<AtomicBool>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = write.send(msg).await {
            error!("Failed to send on room socket: {}", e);
            connected.store(false, Ordering::Release);
            break;
        }
        if closing {
            break;
        }
    }

    debug!("Room writer terminated");
}
