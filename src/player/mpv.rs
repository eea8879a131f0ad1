//! mpv-backed media widget
//!
//! One mpv process is shared by the whole application and driven over its
//! JSON IPC socket. Spawning it is the expensive "API load" and goes through
//! a process-wide [`ApiLoader`]. Each widget opens its own IPC connection;
//! a reader thread routes command replies back to the caller and turns
//! playback events into [`WidgetEvent`]s.
//!
//! Widget calls wait for mpv's reply. The provider only makes them from its
//! widget thread, never from the engine loop.

use crate::player::{ApiLoader, MediaWidget, WidgetEvent, WidgetEventSink, WidgetFactory};
use crate::room::VideoId;
use crate::utils::config::PlayerConfig;
use crate::utils::error::{IntoRoomError, Result, WatchRoomError};
use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Replies slower than this are treated as lost
const REPLY_TIMEOUT: Duration = Duration::from_millis(500);

/// Socket readiness poll period while mpv starts
const STARTUP_POLL: Duration = Duration::from_millis(50);

static MPV_API: Lazy<ApiLoader<MpvProcess>> = Lazy::new(ApiLoader::new);

/// The shared mpv process
pub struct MpvProcess {
    child: Mutex<Option<Child>>,
    socket: PathBuf,
}

impl MpvProcess {
    async fn spawn(config: PlayerConfig) -> Result<Self> {
        let socket = config
            .ipc_socket
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(format!("watchroom-mpv-{}.sock", std::process::id())));

        if socket.exists() {
            std::fs::remove_file(&socket)?;
        }

        info!("Starting {} with IPC socket {:?}", config.mpv_path, socket);
        let child = Command::new(&config.mpv_path)
            .arg("--idle=yes")
            .arg("--force-window=yes")
            .arg("--keep-open=yes")
            .arg("--no-terminal")
            .arg(format!("--input-ipc-server={}", socket.display()))
            .args(&config.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .widget_err(&format!("Failed to start {}", config.mpv_path))?;

        let process = Self {
            child: Mutex::new(Some(child)),
            socket,
        };

        let deadline = Instant::now() + config.ready_timeout();
        while UnixStream::connect(&process.socket).is_err() {
            if Instant::now() >= deadline {
                process.kill();
                return Err(WatchRoomError::Timeout("waiting for the mpv IPC socket".to_string()));
            }
            tokio::time::sleep(STARTUP_POLL).await;
        }

        debug!("mpv IPC socket is up");
        Ok(process)
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    fn kill(&self) {
        if let Some(mut child) = self.child.lock().take() {
            if let Err(e) = child.kill() {
                debug!("mpv already gone: {}", e);
            }
            let _ = child.wait();
        }
        let _ = std::fs::remove_file(&self.socket);
    }
}

/// Stop the shared mpv process, if one was started
pub fn shutdown() {
    if let Some(process) = MPV_API.get() {
        info!("Stopping mpv");
        process.kill();
    }
}

/// Creates [`MpvWidget`]s on top of the shared process
pub struct MpvFactory {
    config: PlayerConfig,
}

impl MpvFactory {
    pub fn new(config: PlayerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl WidgetFactory for MpvFactory {
    async fn create(&self, events: WidgetEventSink) -> Result<Box<dyn MediaWidget>> {
        let config = self.config.clone();
        let process = MPV_API.get_or_load(|| MpvProcess::spawn(config)).await?;
        let widget = MpvWidget::connect(process.socket(), events)?;
        Ok(Box::new(widget))
    }
}

/// One IPC connection to mpv
pub struct MpvWidget {
    stream: UnixStream,
    replies: Receiver<Value>,
    next_request: u64,
}

impl MpvWidget {
    pub fn connect(socket: &Path, events: WidgetEventSink) -> Result<Self> {
        let stream = UnixStream::connect(socket).widget_err("Connecting to mpv")?;
        let reader = stream.try_clone()?;
        let (reply_tx, replies) = unbounded();

        thread::Builder::new()
            .name("mpv-ipc".to_string())
            .spawn(move || {
                for line in BufReader::new(reader).lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("mpv IPC read failed: {}", e);
                            break;
                        }
                    };
                    let message: Value = match serde_json::from_str(&line) {
                        Ok(message) => message,
                        Err(e) => {
                            debug!("Ignoring unparsable mpv line: {}", e);
                            continue;
                        }
                    };

                    if message.get("request_id").is_some() {
                        if reply_tx.send(message).is_err() {
                            break;
                        }
                    } else if let Some(event) = playback_event(&message) {
                        events.emit(event);
                    }
                }

                events.emit(WidgetEvent::LoadError("mpv connection closed".to_string()));
                debug!("mpv IPC reader terminated");
            })?;

        Ok(Self {
            stream,
            replies,
            next_request: 1,
        })
    }

    fn command(&mut self, args: Value) -> Result<Value> {
        let request_id = self.next_request;
        self.next_request += 1;

        let mut line = serde_json::to_vec(&json!({ "command": args, "request_id": request_id }))?;
        line.push(b'\n');
        self.stream.write_all(&line).widget_err("Writing to mpv")?;

        let deadline = Instant::now() + REPLY_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let reply = match self.replies.recv_timeout(remaining) {
                Ok(reply) => reply,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(WatchRoomError::Timeout(format!("mpv reply to {}", args)));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(WatchRoomError::widget_error("mpv connection closed"));
                }
            };

            // Late replies to timed-out requests are dropped here
            if reply.get("request_id").and_then(Value::as_u64) != Some(request_id) {
                continue;
            }

            return match reply.get("error").and_then(Value::as_str) {
                Some("success") => Ok(reply.get("data").cloned().unwrap_or(Value::Null)),
                Some(error) => Err(WatchRoomError::widget_error(format!("mpv rejected {}: {}", args, error))),
                None => Err(WatchRoomError::Protocol("mpv reply without status".to_string())),
            };
        }
    }

    fn open(&mut self, id: &VideoId, start: f64, paused: bool) -> Result<()> {
        self.command(json!(["set_property", "start", format!("{:.3}", start.max(0.0))]))?;
        self.command(json!(["set_property", "pause", paused]))?;
        self.command(json!(["loadfile", id.watch_url(), "replace"]))?;
        Ok(())
    }
}

impl MediaWidget for MpvWidget {
    fn load_video(&mut self, id: &VideoId, start: f64) -> Result<()> {
        self.open(id, start, false)
    }

    fn cue_video(&mut self, id: &VideoId, start: f64) -> Result<()> {
        self.open(id, start, true)
    }

    fn play(&mut self) -> Result<()> {
        self.command(json!(["set_property", "pause", false])).map(|_| ())
    }

    fn pause(&mut self) -> Result<()> {
        self.command(json!(["set_property", "pause", true])).map(|_| ())
    }

    fn seek_to(&mut self, position: f64) -> Result<()> {
        self.command(json!(["seek", position.max(0.0), "absolute"])).map(|_| ())
    }

    fn current_time(&mut self) -> Result<f64> {
        self.command(json!(["get_property", "time-pos"]))?
            .as_f64()
            .ok_or_else(|| WatchRoomError::widget_error("no media position"))
    }
}

/// Map an mpv event message to a widget event
fn playback_event(message: &Value) -> Option<WidgetEvent> {
    match message.get("event")?.as_str()? {
        "file-loaded" => Some(WidgetEvent::Ready),
        "end-file" if message.get("reason").and_then(Value::as_str) == Some("error") => {
            let detail = message
                .get("file_error")
                .and_then(Value::as_str)
                .unwrap_or("playback error");
            Some(WidgetEvent::LoadError(detail.to_string()))
        }
        _ => None,
    }
}
