//! Forwards engine commands to the room service
//!
//! Commands run one after another off the engine loop. A failure never
//! touches local state; it is logged and turned into a user notice, and
//! the room's next snapshot remains the only source of truth.

use crate::room::{RoomCommand, RoomService};
use crate::sync::{EngineEvent, EngineSender};
use crate::utils::error::Result;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct CommandDispatcher {
    service: Arc<dyn RoomService>,
    notices: EngineSender,
}

impl CommandDispatcher {
    pub fn new(service: Arc<dyn RoomService>, notices: EngineSender) -> Self {
        Self { service, notices }
    }

    /// Run on a background task until the command channel closes
    pub fn spawn(self, commands: mpsc::UnboundedReceiver<RoomCommand>) -> JoinHandle<()> {
        tokio::spawn(self.run(commands))
    }

    pub async fn run(self, mut commands: mpsc::UnboundedReceiver<RoomCommand>) {
        while let Some(command) = commands.recv().await {
            let label = describe(&command);
            if let Err(e) = self.execute(command).await {
                warn!("{} failed: {}", label, e);
                let _ = self.notices.send(EngineEvent::Notice(format!("{} failed: {}", label, e)));
            }
        }
        debug!("Command dispatcher terminated");
    }

    pub async fn execute(&self, command: RoomCommand) -> Result<()> {
        match command {
            RoomCommand::AddToQueue(video) => {
                info!("Queueing \"{}\"", video.title);
                self.service.add_to_queue(&video).await
            }
            RoomCommand::RemoveFromQueue(index) => self.service.remove_from_queue(index).await,
            RoomCommand::TogglePlayPause => self.service.toggle_play_pause().await,
            RoomCommand::SkipNext => self.service.skip_next().await,
            RoomCommand::Seek(position) => self.service.seek(position).await,
        }
    }
}

fn describe(command: &RoomCommand) -> &'static str {
    match command {
        RoomCommand::AddToQueue(_) => "Adding to queue",
        RoomCommand::RemoveFromQueue(_) => "Removing from queue",
        RoomCommand::TogglePlayPause => "Play/pause",
        RoomCommand::SkipNext => "Skipping",
        RoomCommand::Seek(_) => "Seek",
    }
}
