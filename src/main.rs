use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use watchroom::player::{NoWidgetFactory, WidgetFactory};
use watchroom::room::{RoomClient, RoomId, RoomService, RoomSession};
use watchroom::sync::RoomView;
use watchroom::ui::{Flow, Frontend, RenderModel, HELP};
use watchroom::utils::{load_config, Config, PlayerConfig};

/// WatchRoom - watch videos in sync with a shared room
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Room service base URL
    #[arg(long, value_name = "URL")]
    server: Option<String>,

    /// Configuration file to use instead of the default locations
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Follow the room without starting a media player
    #[arg(long)]
    no_player: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new room and join it
    Create,

    /// Join an existing room
    Join {
        /// Room id
        room: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => load_config()?,
    };
    if let Some(server) = &args.server {
        config.server.base_url = server.clone();
        config.validate()?;
    }

    let log_level = if args.debug { "debug" } else { config.general.log_level.as_str() };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    info!("Starting WatchRoom v{}", env!("CARGO_PKG_VERSION"));

    let client = RoomClient::new(&config.server)?;
    let room_id = match args.command.unwrap_or(Command::Create) {
        Command::Create => {
            let id = client.create_room().await?;
            println!("Created room {}", id);
            id
        }
        Command::Join { room } => RoomId::new(room),
    };

    let (session, initial) = match RoomSession::connect(client, room_id).await {
        Ok(joined) => joined,
        Err(e) => {
            error!("Could not join room: {}", e);
            return Err(e.into());
        }
    };
    let session = Arc::new(session);

    let factory = widget_factory(&config.player, args.no_player);
    let service: Arc<dyn RoomService> = session.clone();
    let room = RoomView::enter(config.sync.clone(), factory, Arc::clone(&service), session.push(), initial);
    let mut views = room.views();
    let mut frontend = Frontend::new(service, room);

    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut status = tokio::time::interval(Duration::from_secs(1));
    let mut last_frame = String::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let (flow, output) = frontend.handle_line(&line).await;
                if let Some(output) = output {
                    println!("{}", output);
                }
                if flow == Flow::Quit {
                    break;
                }
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                // Full redraw only when something besides the clock moved
                let model = RenderModel::from_view(&views.borrow_and_update());
                let frame = frame_key(&model);
                if frame != last_frame {
                    println!("\n{}", model);
                    last_frame = frame;
                }
            }
            _ = status.tick() => {
                let model = RenderModel::from_view(&views.borrow());
                print!("\r{}  ", model.status_line());
                std::io::stdout().flush()?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }

        if !session.is_connected() {
            error!("Lost connection to room {}", session.room_id());
            break;
        }
    }

    frontend.close().await;
    session.close();
    shutdown_widget();
    info!("Shutting down");
    Ok(())
}

/// Everything in the render model except the moving clock
fn frame_key(model: &RenderModel) -> String {
    format!(
        "{}|{}|{}|{:?}|{:?}|{:?}|{:?}",
        model.room_id, model.title, model.status, model.placeholder, model.queue, model.updated, model.notice
    )
}

#[cfg(unix)]
fn widget_factory(config: &PlayerConfig, disabled: bool) -> Arc<dyn WidgetFactory> {
    if disabled {
        return Arc::new(NoWidgetFactory);
    }
    Arc::new(watchroom::player::mpv::MpvFactory::new(config.clone()))
}

#[cfg(not(unix))]
fn widget_factory(_config: &PlayerConfig, _disabled: bool) -> Arc<dyn WidgetFactory> {
    Arc::new(NoWidgetFactory)
}

fn shutdown_widget() {
    #[cfg(unix)]
    watchroom::player::mpv::shutdown();
}
