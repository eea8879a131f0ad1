//! Line-oriented user input

use crate::utils::error::{Result, WatchRoomError};

/// What a typed line asks for
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    TogglePlayPause,
    Next,
    Search(String),
    /// Queue search result n (1-based)
    Add(usize),
    /// Remove queue entry n (1-based)
    Remove(usize),
    /// Scrub to a percentage of the track
    Seek(f64),
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  p              play / pause
  n              next track
  s <query>      search videos
  a <n>          add search result n to the queue
  d <n>          remove queue entry n
  seek <pct>     jump to pct% of the track
  show           redraw the room
  q              quit";

/// Parse one input line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<UserAction>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    let action = match command {
        "p" | "pause" | "play" => UserAction::TogglePlayPause,
        "n" | "next" => UserAction::Next,
        "s" | "search" => {
            if rest.is_empty() {
                return Err(WatchRoomError::InvalidInput("search needs a query".to_string()));
            }
            UserAction::Search(rest.to_string())
        }
        "a" | "add" => UserAction::Add(parse_number(rest)?),
        "d" | "del" | "delete" => UserAction::Remove(parse_number(rest)?),
        "seek" => UserAction::Seek(parse_percent(rest)?),
        "show" | "r" => UserAction::Show,
        "h" | "help" | "?" => UserAction::Help,
        "q" | "quit" | "exit" => UserAction::Quit,
        other => return Err(WatchRoomError::InvalidInput(format!("unknown command '{}'", other))),
    };

    Ok(Some(action))
}

fn parse_number(text: &str) -> Result<usize> {
    match text.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(WatchRoomError::InvalidInput(format!("expected a number from 1, got '{}'", text))),
    }
}

fn parse_percent(text: &str) -> Result<f64> {
    let text = text.trim_end_matches('%');
    match text.parse::<f64>() {
        Ok(pct) if pct.is_finite() => Ok(pct),
        _ => Err(WatchRoomError::InvalidInput(format!("expected a percentage, got '{}'", text))),
    }
}
