//! Line commands typed at the prompt

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Record a user interaction explicitly
    Gesture,
    /// Open the audio device
    Activate,
    /// List output devices
    Devices,
    /// Add an audio file to the library
    Add(PathBuf),
    /// List the library
    View,
    /// Play the library track at this position
    Select(usize),
    /// Toggle play/pause
    Play,
    Set { path: String, value: f32 },
    Reset,
    Effects,
    State,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  gesture              record a user interaction
  activate             open the audio device
  devices              list output devices
  add <path>           add an audio file to the library
  view                 list library tracks
  select <index>       play the track at <index>
  play                 toggle play/pause
  set <path> <value>   change an effect (e.g. set delay.mix 0.3)
  reset                restore default effects
  effects              show effect parameters
  state                show playback state
  quit                 stop and exit";

/// Parse one input line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    let Some((word, rest)) = split_word(line) else {
        return Ok(None);
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "gesture" => Command::Gesture,
        "activate" => Command::Activate,
        "devices" => Command::Devices,
        "add" => {
            if rest.is_empty() {
                bail!("usage: add <path>");
            }
            Command::Add(PathBuf::from(rest))
        }
        "view" | "ls" => Command::View,
        "select" => {
            let index = rest
                .parse()
                .with_context(|| format!("select: {:?} is not a track index", rest))?;
            Command::Select(index)
        }
        "play" | "pause" => Command::Play,
        "set" => {
            let (path, value) = split_word(rest).ok_or_else(|| anyhow!("usage: set <path> <value>"))?;
            let value: f32 = value
                .parse()
                .with_context(|| format!("set: {:?} is not a number", value))?;
            Command::Set {
                path: path.to_string(),
                value,
            }
        }
        "reset" => Command::Reset,
        "effects" | "fx" => Command::Effects,
        "state" | "status" => Command::State,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => bail!("unknown command {:?} (type help)", other),
    };
    Ok(Some(command))
}

fn split_word(s: &str) -> Option<(&str, &str)> {
    if s.is_empty() {
        return None;
    }
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim())),
        None => Some((s, "")),
    }
}
