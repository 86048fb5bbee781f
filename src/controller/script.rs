// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Reads input events from a text stream, one per line:
//!
//! ```text
//! # comments and blank lines are ignored
//! down a
//! up a
//! down escape
//! quit
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::{info, span, warn, Level};

use super::{InputEvent, Key};

const DOWN: &str = "down";
const UP: &str = "up";
const QUIT: &str = "quit";
const ESCAPE: &str = "escape";
const SPACE: &str = "space";

/// Why a script line couldn't be understood.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command {0}")]
    UnknownCommand(String),

    #[error("{0} needs a key")]
    MissingKey(String),

    #[error("unrecognized key {0}")]
    UnknownKey(String),

    #[error("unexpected text after command: {0}")]
    TrailingInput(String),
}

/// Parses a single line. Returns None for blank lines and comments.
pub fn parse_line(line: &str) -> Result<Option<InputEvent>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default().to_lowercase();
    let event = match command.as_str() {
        QUIT => InputEvent::Quit,
        DOWN | UP => {
            let key = parts
                .next()
                .ok_or_else(|| ParseError::MissingKey(command.clone()))
                .and_then(parse_key)?;
            if command == DOWN {
                InputEvent::KeyDown(key)
            } else {
                InputEvent::KeyUp(key)
            }
        }
        _ => return Err(ParseError::UnknownCommand(command)),
    };

    let rest: Vec<&str> = parts.collect();
    if !rest.is_empty() {
        return Err(ParseError::TrailingInput(rest.join(" ")));
    }
    Ok(Some(event))
}

fn parse_key(token: &str) -> Result<Key, ParseError> {
    let lower = token.to_lowercase();
    if lower == ESCAPE || lower == "esc" {
        return Ok(Key::Escape);
    }
    if lower == SPACE {
        return Ok(Key::from(' '));
    }

    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Key::from(c)),
        _ => Err(ParseError::UnknownKey(token.to_string())),
    }
}

/// Where the script is read from.
#[derive(Debug, Clone)]
pub enum ScriptSource {
    Stdin,
    File(PathBuf),
}

impl ScriptSource {
    /// `-` selects standard input, anything else is a file path.
    pub fn from_arg(arg: &str) -> ScriptSource {
        if arg == "-" {
            ScriptSource::Stdin
        } else {
            ScriptSource::File(PathBuf::from(arg))
        }
    }
}

/// Replays an event script.
pub struct Driver {
    source: ScriptSource,
}

impl Driver {
    pub fn new(source: ScriptSource) -> Driver {
        Driver { source }
    }

    /// Sends every event in the reader. Lines that don't parse are logged and
    /// skipped.
    fn monitor_io<R: BufRead>(events_tx: &Sender<InputEvent>, reader: R) -> Result<(), io::Error> {
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            match parse_line(&line) {
                Ok(Some(event)) => {
                    if events_tx.send(event).is_err() {
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(line = number + 1, err = %e, "Skipping script line"),
            }
        }
        Ok(())
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<InputEvent>) -> JoinHandle<Result<(), io::Error>> {
        let source = self.source.clone();
        thread::spawn(move || {
            let span = span!(Level::INFO, "script driver");
            let _enter = span.enter();

            info!(source = ?source, "Script driver started.");
            let result = match source {
                ScriptSource::Stdin => Self::monitor_io(&events_tx, io::stdin().lock()),
                ScriptSource::File(path) => {
                    Self::monitor_io(&events_tx, BufReader::new(File::open(path)?))
                }
            };
            info!("Script finished.");
            result
        })
    }
}
