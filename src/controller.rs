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
use std::fmt;
use std::io;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::keymap::KeyIdentifier;

pub mod keyboard;
pub mod script;

/// A key as seen by the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A printable key, normalized to lowercase.
    Char(KeyIdentifier),

    /// The exit key.
    Escape,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(key) => write!(f, "{}", key),
            Key::Escape => f.write_str("escape"),
        }
    }
}

impl From<char> for Key {
    fn from(c: char) -> Self {
        Key::Char(KeyIdentifier::new(c))
    }
}

/// Input events that drive the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// A key was pressed, or is being repeated while held.
    KeyDown(Key),

    /// A key was released.
    KeyUp(Key),

    /// Stop playing and exit.
    Quit,
}

/// Produces input events on its own thread.
pub trait Driver: Send + Sync + 'static {
    /// Starts sending events. The thread exits once the source is exhausted or
    /// the receiving side hangs up.
    fn monitor_events(&self, events_tx: Sender<InputEvent>) -> JoinHandle<Result<(), io::Error>>;
}

/// Starts the driver and returns the receiving end of its events.
pub fn spawn(driver: &dyn Driver) -> (Receiver<InputEvent>, JoinHandle<Result<(), io::Error>>) {
    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let handle = driver.monitor_events(events_tx);
    (events_rx, handle)
}
