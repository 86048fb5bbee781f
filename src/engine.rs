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

//! The playback engine: turns key events into voice commands on the output device.

use std::fmt;
use std::ops::ControlFlow;
use std::path::Path;
use std::time::Duration;

use crossbeam_channel::Receiver;
use tracing::{debug, info, span, warn, Level};

use crate::audio::{Device, VoiceId};
use crate::controller::{InputEvent, Key};
use crate::keymap::{KeyIdentifier, KeyMap};
use crate::samples::SampleLoader;
use crate::scale::NoteName;

mod voice;


pub use voice::VoiceState;
use voice::{VoiceArena, VoiceSlot};

const DEFAULT_FADE_IN: Duration = Duration::from_millis(10);
const DEFAULT_FADE_OUT: Duration = Duration::from_millis(500);

/// Fade lengths applied to every voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub fade_in: Duration,
    pub fade_out: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            fade_in: DEFAULT_FADE_IN,
            fade_out: DEFAULT_FADE_OUT,
        }
    }
}

/// Why the event loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A quit event was received.
    Quit,
    /// The exit key was pressed.
    ExitKey,
    /// The event source hung up.
    SourceClosed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::Quit => "quit",
            StopReason::ExitKey => "exit key",
            StopReason::SourceClosed => "event source closed",
        })
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Number of events consumed, including the one that stopped the loop.
    pub events: usize,
    pub reason: StopReason,
}

/// Plays preloaded note samples in response to key events.
///
/// The engine owns the output device. Every voice is stopped and the device
/// released when the engine is dropped.
pub struct PlaybackEngine {
    device: Box<dyn Device>,
    voices: VoiceArena,
    fade_in_frames: usize,
    fade_out_frames: usize,
    stopped: bool,
}

impl PlaybackEngine {
    /// Preloads the sample of every mapped key that has a file in the folder.
    ///
    /// Keys without a file are skipped silently. Keys whose file can't be read are
    /// skipped with a warning.
    pub fn new(
        device: Box<dyn Device>,
        key_map: &KeyMap,
        folder: &Path,
        loader: &mut SampleLoader,
        settings: EngineSettings,
    ) -> PlaybackEngine {
        let mut slots = Vec::with_capacity(key_map.len());
        for (key, note) in key_map.iter() {
            match loader.load_note(folder, note) {
                Ok(Some(sample)) => slots.push(VoiceSlot {
                    key,
                    note,
                    sample,
                    state: VoiceState {
                        loaded: true,
                        sounding: false,
                    },
                }),
                Ok(None) => debug!(key = %key, note = %note, "Key has no sample, skipping"),
                Err(e) => warn!(key = %key, note = %note, err = %e, "Unable to load sample, skipping key"),
            }
        }

        let format = device.format();
        let engine = PlaybackEngine {
            fade_in_frames: format.frames(settings.fade_in),
            fade_out_frames: format.frames(settings.fade_out),
            voices: VoiceArena::new(slots),
            device,
            stopped: false,
        };
        info!(
            device = %engine.device,
            mapped = key_map.len(),
            loaded = engine.voices.len(),
            memory_kb = loader.total_memory_usage() / 1024,
            fade_in_frames = engine.fade_in_frames,
            fade_out_frames = engine.fade_out_frames,
            "Playback engine ready"
        );
        engine
    }

    /// Applies a single event. Breaks with the reason if the loop should stop.
    pub fn handle_event(&mut self, event: InputEvent) -> ControlFlow<StopReason> {
        match event {
            InputEvent::Quit => return ControlFlow::Break(StopReason::Quit),
            InputEvent::KeyDown(Key::Escape) => return ControlFlow::Break(StopReason::ExitKey),
            InputEvent::KeyDown(Key::Char(key)) => self.key_down(key),
            InputEvent::KeyUp(Key::Char(key)) => self.key_up(key),
            InputEvent::KeyUp(Key::Escape) => {}
        }
        ControlFlow::Continue(())
    }

    /// Consumes events until told to stop or the source closes, then shuts down.
    pub fn run(mut self, events: &Receiver<InputEvent>) -> RunOutcome {
        let span = span!(Level::INFO, "engine");
        let _enter = span.enter();

        info!(keys = self.voices.len(), "Ready to play");
        let mut count = 0;
        let reason = loop {
            let Ok(event) = events.recv() else {
                break StopReason::SourceClosed;
            };
            count += 1;
            if let ControlFlow::Break(reason) = self.handle_event(event) {
                break reason;
            }
        };

        info!(reason = %reason, events = count, "Stopping playback");
        self.shutdown();
        RunOutcome {
            events: count,
            reason,
        }
    }

    /// Silences every voice. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.device.stop_all();
        for slot in self.voices.slots_mut() {
            slot.state.sounding = false;
        }
        self.voices.active.clear();
    }

    /// State of the given key, if it has a loaded sample.
    pub fn voice_state(&self, key: KeyIdentifier) -> Option<VoiceState> {
        self.voices
            .resolve(key)
            .map(|voice| self.voices.slot(voice).state)
    }

    /// The voice and note the key plays, if it has a loaded sample.
    pub fn voice_for(&self, key: KeyIdentifier) -> Option<(VoiceId, NoteName)> {
        self.voices
            .resolve(key)
            .map(|voice| (voice, self.voices.slot(voice).note))
    }

    /// Number of keys with a loaded sample.
    pub fn loaded_keys(&self) -> usize {
        self.voices.len()
    }

    /// Number of keys currently sounding.
    pub fn sounding_keys(&self) -> usize {
        self.voices.active.len()
    }

    fn key_down(&mut self, key: KeyIdentifier) {
        let Some(voice) = self.voices.resolve(key) else {
            return;
        };
        // Held keys repeat; only the first press triggers.
        if !self.voices.active.insert(voice) {
            return;
        }

        let slot = self.voices.slot_mut(voice);
        slot.state.sounding = true;
        debug!(key = %key, note = %slot.note, voice = %voice, "Note on");
        self.device
            .trigger(voice, &slot.sample, self.fade_in_frames);
    }

    fn key_up(&mut self, key: KeyIdentifier) {
        let Some(voice) = self.voices.resolve(key) else {
            return;
        };
        if !self.voices.active.remove(voice) {
            return;
        }

        let slot = self.voices.slot_mut(voice);
        slot.state.sounding = false;
        debug!(key = %key, note = %slot.note, voice = %voice, "Note off");
        self.device.release(voice, self.fade_out_frames);
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("device", &self.device.to_string())
            .field("loaded_keys", &self.voices.len())
            .field("sounding_keys", &self.voices.active.len())
            .field("fade_in_frames", &self.fade_in_frames)
            .field("fade_out_frames", &self.fade_out_frames)
            .finish()
    }
}
