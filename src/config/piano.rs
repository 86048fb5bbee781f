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
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::audio::Audio;
use super::error::ConfigError;

/// Keys in the order they are bound to the scale, lowest note first.
pub const DEFAULT_KEYBOARD_LAYOUT: &str = "zxcvbasdfgqwert12345nm,./hjkl;yuiop67890";
const DEFAULT_INPUT_SOUND: &str = "input.wav";
const DEFAULT_OUTPUT_FOLDER: &str = "scaled_notes";
const DEFAULT_OCTAVES: u32 = 4;
const DEFAULT_FADE_IN_MS: u64 = 10;
const DEFAULT_FADE_OUT_MS: u64 = 500;

pub const MIN_OCTAVES: u32 = 1;
pub const MAX_OCTAVES: u32 = 10;

/// The top level configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Piano {
    /// Keys bound to the scale positionally.
    keyboard_layout: Option<String>,

    /// The recorded sound every note is derived from.
    input_sound: Option<PathBuf>,

    /// Where the generated notes are written and read back from.
    output_folder: Option<PathBuf>,

    /// Number of octaves to generate.
    octaves: Option<u32>,

    /// Fade applied when a key is pressed.
    fade_in_ms: Option<u64>,

    /// Fade applied when a key is released.
    fade_out_ms: Option<u64>,

    /// Output device settings.
    #[serde(default)]
    audio: Audio,
}

impl Piano {
    pub fn keyboard_layout(&self) -> &str {
        self.keyboard_layout
            .as_deref()
            .unwrap_or(DEFAULT_KEYBOARD_LAYOUT)
    }

    pub fn input_sound(&self) -> &Path {
        self.input_sound
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_INPUT_SOUND))
    }

    pub fn output_folder(&self) -> &Path {
        self.output_folder
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_OUTPUT_FOLDER))
    }

    pub fn octaves(&self) -> u32 {
        self.octaves.unwrap_or(DEFAULT_OCTAVES)
    }

    pub fn fade_in(&self) -> Duration {
        Duration::from_millis(self.fade_in_ms.unwrap_or(DEFAULT_FADE_IN_MS))
    }

    pub fn fade_out(&self) -> Duration {
        Duration::from_millis(self.fade_out_ms.unwrap_or(DEFAULT_FADE_OUT_MS))
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Checks the values that would otherwise fail later in confusing ways.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let octaves = self.octaves();
        if !(MIN_OCTAVES..=MAX_OCTAVES).contains(&octaves) {
            return Err(ConfigError::OctavesOutOfRange {
                value: octaves,
                min: MIN_OCTAVES,
                max: MAX_OCTAVES,
            });
        }
        if self.keyboard_layout().is_empty() {
            return Err(ConfigError::EmptyLayout);
        }
        self.audio.validate()
    }
}
