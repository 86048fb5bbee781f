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

//! The sample bank: one pitched buffer per note, derived from a single source sound.
//!
//! This module provides:
//! - Decoding of the source sound
//! - Pitch shifting by whole semitones
//! - Generation and persistence of the bank
//! - Loading and caching of note samples for playback

mod bank;
mod error;
mod generator;
mod loader;
mod pitch;
mod source;

pub use bank::SampleBank;
pub use error::{GenerateError, LoadError, ShiftError, SourceError};
pub use generator::SampleBankGenerator;
pub use loader::{probe_sample_rate, LoadedSample, SampleLoader};
pub use pitch::{semitone_ratio, PhaseVocoder, PitchShifter};
pub use source::SourceWaveform;
