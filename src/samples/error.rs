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
use std::path::PathBuf;

use crate::scale::NoteName;

/// Errors reading the source sound.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Unable to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: symphonia::core::errors::Error,
    },

    #[error("No audio track found in {}", path.display())]
    NoTrack { path: PathBuf },

    #[error("Sample rate not specified in {}", path.display())]
    MissingSampleRate { path: PathBuf },

    #[error("No samples found in {}", path.display())]
    Empty { path: PathBuf },
}

/// Errors produced by a pitch shifter.
#[derive(Debug, thiserror::Error)]
pub enum ShiftError {
    #[error("Channels have different lengths")]
    UnequalChannels,

    #[error("Resampler setup failed: {0}")]
    ResamplerConstruction(#[from] rubato::ResamplerConstructionError),

    #[error("Resampling failed: {0}")]
    Resample(#[from] rubato::ResampleError),
}

/// Errors generating the sample bank. Any of these aborts the whole generation.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Unable to shift {note}: {source}")]
    Shift {
        note: NoteName,
        #[source]
        source: ShiftError,
    },

    #[error("Unable to create {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
}

/// Errors loading a generated sample back into memory.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Unable to read {}: {source}", path.display())]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("{} has an unsupported format ({bits} bit {format})", path.display())]
    UnsupportedFormat {
        path: PathBuf,
        bits: u16,
        format: &'static str,
    },
}
