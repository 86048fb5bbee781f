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

//! Loading and caching of note samples.
//!
//! Samples are loaded entirely into memory before playback starts so a key press
//! never touches the disk.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hound::{SampleFormat, WavReader};
use tracing::{debug, info};

use super::error::LoadError;
use crate::scale::NoteName;

/// A sample held in memory, ready to be played.
/// The data is stored in an Arc so the audio thread can share it without copying.
#[derive(Clone, PartialEq)]
pub struct LoadedSample {
    /// The sample data as f32 samples (interleaved if multi-channel).
    data: Arc<Vec<f32>>,
    /// Number of channels in the sample.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl LoadedSample {
    /// Creates a sample from interleaved data.
    pub fn from_interleaved(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> Self {
        Self {
            data: Arc::new(data),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// Creates a sample by interleaving planar channels.
    pub fn from_planar(channels: &[Vec<f32>], sample_rate: u32) -> Self {
        let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
        let mut data = Vec::with_capacity(frames * channels.len());
        for frame in 0..frames {
            data.extend(channels.iter().map(|c| c[frame]));
        }
        Self::from_interleaved(data, channels.len() as u16, sample_rate)
    }

    /// The interleaved sample data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of frames.
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    /// Returns the length of the sample.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

impl std::fmt::Debug for LoadedSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedSample")
            .field("channel_count", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

/// Manages loading and caching of sample data.
pub struct SampleLoader {
    /// Cache of loaded samples by file path.
    cache: HashMap<PathBuf, LoadedSample>,
    /// Target sample rate for transcoding (matches audio output).
    target_sample_rate: u32,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(target_sample_rate: u32) -> Self {
        Self {
            cache: HashMap::new(),
            target_sample_rate,
        }
    }

    /// Places an already decoded sample in the cache, e.g. one that was just generated.
    /// It is transcoded if its rate does not match the target.
    pub fn insert(&mut self, path: PathBuf, sample: LoadedSample) {
        let sample = self.conform(sample);
        self.cache.insert(path, sample);
    }

    /// Loads the sample for the given note from the folder.
    ///
    /// Returns `Ok(None)` if the folder has no file for the note.
    pub fn load_note(
        &mut self,
        folder: &Path,
        note: NoteName,
    ) -> Result<Option<LoadedSample>, LoadError> {
        let path = folder.join(note.file_name());
        if !path.is_file() {
            debug!(path = ?path, note = %note, "No sample file for note");
            return Ok(None);
        }
        match self.load(&path) {
            Ok(sample) => Ok(Some(sample)),
            Err(LoadError::Wav {
                source: hound::Error::IoError(e),
                ..
            }) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Loads a WAV file into memory.
    /// Returns a cached version if already loaded.
    pub fn load(&mut self, path: &Path) -> Result<LoadedSample, LoadError> {
        if let Some(sample) = self.cache.get(path) {
            debug!(path = ?path, "Using cached sample");
            return Ok(sample.clone());
        }

        let wav_err = |source: hound::Error| LoadError::Wav {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = WavReader::open(path).map_err(wav_err)?;
        let spec = reader.spec();

        let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(wav_err)?,
            (SampleFormat::Int, bits @ 1..=32) => {
                let scale = 1.0 / (1_i64 << (bits - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|s| s as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(wav_err)?
            }
            (format, bits) => {
                return Err(LoadError::UnsupportedFormat {
                    path: path.to_path_buf(),
                    bits,
                    format: match format {
                        SampleFormat::Float => "float",
                        SampleFormat::Int => "int",
                    },
                })
            }
        };

        let loaded = self.conform(LoadedSample::from_interleaved(
            samples,
            spec.channels,
            spec.sample_rate,
        ));

        info!(
            path = ?path,
            channels = loaded.channel_count(),
            sample_rate = loaded.sample_rate(),
            duration_ms = loaded.duration().as_millis(),
            memory_kb = loaded.memory_size() / 1024,
            "Sample loaded"
        );

        self.cache.insert(path.to_path_buf(), loaded.clone());
        Ok(loaded)
    }

    /// Returns the number of cached samples.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Returns the total memory used by cached samples.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.values().map(|s| s.memory_size()).sum()
    }

    /// Transcodes the sample to the target rate if needed.
    fn conform(&self, sample: LoadedSample) -> LoadedSample {
        if sample.sample_rate == self.target_sample_rate || sample.sample_rate == 0 {
            return sample;
        }
        info!(
            source_rate = sample.sample_rate,
            target_rate = self.target_sample_rate,
            "Transcoding sample"
        );
        let transcoded = transcode_samples(
            sample.data(),
            sample.channel_count,
            sample.sample_rate,
            self.target_sample_rate,
        );
        LoadedSample::from_interleaved(transcoded, sample.channel_count, self.target_sample_rate)
    }
}

impl std::fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLoader")
            .field("cached_samples", &self.cache.len())
            .field("target_sample_rate", &self.target_sample_rate)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

/// Reads the sample rate of the first note in the scale that has a file in the folder.
pub fn probe_sample_rate(folder: &Path, scale: &[NoteName]) -> Option<u32> {
    scale
        .iter()
        .map(|note| folder.join(note.file_name()))
        .filter(|path| path.is_file())
        .find_map(|path| WavReader::open(path).ok().map(|r| r.spec().sample_rate))
}

/// Transcodes interleaved samples from one sample rate to another using linear
/// interpolation. Good enough for one-shot notes that are usually already at the
/// device rate.
fn transcode_samples(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channel_count.max(1) as usize;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);
    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let s0 = samples
                .get(source_frame * channels + channel)
                .copied()
                .unwrap_or(0.0);
            let s1 = samples
                .get((source_frame + 1) * channels + channel)
                .copied()
                .unwrap_or(s0);
            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}
