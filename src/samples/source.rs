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
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info};

use super::error::SourceError;

/// The recorded sound every note is derived from.
///
/// Samples are stored planar: one Vec per channel, all of the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceWaveform {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl SourceWaveform {
    /// Creates a waveform from planar samples.
    pub fn from_planar(channels: Vec<Vec<f32>>, sample_rate: u32) -> SourceWaveform {
        SourceWaveform {
            channels,
            sample_rate,
        }
    }

    /// Decodes the first audio track of the given file. WAV, FLAC, MP3, OGG and
    /// anything else symphonia understands is accepted.
    pub fn load(path: &Path) -> Result<SourceWaveform, SourceError> {
        let decode_err = |source: SymphoniaError| SourceError::Decode {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(decode_err)?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| SourceError::NoTrack {
                path: path.to_path_buf(),
            })?;
        let track_id = track.id;
        let sample_rate =
            track
                .codec_params
                .sample_rate
                .ok_or_else(|| SourceError::MissingSampleRate {
                    path: path.to_path_buf(),
                })?;
        let mut decoder = get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(decode_err)?;

        let mut channels: Vec<Vec<f32>> = Vec::new();
        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break
                }
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(decode_err(e)),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // Corrupt packets are skipped rather than failing the whole file.
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!(path = ?path, error = e, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(decode_err(e)),
            };

            let spec = *decoded.spec();
            let channel_count = spec.channels.count();
            let frames = decoded.frames();
            if channel_count == 0 || frames == 0 {
                continue;
            }
            if channels.is_empty() {
                channels = vec![Vec::new(); channel_count];
            }

            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_planar_ref(decoded);
            for (channel, plane) in channels
                .iter_mut()
                .zip(buffer.samples().chunks_exact(frames))
            {
                channel.extend_from_slice(plane);
            }
        }

        if channels.first().map_or(true, |c| c.is_empty()) {
            return Err(SourceError::Empty {
                path: path.to_path_buf(),
            });
        }

        let waveform = SourceWaveform::from_planar(channels, sample_rate);
        info!(
            path = ?path,
            channels = waveform.channel_count(),
            sample_rate,
            duration_ms = waveform.duration().as_millis(),
            "Source sound loaded"
        );
        Ok(waveform)
    }

    /// Planar sample data.
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Length of the sound.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}
