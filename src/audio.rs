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

use crate::config;
use crate::samples::LoadedSample;

pub mod cpal;
pub mod format;
pub mod mixer;
pub mod mock;

pub use format::{OutputFormat, SampleFormat};

/// Index of a voice slot on the output device. Resolved once per key when the
/// engine loads its samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(usize);

impl VoiceId {
    pub fn new(index: usize) -> VoiceId {
        VoiceId(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice {}", self.0)
    }
}

/// Errors opening or enumerating audio devices.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("No device found with name {0}")]
    NotFound(String),

    #[error("No default output device available")]
    NoDefaultDevice,

    #[error("Unsupported bit depth {0}, expected 16 or 32")]
    UnsupportedBitDepth(u16),

    #[error("Unable to enumerate devices: {0}")]
    Devices(#[from] ::cpal::DevicesError),

    #[error("Unable to read device name: {0}")]
    Name(#[from] ::cpal::DeviceNameError),

    #[error("Unable to read supported configurations: {0}")]
    SupportedConfigs(#[from] ::cpal::SupportedStreamConfigsError),

    #[error("Unable to read default configuration: {0}")]
    DefaultConfig(#[from] ::cpal::DefaultStreamConfigError),

    #[error("Unable to open output stream: {0}")]
    BuildStream(#[from] ::cpal::BuildStreamError),

    #[error("Unable to start output stream: {0}")]
    PlayStream(#[from] ::cpal::PlayStreamError),

    #[error("Audio host unavailable: {0}")]
    Host(#[from] ::cpal::HostUnavailable),

    #[error("Output stream thread exited before the stream was opened")]
    StreamThread,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An output device that plays one-shot samples on numbered voices.
///
/// All commands are fire-and-forget: they return immediately and the fades run
/// on the audio thread.
pub trait Device: fmt::Display + Send {
    /// The format the device was opened with.
    fn format(&self) -> OutputFormat;

    /// Starts the sample on the voice with a linear fade-in. Anything still
    /// sounding on the voice, including a fade-out, is cut.
    fn trigger(&self, voice: VoiceId, sample: &LoadedSample, fade_in_frames: usize);

    /// Fades the voice out from its current gain and frees it.
    fn release(&self, voice: VoiceId, fade_out_frames: usize);

    /// Silences every voice immediately.
    fn stop_all(&self);
}

/// Opens the output device named in the config at the given sample rate.
/// Names starting with "mock" select a mock device that plays nothing.
pub fn open_device(
    config: &config::Audio,
    sample_rate: u32,
    voices: usize,
) -> Result<Box<dyn Device>, DeviceError> {
    let name = config.device();
    if name.starts_with("mock") {
        let format = OutputFormat::new(
            sample_rate,
            config.channels().unwrap_or(2),
            SampleFormat::from_bits(config.bits_per_sample())?,
        );
        return Ok(Box::new(mock::Device::get(name, format)));
    }

    Ok(Box::new(cpal::Device::open(config, sample_rate, voices)?))
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::DeviceInfo>, DeviceError> {
    cpal::Device::list()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_mock_device() {
        let mut config = config::Audio::new("mock-device");
        config.set_channels(1);
        let device = open_device(&config, 22050, 4).unwrap();
        assert_eq!(
            device.format(),
            OutputFormat::new(22050, 1, SampleFormat::Int)
        );
        assert_eq!(device.to_string(), "mock-device (Mock)");
    }

    #[test]
    fn test_open_mock_device_rejects_bad_bit_depth() {
        let mut config = config::Audio::new("mock");
        config.set_bits_per_sample(24);
        assert!(matches!(
            open_device(&config, 44100, 1),
            Err(DeviceError::UnsupportedBitDepth(24))
        ));
    }
}
