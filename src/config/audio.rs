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
use serde::Deserialize;

use super::error::ConfigError;

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_BUFFER_SIZE: u32 = 512;
const DEFAULT_BITS_PER_SAMPLE: u16 = 16;

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// The audio device. "default" picks the system default, names starting
    /// with "mock" select the mock device.
    device: Option<String>,

    /// Stream buffer size in frames. Smaller values lower the trigger latency
    /// but make underruns more likely. 0 leaves the choice to the backend.
    buffer_size: Option<u32>,

    /// 16 for integer output, 32 for float output (default: 16)
    bits_per_sample: Option<u16>,

    /// Number of output channels (default: the device's default)
    channels: Option<u16>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: Some(device.to_string()),
            ..Default::default()
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the stream buffer size in frames (default: 512)
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE)
    }

    /// Returns the output bits per sample (default: 16)
    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample.unwrap_or(DEFAULT_BITS_PER_SAMPLE)
    }

    /// Returns the requested channel count, if any.
    pub fn channels(&self) -> Option<u16> {
        self.channels
    }

    pub fn set_channels(&mut self, channels: u16) {
        self.channels = Some(channels);
    }

    pub fn set_bits_per_sample(&mut self, bits_per_sample: u16) {
        self.bits_per_sample = Some(bits_per_sample);
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        match self.bits_per_sample() {
            16 | 32 => {}
            bits => return Err(ConfigError::UnsupportedBitsPerSample(bits)),
        }
        if self.channels == Some(0) {
            return Err(ConfigError::NoChannels);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_audio_deserialize() {
        let yaml = r#"
            device: UltraLite-mk5
            buffer_size: 128
            bits_per_sample: 32
            channels: 2
        "#;

        let audio: Audio = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(audio.device(), "UltraLite-mk5");
        assert_eq!(audio.buffer_size(), 128);
        assert_eq!(audio.bits_per_sample(), 32);
        assert_eq!(audio.channels(), Some(2));
        assert!(audio.validate().is_ok());
    }

    #[test]
    fn test_audio_defaults() {
        let audio = Audio::default();
        assert_eq!(audio.device(), "default");
        assert_eq!(audio.buffer_size(), 512);
        assert_eq!(audio.bits_per_sample(), 16);
        assert_eq!(audio.channels(), None);
    }

    #[test]
    fn test_audio_validation() {
        let mut audio = Audio::new("mock");
        audio.set_bits_per_sample(24);
        assert!(matches!(
            audio.validate(),
            Err(ConfigError::UnsupportedBitsPerSample(24))
        ));

        let mut audio = Audio::new("mock");
        audio.set_channels(0);
        assert!(matches!(audio.validate(), Err(ConfigError::NoChannels)));
    }
}
