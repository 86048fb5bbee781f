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
use std::time::Duration;

use super::DeviceError;

/// Sample format of the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 16 bit signed integers.
    Int,
    /// 32 bit floats.
    Float,
}

impl SampleFormat {
    /// Picks the format for the given bit depth.
    pub fn from_bits(bits_per_sample: u16) -> Result<SampleFormat, DeviceError> {
        match bits_per_sample {
            16 => Ok(SampleFormat::Int),
            32 => Ok(SampleFormat::Float),
            bits => Err(DeviceError::UnsupportedBitDepth(bits)),
        }
    }

    /// Convert to string representation
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Float => "float",
            SampleFormat::Int => "int",
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        match self {
            SampleFormat::Int => 16,
            SampleFormat::Float => 32,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The format an output device was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of output channels
    pub channels: u16,
    /// Sample format of the stream
    pub sample_format: SampleFormat,
}

impl OutputFormat {
    pub fn new(sample_rate: u32, channels: u16, sample_format: SampleFormat) -> OutputFormat {
        OutputFormat {
            sample_rate,
            channels,
            sample_format,
        }
    }

    /// Converts a duration into a whole number of frames at this rate.
    pub fn frames(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * self.sample_rate as f64).round() as usize
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} channels, {} bit {}",
            self.sample_rate,
            self.channels,
            self.sample_format.bits_per_sample(),
            self.sample_format
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_format_from_bits() {
        assert_eq!(SampleFormat::from_bits(16).unwrap(), SampleFormat::Int);
        assert_eq!(SampleFormat::from_bits(32).unwrap(), SampleFormat::Float);
        assert!(matches!(
            SampleFormat::from_bits(24),
            Err(DeviceError::UnsupportedBitDepth(24))
        ));
    }

    #[test]
    fn test_frames() {
        let format = OutputFormat::new(44100, 2, SampleFormat::Int);
        assert_eq!(format.frames(Duration::from_millis(10)), 441);
        assert_eq!(format.frames(Duration::from_millis(500)), 22050);
        assert_eq!(format.frames(Duration::ZERO), 0);
    }

    #[test]
    fn test_display() {
        let format = OutputFormat::new(48000, 2, SampleFormat::Float);
        assert_eq!(format.to_string(), "48000 Hz, 2 channels, 32 bit float");
    }
}
