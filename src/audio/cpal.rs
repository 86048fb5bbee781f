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
use std::{fmt, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Sender, TrySendError};
use tracing::{error, info, span, warn, Level};

use super::mixer::{VoiceCommand, VoiceMixer};
use super::{DeviceError, OutputFormat, SampleFormat, VoiceId};
use crate::config;
use crate::samples::LoadedSample;

/// Capacity of the command queue between the engine and the audio callback.
const COMMAND_QUEUE_SIZE: usize = 1024;

/// A device reported by `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub host: String,
    pub max_channels: u16,
    pub is_default: bool,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({}){}",
            self.name,
            self.max_channels,
            self.host,
            if self.is_default { " [default]" } else { "" }
        )
    }
}

/// An open cpal output stream. The stream lives on its own thread and is closed
/// when the device is dropped.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The format the stream was opened with.
    format: OutputFormat,
    /// Commands for the mixer running in the stream callback.
    commands: Sender<VoiceCommand>,
    /// Dropping or signalling this closes the stream.
    shutdown: Option<Sender<()>>,
    /// Thread that owns the stream.
    stream_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.format.channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists output devices across all hosts.
    pub fn list() -> Result<Vec<DeviceInfo>, DeviceError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = cpal::host_from_id(host_id)?;
            let default_name = host.default_output_device().and_then(|d| d.name().ok());
            let host_devices = match host.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs.map(|c| c.channels()).max().unwrap_or(0);
                if max_channels == 0 {
                    continue;
                }

                let name = device.name()?;
                devices.push(DeviceInfo {
                    is_default: default_name.as_deref() == Some(name.as_str()),
                    name,
                    host: host_id.name().to_string(),
                    max_channels,
                });
            }
        }

        devices.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(devices)
    }

    /// Finds the device with the given name. "default" is the default output
    /// device of the default host.
    fn find(name: &str) -> Result<(cpal::HostId, cpal::Device), DeviceError> {
        if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or(DeviceError::NoDefaultDevice)?;
            return Ok((host.id(), device));
        }

        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;
        for host_id in cpal::available_hosts() {
            let Ok(devices) = cpal::host_from_id(host_id)?.output_devices() else {
                continue;
            };
            for device in devices {
                if device.name().is_ok_and(|n| n.trim() == name) {
                    return Ok((host_id, device));
                }
            }
        }
        Err(DeviceError::NotFound(name.to_string()))
    }

    /// Opens the configured device at the given sample rate with room for the
    /// given number of voices.
    pub fn open(
        config: &config::Audio,
        sample_rate: u32,
        voices: usize,
    ) -> Result<Device, DeviceError> {
        let span = span!(Level::INFO, "open device (cpal)");
        let _enter = span.enter();

        let sample_format = SampleFormat::from_bits(config.bits_per_sample())?;
        let (host_id, device) = Device::find(config.device())?;
        let name = device.name()?;
        let channels = match config.channels() {
            Some(channels) => channels,
            None => device.default_output_config()?.channels(),
        };
        let format = OutputFormat::new(sample_rate, channels, sample_format);

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate,
            buffer_size: match config.buffer_size() {
                0 => cpal::BufferSize::Default,
                frames => cpal::BufferSize::Fixed(frames),
            },
        };

        let (commands, command_rx) = crossbeam_channel::bounded(COMMAND_QUEUE_SIZE);
        let mixer = VoiceMixer::new(channels, voices, command_rx);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), DeviceError>>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);

        // The stream is created and dropped on this thread.
        let stream_thread = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let stream = match build_stream(&device, &stream_config, sample_format, mixer) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                let _ = shutdown_rx.recv();
                drop(stream);
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = stream_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = stream_thread.join();
                return Err(DeviceError::StreamThread);
            }
        }

        info!(
            device = name,
            host = host_id.name(),
            format = %format,
            buffer_size = config.buffer_size(),
            voices,
            "Output stream started"
        );

        Ok(Device {
            name,
            host_id,
            format,
            commands,
            shutdown: Some(shutdown_tx),
            stream_thread: Some(stream_thread),
        })
    }

    fn send(&self, command: VoiceCommand) {
        match self.commands.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => {
                warn!(command = ?command, "Audio command queue full, dropping command")
            }
            Err(TrySendError::Disconnected(_)) => {
                error!(device = self.name, "Output stream is gone, dropping command")
            }
        }
    }
}

impl super::Device for Device {
    fn format(&self) -> OutputFormat {
        self.format
    }

    fn trigger(&self, voice: VoiceId, sample: &LoadedSample, fade_in_frames: usize) {
        self.send(VoiceCommand::Trigger {
            voice,
            sample: sample.clone(),
            fade_in_frames,
        });
    }

    fn release(&self, voice: VoiceId, fade_out_frames: usize) {
        self.send(VoiceCommand::Release {
            voice,
            fade_out_frames,
        });
    }

    fn stop_all(&self) {
        self.send(VoiceCommand::StopAll);
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.stream_thread.take() {
            let _ = thread.join();
        }
        info!(device = self.name, "Output stream closed");
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: SampleFormat,
    mixer: VoiceMixer,
) -> Result<cpal::Stream, DeviceError> {
    Ok(match sample_format {
        SampleFormat::Int => build_typed_stream::<i16>(device, config, mixer)?,
        SampleFormat::Float => build_typed_stream::<f32>(device, config, mixer)?,
    })
}

/// Builds a stream whose callback mixes in f32 and converts to the device type.
fn build_typed_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: VoiceMixer,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if scratch.len() < data.len() {
                scratch.resize(data.len(), 0.0);
            }
            let block = &mut scratch[..data.len()];
            mixer.render(block);
            for (dst, src) in data.iter_mut().zip(block.iter()) {
                *dst = T::from_sample(*src);
            }
        },
        |err| error!(err = err.to_string(), "Output stream error"),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_display() {
        let info = DeviceInfo {
            name: "UltraLite-mk5".to_string(),
            host: "ALSA".to_string(),
            max_channels: 22,
            is_default: true,
        };
        assert_eq!(info.to_string(), "UltraLite-mk5 (Channels=22) (ALSA) [default]");
    }
}
