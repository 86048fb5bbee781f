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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{OutputFormat, VoiceId};
use crate::samples::LoadedSample;

/// A command received by the mock device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Trigger {
        voice: VoiceId,
        frames: usize,
        fade_in_frames: usize,
    },
    Release {
        voice: VoiceId,
        fade_out_frames: usize,
    },
    StopAll,
}

/// Shared view of what a mock device was asked to do. Stays readable after the
/// device itself has been dropped.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<DeviceEvent>>>,
    released: Arc<AtomicBool>,
}

impl Recorder {
    /// All commands received so far, in order.
    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events.lock().clone()
    }

    /// Returns true once the device has been dropped.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Relaxed)
    }

    fn record(&self, event: DeviceEvent) {
        debug!(event = ?event, "Mock device command");
        self.events.lock().push(event);
    }
}

/// A mock device. Doesn't actually play anything.
pub struct Device {
    name: String,
    format: OutputFormat,
    recorder: Recorder,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, format: OutputFormat) -> Device {
        info!(device = name, format = %format, "Opened mock device");
        Device {
            name: name.to_string(),
            format,
            recorder: Recorder::default(),
        }
    }

    /// Returns a handle to the commands this device receives.
    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }
}

impl super::Device for Device {
    fn format(&self) -> OutputFormat {
        self.format
    }

    fn trigger(&self, voice: VoiceId, sample: &LoadedSample, fade_in_frames: usize) {
        self.recorder.record(DeviceEvent::Trigger {
            voice,
            frames: sample.frames(),
            fade_in_frames,
        });
    }

    fn release(&self, voice: VoiceId, fade_out_frames: usize) {
        self.recorder.record(DeviceEvent::Release {
            voice,
            fade_out_frames,
        });
    }

    fn stop_all(&self) {
        self.recorder.record(DeviceEvent::StopAll);
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.recorder.released.store(true, Ordering::Relaxed);
        info!(device = self.name, "Released mock device");
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
