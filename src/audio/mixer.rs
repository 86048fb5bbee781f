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
// Voice mixing that runs inside the audio callback.
use crossbeam_channel::Receiver;

use super::VoiceId;
use crate::samples::LoadedSample;

/// Commands sent from the engine to the audio callback.
#[derive(Debug, Clone)]
pub enum VoiceCommand {
    Trigger {
        voice: VoiceId,
        sample: LoadedSample,
        fade_in_frames: usize,
    },
    Release {
        voice: VoiceId,
        fade_out_frames: usize,
    },
    StopAll,
}

/// A sample playing on a voice slot.
struct Playback {
    sample: LoadedSample,
    /// Next frame to read from the sample.
    position: usize,
    /// Current linear gain.
    gain: f32,
    /// Gain change per frame.
    ramp: f32,
    /// Set once the voice is fading out.
    releasing: bool,
}

impl Playback {
    fn new(sample: LoadedSample, fade_in_frames: usize) -> Playback {
        let (gain, ramp) = if fade_in_frames == 0 {
            (1.0, 0.0)
        } else {
            (0.0, 1.0 / fade_in_frames as f32)
        };
        Playback {
            sample,
            position: 0,
            gain,
            ramp,
            releasing: false,
        }
    }

    fn release(&mut self, fade_out_frames: usize) -> bool {
        if fade_out_frames == 0 || self.gain <= 0.0 {
            return false;
        }
        self.releasing = true;
        self.ramp = -self.gain / fade_out_frames as f32;
        true
    }

    /// Mixes into the interleaved output. Returns false once the voice is done.
    fn mix_into(&mut self, output: &mut [f32], channels: usize) -> bool {
        let source_channels = self.sample.channel_count() as usize;
        let data = self.sample.data();
        let frames = self.sample.frames();

        for frame in output.chunks_exact_mut(channels) {
            if self.position >= frames {
                return false;
            }
            let offset = self.position * source_channels;
            for (channel, out) in frame.iter_mut().enumerate() {
                *out += data[offset + channel % source_channels] * self.gain;
            }
            self.position += 1;

            self.gain += self.ramp;
            if self.releasing {
                if self.gain <= 0.0 {
                    return false;
                }
            } else if self.gain >= 1.0 {
                self.gain = 1.0;
                self.ramp = 0.0;
            }
        }
        self.position < frames
    }
}

/// Fixed set of voice slots mixed into the output buffer.
///
/// Slots are allocated up front so triggering a voice never allocates on the
/// audio thread.
pub struct VoiceMixer {
    channels: usize,
    voices: Vec<Option<Playback>>,
    commands: Receiver<VoiceCommand>,
}

impl VoiceMixer {
    pub fn new(channels: u16, voice_capacity: usize, commands: Receiver<VoiceCommand>) -> Self {
        VoiceMixer {
            channels: channels.max(1) as usize,
            voices: (0..voice_capacity).map(|_| None).collect(),
            commands,
        }
    }

    /// Applies a single command.
    pub fn apply(&mut self, command: VoiceCommand) {
        match command {
            VoiceCommand::Trigger {
                voice,
                sample,
                fade_in_frames,
            } => {
                if let Some(slot) = self.voices.get_mut(voice.index()) {
                    *slot = Some(Playback::new(sample, fade_in_frames));
                }
            }
            VoiceCommand::Release {
                voice,
                fade_out_frames,
            } => {
                if let Some(slot) = self.voices.get_mut(voice.index()) {
                    if let Some(playback) = slot {
                        if !playback.release(fade_out_frames) {
                            *slot = None;
                        }
                    }
                }
            }
            VoiceCommand::StopAll => {
                for slot in self.voices.iter_mut() {
                    *slot = None;
                }
            }
        }
    }

    /// Drains pending commands and renders the next block of interleaved output.
    pub fn render(&mut self, output: &mut [f32]) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }

        output.fill(0.0);
        let channels = self.channels;
        for slot in self.voices.iter_mut() {
            if let Some(playback) = slot {
                if !playback.mix_into(output, channels) {
                    *slot = None;
                }
            }
        }
    }

    /// Number of voices currently producing sound.
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixer(channels: u16) -> (crossbeam_channel::Sender<VoiceCommand>, VoiceMixer) {
        let (tx, rx) = crossbeam_channel::bounded(16);
        (tx, VoiceMixer::new(channels, 4, rx))
    }

    fn constant(value: f32, frames: usize) -> LoadedSample {
        LoadedSample::from_interleaved(vec![value; frames], 1, 44100)
    }

    #[test]
    fn test_fade_in_is_linear() {
        let (tx, mut mixer) = mixer(1);
        tx.send(VoiceCommand::Trigger {
            voice: VoiceId::new(0),
            sample: constant(1.0, 10),
            fade_in_frames: 4,
        })
        .unwrap();

        let mut output = vec![0.0; 6];
        mixer.render(&mut output);
        assert_eq!(output, vec![0.0, 0.25, 0.5, 0.75, 1.0, 1.0]);
    }

    #[test]
    fn test_mono_sample_fills_every_output_channel() {
        let (tx, mut mixer) = mixer(2);
        tx.send(VoiceCommand::Trigger {
            voice: VoiceId::new(1),
            sample: LoadedSample::from_interleaved(vec![0.5, 0.25], 1, 44100),
            fade_in_frames: 0,
        })
        .unwrap();

        let mut output = vec![0.0; 6];
        mixer.render(&mut output);
        assert_eq!(output, vec![0.5, 0.5, 0.25, 0.25, 0.0, 0.0]);
        // The sample ended, so the slot is free again.
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn test_voices_are_summed() {
        let (tx, mut mixer) = mixer(1);
        for (voice, value) in [(0, 0.5), (2, 0.25)] {
            tx.send(VoiceCommand::Trigger {
                voice: VoiceId::new(voice),
                sample: constant(value, 8),
                fade_in_frames: 0,
            })
            .unwrap();
        }

        let mut output = vec![0.0; 2];
        mixer.render(&mut output);
        assert_eq!(output, vec![0.75, 0.75]);
        assert_eq!(mixer.active_voices(), 2);
    }

    #[test]
    fn test_release_fades_from_current_gain() {
        let (_tx, mut mixer) = mixer(1);
        mixer.apply(VoiceCommand::Trigger {
            voice: VoiceId::new(0),
            sample: constant(1.0, 100),
            fade_in_frames: 0,
        });
        mixer.apply(VoiceCommand::Release {
            voice: VoiceId::new(0),
            fade_out_frames: 4,
        });

        let mut output = vec![0.0; 6];
        mixer.render(&mut output);
        assert_eq!(output, vec![1.0, 0.75, 0.5, 0.25, 0.0, 0.0]);
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn test_release_without_fade_frees_immediately() {
        let (_tx, mut mixer) = mixer(1);
        mixer.apply(VoiceCommand::Trigger {
            voice: VoiceId::new(0),
            sample: constant(1.0, 100),
            fade_in_frames: 0,
        });
        mixer.apply(VoiceCommand::Release {
            voice: VoiceId::new(0),
            fade_out_frames: 0,
        });
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn test_retrigger_during_fade_out_restarts() {
        let (_tx, mut mixer) = mixer(1);
        let sample = LoadedSample::from_interleaved((0..100).map(|i| i as f32).collect(), 1, 44100);
        mixer.apply(VoiceCommand::Trigger {
            voice: VoiceId::new(0),
            sample: sample.clone(),
            fade_in_frames: 0,
        });
        let mut output = vec![0.0; 10];
        mixer.render(&mut output);
        mixer.apply(VoiceCommand::Release {
            voice: VoiceId::new(0),
            fade_out_frames: 1000,
        });
        mixer.render(&mut output);

        mixer.apply(VoiceCommand::Trigger {
            voice: VoiceId::new(0),
            sample,
            fade_in_frames: 0,
        });
        let mut output = vec![0.0; 3];
        mixer.render(&mut output);
        // Back at the start of the sample at full gain.
        assert_eq!(output, vec![0.0, 1.0, 2.0]);
        assert_eq!(mixer.active_voices(), 1);
    }

    #[test]
    fn test_stop_all() {
        let (tx, mut mixer) = mixer(1);
        for voice in 0..4 {
            tx.send(VoiceCommand::Trigger {
                voice: VoiceId::new(voice),
                sample: constant(0.1, 100),
                fade_in_frames: 0,
            })
            .unwrap();
        }
        tx.send(VoiceCommand::StopAll).unwrap();

        let mut output = vec![1.0; 4];
        mixer.render(&mut output);
        assert_eq!(output, vec![0.0; 4]);
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn test_out_of_range_voice_is_ignored() {
        let (_tx, mut mixer) = mixer(1);
        mixer.apply(VoiceCommand::Trigger {
            voice: VoiceId::new(99),
            sample: constant(1.0, 10),
            fade_in_frames: 0,
        });
        mixer.apply(VoiceCommand::Release {
            voice: VoiceId::new(99),
            fade_out_frames: 10,
        });
        assert_eq!(mixer.active_voices(), 0);
    }
}
