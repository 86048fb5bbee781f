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

//! Pitch shifting of planar audio.
//!
//! The phase vocoder stretches the sound in time by the pitch ratio and then
//! resamples it back to the original length, which moves every partial by the
//! same ratio while keeping the duration.

use std::f32::consts::PI;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use super::error::ShiftError;
use crate::scale::SEMITONES_PER_OCTAVE;

/// Frames fed to the resampler per call.
const RESAMPLER_CHUNK_SIZE: usize = 1024;

/// Window sums below this are treated as silence during overlap-add.
const WINDOW_SUM_FLOOR: f32 = 1e-6;

/// Shifts planar audio by a whole number of semitones.
///
/// Implementations must be deterministic and return the same number of
/// channels and frames they were given.
pub trait PitchShifter: Send + Sync {
    fn shift(&self, channels: &[Vec<f32>], semitones: i32) -> Result<Vec<Vec<f32>>, ShiftError>;
}

/// Returns the frequency ratio for the given number of semitones.
pub fn semitone_ratio(semitones: i32) -> f64 {
    2f64.powf(semitones as f64 / SEMITONES_PER_OCTAVE as f64)
}

/// STFT phase vocoder followed by band-limited resampling.
#[derive(Debug, Clone, Copy)]
pub struct PhaseVocoder {
    fft_size: usize,
    hop_size: usize,
}

impl Default for PhaseVocoder {
    fn default() -> Self {
        PhaseVocoder {
            fft_size: 2048,
            hop_size: 512,
        }
    }
}

impl PhaseVocoder {
    /// Changes the duration of the signal by `1 / rate` without changing its pitch.
    fn time_stretch(&self, samples: &[f32], rate: f32) -> Vec<f32> {
        let n = self.fft_size;
        let hop = self.hop_size;
        let bins = n / 2 + 1;
        let window = hann_window(n);

        // Center the frames on the signal so the edges are not attenuated.
        let pad = n / 2;
        let mut padded = vec![0.0; pad];
        padded.extend_from_slice(samples);
        padded.extend(std::iter::repeat(0.0).take(pad));
        if padded.len() < n {
            padded.resize(n, 0.0);
        }
        let frame_count = 1 + (padded.len() - n) / hop;

        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(n);
        let inverse = planner.plan_fft_inverse(n);

        let mut buffer = vec![Complex::new(0.0, 0.0); n];
        let mut spectra: Vec<Vec<Complex<f32>>> = Vec::with_capacity(frame_count + 1);
        for frame in 0..frame_count {
            let start = frame * hop;
            for (i, value) in buffer.iter_mut().enumerate() {
                *value = Complex::new(padded[start + i] * window[i], 0.0);
            }
            forward.process(&mut buffer);
            spectra.push(buffer[..bins].to_vec());
        }
        // A silent frame past the end keeps the interpolation below in bounds.
        spectra.push(vec![Complex::new(0.0, 0.0); bins]);

        let expected_phase_advance: Vec<f32> = (0..bins)
            .map(|k| 2.0 * PI * hop as f32 * k as f32 / n as f32)
            .collect();
        let mut phase: Vec<f32> = spectra[0].iter().map(|c| c.arg()).collect();

        let steps: Vec<f32> = (0..)
            .map(|i| i as f32 * rate)
            .take_while(|step| *step < frame_count as f32)
            .collect();

        let output_len = n + hop * steps.len().saturating_sub(1);
        let mut output = vec![0.0; output_len];
        let mut window_sum = vec![0.0; output_len];

        for (out_frame, step) in steps.iter().enumerate() {
            let index = *step as usize;
            let alpha = step.fract();
            let left = &spectra[index];
            let right = &spectra[index + 1];

            for k in 0..bins {
                let magnitude = (1.0 - alpha) * left[k].norm() + alpha * right[k].norm();
                buffer[k] = Complex::from_polar(magnitude, phase[k]);

                let mut delta = right[k].arg() - left[k].arg() - expected_phase_advance[k];
                delta -= 2.0 * PI * (delta / (2.0 * PI)).round();
                phase[k] += expected_phase_advance[k] + delta;
            }
            // Mirror the positive frequencies so the inverse transform is real.
            for k in 1..n - bins + 1 {
                buffer[n - k] = buffer[k].conj();
            }

            inverse.process(&mut buffer);

            let start = out_frame * hop;
            for i in 0..n {
                output[start + i] += buffer[i].re / n as f32 * window[i];
                window_sum[start + i] += window[i] * window[i];
            }
        }

        for (sample, sum) in output.iter_mut().zip(window_sum.iter()) {
            if *sum > WINDOW_SUM_FLOOR {
                *sample /= *sum;
            }
        }

        let stretched_len = (samples.len() as f32 / rate).round() as usize;
        output
            .into_iter()
            .skip(pad)
            .chain(std::iter::repeat(0.0))
            .take(stretched_len)
            .collect()
    }
}

impl PitchShifter for PhaseVocoder {
    fn shift(&self, channels: &[Vec<f32>], semitones: i32) -> Result<Vec<Vec<f32>>, ShiftError> {
        let frames = channels.first().map(|c| c.len()).unwrap_or(0);
        if channels.iter().any(|c| c.len() != frames) {
            return Err(ShiftError::UnequalChannels);
        }
        if semitones == 0 {
            return Ok(channels.to_vec());
        }

        // Stretch to `ratio` times the length, then squeeze back: the squeeze
        // raises every frequency by `ratio`.
        let rate = 1.0 / semitone_ratio(semitones);
        let stretched: Vec<Vec<f32>> = channels
            .iter()
            .map(|channel| self.time_stretch(channel, rate as f32))
            .collect();

        let mut shifted = resample(&stretched, rate)?;
        for (shifted, original) in shifted.iter_mut().zip(channels.iter()) {
            shifted.resize(original.len(), 0.0);
        }
        Ok(shifted)
    }
}

/// Resamples planar audio by the given output/input ratio.
fn resample(channels: &[Vec<f32>], ratio: f64) -> Result<Vec<Vec<f32>>, ShiftError> {
    let input_len = channels.first().map(|c| c.len()).unwrap_or(0);
    if input_len == 0 {
        return Ok(vec![Vec::new(); channels.len()]);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLER_CHUNK_SIZE, channels.len())?;

    let delay = resampler.output_delay();
    let expected_len = (input_len as f64 * ratio).round() as usize;
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected_len + delay); channels.len()];

    let append = |chunk: Vec<Vec<f32>>, output: &mut Vec<Vec<f32>>| {
        for (out, chunk) in output.iter_mut().zip(chunk) {
            out.extend(chunk);
        }
    };

    let mut position = 0;
    while position + RESAMPLER_CHUNK_SIZE <= input_len {
        let chunk: Vec<&[f32]> = channels
            .iter()
            .map(|c| &c[position..position + RESAMPLER_CHUNK_SIZE])
            .collect();
        append(resampler.process(chunk.as_slice(), None)?, &mut output);
        position += RESAMPLER_CHUNK_SIZE;
    }
    if position < input_len {
        let chunk: Vec<&[f32]> = channels.iter().map(|c| &c[position..]).collect();
        append(
            resampler.process_partial(Some(chunk.as_slice()), None)?,
            &mut output,
        );
    }

    // Flush the filter until the delayed tail is out.
    while output[0].len() < expected_len + delay {
        let tail = resampler.process_partial(None::<&[Vec<f32>]>, None)?;
        if tail.first().map_or(true, |t| t.is_empty()) {
            break;
        }
        append(tail, &mut output);
    }

    for channel in output.iter_mut() {
        channel.drain(..delay.min(channel.len()));
        channel.truncate(expected_len);
    }
    Ok(output)
}

/// Periodic Hann window.
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / size as f32).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{calculate_rms, sine, zero_crossings};

    const SAMPLE_RATE: u32 = 22050;

    fn middle(samples: &[f32]) -> &[f32] {
        let quarter = samples.len() / 4;
        &samples[quarter..samples.len() - quarter]
    }

    #[test]
    fn test_zero_semitones_is_identity() {
        let source = vec![sine(220.0, 0.5, SAMPLE_RATE, 4000), sine(330.0, 0.25, SAMPLE_RATE, 4000)];
        let shifted = PhaseVocoder::default().shift(&source, 0).unwrap();
        assert_eq!(shifted, source);
    }

    #[test]
    fn test_octave_up_doubles_frequency() {
        let source = vec![sine(220.0, 0.5, SAMPLE_RATE, SAMPLE_RATE as usize)];
        let shifted = PhaseVocoder::default().shift(&source, 12).unwrap();

        let original = zero_crossings(middle(&source[0])) as f32;
        let octave = zero_crossings(middle(&shifted[0])) as f32;
        let ratio = octave / original;
        assert!((ratio - 2.0).abs() < 0.2, "ratio was {}", ratio);
    }

    #[test]
    fn test_pitch_increases_with_offset() {
        let source = vec![sine(220.0, 0.5, SAMPLE_RATE, SAMPLE_RATE as usize)];
        let shifter = PhaseVocoder::default();

        let crossings: Vec<usize> = [0, 3, 7, 12]
            .iter()
            .map(|semitones| {
                let shifted = shifter.shift(&source, *semitones).unwrap();
                zero_crossings(middle(&shifted[0]))
            })
            .collect();
        assert!(
            crossings.windows(2).all(|w| w[0] < w[1]),
            "crossings were {:?}",
            crossings
        );
    }

    #[test]
    fn test_preserves_length_and_channels() {
        let source = vec![
            sine(220.0, 0.5, SAMPLE_RATE, 7001),
            sine(440.0, 0.5, SAMPLE_RATE, 7001),
        ];
        let shifted = PhaseVocoder::default().shift(&source, 5).unwrap();
        assert_eq!(shifted.len(), 2);
        assert!(shifted.iter().all(|c| c.len() == 7001));
        assert!(calculate_rms(middle(&shifted[0])) > 0.1);
    }

    #[test]
    fn test_deterministic() {
        let source = vec![sine(261.6, 0.5, SAMPLE_RATE, 6000)];
        let shifter = PhaseVocoder::default();
        assert_eq!(
            shifter.shift(&source, 7).unwrap(),
            shifter.shift(&source, 7).unwrap()
        );
    }

    #[test]
    fn test_very_short_input() {
        let source = vec![vec![0.1, -0.1, 0.2]];
        let shifted = PhaseVocoder::default().shift(&source, 4).unwrap();
        assert_eq!(shifted[0].len(), 3);
    }

    #[test]
    fn test_unequal_channels_rejected() {
        let source = vec![vec![0.0; 10], vec![0.0; 9]];
        assert!(matches!(
            PhaseVocoder::default().shift(&source, 1),
            Err(ShiftError::UnequalChannels)
        ));
    }

    #[test]
    fn test_semitone_ratio() {
        assert!((semitone_ratio(12) - 2.0).abs() < 1e-12);
        assert!((semitone_ratio(0) - 1.0).abs() < 1e-12);
        assert!((semitone_ratio(-12) - 0.5).abs() < 1e-12);
    }
}
