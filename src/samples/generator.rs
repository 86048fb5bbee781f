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
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{info, span, Level};

use super::bank::SampleBank;
use super::error::GenerateError;
use super::loader::LoadedSample;
use super::pitch::{PhaseVocoder, PitchShifter};
use super::source::SourceWaveform;
use crate::scale::NoteName;

/// Builds a sample bank by shifting one source sound to every note of a scale.
pub struct SampleBankGenerator<S = PhaseVocoder> {
    shifter: S,
}

impl SampleBankGenerator<PhaseVocoder> {
    pub fn new() -> Self {
        Self::with_shifter(PhaseVocoder::default())
    }
}

impl Default for SampleBankGenerator<PhaseVocoder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: PitchShifter> SampleBankGenerator<S> {
    pub fn with_shifter(shifter: S) -> Self {
        Self { shifter }
    }

    /// Decodes the source file and generates the bank from it.
    pub fn generate_from_file(
        &self,
        path: &Path,
        scale: &[NoteName],
    ) -> Result<SampleBank, GenerateError> {
        let source = SourceWaveform::load(path)?;
        self.generate(&source, scale)
    }

    /// Shifts the source by each note's offset. Notes are processed in parallel.
    /// A failure on any note fails the whole bank.
    pub fn generate(
        &self,
        source: &SourceWaveform,
        scale: &[NoteName],
    ) -> Result<SampleBank, GenerateError> {
        let span = span!(Level::INFO, "generate", notes = scale.len());
        let _enter = span.enter();
        let start = Instant::now();

        let sample_rate = source.sample_rate();
        let entries = scale
            .par_iter()
            .map(|note| {
                let shifted = self
                    .shifter
                    .shift(source.channels(), note.offset() as i32)
                    .map_err(|source| GenerateError::Shift {
                        note: *note,
                        source,
                    })?;
                Ok((*note, LoadedSample::from_planar(&shifted, sample_rate)))
            })
            .collect::<Result<Vec<_>, GenerateError>>()?;

        info!(
            notes = entries.len(),
            sample_rate,
            channels = source.channel_count(),
            elapsed_ms = start.elapsed().as_millis(),
            "Sample bank generated"
        );
        Ok(SampleBank::new(sample_rate, source.channel_count(), entries))
    }
}
