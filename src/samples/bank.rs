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
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use rayon::prelude::*;
use tracing::info;

use super::error::GenerateError;
use super::loader::{LoadedSample, SampleLoader};
use crate::scale::NoteName;

/// Bit depth of the persisted note files.
const WRITE_BITS_PER_SAMPLE: u16 = 16;

/// One buffer per note of the scale, all sharing the source's rate and channel count.
#[derive(Debug, Clone)]
pub struct SampleBank {
    sample_rate: u32,
    channel_count: u16,
    entries: Vec<(NoteName, LoadedSample)>,
}

impl SampleBank {
    pub(super) fn new(
        sample_rate: u32,
        channel_count: u16,
        entries: Vec<(NoteName, LoadedSample)>,
    ) -> SampleBank {
        SampleBank {
            sample_rate,
            channel_count,
            entries,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the buffer for the given note.
    pub fn get(&self, note: NoteName) -> Option<&LoadedSample> {
        self.entries
            .iter()
            .find(|(n, _)| *n == note)
            .map(|(_, sample)| sample)
    }

    /// Iterates over the notes and their buffers in scale order.
    pub fn iter(&self) -> impl Iterator<Item = (NoteName, &LoadedSample)> {
        self.entries.iter().map(|(note, sample)| (*note, sample))
    }

    /// Writes every buffer to `<folder>/<NoteName>.wav` as 16 bit PCM, creating
    /// the folder if needed. Returns the written paths in scale order.
    pub fn write_to(&self, folder: &Path) -> Result<Vec<PathBuf>, GenerateError> {
        std::fs::create_dir_all(folder).map_err(|source| GenerateError::CreateDir {
            path: folder.to_path_buf(),
            source,
        })?;

        let spec = WavSpec {
            channels: self.channel_count,
            sample_rate: self.sample_rate,
            bits_per_sample: WRITE_BITS_PER_SAMPLE,
            sample_format: SampleFormat::Int,
        };

        let paths = self
            .entries
            .par_iter()
            .map(|(note, sample)| {
                let path = folder.join(note.file_name());
                write_sample(&path, spec, sample).map_err(|source| GenerateError::Write {
                    path: path.clone(),
                    source,
                })?;
                Ok(path)
            })
            .collect::<Result<Vec<_>, GenerateError>>()?;

        info!(folder = ?folder, notes = paths.len(), "Sample bank written");
        Ok(paths)
    }

    /// Hands the in-memory buffers to the loader so playback does not have to
    /// read back the files that were just written.
    pub fn seed(&self, folder: &Path, loader: &mut SampleLoader) {
        for (note, sample) in self.entries.iter() {
            loader.insert(folder.join(note.file_name()), sample.clone());
        }
    }
}

fn write_sample(path: &Path, spec: WavSpec, sample: &LoadedSample) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec)?;
    {
        let mut writer = writer.get_i16_writer(sample.data().len() as u32);
        for value in sample.data() {
            writer.write_sample((value.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
        }
        writer.flush()?;
    }
    writer.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> SampleBank {
        SampleBank::new(
            22050,
            2,
            vec![
                (
                    "C0".parse().unwrap(),
                    LoadedSample::from_interleaved(vec![0.5, -0.5, 0.25, -0.25], 2, 22050),
                ),
                (
                    "C#0".parse().unwrap(),
                    LoadedSample::from_interleaved(vec![2.0, -2.0, 0.0, 0.0], 2, 22050),
                ),
            ],
        )
    }

    #[test]
    fn test_write_to_creates_one_file_per_note() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("nested").join("scaled_notes");
        let paths = bank().write_to(&folder).unwrap();

        assert_eq!(
            paths,
            vec![folder.join("C0.wav"), folder.join("C#0.wav")]
        );
        for path in paths {
            let reader = hound::WavReader::open(path).unwrap();
            let spec = reader.spec();
            assert_eq!(spec.sample_rate, 22050);
            assert_eq!(spec.channels, 2);
            assert_eq!(spec.bits_per_sample, 16);
        }
    }

    #[test]
    fn test_written_files_load_back() {
        let dir = tempfile::tempdir().unwrap();
        bank().write_to(dir.path()).unwrap();

        let mut loader = SampleLoader::new(22050);
        let loaded = loader
            .load_note(dir.path(), "C0".parse().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(loaded.channel_count(), 2);
        assert_eq!(loaded.frames(), 2);
        assert!((loaded.data()[0] - 0.5).abs() < 1e-3);
        assert!((loaded.data()[3] + 0.25).abs() < 1e-3);

        // Out of range values are clipped.
        let clipped = loader
            .load_note(dir.path(), "C#0".parse().unwrap())
            .unwrap()
            .unwrap();
        assert!(clipped.data()[0] <= 1.0);
        assert!(clipped.data()[1] >= -1.0);
    }

    #[test]
    fn test_seed_fills_loader_cache() {
        let dir = tempfile::tempdir().unwrap();
        let bank = bank();
        let mut loader = SampleLoader::new(22050);
        bank.seed(dir.path(), &mut loader);
        assert_eq!(loader.cached(), 2);
    }

    #[test]
    fn test_get() {
        let bank = bank();
        assert!(bank.get("C#0".parse().unwrap()).is_some());
        assert!(bank.get("D0".parse().unwrap()).is_none());
        assert_eq!(bank.len(), 2);
    }
}
