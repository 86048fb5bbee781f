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

//! Chromatic note naming.
//!
//! The source sound is treated as semitone 0 of the scale, i.e. `C0`. Every
//! following note is one semitone higher than the previous one.

use std::fmt;
use std::str::FromStr;

/// Number of semitones in an octave.
pub const SEMITONES_PER_OCTAVE: u32 = 12;

/// Pitch class names in ascending order.
const PITCH_CLASSES: [&str; SEMITONES_PER_OCTAVE as usize] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A note in the generated scale, e.g. `C#2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteName {
    /// Semitone offset from the source sound.
    offset: u32,
}

impl NoteName {
    /// Creates the note that sits `offset` semitones above the source.
    pub fn from_offset(offset: u32) -> NoteName {
        NoteName { offset }
    }

    /// The semitone offset from the source sound.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// The octave index, starting at 0.
    pub fn octave(&self) -> u32 {
        self.offset / SEMITONES_PER_OCTAVE
    }

    /// The pitch class, e.g. `C#`.
    pub fn pitch_class(&self) -> &'static str {
        PITCH_CLASSES[(self.offset % SEMITONES_PER_OCTAVE) as usize]
    }

    /// The file name this note is persisted under, e.g. `C#2.wav`.
    pub fn file_name(&self) -> String {
        format!("{}.wav", self)
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class(), self.octave())
    }
}

impl FromStr for NoteName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| format!("note {} has no octave", s))?;
        let (class, octave) = s.split_at(split);
        let index = PITCH_CLASSES
            .iter()
            .position(|p| *p == class)
            .ok_or_else(|| format!("unknown pitch class {}", class))?;
        let octave: u32 = octave
            .parse()
            .map_err(|_| format!("invalid octave in note {}", s))?;
        Ok(NoteName::from_offset(
            octave * SEMITONES_PER_OCTAVE + index as u32,
        ))
    }
}

/// Generates the ascending chromatic scale covering the given number of octaves.
pub fn chromatic_scale(octaves: u32) -> Vec<NoteName> {
    (0..octaves * SEMITONES_PER_OCTAVE)
        .map(NoteName::from_offset)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_length() {
        for octaves in 0..=8 {
            assert_eq!(chromatic_scale(octaves).len(), 12 * octaves as usize);
        }
    }

    #[test]
    fn test_scale_order() {
        let names: Vec<String> = chromatic_scale(2).iter().map(|n| n.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "C0", "C#0", "D0", "D#0", "E0", "F0", "F#0", "G0", "G#0", "A0", "A#0", "B0", "C1",
                "C#1", "D1", "D#1", "E1", "F1", "F#1", "G1", "G#1", "A1", "A#1", "B1",
            ]
        );
    }

    #[test]
    fn test_default_scale_ends_on_b3() {
        let scale = chromatic_scale(4);
        assert_eq!(scale.len(), 48);
        assert_eq!(scale.first().map(|n| n.to_string()), Some("C0".to_string()));
        assert_eq!(scale.last().map(|n| n.to_string()), Some("B3".to_string()));
    }

    #[test]
    fn test_offsets_are_positions() {
        for (i, note) in chromatic_scale(3).iter().enumerate() {
            assert_eq!(note.offset() as usize, i);
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("C#2".parse::<NoteName>(), Ok(NoteName::from_offset(25)));
        assert_eq!("B3".parse::<NoteName>(), Ok(NoteName::from_offset(47)));
        assert!("H2".parse::<NoteName>().is_err());
        assert!("C#".parse::<NoteName>().is_err());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(NoteName::from_offset(25).file_name(), "C#2.wav");
    }
}
