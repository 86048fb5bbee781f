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

//! Binding of keyboard keys to notes of the generated scale.

use std::fmt;

use crate::scale::NoteName;

/// A single logical key, always stored lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyIdentifier(char);

impl KeyIdentifier {
    /// Creates a key identifier, normalizing the character to lowercase.
    pub fn new(c: char) -> KeyIdentifier {
        // Lowercasing can expand to several chars for a few scripts; keep the
        // original character in that case.
        let mut lower = c.to_lowercase();
        match (lower.next(), lower.next()) {
            (Some(l), None) => KeyIdentifier(l),
            _ => KeyIdentifier(c),
        }
    }

    /// Returns the underlying character.
    pub fn as_char(&self) -> char {
        self.0
    }
}

impl From<char> for KeyIdentifier {
    fn from(c: char) -> Self {
        KeyIdentifier::new(c)
    }
}

impl fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-fatal problems found while building a key map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMapWarning {
    /// The layout has more keys than the scale has notes. The excess keys are unmapped.
    LayoutTooLong {
        layout_keys: usize,
        scale_notes: usize,
        dropped: Vec<KeyIdentifier>,
    },
}

impl fmt::Display for KeyMapWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMapWarning::LayoutTooLong {
                layout_keys,
                scale_notes,
                dropped,
            } => {
                let dropped: String = dropped.iter().map(|k| k.as_char()).collect();
                write!(
                    f,
                    "keyboard layout has {} keys but the scale only has {} notes, unmapped keys: {}",
                    layout_keys, scale_notes, dropped
                )
            }
        }
    }
}

/// Ordered mapping from keys to notes.
///
/// Entries keep layout order. A key repeated in the layout keeps its first position
/// but takes the note of its last occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMap {
    entries: Vec<(KeyIdentifier, NoteName)>,
}

impl KeyMap {
    /// Zips the layout against the scale positionally.
    ///
    /// Returns the map and, if the layout is longer than the scale, a warning
    /// describing the keys that were left unmapped.
    pub fn build<I>(layout: I, scale: &[NoteName]) -> (KeyMap, Option<KeyMapWarning>)
    where
        I: IntoIterator<Item = KeyIdentifier>,
    {
        let layout: Vec<KeyIdentifier> = layout.into_iter().collect();
        let mut entries: Vec<(KeyIdentifier, NoteName)> = Vec::with_capacity(scale.len());

        for (key, note) in layout.iter().zip(scale.iter()) {
            match entries.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = *note,
                None => entries.push((*key, *note)),
            }
        }

        let warning = if layout.len() > scale.len() {
            Some(KeyMapWarning::LayoutTooLong {
                layout_keys: layout.len(),
                scale_notes: scale.len(),
                dropped: layout[scale.len()..].to_vec(),
            })
        } else {
            None
        };

        (KeyMap { entries }, warning)
    }

    /// Builds a key map from a layout string such as `"zxcvb"`.
    pub fn from_layout(layout: &str, scale: &[NoteName]) -> (KeyMap, Option<KeyMapWarning>) {
        KeyMap::build(layout.chars().map(KeyIdentifier::new), scale)
    }

    /// Returns the note bound to the given key.
    pub fn get(&self, key: KeyIdentifier) -> Option<NoteName> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, note)| *note)
    }

    /// Iterates over the key to note bindings in layout order.
    pub fn iter(&self) -> impl Iterator<Item = (KeyIdentifier, NoteName)> + '_ {
        self.entries.iter().copied()
    }

    /// Number of mapped keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no keys are mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
