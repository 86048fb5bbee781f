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

//! Per-key voice bookkeeping for the playback engine.
//!
//! Voices live in a fixed arena. A key is resolved to its slot through a flat
//! table for ASCII keys, falling back to a map for everything else.

use std::collections::HashMap;

use crate::audio::VoiceId;
use crate::keymap::KeyIdentifier;
use crate::samples::LoadedSample;
use crate::scale::NoteName;

const ASCII_KEYS: usize = 128;

/// Playback state of a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoiceState {
    pub loaded: bool,
    pub sounding: bool,
}

/// A key with its preloaded sample.
pub(super) struct VoiceSlot {
    pub(super) key: KeyIdentifier,
    pub(super) note: NoteName,
    pub(super) sample: LoadedSample,
    pub(super) state: VoiceState,
}

/// Resolves keys to voice slots.
pub(super) struct KeyIndex {
    ascii: [Option<VoiceId>; ASCII_KEYS],
    other: HashMap<KeyIdentifier, VoiceId>,
}

impl KeyIndex {
    fn new() -> KeyIndex {
        KeyIndex {
            ascii: [None; ASCII_KEYS],
            other: HashMap::new(),
        }
    }

    fn insert(&mut self, key: KeyIdentifier, voice: VoiceId) {
        match ascii_index(key) {
            Some(i) => self.ascii[i] = Some(voice),
            None => {
                self.other.insert(key, voice);
            }
        }
    }

    fn get(&self, key: KeyIdentifier) -> Option<VoiceId> {
        match ascii_index(key) {
            Some(i) => self.ascii[i],
            None => self.other.get(&key).copied(),
        }
    }
}

fn ascii_index(key: KeyIdentifier) -> Option<usize> {
    let c = key.as_char();
    c.is_ascii().then_some(c as usize)
}

/// Keys that are currently sounding, one bit per voice.
#[derive(Debug, Default)]
pub(super) struct ActiveKeySet {
    bits: Vec<u64>,
}

impl ActiveKeySet {
    fn with_capacity(voices: usize) -> ActiveKeySet {
        ActiveKeySet {
            bits: vec![0; voices.div_ceil(64)],
        }
    }

    /// Returns false if the voice was already present.
    pub(super) fn insert(&mut self, voice: VoiceId) -> bool {
        let (word, mask) = Self::position(voice);
        let was_set = self.bits[word] & mask != 0;
        self.bits[word] |= mask;
        !was_set
    }

    /// Returns false if the voice was not present.
    pub(super) fn remove(&mut self, voice: VoiceId) -> bool {
        let (word, mask) = Self::position(voice);
        let was_set = self.bits[word] & mask != 0;
        self.bits[word] &= !mask;
        was_set
    }

    pub(super) fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub(super) fn clear(&mut self) {
        self.bits.fill(0);
    }

    fn position(voice: VoiceId) -> (usize, u64) {
        (voice.index() / 64, 1 << (voice.index() % 64))
    }
}

/// The fixed set of voices built when the engine starts.
pub(super) struct VoiceArena {
    slots: Vec<VoiceSlot>,
    index: KeyIndex,
    pub(super) active: ActiveKeySet,
}

impl VoiceArena {
    pub(super) fn new(slots: Vec<VoiceSlot>) -> VoiceArena {
        let mut index = KeyIndex::new();
        for (i, slot) in slots.iter().enumerate() {
            index.insert(slot.key, VoiceId::new(i));
        }
        VoiceArena {
            active: ActiveKeySet::with_capacity(slots.len()),
            slots,
            index,
        }
    }

    pub(super) fn resolve(&self, key: KeyIdentifier) -> Option<VoiceId> {
        self.index.get(key)
    }

    pub(super) fn slot(&self, voice: VoiceId) -> &VoiceSlot {
        &self.slots[voice.index()]
    }

    pub(super) fn slot_mut(&mut self, voice: VoiceId) -> &mut VoiceSlot {
        &mut self.slots[voice.index()]
    }

    pub(super) fn slots_mut(&mut self) -> impl Iterator<Item = &mut VoiceSlot> {
        self.slots.iter_mut()
    }

    pub(super) fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(c: char, offset: u32) -> VoiceSlot {
        VoiceSlot {
            key: KeyIdentifier::new(c),
            note: NoteName::from_offset(offset),
            sample: LoadedSample::from_interleaved(vec![0.0; 4], 1, 44100),
            state: VoiceState {
                loaded: true,
                sounding: false,
            },
        }
    }

    #[test]
    fn test_key_index_ascii_and_fallback() {
        let arena = VoiceArena::new(vec![slot('a', 0), slot('ü', 1), slot(';', 2)]);
        assert_eq!(arena.resolve('a'.into()), Some(VoiceId::new(0)));
        assert_eq!(arena.resolve('Ü'.into()), Some(VoiceId::new(1)));
        assert_eq!(arena.resolve(';'.into()), Some(VoiceId::new(2)));
        assert_eq!(arena.resolve('b'.into()), None);
        assert_eq!(arena.resolve('é'.into()), None);
        assert_eq!(arena.slot(VoiceId::new(1)).note, NoteName::from_offset(1));
    }

    #[test]
    fn test_active_key_set() {
        let mut active = ActiveKeySet::with_capacity(70);
        assert!(active.insert(VoiceId::new(3)));
        assert!(!active.insert(VoiceId::new(3)));
        assert!(active.insert(VoiceId::new(69)));
        assert_eq!(active.len(), 2);

        assert!(active.remove(VoiceId::new(3)));
        assert!(!active.remove(VoiceId::new(3)));
        assert_eq!(active.len(), 1);

        active.clear();
        assert_eq!(active.len(), 0);
        assert!(active.insert(VoiceId::new(69)));
    }
}
