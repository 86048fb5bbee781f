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

//! A computer-keyboard piano built from a single recorded sound.
//!
//! The sound is pitch shifted into a chromatic scale, the notes are bound to
//! keyboard keys and played back with short fades as keys are pressed and
//! released.

pub mod audio;
pub mod config;
pub mod controller;
pub mod engine;
pub mod keymap;
pub mod samples;
pub mod scale;
#[cfg(test)]
mod testutil;
