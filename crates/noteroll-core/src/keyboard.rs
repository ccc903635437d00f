//! Piano key column beside the note grid.

use std::ops::RangeInclusive;

use serde::Serialize;

use crate::model::{MAX_PITCH, MIDDLE_C};

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct KeyInfo {
    pub pitch: u8,
    pub name: &'static str,
    pub octave: i8,
    pub is_black: bool,
}

impl KeyInfo {
    /// Only C keys carry a label, e.g. `C4`.
    pub fn label(&self) -> Option<String> {
        (self.name == "C").then(|| format!("{}{}", self.name, self.octave))
    }

    pub fn is_middle_c(&self) -> bool {
        self.pitch == MIDDLE_C
    }
}

pub fn note_info(pitch: u8) -> KeyInfo {
    let pitch = pitch.min(MAX_PITCH);
    let name = NOTE_NAMES[usize::from(pitch % 12)];
    KeyInfo {
        pitch,
        name,
        octave: (pitch / 12) as i8 - 1,
        is_black: name.ends_with('#'),
    }
}

/// Pitches whose rows intersect a key column of `height` pixels scrolled
/// down by `scroll_y`. Empty when scrolled past the lowest row.
pub fn visible_keys(scroll_y: f32, height: f32, note_height: f32) -> RangeInclusive<u8> {
    let note_height = note_height.max(f32::EPSILON);
    let top = (scroll_y.max(0.0) / note_height).floor() as i32;
    let rows = (height.max(0.0) / note_height).ceil() as i32;
    let max = i32::from(MAX_PITCH);
    let bottom = (top + rows + 1).min(max);
    let high = max - top;
    if high < 0 {
        return RangeInclusive::new(1, 0);
    }
    let low = (max - bottom).max(0);
    low as u8..=high.min(max) as u8
}

/// Pitch of the key under `y` (relative to the column's visible top).
pub fn key_at(y: f32, scroll_y: f32, note_height: f32) -> u8 {
    let row = ((y + scroll_y.max(0.0)) / note_height.max(f32::EPSILON)).floor();
    let pitch = f32::from(MAX_PITCH) - row;
    if pitch.is_nan() {
        return 0;
    }
    pitch.clamp(0.0, f32::from(MAX_PITCH)) as u8
}
