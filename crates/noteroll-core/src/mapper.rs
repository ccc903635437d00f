//! Conversion between pixel space and musical space.
//!
//! Horizontal pixels are measured from the left edge of the visible grid, so
//! they depend on the horizontal scroll offset. Vertical pixels are measured
//! from the top row of the pitch grid (pitch 127).

use egui::{pos2, vec2, Pos2, Rect, Vec2};

use crate::config::EditorConfig;
use crate::model::{Note, PendingNote, MAX_PITCH, MAX_VELOCITY};

/// Narrowest width a note is drawn (and hit-tested) with, in pixels.
pub const MIN_NOTE_WIDTH: f32 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateMapper {
    note_height: f32,
    beat_width: f32,
    scroll_x: f32,
}

impl CoordinateMapper {
    pub fn new(note_height: f32, base_beat_width: f32, zoom: f32, scroll_x: f32) -> Self {
        Self {
            note_height: note_height.max(f32::EPSILON),
            beat_width: (base_beat_width * zoom).max(f32::EPSILON),
            scroll_x: scroll_x.max(0.0),
        }
    }

    pub fn from_config(config: &EditorConfig, zoom: f32, scroll_x: f32) -> Self {
        Self::new(config.note_height, config.base_beat_width, zoom, scroll_x)
    }

    /// Pixels per beat at the current zoom.
    pub fn beat_width(&self) -> f32 {
        self.beat_width
    }

    pub fn note_height(&self) -> f32 {
        self.note_height
    }

    pub fn scroll_x(&self) -> f32 {
        self.scroll_x
    }

    pub fn y_from_pitch(&self, pitch: u8) -> f32 {
        f32::from(MAX_PITCH - pitch.min(MAX_PITCH)) * self.note_height
    }

    /// Row under `y`, always inside `0..=127`.
    pub fn pitch_from_y(&self, y: f32) -> u8 {
        let row = (y / self.note_height).floor();
        let pitch = f32::from(MAX_PITCH) - row;
        if pitch.is_nan() {
            return 0;
        }
        pitch.clamp(0.0, f32::from(MAX_PITCH)) as u8
    }

    pub fn x_from_time(&self, time: f64) -> f32 {
        (time * f64::from(self.beat_width) - f64::from(self.scroll_x)) as f32
    }

    /// Beat position under `x`; never negative.
    pub fn time_from_x(&self, x: f32) -> f64 {
        let time = (f64::from(x) + f64::from(self.scroll_x)) / f64::from(self.beat_width);
        time.max(0.0)
    }

    /// Top-left corner of a note's row/column cell.
    pub fn note_origin(&self, pitch: u8, start: f64) -> Pos2 {
        pos2(self.x_from_time(start), self.y_from_pitch(pitch))
    }

    /// Rectangle a note occupies on screen.
    pub fn note_rect(&self, note: &Note) -> Rect {
        let origin = self.note_origin(note.pitch, note.start);
        let width = (note.duration as f32 * self.beat_width - 2.0).max(MIN_NOTE_WIDTH);
        Rect::from_min_size(
            origin + vec2(0.0, 1.0),
            vec2(width, self.note_height - 2.0),
        )
    }

    /// Fixed-origin preview of a note being drawn, one sixteenth wide.
    pub fn pending_rect(&self, pending: &PendingNote) -> Rect {
        let origin = self.note_origin(pending.pitch, pending.start);
        let width = (self.beat_width / 4.0 - 2.0).max(MIN_NOTE_WIDTH);
        Rect::from_min_size(
            origin + vec2(0.0, 1.0),
            vec2(width, self.note_height - 2.0),
        )
    }

    /// First note, in storage order, whose rectangle contains `pos`.
    pub fn hit_test<'a>(&self, notes: &'a [Note], pos: Pos2) -> Option<&'a Note> {
        notes.iter().find(|note| self.note_rect(note).contains(pos))
    }

    /// Full size of the scrollable grid content.
    pub fn grid_size(&self, visible_beats: u32) -> Vec2 {
        vec2(
            visible_beats as f32 * self.beat_width,
            (f32::from(MAX_PITCH) + 1.0) * self.note_height,
        )
    }
}

/// Render opacity of a note, driven by its velocity.
pub fn note_opacity(velocity: u8) -> f32 {
    (f32::from(velocity.min(MAX_VELOCITY)) / f32::from(MAX_VELOCITY)).max(0.4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NoteGeometry, NoteId};

    fn mapper(scroll_x: f32) -> CoordinateMapper {
        CoordinateMapper::new(20.0, 60.0, 1.0, scroll_x)
    }

    #[test]
    fn pitch_rows_run_top_down() {
        let m = mapper(0.0);
        assert_eq!(m.y_from_pitch(127), 0.0);
        assert_eq!(m.y_from_pitch(0), 127.0 * 20.0);
        assert_eq!(m.pitch_from_y(0.0), 127);
        assert_eq!(m.pitch_from_y(19.9), 127);
        assert_eq!(m.pitch_from_y(20.0), 126);
    }

    #[test]
    fn pitch_is_clamped() {
        let m = mapper(0.0);
        assert_eq!(m.pitch_from_y(-500.0), 127);
        assert_eq!(m.pitch_from_y(1.0e9), 0);
        assert_eq!(m.pitch_from_y(f32::NAN), 0);
    }

    #[test]
    fn time_accounts_for_scroll_and_zoom() {
        let m = CoordinateMapper::new(20.0, 60.0, 2.0, 120.0);
        assert_eq!(m.beat_width(), 120.0);
        assert_eq!(m.time_from_x(0.0), 1.0);
        assert_eq!(m.x_from_time(1.0), 0.0);
        assert_eq!(m.x_from_time(2.5), 180.0);
    }

    #[test]
    fn negative_x_floors_to_zero() {
        assert_eq!(mapper(0.0).time_from_x(-40.0), 0.0);
        assert_eq!(mapper(10.0).time_from_x(-400.0), 0.0);
    }

    #[test]
    fn short_notes_keep_a_minimum_width() {
        let m = mapper(0.0);
        let note = Note::from_geometry(
            NoteId::from("n"),
            NoteGeometry {
                pitch: 127,
                start: 0.0,
                duration: 0.05,
                velocity: 90,
            },
        );
        let rect = m.note_rect(&note);
        assert_eq!(rect.width(), MIN_NOTE_WIDTH);
        assert_eq!(rect.top(), 1.0);
        assert_eq!(rect.height(), 18.0);
    }

    #[test]
    fn pending_preview_is_a_sixteenth_wide() {
        let rect = mapper(0.0).pending_rect(&PendingNote {
            pitch: 60,
            start: 2.25,
        });
        assert_eq!(rect.left(), 135.0);
        assert_eq!(rect.top(), 67.0 * 20.0 + 1.0);
        assert_eq!(rect.width(), 13.0);
        let zoomed_out = CoordinateMapper::new(20.0, 60.0, 0.5, 0.0);
        assert_eq!(
            zoomed_out
                .pending_rect(&PendingNote {
                    pitch: 60,
                    start: 0.0
                })
                .width(),
            MIN_NOTE_WIDTH
        );
    }

    #[test]
    fn opacity_has_a_floor() {
        assert_eq!(note_opacity(0), 0.4);
        assert_eq!(note_opacity(127), 1.0);
    }
}
