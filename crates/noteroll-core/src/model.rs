use std::fmt;

use egui::Vec2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Highest MIDI pitch; pitch rows run `0..=MAX_PITCH`.
pub const MAX_PITCH: u8 = 127;
/// Highest MIDI velocity.
pub const MAX_VELOCITY: u8 = 127;
/// Pitch of middle C (C4).
pub const MIDDLE_C: u8 = 60;

/// Opaque note identifier.
///
/// Notes loaded from the engine keep the engine's id. Notes created in the
/// editor get a fresh local id which stays stable for the note's lifetime,
/// even after the engine assigns its own.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh id for a note created in the editor.
    pub fn local() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A note in the local mirror. Positions and durations are in beats.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub pitch: u8,
    pub start: f64,
    pub duration: f64,
    pub velocity: u8,
    #[serde(default)]
    pub selected: bool,
}

impl Note {
    pub fn from_geometry(id: NoteId, geometry: NoteGeometry) -> Self {
        Self {
            id,
            pitch: geometry.pitch,
            start: geometry.start,
            duration: geometry.duration,
            velocity: geometry.velocity,
            selected: false,
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn geometry(&self) -> NoteGeometry {
        NoteGeometry {
            pitch: self.pitch,
            start: self.start,
            duration: self.duration,
            velocity: self.velocity,
        }
    }

    /// Whether the note satisfies the pitch/start/duration/velocity invariants.
    pub fn is_valid(&self) -> bool {
        self.geometry().is_valid()
    }

    /// Force the note back into range. Returns `true` if anything changed.
    pub fn sanitize(&mut self, min_duration: f64) -> bool {
        let fixed = self.geometry().sanitized(min_duration);
        if fixed == self.geometry() {
            return false;
        }
        self.pitch = fixed.pitch;
        self.start = fixed.start;
        self.duration = fixed.duration;
        self.velocity = fixed.velocity;
        true
    }
}

/// Geometry of a note about to be created.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteGeometry {
    pub pitch: u8,
    pub start: f64,
    pub duration: f64,
    pub velocity: u8,
}

impl NoteGeometry {
    pub fn is_valid(&self) -> bool {
        self.pitch <= MAX_PITCH
            && self.velocity <= MAX_VELOCITY
            && self.start.is_finite()
            && self.start >= 0.0
            && self.duration.is_finite()
            && self.duration > 0.0
    }

    pub fn sanitized(self, min_duration: f64) -> Self {
        Self {
            pitch: self.pitch.min(MAX_PITCH),
            start: sanitize_start(self.start),
            duration: sanitize_duration(self.duration, min_duration),
            velocity: self.velocity.min(MAX_VELOCITY),
        }
    }
}

fn sanitize_start(start: f64) -> f64 {
    if start.is_finite() {
        start.max(0.0)
    } else {
        0.0
    }
}

fn sanitize_duration(duration: f64, min_duration: f64) -> f64 {
    let floor = if min_duration.is_finite() && min_duration > 0.0 {
        min_duration
    } else {
        f64::EPSILON
    };
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        floor
    }
}

/// Partial update of a note. `None` fields are left untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<u8>,
}

impl NotePatch {
    /// Patch moving a note to a new pitch and start.
    pub fn position(pitch: u8, start: f64) -> Self {
        Self {
            pitch: Some(pitch),
            start: Some(start),
            ..Self::default()
        }
    }

    pub fn velocity(velocity: u8) -> Self {
        Self {
            velocity: Some(velocity),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pitch.is_none()
            && self.start.is_none()
            && self.duration.is_none()
            && self.velocity.is_none()
    }

    /// Combine with a newer patch; fields set in `newer` win.
    pub fn merge(self, newer: NotePatch) -> NotePatch {
        NotePatch {
            pitch: newer.pitch.or(self.pitch),
            start: newer.start.or(self.start),
            duration: newer.duration.or(self.duration),
            velocity: newer.velocity.or(self.velocity),
        }
    }

    pub fn sanitized(self, min_duration: f64) -> NotePatch {
        NotePatch {
            pitch: self.pitch.map(|p| p.min(MAX_PITCH)),
            start: self.start.map(sanitize_start),
            duration: self.duration.map(|d| sanitize_duration(d, min_duration)),
            velocity: self.velocity.map(|v| v.min(MAX_VELOCITY)),
        }
    }

    /// The note's current values for the fields this patch touches.
    pub fn capture(&self, note: &Note) -> NotePatch {
        NotePatch {
            pitch: self.pitch.map(|_| note.pitch),
            start: self.start.map(|_| note.start),
            duration: self.duration.map(|_| note.duration),
            velocity: self.velocity.map(|_| note.velocity),
        }
    }

    /// Apply to `note`. Returns `true` if the note changed.
    pub fn apply(&self, note: &mut Note) -> bool {
        let before = note.geometry();
        if let Some(pitch) = self.pitch {
            note.pitch = pitch;
        }
        if let Some(start) = self.start {
            note.start = start;
        }
        if let Some(duration) = self.duration {
            note.duration = duration;
        }
        if let Some(velocity) = self.velocity {
            note.velocity = velocity;
        }
        before != note.geometry()
    }
}

/// Provisional geometry of a note being drawn; not in the store until commit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PendingNote {
    pub pitch: u8,
    pub start: f64,
}

/// State of an active drag.
#[derive(Clone, Debug, PartialEq)]
pub struct DragContext {
    pub note: NoteId,
    /// Pointer position minus the note's visual origin at gesture start.
    pub pointer_offset: Vec2,
    /// Last `(pitch, start)` computed for the grabbed note.
    pub last: Option<(u8, f64)>,
}

/// Counters shown in the piano roll header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NoteStats {
    pub total: usize,
    pub selected: usize,
}
