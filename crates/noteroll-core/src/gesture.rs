//! Pointer gestures of the piano roll.
//!
//! [`GestureState::handle`] is a pure transition: it reads the notes and the
//! current mapping, updates the gesture state and returns the edits the
//! gesture asks for. Applying those edits is the caller's business.

use egui::Pos2;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::mapper::CoordinateMapper;
use crate::model::{DragContext, Note, NoteGeometry, NoteId, PendingNote};
use crate::quantize::Quantizer;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerModifiers {
    /// Add to the selection instead of replacing it (shift/ctrl click).
    #[serde(default)]
    pub additive: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorKey {
    Delete,
    Backspace,
    /// Abandons a note being drawn.
    Escape,
    Other,
}

impl EditorKey {
    pub fn deletes(self) -> bool {
        matches!(self, EditorKey::Delete | EditorKey::Backspace)
    }
}

/// Input events in grid pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditorInput {
    PointerDown {
        pos: Pos2,
        #[serde(default)]
        modifiers: PointerModifiers,
    },
    PointerMove {
        pos: Pos2,
    },
    PointerUp {
        pos: Pos2,
    },
    Key {
        key: EditorKey,
    },
}

/// Edits requested by a gesture transition.
#[derive(Clone, Debug, PartialEq)]
pub enum GestureAction {
    Select { id: NoteId, additive: bool },
    Move { id: NoteId, pitch: u8, start: f64 },
    EndDrag { id: NoteId },
    Create(NoteGeometry),
    DeleteSelected,
}

pub type GestureActions = SmallVec<[GestureAction; 2]>;

/// What a transition may look at.
#[derive(Clone, Copy, Debug)]
pub struct GestureContext<'a> {
    pub notes: &'a [Note],
    pub mapper: &'a CoordinateMapper,
    pub quantizer: &'a Quantizer,
    pub default_velocity: u8,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum GestureState {
    #[default]
    Idle,
    DraggingNote(DragContext),
    CreatingNote(PendingNote),
}

impl GestureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, GestureState::Idle)
    }

    pub fn name(&self) -> &'static str {
        match self {
            GestureState::Idle => "idle",
            GestureState::DraggingNote(_) => "dragging",
            GestureState::CreatingNote(_) => "creating",
        }
    }

    pub fn dragged(&self) -> Option<&NoteId> {
        match self {
            GestureState::DraggingNote(drag) => Some(&drag.note),
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<&PendingNote> {
        match self {
            GestureState::CreatingNote(pending) => Some(pending),
            _ => None,
        }
    }

    /// Advance the state machine by one input.
    pub fn handle(&mut self, input: &EditorInput, ctx: &GestureContext<'_>) -> GestureActions {
        let (next, actions) = transition(std::mem::take(self), input, ctx);
        *self = next;
        actions
    }
}

pub fn transition(
    state: GestureState,
    input: &EditorInput,
    ctx: &GestureContext<'_>,
) -> (GestureState, GestureActions) {
    let mut actions = GestureActions::new();
    let next = match (state, *input) {
        (GestureState::Idle, EditorInput::PointerDown { pos, modifiers }) => {
            match ctx.mapper.hit_test(ctx.notes, pos) {
                Some(note) => {
                    let origin = ctx.mapper.note_origin(note.pitch, note.start);
                    actions.push(GestureAction::Select {
                        id: note.id.clone(),
                        additive: modifiers.additive,
                    });
                    GestureState::DraggingNote(DragContext {
                        note: note.id.clone(),
                        pointer_offset: pos - origin,
                        last: Some((note.pitch, note.start)),
                    })
                }
                None => GestureState::CreatingNote(PendingNote {
                    pitch: ctx.mapper.pitch_from_y(pos.y),
                    start: ctx.quantizer.snap_start(ctx.mapper.time_from_x(pos.x)),
                }),
            }
        }
        (GestureState::Idle, EditorInput::Key { key }) => {
            if key.deletes() {
                actions.push(GestureAction::DeleteSelected);
            }
            GestureState::Idle
        }
        (GestureState::Idle, _) => GestureState::Idle,

        (GestureState::DraggingNote(mut drag), EditorInput::PointerMove { pos }) => {
            if let Some(action) = drag_to(&mut drag, pos, ctx) {
                actions.push(action);
            }
            GestureState::DraggingNote(drag)
        }
        (GestureState::DraggingNote(mut drag), EditorInput::PointerUp { pos }) => {
            if let Some(action) = drag_to(&mut drag, pos, ctx) {
                actions.push(action);
            }
            actions.push(GestureAction::EndDrag { id: drag.note });
            GestureState::Idle
        }
        (state @ GestureState::DraggingNote(_), _) => state,

        (GestureState::CreatingNote(pending), EditorInput::PointerUp { pos }) => {
            let raw = ctx.mapper.time_from_x(pos.x) - pending.start;
            actions.push(GestureAction::Create(NoteGeometry {
                pitch: pending.pitch,
                start: pending.start,
                duration: ctx.quantizer.snap_duration(raw),
                velocity: ctx.default_velocity,
            }));
            GestureState::Idle
        }
        (GestureState::CreatingNote(_), EditorInput::Key { key: EditorKey::Escape }) => {
            GestureState::Idle
        }
        (state @ GestureState::CreatingNote(_), _) => state,
    };
    (next, actions)
}

/// Keeps a corner that lands on a row edge through float error on that row.
const ROW_EDGE_TOLERANCE: f32 = 0.01;

fn drag_to(drag: &mut DragContext, pos: Pos2, ctx: &GestureContext<'_>) -> Option<GestureAction> {
    let corner = pos - drag.pointer_offset;
    let row_pitch = ctx.mapper.pitch_from_y(corner.y + ROW_EDGE_TOLERANCE);
    let pitch = ctx.quantizer.snap_pitch(f32::from(row_pitch));
    let start = ctx.quantizer.snap_start(ctx.mapper.time_from_x(corner.x));
    if drag.last == Some((pitch, start)) {
        return None;
    }
    drag.last = Some((pitch, start));
    Some(GestureAction::Move {
        id: drag.note.clone(),
        pitch,
        start,
    })
}
