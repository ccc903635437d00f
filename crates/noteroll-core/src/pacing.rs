use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::model::NoteId;

/// How drag moves are forwarded to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragUpdates {
    /// One engine update per pointer move.
    EveryMove,
    /// At most one engine update per note per frame.
    #[default]
    PerFrame,
}

/// A position ready to be sent to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    pub id: NoteId,
    pub pitch: u8,
    pub start: f64,
}

/// Coalesces drag positions so the engine sees a bounded update rate.
///
/// The local mirror is updated on every move regardless of mode; this type
/// only decides when a position travels to the engine.
#[derive(Debug, Default)]
pub struct UpdateThrottle {
    mode: DragUpdates,
    queued: SmallVec<[PositionUpdate; 2]>,
    sent: HashMap<NoteId, (u8, f64)>,
}

impl UpdateThrottle {
    pub fn new(mode: DragUpdates) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> DragUpdates {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DragUpdates) {
        self.mode = mode;
    }

    /// Record the position the engine already knows for `id`.
    pub fn begin(&mut self, id: &NoteId, pitch: u8, start: f64) {
        self.sent.insert(id.clone(), (pitch, start));
    }

    /// Offer a new position. Returns it when it must be sent right away.
    pub fn offer(&mut self, id: &NoteId, pitch: u8, start: f64) -> Option<PositionUpdate> {
        self.queued.retain(|update| &update.id != id);
        if self.sent.get(id) == Some(&(pitch, start)) {
            return None;
        }
        let update = PositionUpdate {
            id: id.clone(),
            pitch,
            start,
        };
        match self.mode {
            DragUpdates::EveryMove => {
                self.sent.insert(id.clone(), (pitch, start));
                Some(update)
            }
            DragUpdates::PerFrame => {
                self.queued.push(update);
                None
            }
        }
    }

    /// Positions coalesced during the frame that just ended.
    pub fn take_frame(&mut self) -> SmallVec<[PositionUpdate; 2]> {
        let queued = std::mem::take(&mut self.queued);
        for update in &queued {
            self.sent
                .insert(update.id.clone(), (update.pitch, update.start));
        }
        queued
    }

    /// Release the queued position of `id` immediately, if any.
    pub fn flush(&mut self, id: &NoteId) -> Option<PositionUpdate> {
        let index = self.queued.iter().position(|update| &update.id == id)?;
        let update = self.queued.remove(index);
        self.sent
            .insert(update.id.clone(), (update.pitch, update.start));
        Some(update)
    }

    /// Drop everything known about `id`.
    pub fn forget(&mut self, id: &NoteId) {
        self.queued.retain(|update| &update.id != id);
        self.sent.remove(id);
    }

    pub fn has_queued(&self) -> bool {
        !self.queued.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> NoteId {
        NoteId::from("a")
    }

    #[test]
    fn every_move_sends_each_change() {
        let mut throttle = UpdateThrottle::new(DragUpdates::EveryMove);
        throttle.begin(&id(), 60, 1.0);
        assert!(throttle.offer(&id(), 60, 1.0).is_none());
        assert!(throttle.offer(&id(), 61, 1.0).is_some());
        assert!(throttle.offer(&id(), 62, 1.0).is_some());
        assert!(throttle.offer(&id(), 62, 1.0).is_none());
    }

    #[test]
    fn per_frame_keeps_only_the_latest() {
        let mut throttle = UpdateThrottle::new(DragUpdates::PerFrame);
        throttle.begin(&id(), 60, 1.0);
        for step in 1..=10 {
            assert!(throttle.offer(&id(), 60, 1.0 + f64::from(step) * 0.25).is_none());
        }
        let frame = throttle.take_frame();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame[0].start, 3.5);
        assert!(throttle.take_frame().is_empty());
    }

    #[test]
    fn returning_to_the_sent_position_cancels() {
        let mut throttle = UpdateThrottle::new(DragUpdates::PerFrame);
        throttle.begin(&id(), 60, 1.0);
        throttle.offer(&id(), 64, 2.0);
        throttle.offer(&id(), 60, 1.0);
        assert!(!throttle.has_queued());
    }

    #[test]
    fn flush_releases_one_note() {
        let mut throttle = UpdateThrottle::new(DragUpdates::PerFrame);
        throttle.offer(&id(), 64, 2.0);
        throttle.offer(&NoteId::from("b"), 50, 0.0);
        let flushed = throttle.flush(&id()).expect("queued update");
        assert_eq!((flushed.pitch, flushed.start), (64, 2.0));
        assert!(throttle.flush(&id()).is_none());
        assert!(throttle.has_queued());
    }
}
