use std::collections::HashMap;

use super::{Completion, EngineEndpoint, EngineReply, EngineRequest, RequestKind};
use crate::error::EngineError;
use crate::model::{Note, NoteGeometry, NoteId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Next(u32),
    Always,
}

/// In-memory engine that answers every request of the engine contract.
///
/// Used by tests, benches and the CLI in place of a real audio engine.
/// Faults can be injected per request kind.
#[derive(Debug, Default)]
pub struct LoopbackEngine {
    notes: Vec<Note>,
    next_id: u64,
    zoom: Option<f32>,
    scroll: Option<(f32, f32)>,
    previews: Vec<u8>,
    faults: HashMap<RequestKind, Fault>,
    handled: usize,
}

impl LoopbackEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notes(notes: Vec<Note>) -> Self {
        Self {
            notes,
            ..Self::default()
        }
    }

    /// A C major triad, the content a fresh session starts with.
    pub fn demo() -> Self {
        let triad = [("1", 60, 1.0, 1.0, 100), ("2", 64, 2.0, 0.5, 80), ("3", 67, 3.0, 2.0, 90)];
        Self::with_notes(
            triad
                .into_iter()
                .map(|(id, pitch, start, duration, velocity)| {
                    Note::from_geometry(
                        NoteId::from(id),
                        NoteGeometry {
                            pitch,
                            start,
                            duration,
                            velocity,
                        },
                    )
                })
                .collect(),
        )
    }

    /// Reject the next `count` requests of `kind`.
    pub fn fail_next(&mut self, kind: RequestKind, count: u32) {
        if count > 0 {
            self.faults.insert(kind, Fault::Next(count));
        }
    }

    /// Reject every request of `kind` until faults are cleared.
    pub fn fail_all(&mut self, kind: RequestKind) {
        self.faults.insert(kind, Fault::Always);
    }

    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note(&self, id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| &note.id == id)
    }

    pub fn zoom(&self) -> Option<f32> {
        self.zoom
    }

    pub fn scroll(&self) -> Option<(f32, f32)> {
        self.scroll
    }

    pub fn previews(&self) -> &[u8] {
        &self.previews
    }

    /// Number of requests processed so far, failed ones included.
    pub fn handled(&self) -> usize {
        self.handled
    }

    fn take_fault(&mut self, kind: RequestKind) -> bool {
        match self.faults.get_mut(&kind) {
            Some(Fault::Always) => true,
            Some(Fault::Next(remaining)) => {
                *remaining -= 1;
                if *remaining == 0 {
                    self.faults.remove(&kind);
                }
                true
            }
            None => false,
        }
    }

    pub fn handle(&mut self, request: EngineRequest) -> Result<EngineReply, EngineError> {
        self.handled += 1;
        let kind = request.kind();
        if self.take_fault(kind) {
            return Err(EngineError::rejected(format!("injected {kind:?} fault")));
        }
        match request {
            EngineRequest::ListNotes => Ok(EngineReply::Notes(self.notes.clone())),
            EngineRequest::CreateNote {
                pitch,
                start,
                duration,
                velocity,
            } => {
                self.next_id += 1;
                let id = NoteId::new(format!("n{}", self.next_id));
                self.notes.push(Note::from_geometry(
                    id.clone(),
                    NoteGeometry {
                        pitch,
                        start,
                        duration,
                        velocity,
                    },
                ));
                Ok(EngineReply::Created(id))
            }
            EngineRequest::UpdateNote { id, patch } => {
                let note = self
                    .notes
                    .iter_mut()
                    .find(|note| note.id == id)
                    .ok_or(EngineError::UnknownNote(id))?;
                patch.apply(note);
                Ok(EngineReply::Done)
            }
            EngineRequest::DeleteNotes { ids } => {
                self.notes.retain(|note| !ids.contains(&note.id));
                Ok(EngineReply::Done)
            }
            EngineRequest::SelectNotes {
                ids,
                clear_previous,
            } => {
                for note in &mut self.notes {
                    if ids.contains(&note.id) {
                        note.selected = true;
                    } else if clear_previous {
                        note.selected = false;
                    }
                }
                Ok(EngineReply::Done)
            }
            EngineRequest::ClearSelection => {
                for note in &mut self.notes {
                    note.selected = false;
                }
                Ok(EngineReply::Done)
            }
            EngineRequest::PreviewNote { pitch } => {
                self.previews.push(pitch);
                Ok(EngineReply::Done)
            }
            EngineRequest::SetZoom { zoom } => {
                self.zoom = Some(zoom);
                Ok(EngineReply::Done)
            }
            EngineRequest::SetScrollPosition { x, y } => {
                self.scroll = Some((x, y));
                Ok(EngineReply::Done)
            }
        }
    }

    /// Service queued requests and post completions. Stops while the
    /// completion queue is full so no reply is lost; the rest stay queued.
    /// Returns how many requests were processed.
    pub fn process_pending(&mut self, endpoint: &EngineEndpoint) -> usize {
        let mut processed = 0;
        while endpoint.can_complete() {
            let Ok(Some(envelope)) = endpoint.try_recv() else {
                break;
            };
            processed += 1;
            let kind = envelope.request.kind();
            let result = self.handle(envelope.request);
            if !kind.expects_reply() {
                if let Err(err) = result {
                    tracing::debug!(?err, ?kind, "loopback dropped informational request");
                }
                continue;
            }
            let completion = Completion {
                ticket: envelope.ticket,
                result,
            };
            if let Err(err) = endpoint.complete(completion) {
                tracing::warn!(?err, ticket = envelope.ticket.0, "failed to post completion");
            }
        }
        processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{engine_channel, EngineLink, Ticket};
    use crate::model::NotePatch;

    #[test]
    fn assigns_sequential_ids() {
        let mut engine = LoopbackEngine::new();
        let create = || EngineRequest::CreateNote {
            pitch: 60,
            start: 0.0,
            duration: 1.0,
            velocity: 100,
        };
        assert_eq!(
            engine.handle(create()),
            Ok(EngineReply::Created(NoteId::from("n1")))
        );
        assert_eq!(
            engine.handle(create()),
            Ok(EngineReply::Created(NoteId::from("n2")))
        );
    }

    #[test]
    fn update_of_unknown_note_fails() {
        let mut engine = LoopbackEngine::demo();
        let err = engine
            .handle(EngineRequest::UpdateNote {
                id: NoteId::from("missing"),
                patch: NotePatch::velocity(3),
            })
            .unwrap_err();
        assert_eq!(err, EngineError::UnknownNote(NoteId::from("missing")));
    }

    #[test]
    fn fail_next_is_consumed() {
        let mut engine = LoopbackEngine::demo();
        engine.fail_next(RequestKind::ClearSelection, 1);
        assert!(engine.handle(EngineRequest::ClearSelection).is_err());
        assert!(engine.handle(EngineRequest::ClearSelection).is_ok());
    }

    #[test]
    fn fire_and_forget_requests_post_nothing() {
        let (mut link, endpoint) = engine_channel(8);
        let mut engine = LoopbackEngine::new();
        link.submit(Ticket(1), EngineRequest::SetZoom { zoom: 2.0 })
            .unwrap();
        link.submit(Ticket(2), EngineRequest::ListNotes).unwrap();
        assert_eq!(engine.process_pending(&endpoint), 2);
        assert_eq!(engine.zoom(), Some(2.0));
        let completion = link.poll().expect("list completion");
        assert_eq!(completion.ticket, Ticket(2));
        assert!(link.poll().is_none());
    }

    #[test]
    fn select_without_clear_keeps_previous() {
        let mut engine = LoopbackEngine::demo();
        engine
            .handle(EngineRequest::SelectNotes {
                ids: vec![NoteId::from("1")],
                clear_previous: true,
            })
            .unwrap();
        engine
            .handle(EngineRequest::SelectNotes {
                ids: vec![NoteId::from("2")],
                clear_previous: false,
            })
            .unwrap();
        let selected: Vec<_> = engine
            .notes()
            .iter()
            .filter(|n| n.selected)
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(selected, ["1", "2"]);
    }

    #[test]
    fn stops_while_completions_back_up() {
        let (mut link, endpoint) = engine_channel(2);
        let mut engine = LoopbackEngine::demo();
        link.submit(Ticket(1), EngineRequest::ListNotes).unwrap();
        link.submit(Ticket(2), EngineRequest::ClearSelection).unwrap();
        assert_eq!(engine.process_pending(&endpoint), 2);

        link.submit(Ticket(3), EngineRequest::ClearSelection).unwrap();
        assert_eq!(engine.process_pending(&endpoint), 0);
        assert!(!endpoint.is_empty());

        let drained: Vec<_> = std::iter::from_fn(|| link.poll()).map(|c| c.ticket).collect();
        assert_eq!(drained, [Ticket(1), Ticket(2)]);
        assert_eq!(engine.process_pending(&endpoint), 1);
        assert_eq!(link.poll().map(|c| c.ticket), Some(Ticket(3)));
    }
}
