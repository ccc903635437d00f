use std::ops::RangeInclusive;

use egui::{Pos2, Rect, Vec2};
use tracing::debug;

use crate::config::EditorConfig;
use crate::engine::{EngineLink, EngineRequest, Ticket};
use crate::gesture::{EditorInput, GestureAction, GestureActions, GestureContext, GestureState};
use crate::keyboard;
use crate::mapper::{note_opacity, CoordinateMapper};
use crate::model::{Note, NoteId, NotePatch, NoteStats};
use crate::pacing::UpdateThrottle;
use crate::quantize::Quantizer;
use crate::scroll::{ScrollOffset, ScrollPort};
use crate::store::{NoteStore, StoreEvent};
use crate::viewport::Viewport;

/// What a renderer needs to draw one note.
#[derive(Clone, Debug, PartialEq)]
pub struct NoteSprite {
    pub id: NoteId,
    pub rect: Rect,
    pub opacity: f32,
    pub selected: bool,
}

/// The piano roll: gestures, mapping, quantizing and the note store wired
/// together around one engine link.
pub struct PianoRollEditor<L> {
    config: EditorConfig,
    quantizer: Quantizer,
    viewport: Viewport,
    store: NoteStore<L>,
    gesture: GestureState,
    throttle: UpdateThrottle,
    scroll: Option<ScrollPort>,
}

impl<L: EngineLink> PianoRollEditor<L> {
    pub fn new(config: EditorConfig, link: L) -> Self {
        Self {
            quantizer: Quantizer::from_config(&config),
            viewport: Viewport::new(config.zoom),
            store: NoteStore::new(link, config.failure_policy, config.min_duration),
            gesture: GestureState::Idle,
            throttle: UpdateThrottle::new(config.drag_updates),
            scroll: None,
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn notes(&self) -> &[Note] {
        self.store.list()
    }

    pub fn store(&self) -> &NoteStore<L> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut NoteStore<L> {
        &mut self.store
    }

    pub fn stats(&self) -> NoteStats {
        self.store.stats()
    }

    pub fn gesture(&self) -> &GestureState {
        &self.gesture
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    pub fn mapper(&self) -> CoordinateMapper {
        self.viewport.mapper(&self.config)
    }

    /// Request the engine's notes.
    pub fn load(&mut self) -> Ticket {
        self.store.load()
    }

    pub fn poll_engine(&mut self) -> Vec<StoreEvent> {
        self.store.poll_engine()
    }

    /// Feed one input event through the gesture state machine and apply the
    /// resulting edits. Returns the applied actions.
    pub fn handle(&mut self, input: EditorInput) -> GestureActions {
        let mapper = self.mapper();
        let ctx = GestureContext {
            notes: self.store.list(),
            mapper: &mapper,
            quantizer: &self.quantizer,
            default_velocity: self.config.default_velocity,
        };
        let actions = self.gesture.handle(&input, &ctx);
        for action in &actions {
            debug!(state = self.gesture.name(), ?action, "gesture action");
            self.apply(action);
        }
        actions
    }

    fn apply(&mut self, action: &GestureAction) {
        match action {
            GestureAction::Select { id, additive } => {
                self.store.select(std::slice::from_ref(id), !additive);
                if let Some(note) = self.store.get(id) {
                    let (pitch, start) = (note.pitch, note.start);
                    self.throttle.begin(id, pitch, start);
                }
            }
            GestureAction::Move { id, pitch, start } => {
                let patch = NotePatch::position(*pitch, *start);
                match self.throttle.offer(id, *pitch, *start) {
                    Some(_) => self.store.commit_update(id, patch),
                    None => self.store.stage_update(id, patch),
                };
            }
            GestureAction::EndDrag { id } => {
                if let Some(update) = self.throttle.flush(id) {
                    self.store
                        .commit_update(id, NotePatch::position(update.pitch, update.start));
                }
                self.throttle.forget(id);
            }
            GestureAction::Create(geometry) => {
                let id = self.store.create(*geometry);
                self.store.select(&[id], true);
            }
            GestureAction::DeleteSelected => {
                let selected = self.store.selected_ids();
                for id in &selected {
                    self.throttle.forget(id);
                }
                self.store.delete(&selected);
            }
        }
    }

    /// Close the current frame: send drag positions coalesced since the
    /// last call. Returns how many updates were sent.
    pub fn end_frame(&mut self) -> usize {
        let frame = self.throttle.take_frame();
        let mut sent = 0;
        for update in frame {
            if self
                .store
                .commit_update(&update.id, NotePatch::position(update.pitch, update.start))
            {
                sent += 1;
            }
        }
        sent
    }

    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        let before = self.viewport.zoom();
        let applied = self.viewport.set_zoom(zoom);
        self.zoom_changed(before);
        applied
    }

    pub fn zoom_in(&mut self) -> f32 {
        let before = self.viewport.zoom();
        let applied = self.viewport.zoom_in();
        self.zoom_changed(before);
        applied
    }

    pub fn zoom_out(&mut self) -> f32 {
        let before = self.viewport.zoom();
        let applied = self.viewport.zoom_out();
        self.zoom_changed(before);
        applied
    }

    fn zoom_changed(&mut self, before: f32) {
        let zoom = self.viewport.zoom();
        if zoom != before {
            self.store.notify(EngineRequest::SetZoom { zoom });
        }
    }

    pub fn set_panel_size(&mut self, width: f32, height: f32) {
        self.viewport.set_size(width, height);
    }

    /// Presentational split percentages handed down by the layout.
    pub fn set_percent(&mut self, width: f32, height: f32) {
        self.viewport.set_percent(width, height);
    }

    /// Connect to the layout's scroll synchronisation.
    pub fn attach_scroll(&mut self, port: ScrollPort) {
        self.viewport.set_scroll(port.offset());
        self.scroll = Some(port);
    }

    /// Scroll position pushed down by the owner.
    pub fn set_scroll(&mut self, offset: ScrollOffset) {
        self.viewport.set_scroll(offset);
    }

    /// Follow the shared scroll offset. Returns `true` if the view moved.
    pub fn sync_scroll(&mut self) -> bool {
        let Some(offset) = self.scroll.as_mut().and_then(ScrollPort::pull) else {
            return false;
        };
        self.viewport.set_scroll(offset);
        true
    }

    /// The user scrolled the piano roll.
    pub fn on_user_scroll(&mut self, offset: ScrollOffset) {
        self.viewport.set_scroll(offset);
        let offset = self.viewport.scroll();
        if let Some(port) = self.scroll.as_mut() {
            port.emit(offset);
        }
        self.store.notify(EngineRequest::SetScrollPosition {
            x: offset.x,
            y: offset.y,
        });
    }

    /// Audible preview of a piano key.
    pub fn preview_key(&mut self, pitch: u8) {
        self.store.notify(EngineRequest::PreviewNote {
            pitch: pitch.min(crate::model::MAX_PITCH),
        });
    }

    /// Key under `pos`, relative to the key column's visible top-left.
    pub fn key_under(&self, pos: Pos2) -> Option<u8> {
        if !(0.0..self.config.piano_width).contains(&pos.x) {
            return None;
        }
        Some(keyboard::key_at(
            pos.y,
            self.viewport.scroll().y,
            self.config.note_height,
        ))
    }

    /// A click in the key column. Returns the previewed pitch.
    pub fn click_key(&mut self, pos: Pos2) -> Option<u8> {
        let pitch = self.key_under(pos)?;
        self.preview_key(pitch);
        Some(pitch)
    }

    pub fn visible_keys(&self) -> RangeInclusive<u8> {
        keyboard::visible_keys(
            self.viewport.scroll().y,
            self.viewport.size().y,
            self.config.note_height,
        )
    }

    /// Preview of the note being drawn, if any.
    pub fn preview_rect(&self) -> Option<Rect> {
        let pending = self.gesture.pending()?;
        Some(self.mapper().pending_rect(pending))
    }

    pub fn sprites(&self) -> Vec<NoteSprite> {
        let mapper = self.mapper();
        self.store
            .list()
            .iter()
            .map(|note| NoteSprite {
                id: note.id.clone(),
                rect: mapper.note_rect(note),
                opacity: note_opacity(note.velocity),
                selected: note.selected,
            })
            .collect()
    }

    pub fn grid_size(&self) -> Vec2 {
        self.mapper().grid_size(self.config.visible_beats)
    }
}

#[cfg(test)]
mod tests {
    use egui::pos2;

    use super::*;
    use crate::engine::{engine_channel, ChannelLink, EngineEndpoint, LoopbackEngine, RequestKind};
    use crate::gesture::PointerModifiers;
    use crate::pacing::DragUpdates;

    fn editor(mode: DragUpdates) -> (PianoRollEditor<ChannelLink>, EngineEndpoint, LoopbackEngine) {
        let (link, endpoint) = engine_channel(256);
        let mut editor =
            PianoRollEditor::new(EditorConfig::default().with_drag_updates(mode), link);
        let mut engine = LoopbackEngine::demo();
        editor.load();
        engine.process_pending(&endpoint);
        editor.poll_engine();
        (editor, endpoint, engine)
    }

    fn row(pitch: u8) -> f32 {
        f32::from(127 - pitch) * 20.0 + 10.0
    }

    fn drag(editor: &mut PianoRollEditor<ChannelLink>, moves: &[f32]) {
        editor.handle(EditorInput::PointerDown {
            pos: pos2(65.0, row(60)),
            modifiers: PointerModifiers::default(),
        });
        for x in moves {
            editor.handle(EditorInput::PointerMove {
                pos: pos2(*x, row(60)),
            });
        }
    }

    #[test]
    fn every_move_floods_the_engine() {
        let (mut editor, endpoint, mut engine) = editor(DragUpdates::EveryMove);
        drag(&mut editor, &[80.0, 95.0, 110.0, 125.0]);
        engine.process_pending(&endpoint);
        let updates = editor.store().pending_count();
        assert_eq!(updates, 5);
    }

    #[test]
    fn per_frame_sends_one_update_per_frame() {
        let (mut editor, endpoint, mut engine) = editor(DragUpdates::PerFrame);
        drag(&mut editor, &[80.0, 95.0, 110.0, 125.0]);
        assert_eq!(editor.notes()[0].start, 2.0);
        assert_eq!(editor.end_frame(), 1);
        assert_eq!(editor.end_frame(), 0);
        engine.process_pending(&endpoint);
        editor.poll_engine();
        assert_eq!(engine.note(&NoteId::from("1")).map(|n| n.start), Some(2.0));
    }

    #[test]
    fn pointer_up_flushes_the_final_position() {
        let (mut editor, endpoint, mut engine) = editor(DragUpdates::PerFrame);
        drag(&mut editor, &[95.0]);
        editor.handle(EditorInput::PointerUp {
            pos: pos2(95.0, row(60)),
        });
        engine.process_pending(&endpoint);
        assert_eq!(engine.note(&NoteId::from("1")).map(|n| n.start), Some(1.5));
        assert!(editor.gesture().is_idle());
    }

    #[test]
    fn zoom_is_reported_to_the_engine() {
        let (mut editor, endpoint, mut engine) = editor(DragUpdates::PerFrame);
        assert_eq!(editor.set_zoom(2.0), 2.0);
        editor.set_zoom(2.0);
        engine.process_pending(&endpoint);
        assert_eq!(engine.zoom(), Some(2.0));
        assert_eq!(editor.mapper().beat_width(), 120.0);
    }

    #[test]
    fn key_clicks_preview_notes() {
        let (mut editor, endpoint, mut engine) = editor(DragUpdates::PerFrame);
        editor.set_scroll(ScrollOffset::new(0.0, 1340.0));
        assert_eq!(editor.click_key(pos2(40.0, 5.0)), Some(60));
        assert_eq!(editor.click_key(pos2(85.0, 5.0)), None);
        assert_eq!(editor.click_key(pos2(-1.0, 5.0)), None);
        engine.process_pending(&endpoint);
        assert_eq!(engine.previews(), [60]);
    }

    #[test]
    fn preview_rect_exists_only_while_creating() {
        let (mut editor, _endpoint, _engine) = editor(DragUpdates::PerFrame);
        assert!(editor.preview_rect().is_none());
        editor.handle(EditorInput::PointerDown {
            pos: pos2(600.0, row(30)),
            modifiers: PointerModifiers::default(),
        });
        let rect = editor.preview_rect().expect("creating");
        assert_eq!(rect.left(), 600.0);
        assert_eq!(rect.width(), 13.0);
    }

    #[test]
    fn failed_preview_is_not_tracked() {
        let (mut editor, endpoint, mut engine) = editor(DragUpdates::PerFrame);
        engine.fail_all(RequestKind::PreviewNote);
        editor.preview_key(64);
        engine.process_pending(&endpoint);
        assert!(editor.poll_engine().is_empty());
        assert_eq!(editor.store().pending_count(), 0);
    }
}
