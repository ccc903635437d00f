#![no_main]

use libfuzzer_sys::fuzz_target;
use noteroll_core::{
    engine_channel, EditorConfig, EditorInput, EditorKey, LoopbackEngine, PianoRollEditor,
    PointerModifiers, RequestKind, ScrollOffset,
};

fn coordinate(hi: u8, lo: u8) -> f32 {
    f32::from(u16::from_be_bytes([hi, lo])) / 16.0 - 256.0
}

fuzz_target!(|data: &[u8]| {
    let (link, endpoint) = engine_channel(64);
    let mut engine = LoopbackEngine::demo();
    let mut editor = PianoRollEditor::new(EditorConfig::default(), link);
    editor.load();

    for chunk in data.chunks_exact(5) {
        let pos = egui::pos2(coordinate(chunk[1], chunk[2]), coordinate(chunk[3], chunk[4]) * 8.0);
        match chunk[0] % 10 {
            0 => {
                editor.handle(EditorInput::PointerDown {
                    pos,
                    modifiers: PointerModifiers {
                        additive: chunk[0] & 0x80 != 0,
                    },
                });
            }
            1 | 2 => {
                editor.handle(EditorInput::PointerMove { pos });
            }
            3 => {
                editor.handle(EditorInput::PointerUp { pos });
            }
            4 => {
                editor.handle(EditorInput::Key {
                    key: EditorKey::Delete,
                });
            }
            5 => {
                editor.end_frame();
            }
            6 => {
                engine.process_pending(&endpoint);
                editor.poll_engine();
            }
            7 => {
                editor.set_zoom(pos.x / 64.0);
            }
            8 => {
                editor.on_user_scroll(ScrollOffset::new(pos.x, pos.y));
            }
            _ => {
                engine.fail_next(RequestKind::UpdateNote, 1);
            }
        }
        for note in editor.notes() {
            assert!(note.is_valid(), "invalid note {note:?}");
        }
    }

    engine.clear_faults();
    for _ in 0..16 {
        editor.end_frame();
        engine.process_pending(&endpoint);
        editor.poll_engine();
    }
});
