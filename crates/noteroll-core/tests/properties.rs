use egui::pos2;
use noteroll_core::quantize::snap;
use noteroll_core::{
    engine_channel, CoordinateMapper, EditorConfig, EditorInput, EditorKey, FailurePolicy,
    LoopbackEngine, PianoRollEditor, PointerModifiers, RequestKind,
};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Step {
    Down { x: f32, y: f32, additive: bool },
    Move { x: f32, y: f32 },
    Up { x: f32, y: f32 },
    Delete,
    Frame,
    Zoom(f32),
    Engine,
    Fault(u8),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    let x = -200.0f32..4000.0;
    let y = -100.0f32..2700.0;
    prop_oneof![
        (x.clone(), y.clone(), any::<bool>())
            .prop_map(|(x, y, additive)| Step::Down { x, y, additive }),
        (x.clone(), y.clone()).prop_map(|(x, y)| Step::Move { x, y }),
        (x, y).prop_map(|(x, y)| Step::Up { x, y }),
        Just(Step::Delete),
        Just(Step::Frame),
        (0.0f32..4.0).prop_map(Step::Zoom),
        Just(Step::Engine),
        any::<u8>().prop_map(Step::Fault),
    ]
}

fn policy_strategy() -> impl Strategy<Value = FailurePolicy> {
    prop_oneof![
        Just(FailurePolicy::Ignore),
        Just(FailurePolicy::Rollback),
        (1u32..4).prop_map(|max_attempts| FailurePolicy::Retry { max_attempts }),
    ]
}

const FAULT_KINDS: [RequestKind; 4] = [
    RequestKind::CreateNote,
    RequestKind::UpdateNote,
    RequestKind::DeleteNotes,
    RequestKind::SelectNotes,
];

proptest! {
    #[test]
    fn x_round_trips_through_time(x in 0.0f32..2000.0, zoom in 0.5f32..3.0, scroll in 0.0f32..5000.0) {
        let mapper = CoordinateMapper::new(20.0, 60.0, zoom, scroll);
        let back = mapper.x_from_time(mapper.time_from_x(x));
        prop_assert!((back - x).abs() < 1e-2, "{} -> {}", x, back);
    }

    #[test]
    fn pitch_is_always_in_range(y in any::<f32>()) {
        let mapper = CoordinateMapper::new(20.0, 60.0, 1.0, 0.0);
        prop_assert!(mapper.pitch_from_y(y) <= 127);
    }

    #[test]
    fn time_is_never_negative(x in -1.0e6f32..1.0e6) {
        let mapper = CoordinateMapper::new(20.0, 60.0, 1.0, 0.0);
        prop_assert!(mapper.time_from_x(x) >= 0.0);
    }

    #[test]
    fn snapping_is_idempotent(v in -1.0e6f64..1.0e6, division in 1u32..33) {
        let once = snap(v, division);
        prop_assert_eq!(snap(once, division), once);
    }

    #[test]
    fn random_sessions_keep_notes_valid(
        steps in prop::collection::vec(step_strategy(), 1..80),
        policy in policy_strategy(),
    ) {
        let (link, endpoint) = engine_channel(1024);
        let config = EditorConfig::default().with_failure_policy(policy);
        let mut editor = PianoRollEditor::new(config, link);
        let mut engine = LoopbackEngine::demo();
        editor.load();

        for step in steps {
            match step {
                Step::Down { x, y, additive } => {
                    let dragging = editor.gesture().dragged().cloned();
                    editor.handle(EditorInput::PointerDown {
                        pos: pos2(x, y),
                        modifiers: PointerModifiers { additive },
                    });
                    if dragging.is_some() {
                        prop_assert_eq!(editor.gesture().dragged().cloned(), dragging);
                    }
                }
                Step::Move { x, y } => {
                    editor.handle(EditorInput::PointerMove { pos: pos2(x, y) });
                }
                Step::Up { x, y } => {
                    editor.handle(EditorInput::PointerUp { pos: pos2(x, y) });
                    prop_assert!(editor.gesture().is_idle());
                }
                Step::Delete => {
                    editor.handle(EditorInput::Key { key: EditorKey::Delete });
                }
                Step::Frame => {
                    editor.end_frame();
                }
                Step::Zoom(zoom) => {
                    let applied = editor.set_zoom(zoom);
                    prop_assert!((0.5..=3.0).contains(&applied));
                }
                Step::Engine => {
                    engine.process_pending(&endpoint);
                    editor.poll_engine();
                }
                Step::Fault(seed) => {
                    let kind = FAULT_KINDS[usize::from(seed) % FAULT_KINDS.len()];
                    engine.fail_next(kind, u32::from(seed % 3) + 1);
                }
            }
            for note in editor.notes() {
                prop_assert!(note.is_valid(), "invalid note {:?}", note);
            }
            let stats = editor.stats();
            prop_assert!(stats.selected <= stats.total);
        }

        engine.clear_faults();
        for _ in 0..16 {
            editor.end_frame();
            engine.process_pending(&endpoint);
            editor.poll_engine();
        }
        prop_assert_eq!(editor.store().pending_count(), 0);
    }
}
