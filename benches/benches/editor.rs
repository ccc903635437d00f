use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use noteroll_core::{
    engine_channel, CoordinateMapper, DragUpdates, EditorConfig, EditorInput, LoopbackEngine,
    Note, NoteGeometry, NoteId, PianoRollEditor, PointerModifiers,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_notes(count: usize) -> Vec<Note> {
    let mut rng = StdRng::seed_from_u64(7);
    (0..count)
        .map(|index| {
            let geometry = NoteGeometry {
                pitch: rng.gen_range(24..=96),
                start: f64::from(rng.gen_range(0..256u32)) * 0.25,
                duration: f64::from(rng.gen_range(1..16u32)) * 0.25,
                velocity: rng.gen_range(1..=127),
            };
            Note::from_geometry(NoteId::new(index.to_string()), geometry)
        })
        .collect()
}

fn hit_testing(c: &mut Criterion) {
    let mut group = c.benchmark_group("mapper");
    let notes = random_notes(2_000);
    let mapper = CoordinateMapper::new(20.0, 60.0, 1.0, 0.0);
    let mut rng = StdRng::seed_from_u64(11);
    let points: Vec<_> = (0..256)
        .map(|_| egui::pos2(rng.gen_range(0.0..3_840.0), rng.gen_range(0.0..2_560.0)))
        .collect();

    group.bench_function("hit_test_2000_notes", |b| {
        b.iter(|| {
            for point in &points {
                black_box(mapper.hit_test(&notes, *point));
            }
        });
    });
    group.finish();
}

fn drag_flood(c: &mut Criterion) {
    let mut group = c.benchmark_group("editor");
    group.measurement_time(Duration::from_secs(10));

    for mode in [DragUpdates::EveryMove, DragUpdates::PerFrame] {
        group.bench_function(format!("drag_600_moves_{mode:?}"), |b| {
            b.iter_batched(
                || {
                    let config = EditorConfig::default().with_drag_updates(mode);
                    let (link, endpoint) = engine_channel(4_096);
                    let mut engine = LoopbackEngine::with_notes(random_notes(500));
                    let mut editor = PianoRollEditor::new(config, link);
                    editor.load();
                    engine.process_pending(&endpoint);
                    editor.poll_engine();
                    (editor, engine, endpoint)
                },
                |(mut editor, mut engine, endpoint)| {
                    let Some(note) = editor.notes().first().cloned() else {
                        return;
                    };
                    let origin = editor.mapper().note_origin(note.pitch, note.start);
                    let grab = egui::pos2(origin.x + 2.0, origin.y + 2.0);
                    editor.handle(EditorInput::PointerDown {
                        pos: grab,
                        modifiers: PointerModifiers::default(),
                    });
                    for step in 0..600 {
                        let pos = egui::pos2(grab.x + step as f32, grab.y + (step % 40) as f32);
                        editor.handle(EditorInput::PointerMove { pos });
                        if step % 10 == 0 {
                            editor.end_frame();
                            engine.process_pending(&endpoint);
                            editor.poll_engine();
                        }
                    }
                    editor.handle(EditorInput::PointerUp { pos: grab });
                    engine.process_pending(&endpoint);
                    black_box(editor.poll_engine());
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, hit_testing, drag_flood);
criterion_main!(benches);
