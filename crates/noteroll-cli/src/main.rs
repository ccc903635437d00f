use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use noteroll_core::{
    engine_channel, ChannelLink, EditorConfig, EditorInput, EngineEndpoint, LoopbackEngine, Note,
    NoteStats, PianoRollEditor, RequestKind, ScrollOffset, StoreEvent,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

const APP_DIR_NAME: &str = "Noteroll";
const CONFIG_FILE: &str = "editor.json";
/// Rounds of frame + engine servicing after the last step.
const SETTLE_ROUNDS: usize = 32;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    let cli = Cli::parse();
    match cli.command {
        Commands::Replay(args) => execute_replay(args),
        Commands::Config(args) => execute_config(args),
    }
}

#[derive(Parser)]
#[command(author, version, about = "Headless tools for the Noteroll piano roll")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an input script against an in-process engine and print the notes.
    Replay(ReplayArgs),
    /// Print the effective editor configuration.
    Config(ConfigArgs),
}

#[derive(Args)]
struct ReplayArgs {
    /// Path to the input script (JSON).
    #[arg(long)]
    script: PathBuf,
    #[command(flatten)]
    config: ConfigArgs,
    /// Also print engine events raised while replaying.
    #[arg(long)]
    events: bool,
}

#[derive(Args)]
struct ConfigArgs {
    /// Editor configuration file. Defaults to the user config directory.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct Script {
    /// Seed the engine with the demo notes before loading.
    #[serde(default)]
    demo: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Step {
    Input(EditorInput),
    Control(Control),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Control {
    /// End of a display frame; flushes coalesced drag updates.
    Frame,
    /// Let the engine answer everything queued so far.
    Engine,
    Scroll {
        x: f32,
        y: f32,
    },
    Zoom {
        zoom: f32,
    },
    PreviewKey {
        pitch: u8,
    },
    /// Make the next `count` requests of `kind` fail.
    Fail {
        kind: RequestKind,
        #[serde(default = "one")]
        count: u32,
    },
}

fn one() -> u32 {
    1
}

#[derive(Serialize)]
struct ReplayReport<'a> {
    notes: &'a [Note],
    stats: NoteStats,
    engine_notes: &'a [Note],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    events: Vec<String>,
}

fn config_path() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join(APP_DIR_NAME).join(CONFIG_FILE);
    path.exists().then_some(path)
}

fn load_config(args: &ConfigArgs) -> Result<EditorConfig> {
    let path = match args.config.clone().or_else(config_path) {
        Some(path) => path,
        None => {
            tracing::debug!("no editor config found, using defaults");
            return Ok(EditorConfig::default());
        }
    };
    let config = EditorConfig::load(&path)
        .with_context(|| format!("failed to load editor config {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded editor config");
    Ok(config)
}

fn load_script(path: &Path) -> Result<Script> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("{} is not a valid script", path.display()))
}

struct Replay {
    editor: PianoRollEditor<ChannelLink>,
    engine: LoopbackEngine,
    endpoint: EngineEndpoint,
    events: Vec<StoreEvent>,
}

impl Replay {
    fn new(config: EditorConfig, engine: LoopbackEngine) -> Self {
        let (link, endpoint) = engine_channel(config.engine_queue_capacity);
        Self {
            editor: PianoRollEditor::new(config, link),
            engine,
            endpoint,
            events: Vec::new(),
        }
    }

    fn service(&mut self) -> usize {
        let processed = self.engine.process_pending(&self.endpoint);
        self.events.extend(self.editor.poll_engine());
        processed
    }

    fn settle(&mut self) {
        for _ in 0..SETTLE_ROUNDS {
            let sent = self.editor.end_frame();
            let processed = self.service();
            if sent == 0 && processed == 0 && self.editor.store().pending_count() == 0 {
                break;
            }
        }
    }

    fn apply(&mut self, step: Step) {
        match step {
            Step::Input(input) => {
                let actions = self.editor.handle(input);
                tracing::debug!(?input, ?actions, state = self.editor.gesture().name(), "input");
            }
            Step::Control(Control::Frame) => {
                self.editor.end_frame();
            }
            Step::Control(Control::Engine) => {
                self.service();
            }
            Step::Control(Control::Scroll { x, y }) => {
                self.editor.on_user_scroll(ScrollOffset::new(x, y));
            }
            Step::Control(Control::Zoom { zoom }) => {
                self.editor.set_zoom(zoom);
            }
            Step::Control(Control::PreviewKey { pitch }) => {
                self.editor.preview_key(pitch);
            }
            Step::Control(Control::Fail { kind, count }) => {
                self.engine.fail_next(kind, count);
            }
        }
    }
}

fn execute_replay(args: ReplayArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let script = load_script(&args.script)?;
    let engine = if script.demo {
        LoopbackEngine::demo()
    } else {
        LoopbackEngine::new()
    };

    let mut replay = Replay::new(config, engine);
    replay.editor.load();
    replay.settle();
    let steps = script.steps.len();
    for step in script.steps {
        replay.apply(step);
    }
    replay.settle();
    tracing::info!(steps, handled = replay.engine.handled(), "replay finished");

    let events = if args.events {
        replay.events.iter().map(|event| format!("{event:?}")).collect()
    } else {
        Vec::new()
    };
    let report = ReplayReport {
        notes: replay.editor.notes(),
        stats: replay.editor.stats(),
        engine_notes: replay.engine.notes(),
        events,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn execute_config(args: ConfigArgs) -> Result<()> {
    let config = load_config(&args)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Script {
        serde_json::from_str(json).expect("script")
    }

    #[test]
    fn scripts_mix_inputs_and_controls() {
        let script = parse(
            r#"{
                "steps": [
                    { "type": "pointer_down", "pos": { "x": 130.0, "y": 1345.0 } },
                    { "type": "pointer_up", "pos": { "x": 130.0, "y": 1345.0 } },
                    { "type": "frame" },
                    { "type": "fail", "kind": "update_note" },
                    { "type": "zoom", "zoom": 2.0 }
                ]
            }"#,
        );
        assert!(!script.demo);
        assert!(matches!(script.steps[0], Step::Input(EditorInput::PointerDown { .. })));
        assert!(matches!(script.steps[2], Step::Control(Control::Frame)));
        assert!(matches!(
            script.steps[3],
            Step::Control(Control::Fail {
                kind: RequestKind::UpdateNote,
                count: 1
            })
        ));
    }

    #[test]
    fn replay_draws_a_note() {
        let script = parse(
            r#"{
                "steps": [
                    { "type": "pointer_down", "pos": { "x": 130.0, "y": 1345.0 } },
                    { "type": "pointer_up", "pos": { "x": 130.0, "y": 1345.0 } }
                ]
            }"#,
        );
        let mut replay = Replay::new(EditorConfig::default(), LoopbackEngine::new());
        replay.editor.load();
        replay.settle();
        for step in script.steps {
            replay.apply(step);
        }
        replay.settle();

        let notes = replay.editor.notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].pitch, 60);
        assert_eq!(notes[0].start, 2.25);
        assert_eq!(replay.engine.notes().len(), 1);
        assert_eq!(replay.editor.store().pending_count(), 0);
    }
}
