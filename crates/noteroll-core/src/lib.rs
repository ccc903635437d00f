//! Note-editing core of the Noteroll piano roll.
//!
//! Pointer input goes through the [`gesture`] state machine, is mapped to
//! pitch and beat time by the [`mapper`], snapped by the [`quantize`] grid and
//! lands in the [`store`], which mirrors the audio engine's notes and
//! forwards every edit over an [`engine::EngineLink`]. [`editor`] wires these
//! together; [`scroll`] keeps sibling panels on one time axis.

pub mod config;
pub mod editor;
pub mod engine;
pub mod error;
pub mod gesture;
pub mod keyboard;
pub mod layout;
pub mod mapper;
pub mod model;
pub mod pacing;
pub mod quantize;
pub mod scroll;
pub mod store;
pub mod timeline;
pub mod viewport;

pub use config::{EditorConfig, ZoomRange};
pub use editor::{NoteSprite, PianoRollEditor};
pub use engine::{
    engine_channel, ChannelLink, Completion, EngineEndpoint, EngineLink, EngineReply,
    EngineRequest, LoopbackEngine, RequestKind, Ticket,
};
pub use error::{ConfigError, EngineError};
pub use gesture::{EditorInput, EditorKey, GestureAction, GestureState, PointerModifiers};
pub use mapper::CoordinateMapper;
pub use model::{Note, NoteGeometry, NoteId, NotePatch, NoteStats};
pub use pacing::DragUpdates;
pub use quantize::Quantizer;
pub use scroll::{ScrollOffset, ScrollPort, ScrollSync};
pub use store::{FailurePolicy, NoteStore, StoreEvent};
pub use viewport::Viewport;
