//! Contract with the audio engine.
//!
//! The editor never blocks on the engine. Requests are submitted with a
//! [`Ticket`] and their outcomes come back later as [`Completion`]s, which
//! the note store drains once per frame.

mod channel;
mod loopback;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::{Note, NoteId, NotePatch};

pub use channel::{engine_channel, ChannelLink, EngineEndpoint, Envelope};
pub use loopback::LoopbackEngine;

/// Correlates a submitted request with its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ticket(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EngineRequest {
    ListNotes,
    CreateNote {
        pitch: u8,
        start: f64,
        duration: f64,
        velocity: u8,
    },
    UpdateNote {
        id: NoteId,
        patch: NotePatch,
    },
    DeleteNotes {
        ids: Vec<NoteId>,
    },
    SelectNotes {
        ids: Vec<NoteId>,
        clear_previous: bool,
    },
    ClearSelection,
    PreviewNote {
        pitch: u8,
    },
    SetZoom {
        zoom: f32,
    },
    SetScrollPosition {
        x: f32,
        y: f32,
    },
}

/// Discriminant of [`EngineRequest`], used for logging and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    ListNotes,
    CreateNote,
    UpdateNote,
    DeleteNotes,
    SelectNotes,
    ClearSelection,
    PreviewNote,
    SetZoom,
    SetScrollPosition,
}

impl EngineRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            EngineRequest::ListNotes => RequestKind::ListNotes,
            EngineRequest::CreateNote { .. } => RequestKind::CreateNote,
            EngineRequest::UpdateNote { .. } => RequestKind::UpdateNote,
            EngineRequest::DeleteNotes { .. } => RequestKind::DeleteNotes,
            EngineRequest::SelectNotes { .. } => RequestKind::SelectNotes,
            EngineRequest::ClearSelection => RequestKind::ClearSelection,
            EngineRequest::PreviewNote { .. } => RequestKind::PreviewNote,
            EngineRequest::SetZoom { .. } => RequestKind::SetZoom,
            EngineRequest::SetScrollPosition { .. } => RequestKind::SetScrollPosition,
        }
    }
}

impl RequestKind {
    /// Fire-and-forget requests produce no completion.
    pub fn expects_reply(self) -> bool {
        !matches!(
            self,
            RequestKind::PreviewNote | RequestKind::SetZoom | RequestKind::SetScrollPosition
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineReply {
    Notes(Vec<Note>),
    Created(NoteId),
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub ticket: Ticket,
    pub result: Result<EngineReply, EngineError>,
}

/// Non-blocking connection to an engine.
pub trait EngineLink {
    /// Queue a request. Errors only describe the submission itself.
    fn submit(&mut self, ticket: Ticket, request: EngineRequest) -> Result<(), EngineError>;

    /// Next completion that has arrived, if any.
    fn poll(&mut self) -> Option<Completion>;
}
