//! Shared scroll position of the panels on the time axis.
//!
//! The hosting layout owns a [`ScrollSync`]. Each panel holds a
//! [`ScrollPort`] and never talks to its siblings: user scrolling is
//! reported to the owner, the owner broadcasts the new pair, and every
//! panel forces its container to it on the next [`ScrollPort::pull`].

use std::fmt;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use serde::{Deserialize, Serialize};

const EVENT_CAPACITY: usize = 64;

/// Horizontal and vertical scroll offsets in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub x: f32,
    pub y: f32,
}

impl ScrollOffset {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Non-negative and finite.
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_axis(self.x),
            y: clamp_axis(self.y),
        }
    }
}

fn clamp_axis(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PanelId(pub u32);

/// A panel reporting that the user scrolled it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollEvent {
    pub panel: PanelId,
    pub offset: ScrollOffset,
}

struct PortLink {
    id: PanelId,
    updates: Sender<ScrollOffset>,
    stale: Receiver<ScrollOffset>,
    /// Disconnects when the port is dropped.
    alive: Receiver<()>,
}

impl PortLink {
    fn is_dropped(&self) -> bool {
        matches!(self.alive.try_recv(), Err(TryRecvError::Disconnected))
    }
}

/// Owner of the shared scroll pair.
pub struct ScrollSync {
    shared: ScrollOffset,
    events_tx: Sender<ScrollEvent>,
    events_rx: Receiver<ScrollEvent>,
    ports: Vec<PortLink>,
    next_id: u32,
}

impl fmt::Debug for ScrollSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollSync")
            .field("shared", &self.shared)
            .field("ports", &self.ports.len())
            .finish_non_exhaustive()
    }
}

impl Default for ScrollSync {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollSync {
    pub fn new() -> Self {
        let (events_tx, events_rx) = bounded(EVENT_CAPACITY);
        Self {
            shared: ScrollOffset::ZERO,
            events_tx,
            events_rx,
            ports: Vec::new(),
            next_id: 0,
        }
    }

    pub fn offset(&self) -> ScrollOffset {
        self.shared
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Hand out a port for a new panel. The port starts at the shared offset.
    pub fn register(&mut self) -> ScrollPort {
        let id = PanelId(self.next_id);
        self.next_id += 1;
        let (updates, receiver) = bounded(1);
        let (token, alive) = bounded(0);
        let link = PortLink {
            id,
            updates,
            stale: receiver.clone(),
            alive,
        };
        let port = ScrollPort {
            id,
            offset: self.shared,
            events: self.events_tx.clone(),
            updates: receiver,
            _token: token,
        };
        self.ports.push(link);
        port
    }

    pub fn unregister(&mut self, id: PanelId) {
        self.ports.retain(|port| port.id != id);
    }

    /// Set the shared pair from the owner side. Returns `true` if it changed.
    pub fn set(&mut self, offset: ScrollOffset) -> bool {
        let offset = offset.clamped();
        if offset == self.shared {
            return false;
        }
        self.shared = offset;
        self.broadcast();
        true
    }

    /// Drain panel reports and broadcast the result. Returns the new shared
    /// pair if it changed.
    pub fn pump(&mut self) -> Option<ScrollOffset> {
        let before = self.shared;
        for event in self.events_rx.try_iter() {
            tracing::trace!(panel = event.panel.0, x = event.offset.x, y = event.offset.y, "scroll");
            self.shared = event.offset.clamped();
        }
        if self.shared == before {
            return None;
        }
        self.broadcast();
        Some(self.shared)
    }

    fn broadcast(&mut self) {
        let offset = self.shared;
        self.ports.retain(|port| {
            if port.is_dropped() {
                tracing::debug!(panel = port.id.0, "scroll port dropped");
                return false;
            }
            // Only the newest offset matters to a panel.
            while port.stale.try_recv().is_ok() {}
            if let Err(err) = port.updates.try_send(offset) {
                tracing::warn!(?err, panel = port.id.0, "scroll broadcast failed");
            }
            true
        });
    }
}

/// A panel's end of the scroll synchronisation.
pub struct ScrollPort {
    id: PanelId,
    offset: ScrollOffset,
    events: Sender<ScrollEvent>,
    updates: Receiver<ScrollOffset>,
    _token: Sender<()>,
}

impl fmt::Debug for ScrollPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollPort")
            .field("id", &self.id)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl ScrollPort {
    pub fn id(&self) -> PanelId {
        self.id
    }

    /// Offset the panel's container currently shows.
    pub fn offset(&self) -> ScrollOffset {
        self.offset
    }

    /// Report user scrolling. The panel's own container follows at once.
    pub fn emit(&mut self, offset: ScrollOffset) {
        self.offset = offset.clamped();
        let event = ScrollEvent {
            panel: self.id,
            offset: self.offset,
        };
        if let Err(err) = self.events.try_send(event) {
            tracing::warn!(?err, panel = self.id.0, "scroll event dropped");
        }
    }

    /// Force the container to the newest shared offset. Returns it when it
    /// differs from what the container showed.
    pub fn pull(&mut self) -> Option<ScrollOffset> {
        let newest = self.updates.try_iter().last()?;
        if newest == self.offset {
            return None;
        }
        self.offset = newest;
        Some(newest)
    }
}
