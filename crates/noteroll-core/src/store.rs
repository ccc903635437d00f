//! Local mirror of the engine's notes.
//!
//! Every mutation is applied to the mirror immediately and forwarded to the
//! engine as a ticketed request. Requests that expect a completion stay in a
//! pending-operation log until the engine answers; the configured
//! [`FailurePolicy`] decides what happens when it answers with an error.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::engine::{Completion, EngineLink, EngineReply, EngineRequest, RequestKind, Ticket};
use crate::error::EngineError;
use crate::model::{Note, NoteGeometry, NoteId, NotePatch, NoteStats};

/// Reaction to an engine call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log and keep the local edit.
    #[default]
    Ignore,
    /// Undo the local edit unless a later edit of the same note is in flight.
    Rollback,
    /// Resubmit until `max_attempts` attempts have been made.
    Retry { max_attempts: u32 },
}

/// Outcome of draining engine completions.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Loaded { count: usize },
    Created { local: NoteId, remote: NoteId },
    EngineFailed { ticket: Ticket, error: EngineError },
    RolledBack { ticket: Ticket },
    Retried { ticket: Ticket, attempt: u32 },
}

/// Engine identity of a note created in the editor.
#[derive(Debug, Clone, PartialEq)]
enum RemoteId {
    Known(NoteId),
    Pending,
    /// Creation failed; the note only exists locally.
    Unavailable,
}

#[derive(Debug, Clone)]
enum Op {
    List,
    Create { id: NoteId, geometry: NoteGeometry },
    Update { id: NoteId, patch: NotePatch },
    Delete { ids: Vec<NoteId> },
    Select { ids: Vec<NoteId>, clear_previous: bool },
    ClearSelection,
}

#[derive(Debug, Clone)]
enum Undo {
    Nothing,
    Patch { id: NoteId, previous: NotePatch },
    Created { id: NoteId },
    Removed(Vec<(usize, Note)>),
    Selection(Vec<(NoteId, bool)>),
}

impl Undo {
    /// Take over the parts of an earlier snapshot that cover the same notes.
    /// Returns whatever this snapshot could not hold.
    fn absorb(&mut self, earlier: Undo) -> Undo {
        match (self, earlier) {
            (
                Undo::Patch { id, previous },
                Undo::Patch {
                    id: earlier_id,
                    previous: older,
                },
            ) if *id == earlier_id => {
                *previous = previous.merge(older);
                Undo::Nothing
            }
            (Undo::Removed(removed), Undo::Patch { id, previous: older }) => {
                match removed.iter_mut().find(|(_, note)| note.id == id) {
                    Some((_, note)) => {
                        older.apply(note);
                        Undo::Nothing
                    }
                    None => Undo::Patch { id, previous: older },
                }
            }
            (Undo::Selection(later), Undo::Selection(older)) => {
                let mut rest = Vec::new();
                for (id, selected) in older {
                    match later.iter_mut().find(|(later_id, _)| *later_id == id) {
                        Some(entry) => entry.1 = selected,
                        None => rest.push((id, selected)),
                    }
                }
                if rest.is_empty() {
                    Undo::Nothing
                } else {
                    Undo::Selection(rest)
                }
            }
            (_, earlier) => earlier,
        }
    }
}

type Touched = SmallVec<[NoteId; 4]>;

#[derive(Debug)]
struct PendingOp {
    op: Op,
    undo: Undo,
    touches: Touched,
    attempts: u32,
}

enum Translation {
    Ready(EngineRequest),
    /// Waits for an engine id that has not arrived yet.
    Blocked,
    /// Nothing left to tell the engine.
    Skip,
}

enum Resolved {
    Ready(NoteId),
    Blocked,
    Missing,
}

pub struct NoteStore<L> {
    link: L,
    notes: Vec<Note>,
    remote: HashMap<NoteId, RemoteId>,
    pending: BTreeMap<Ticket, PendingOp>,
    deferred: Vec<Ticket>,
    failed_submits: Vec<Completion>,
    unsynced: HashMap<NoteId, NotePatch>,
    next_ticket: u64,
    policy: FailurePolicy,
    min_duration: f64,
}

impl<L: EngineLink> NoteStore<L> {
    pub fn new(link: L, policy: FailurePolicy, min_duration: f64) -> Self {
        Self {
            link,
            notes: Vec::new(),
            remote: HashMap::new(),
            pending: BTreeMap::new(),
            deferred: Vec::new(),
            failed_submits: Vec::new(),
            unsynced: HashMap::new(),
            next_ticket: 1,
            policy,
            min_duration,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: FailurePolicy) {
        self.policy = policy;
    }

    /// Notes in storage order.
    pub fn list(&self) -> &[Note] {
        &self.notes
    }

    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| &note.id == id)
    }

    pub fn selected_ids(&self) -> Vec<NoteId> {
        self.notes
            .iter()
            .filter(|note| note.selected)
            .map(|note| note.id.clone())
            .collect()
    }

    pub fn stats(&self) -> NoteStats {
        NoteStats {
            total: self.notes.len(),
            selected: self.notes.iter().filter(|note| note.selected).count(),
        }
    }

    /// Unresolved operations, deferred ones included.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Engine id of a note, if it is known.
    pub fn remote_id(&self, id: &NoteId) -> Option<NoteId> {
        match self.resolve(id) {
            Resolved::Ready(remote) => Some(remote),
            Resolved::Blocked | Resolved::Missing => None,
        }
    }

    /// Ask the engine for its notes. The mirror is replaced when the reply
    /// arrives.
    pub fn load(&mut self) -> Ticket {
        self.record(Op::List, Undo::Nothing, Touched::new())
    }

    /// Add a note locally and ask the engine to create it.
    pub fn create(&mut self, geometry: NoteGeometry) -> NoteId {
        let fixed = geometry.sanitized(self.min_duration);
        if fixed != geometry {
            debug!(?geometry, ?fixed, "corrected note geometry before create");
        }
        let id = NoteId::local();
        self.notes.push(Note::from_geometry(id.clone(), fixed));
        self.remote.insert(id.clone(), RemoteId::Pending);
        let touches = Touched::from_elem(id.clone(), 1);
        self.record(
            Op::Create {
                id: id.clone(),
                geometry: fixed,
            },
            Undo::Created { id: id.clone() },
            touches,
        );
        id
    }

    /// Apply `patch` locally and forward it. Updating a missing note is a
    /// no-op and returns `false`.
    pub fn update(&mut self, id: &NoteId, patch: NotePatch) -> bool {
        if !self.stage_update(id, patch) {
            return false;
        }
        self.commit_update(id, patch)
    }

    /// Apply `patch` to the mirror only. The engine learns about it through
    /// a later [`commit_update`](Self::commit_update).
    pub fn stage_update(&mut self, id: &NoteId, patch: NotePatch) -> bool {
        let patch = patch.sanitized(self.min_duration);
        let Some(note) = self.notes.iter_mut().find(|note| &note.id == id) else {
            return false;
        };
        let before = patch.capture(note);
        patch.apply(note);
        let baseline = match self.unsynced.remove(id) {
            Some(existing) => before.merge(existing),
            None => before,
        };
        self.unsynced.insert(id.clone(), baseline);
        true
    }

    /// Forward `patch` to the engine, applying it locally as well.
    pub fn commit_update(&mut self, id: &NoteId, patch: NotePatch) -> bool {
        let patch = patch.sanitized(self.min_duration);
        let Some(note) = self.notes.iter_mut().find(|note| &note.id == id) else {
            return false;
        };
        let captured = patch.capture(note);
        patch.apply(note);
        let previous = match self.unsynced.remove(id) {
            Some(baseline) => captured.merge(baseline),
            None => captured,
        };
        self.record(
            Op::Update {
                id: id.clone(),
                patch,
            },
            Undo::Patch {
                id: id.clone(),
                previous,
            },
            Touched::from_elem(id.clone(), 1),
        );
        true
    }

    /// Remove notes locally and forward the deletion. Returns how many
    /// notes were removed.
    pub fn delete(&mut self, ids: &[NoteId]) -> usize {
        let mut removed = Vec::new();
        let mut index = 0;
        while index < self.notes.len() {
            if ids.contains(&self.notes[index].id) {
                let note = self.notes.remove(index);
                removed.push((index + removed.len(), note));
            } else {
                index += 1;
            }
        }
        if removed.is_empty() {
            return 0;
        }
        let count = removed.len();
        let gone: Vec<NoteId> = removed.iter().map(|(_, note)| note.id.clone()).collect();
        for id in &gone {
            self.unsynced.remove(id);
        }
        self.record(
            Op::Delete { ids: gone.clone() },
            Undo::Removed(removed),
            gone.into_iter().collect(),
        );
        count
    }

    pub fn delete_selected(&mut self) -> usize {
        let selected = self.selected_ids();
        self.delete(&selected)
    }

    /// Select `ids`, optionally deselecting everything else first.
    pub fn select(&mut self, ids: &[NoteId], clear_previous: bool) {
        let mut previous = Vec::new();
        for note in &mut self.notes {
            let wanted = if ids.contains(&note.id) {
                true
            } else if clear_previous {
                false
            } else {
                note.selected
            };
            if wanted != note.selected {
                previous.push((note.id.clone(), note.selected));
                note.selected = wanted;
            }
        }
        let present: Vec<NoteId> = ids
            .iter()
            .filter(|id| self.notes.iter().any(|note| &note.id == *id))
            .cloned()
            .collect();
        if present.is_empty() && !clear_previous {
            return;
        }
        let touches = previous.iter().map(|(id, _)| id.clone()).collect();
        self.record(
            Op::Select {
                ids: present,
                clear_previous,
            },
            Undo::Selection(previous),
            touches,
        );
    }

    pub fn clear_selection(&mut self) {
        let mut previous = Vec::new();
        for note in self.notes.iter_mut().filter(|note| note.selected) {
            previous.push((note.id.clone(), true));
            note.selected = false;
        }
        let touches = previous.iter().map(|(id, _)| id.clone()).collect();
        self.record(Op::ClearSelection, Undo::Selection(previous), touches);
    }

    /// Send a request that expects no completion.
    pub fn notify(&mut self, request: EngineRequest) {
        let ticket = self.next_ticket();
        let kind = request.kind();
        if let Err(err) = self.link.submit(ticket, request) {
            warn!(?err, ?kind, ticket = ticket.0, "engine notification failed");
        }
    }

    /// Drain completions from the engine and apply the failure policy.
    pub fn poll_engine(&mut self) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        for completion in std::mem::take(&mut self.failed_submits) {
            self.complete(completion, &mut events);
        }
        while let Some(completion) = self.link.poll() {
            self.complete(completion, &mut events);
        }
        events
    }

    fn next_ticket(&mut self) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        ticket
    }

    fn record(&mut self, op: Op, undo: Undo, touches: Touched) -> Ticket {
        let ticket = self.next_ticket();
        self.pending.insert(
            ticket,
            PendingOp {
                op,
                undo,
                touches,
                attempts: 1,
            },
        );
        self.dispatch(ticket);
        ticket
    }

    fn dispatch(&mut self, ticket: Ticket) {
        let translation = match self.pending.get(&ticket) {
            Some(pending) => self.translate(&pending.op),
            None => return,
        };
        match translation {
            Translation::Ready(request) => {
                let kind = request.kind();
                debug!(ticket = ticket.0, ?kind, "submitting engine request");
                if let Err(error) = self.link.submit(ticket, request) {
                    self.failed_submits.push(Completion {
                        ticket,
                        result: Err(error),
                    });
                }
            }
            Translation::Blocked => {
                debug!(ticket = ticket.0, "deferring request until note id arrives");
                self.deferred.push(ticket);
            }
            Translation::Skip => {
                debug!(ticket = ticket.0, "dropping request for local-only notes");
                self.pending.remove(&ticket);
            }
        }
    }

    fn flush_deferred(&mut self) {
        for ticket in std::mem::take(&mut self.deferred) {
            self.dispatch(ticket);
        }
    }

    fn resolve(&self, id: &NoteId) -> Resolved {
        match self.remote.get(id) {
            None => Resolved::Ready(id.clone()),
            Some(RemoteId::Known(remote)) => Resolved::Ready(remote.clone()),
            Some(RemoteId::Pending) => Resolved::Blocked,
            Some(RemoteId::Unavailable) => Resolved::Missing,
        }
    }

    fn resolve_all(&self, ids: &[NoteId]) -> Option<Vec<NoteId>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match self.resolve(id) {
                Resolved::Ready(remote) => out.push(remote),
                Resolved::Blocked => return None,
                Resolved::Missing => {}
            }
        }
        Some(out)
    }

    fn translate(&self, op: &Op) -> Translation {
        match op {
            Op::List => Translation::Ready(EngineRequest::ListNotes),
            Op::Create { geometry, .. } => Translation::Ready(EngineRequest::CreateNote {
                pitch: geometry.pitch,
                start: geometry.start,
                duration: geometry.duration,
                velocity: geometry.velocity,
            }),
            Op::Update { id, patch } => match self.resolve(id) {
                Resolved::Ready(remote) => Translation::Ready(EngineRequest::UpdateNote {
                    id: remote,
                    patch: *patch,
                }),
                Resolved::Blocked => Translation::Blocked,
                Resolved::Missing => Translation::Skip,
            },
            Op::Delete { ids } => match self.resolve_all(ids) {
                None => Translation::Blocked,
                Some(remote) if remote.is_empty() => Translation::Skip,
                Some(remote) => Translation::Ready(EngineRequest::DeleteNotes { ids: remote }),
            },
            Op::Select {
                ids,
                clear_previous,
            } => match self.resolve_all(ids) {
                None => Translation::Blocked,
                Some(remote) if remote.is_empty() && !clear_previous => Translation::Skip,
                Some(remote) => Translation::Ready(EngineRequest::SelectNotes {
                    ids: remote,
                    clear_previous: *clear_previous,
                }),
            },
            Op::ClearSelection => Translation::Ready(EngineRequest::ClearSelection),
        }
    }

    fn complete(&mut self, completion: Completion, events: &mut Vec<StoreEvent>) {
        let Completion { ticket, result } = completion;
        let Some(pending) = self.pending.remove(&ticket) else {
            debug!(ticket = ticket.0, "completion for unknown ticket");
            return;
        };
        match result {
            Ok(reply) => self.succeed(pending, reply, events),
            Err(error) => self.fail(ticket, pending, error, events),
        }
    }

    fn succeed(&mut self, pending: PendingOp, reply: EngineReply, events: &mut Vec<StoreEvent>) {
        match (pending.op, reply) {
            (Op::List, EngineReply::Notes(notes)) => {
                let count = self.replace_mirror(notes);
                events.push(StoreEvent::Loaded { count });
            }
            (Op::Create { id, .. }, EngineReply::Created(remote)) => {
                self.remote.insert(id.clone(), RemoteId::Known(remote.clone()));
                events.push(StoreEvent::Created { local: id, remote });
                self.flush_deferred();
            }
            (Op::Delete { ids }, EngineReply::Done) => {
                for id in ids {
                    if self.get(&id).is_none() {
                        self.remote.remove(&id);
                    }
                }
            }
            (_, EngineReply::Done) => {}
            (op, reply) => {
                warn!(?op, ?reply, "engine reply does not match request");
            }
        }
    }

    fn fail(
        &mut self,
        ticket: Ticket,
        pending: PendingOp,
        error: EngineError,
        events: &mut Vec<StoreEvent>,
    ) {
        let kind = op_kind(&pending.op);
        warn!(ticket = ticket.0, ?kind, ?error, "engine call failed");
        events.push(StoreEvent::EngineFailed {
            ticket,
            error: error.clone(),
        });

        if let FailurePolicy::Retry { max_attempts } = self.policy {
            if pending.attempts < max_attempts {
                let retry = self.next_ticket();
                let attempt = pending.attempts + 1;
                debug!(ticket = ticket.0, retry = retry.0, attempt, "retrying engine call");
                self.pending.insert(
                    retry,
                    PendingOp {
                        attempts: attempt,
                        ..pending
                    },
                );
                events.push(StoreEvent::Retried {
                    ticket: retry,
                    attempt,
                });
                self.dispatch(retry);
                return;
            }
            warn!(ticket = ticket.0, attempts = pending.attempts, "giving up on engine call");
        }

        // Requests waiting on this note's engine id can never be sent now.
        let abandoned = match &pending.op {
            Op::Create { id, .. } => {
                self.remote.insert(id.clone(), RemoteId::Unavailable);
                self.flush_deferred();
                Some(id.clone())
            }
            _ => None,
        };

        if self.policy == FailurePolicy::Rollback {
            if self.superseded(ticket, &pending.touches) {
                debug!(ticket = ticket.0, "rollback skipped; a later edit supersedes it");
                self.hand_off(ticket, pending.undo);
            } else {
                self.undo(pending.undo);
                events.push(StoreEvent::RolledBack { ticket });
            }
        }

        if let Some(id) = abandoned {
            if self.get(&id).is_none() {
                self.remote.remove(&id);
            }
        }
    }

    fn superseded(&self, ticket: Ticket, touches: &[NoteId]) -> bool {
        self.pending
            .range((Bound::Excluded(ticket), Bound::Unbounded))
            .any(|(_, later)| later.touches.iter().any(|id| touches.contains(id)))
    }

    /// Pass a skipped rollback on to the later edits of the same notes, so
    /// undoing those lands on the state the engine last accepted.
    fn hand_off(&mut self, ticket: Ticket, mut undo: Undo) {
        for (_, later) in self
            .pending
            .range_mut((Bound::Excluded(ticket), Bound::Unbounded))
        {
            undo = later.undo.absorb(undo);
            if matches!(undo, Undo::Nothing) {
                break;
            }
        }
    }

    fn undo(&mut self, undo: Undo) {
        match undo {
            Undo::Nothing => {}
            Undo::Patch { id, previous } => {
                if let Some(note) = self.notes.iter_mut().find(|note| note.id == id) {
                    previous.apply(note);
                }
            }
            Undo::Created { id } => {
                self.notes.retain(|note| note.id != id);
                self.unsynced.remove(&id);
            }
            Undo::Removed(removed) => {
                for (index, note) in removed {
                    let index = index.min(self.notes.len());
                    self.notes.insert(index, note);
                }
            }
            Undo::Selection(previous) => {
                for (id, selected) in previous {
                    if let Some(note) = self.notes.iter_mut().find(|note| note.id == id) {
                        note.selected = selected;
                    }
                }
            }
        }
    }

    fn replace_mirror(&mut self, engine_notes: Vec<Note>) -> usize {
        let local_of: HashMap<NoteId, NoteId> = self
            .remote
            .iter()
            .filter_map(|(local, remote)| match remote {
                RemoteId::Known(remote) => Some((remote.clone(), local.clone())),
                RemoteId::Pending | RemoteId::Unavailable => None,
            })
            .collect();

        let mut mirror = Vec::with_capacity(engine_notes.len());
        for mut note in engine_notes {
            if let Some(local) = local_of.get(&note.id) {
                note.id = local.clone();
            }
            if note.sanitize(self.min_duration) {
                warn!(id = %note.id, "engine sent invalid note geometry; corrected");
            }
            mirror.push(note);
        }
        let count = mirror.len();

        let local_only = std::mem::take(&mut self.notes)
            .into_iter()
            .filter(|note| {
                matches!(
                    self.remote.get(&note.id),
                    Some(RemoteId::Pending | RemoteId::Unavailable)
                )
            });
        mirror.extend(local_only);

        self.remote.retain(|local, remote| match remote {
            RemoteId::Known(_) => mirror.iter().any(|note| &note.id == local),
            RemoteId::Pending | RemoteId::Unavailable => true,
        });
        self.unsynced.clear();
        self.notes = mirror;
        debug!(count, "note mirror loaded from engine");
        count
    }
}

fn op_kind(op: &Op) -> RequestKind {
    match op {
        Op::List => RequestKind::ListNotes,
        Op::Create { .. } => RequestKind::CreateNote,
        Op::Update { .. } => RequestKind::UpdateNote,
        Op::Delete { .. } => RequestKind::DeleteNotes,
        Op::Select { .. } => RequestKind::SelectNotes,
        Op::ClearSelection => RequestKind::ClearSelection,
    }
}
