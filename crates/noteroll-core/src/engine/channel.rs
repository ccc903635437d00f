use std::fmt;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};

use super::{Completion, EngineLink, EngineRequest, Ticket};
use crate::error::EngineError;

/// A request travelling to the engine together with its ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub ticket: Ticket,
    pub request: EngineRequest,
}

/// Editor side of the engine bus.
pub struct ChannelLink {
    requests: Sender<Envelope>,
    completions: Receiver<Completion>,
}

/// Engine side of the engine bus.
pub struct EngineEndpoint {
    requests: Receiver<Envelope>,
    completions: Sender<Completion>,
}

impl fmt::Debug for ChannelLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelLink")
            .field("queued", &self.requests.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for EngineEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineEndpoint")
            .field("queued", &self.requests.len())
            .finish_non_exhaustive()
    }
}

/// Bounded request/completion channel pair.
pub fn engine_channel(capacity: usize) -> (ChannelLink, EngineEndpoint) {
    let capacity = capacity.max(2);
    let (request_tx, request_rx) = bounded(capacity);
    let (completion_tx, completion_rx) = bounded(capacity);
    (
        ChannelLink {
            requests: request_tx,
            completions: completion_rx,
        },
        EngineEndpoint {
            requests: request_rx,
            completions: completion_tx,
        },
    )
}

impl EngineLink for ChannelLink {
    fn submit(&mut self, ticket: Ticket, request: EngineRequest) -> Result<(), EngineError> {
        match self.requests.try_send(Envelope { ticket, request }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(EngineError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(EngineError::Disconnected),
        }
    }

    fn poll(&mut self) -> Option<Completion> {
        self.completions.try_recv().ok()
    }
}

impl EngineEndpoint {
    pub fn try_recv(&self) -> Result<Option<Envelope>, EngineError> {
        match self.requests.try_recv() {
            Ok(envelope) => Ok(Some(envelope)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(EngineError::Disconnected),
        }
    }

    pub fn drain(&self) -> impl Iterator<Item = Envelope> + '_ {
        self.requests.try_iter()
    }

    pub fn complete(&self, completion: Completion) -> Result<(), EngineError> {
        match self.completions.try_send(completion) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(EngineError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(EngineError::Disconnected),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Whether another completion fits before the editor drains some.
    pub fn can_complete(&self) -> bool {
        !self.completions.is_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineReply;

    #[test]
    fn requests_arrive_in_submission_order() {
        let (mut link, endpoint) = engine_channel(16);
        for idx in 0..10 {
            link.submit(Ticket(idx), EngineRequest::ClearSelection)
                .expect("submit");
        }
        let tickets: Vec<_> = endpoint.drain().map(|env| env.ticket.0).collect();
        assert_eq!(tickets, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn full_queue_is_reported() {
        let (mut link, _endpoint) = engine_channel(2);
        link.submit(Ticket(1), EngineRequest::ListNotes).unwrap();
        link.submit(Ticket(2), EngineRequest::ListNotes).unwrap();
        assert_eq!(
            link.submit(Ticket(3), EngineRequest::ListNotes),
            Err(EngineError::QueueFull)
        );
    }

    #[test]
    fn dropped_engine_disconnects() {
        let (mut link, endpoint) = engine_channel(4);
        drop(endpoint);
        assert_eq!(
            link.submit(Ticket(1), EngineRequest::ListNotes),
            Err(EngineError::Disconnected)
        );
        assert!(link.poll().is_none());
    }

    #[test]
    fn completions_flow_back() {
        let (mut link, endpoint) = engine_channel(4);
        endpoint
            .complete(Completion {
                ticket: Ticket(9),
                result: Ok(EngineReply::Done),
            })
            .unwrap();
        let completion = link.poll().expect("completion");
        assert_eq!(completion.ticket, Ticket(9));
    }
}
