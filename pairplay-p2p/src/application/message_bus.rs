use crate::domain::{Arrival, InboundSequencer};
use crate::infrastructure::error::{Result, TransportError};
use pairplay_core::GameMessage;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Stable handle returned by `subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&GameMessage) + Send>;

/// Typed publish/subscribe over the session's data channel
///
/// Owns the per-connection sequencing: outbound numbers start at 1 and the
/// inbound side restores sender order before handlers see anything.
pub struct MessageBus {
    subscribers: Vec<(SubscriptionId, Handler)>,
    next_subscription: u64,
    next_outbound: u64,
    inbound: InboundSequencer<GameMessage>,
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("subscribers", &self.subscribers.len())
            .field("next_outbound", &self.next_outbound)
            .field("inbound", &self.inbound)
            .finish()
    }
}

impl MessageBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            subscribers: Vec::new(),
            next_subscription: 0,
            next_outbound: 1,
            inbound: InboundSequencer::new(max_pending),
        }
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&GameMessage) + Send + 'static,
    {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.subscribers.push((id, Box::new(handler)));
        id
    }

    /// Returns whether the subscription existed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Hand one message to every subscriber, in subscription order
    pub fn dispatch(&mut self, message: &GameMessage) {
        tracing::debug!(
            kind = message.kind(),
            subscribers = self.subscribers.len(),
            "Dispatching message"
        );
        for (_, handler) in self.subscribers.iter_mut() {
            handler(message);
        }
    }

    /// Sequence number for the next outbound message
    pub fn next_sequence(&mut self) -> u64 {
        let seq = self.next_outbound;
        self.next_outbound += 1;
        seq
    }

    /// Feed an inbound message; returns the messages now deliverable in order
    ///
    /// A full reorder buffer means the stream can no longer be delivered
    /// completely, so it is reported as an error and the connection must be
    /// dropped.
    pub fn accept(&mut self, sequence: u64, message: GameMessage) -> Result<Vec<GameMessage>> {
        let mut ready = Vec::new();
        match self.inbound.accept(sequence, message, &mut ready) {
            Arrival::InOrder => {}
            Arrival::Buffered => tracing::debug!(
                sequence,
                expected = self.inbound.delivered() + 1,
                "Buffered out-of-order message"
            ),
            Arrival::Duplicate => tracing::debug!(sequence, "Dropped duplicate message"),
            Arrival::Overflow => {
                let pending = self.inbound.pending_len();
                tracing::warn!(sequence, pending, "Reorder buffer full");
                return Err(TransportError::ReorderOverflow(pending));
            }
        }
        Ok(ready)
    }

    /// Start sequencing afresh for a new connection (subscribers stay)
    pub fn reset_sequences(&mut self) {
        self.next_outbound = 1;
        self.inbound.reset();
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Queue filled by a bus subscription, for callers that prefer pulling
#[derive(Debug, Clone, Default)]
pub struct MessageInbox {
    queue: Arc<Mutex<VecDeque<GameMessage>>>,
}

impl MessageInbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<GameMessage>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, message: GameMessage) {
        self.lock().push_back(message);
    }

    pub fn drain(&self) -> Vec<GameMessage> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Messages of one type, removing them from the inbox
    pub fn take_kind(&self, kind: &str) -> Vec<GameMessage> {
        let mut queue = self.lock();
        let (matching, rest): (Vec<_>, Vec<_>) = queue.drain(..).partition(|m| m.is(kind));
        queue.extend(rest);
        matching
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_sees_every_message() {
        let mut bus = MessageBus::default();
        let first = MessageInbox::new();
        let second = MessageInbox::new();

        let a = first.clone();
        bus.subscribe(move |m| a.push(m.clone()));
        let b = second.clone();
        bus.subscribe(move |m| b.push(m.clone()));

        bus.dispatch(&GameMessage::new("GAME_INIT"));
        bus.dispatch(&GameMessage::new("SOMETHING_UNKNOWN"));

        assert_eq!(first.len(), 2);
        assert_eq!(second.drain()[1].kind(), "SOMETHING_UNKNOWN");
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bus = MessageBus::default();
        let inbox = MessageInbox::new();

        let sink = inbox.clone();
        let id = bus.subscribe(move |m| sink.push(m.clone()));
        bus.dispatch(&GameMessage::new("ONE"));

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.dispatch(&GameMessage::new("TWO"));

        assert_eq!(inbox.len(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscription_ids_are_stable() {
        let mut bus = MessageBus::default();
        let a = bus.subscribe(|_| {});
        let b = bus.subscribe(|_| {});
        bus.unsubscribe(a);
        let c = bus.subscribe(|_| {});

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_sequences_restart_per_connection() {
        let mut bus = MessageBus::default();
        assert_eq!(bus.next_sequence(), 1);
        assert_eq!(bus.next_sequence(), 2);

        assert_eq!(bus.accept(1, GameMessage::new("A")).unwrap().len(), 1);
        bus.reset_sequences();

        assert_eq!(bus.next_sequence(), 1);
        assert_eq!(bus.accept(1, GameMessage::new("B")).unwrap().len(), 1);
    }

    #[test]
    fn test_accept_reorders() {
        let mut bus = MessageBus::default();

        assert!(bus.accept(2, GameMessage::new("SECOND")).unwrap().is_empty());
        let ready = bus.accept(1, GameMessage::new("FIRST")).unwrap();

        let kinds: Vec<&str> = ready.iter().map(|m| m.kind()).collect();
        assert_eq!(kinds, vec!["FIRST", "SECOND"]);
        assert!(bus.accept(2, GameMessage::new("SECOND")).unwrap().is_empty());
    }

    #[test]
    fn test_full_reorder_buffer_is_an_error() {
        let mut bus = MessageBus::new(2);

        assert!(bus.accept(3, GameMessage::new("C")).unwrap().is_empty());
        assert!(bus.accept(4, GameMessage::new("D")).unwrap().is_empty());
        assert_eq!(
            bus.accept(5, GameMessage::new("E")),
            Err(TransportError::ReorderOverflow(2))
        );

        bus.reset_sequences();
        assert_eq!(bus.accept(1, GameMessage::new("A")).unwrap().len(), 1);
    }

    #[test]
    fn test_inbox_take_kind() {
        let inbox = MessageInbox::new();
        inbox.push(GameMessage::new("CHAT"));
        inbox.push(GameMessage::new("MOVE"));
        inbox.push(GameMessage::new("CHAT"));

        assert_eq!(inbox.take_kind("CHAT").len(), 2);
        assert_eq!(inbox.drain()[0].kind(), "MOVE");
    }
}
