// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lifecycle event bus for FuseDB.
//
// An `EventBus` is handed to the engine at construction time instead of being
// a process-global emitter. It fans `connected`, `disconnected` and `error`
// notifications out to any number of subscribers over a tokio broadcast
// channel. Subscribers hold a `Subscription`; dropping it unsubscribes.

use tokio::sync::broadcast;
use tracing::warn;

use crate::driver::ConnectionInfo;
use crate::error::EngineError;

/// Default channel capacity used by [`EventBus::default`].
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// A lifecycle notification emitted by an engine.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// The driver session was established.
    Connected(ConnectionInfo),
    /// The driver session was released.
    Disconnected,
    /// An operation failed; the same error is also returned to its caller.
    Error(EngineError),
}

impl LifecycleEvent {
    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            LifecycleEvent::Connected(_) => EventKind::Connected,
            LifecycleEvent::Disconnected => EventKind::Disconnected,
            LifecycleEvent::Error(_) => EventKind::Error,
        }
    }
}

/// Discriminant of a [`LifecycleEvent`], used to filter subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    Error,
}

/// Broadcast channel for lifecycle events.
///
/// Cloning the bus yields another handle to the same channel, so a bus can be
/// shared between several engines or kept by the application to subscribe
/// before the engine is even built.
///
/// # Example
///
/// ```rust
/// use fuse_core::{Engine, EngineConfig, EventBus, EventKind};
///
/// # tokio_test::block_on(async {
/// let bus = EventBus::new(16);
/// let connected = bus.once(EventKind::Connected);
///
/// let engine = Engine::new(EngineConfig::default().with_events(bus.clone())).unwrap();
/// engine.connect().await.unwrap();
///
/// assert!(connected.await.is_some());
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    /// Create a bus whose subscribers may lag at most `capacity` events.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; validated settings never pass zero.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to every future event.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Wait for the next event of `kind`, then unsubscribe.
    ///
    /// The subscription is taken immediately, so events emitted after this
    /// call and before the returned future is polled are not missed.
    /// Resolves to `None` if the bus is closed first.
    pub fn once(&self, kind: EventKind) -> impl std::future::Future<Output = Option<LifecycleEvent>> {
        let mut subscription = self.subscribe();
        async move { subscription.recv_kind(kind).await }
    }

    /// Deliver `event` to all current subscribers.
    ///
    /// Emitting with no subscribers is not an error.
    pub fn emit(&self, event: LifecycleEvent) {
        // `send` only fails when nobody is listening.
        let _ = self.sender.send(event);
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// A persistent subscription to an [`EventBus`].
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<LifecycleEvent>,
}

impl Subscription {
    /// Receive the next event.
    ///
    /// If this subscriber fell behind and events were dropped, the gap is
    /// logged and reception continues with the oldest retained event.
    /// Returns `None` once every bus handle has been dropped.
    pub async fn recv(&mut self) -> Option<LifecycleEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "lifecycle subscriber lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive the next event of the given kind, discarding others.
    pub async fn recv_kind(&mut self, kind: EventKind) -> Option<LifecycleEvent> {
        loop {
            let event = self.recv().await?;
            if event.kind() == kind {
                return Some(event);
            }
        }
    }

    /// Return an already-delivered event without waiting, if any.
    pub fn try_recv(&mut self) -> Option<LifecycleEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "lifecycle subscriber lagged; events dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// Stop receiving events.
    pub fn unsubscribe(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Operation;

    #[tokio::test]
    async fn test_every_subscriber_sees_every_event() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(LifecycleEvent::Disconnected);
        bus.emit(LifecycleEvent::Connected(ConnectionInfo::new("x")));

        for sub in [&mut a, &mut b] {
            assert_eq!(sub.recv().await, Some(LifecycleEvent::Disconnected));
            assert_eq!(sub.recv().await.map(|e| e.kind()), Some(EventKind::Connected));
        }
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_noop() {
        let bus = EventBus::default();
        bus.emit(LifecycleEvent::Disconnected);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_once_filters_by_kind() {
        let bus = EventBus::new(8);
        let waiter = bus.once(EventKind::Error);

        bus.emit(LifecycleEvent::Disconnected);
        let err = EngineError::NotConnected { op: Operation::Get };
        bus.emit(LifecycleEvent::Error(err.clone()));

        assert_eq!(waiter.await, Some(LifecycleEvent::Error(err)));
    }

    #[tokio::test]
    async fn test_unsubscribe_drops_receiver() {
        let bus = EventBus::new(8);
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        sub.unsubscribe();
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_recovers() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();
        for _ in 0..5 {
            bus.emit(LifecycleEvent::Disconnected);
        }
        // The oldest events were overwritten; the rest are still delivered.
        assert_eq!(sub.recv().await, Some(LifecycleEvent::Disconnected));
        assert_eq!(sub.try_recv(), Some(LifecycleEvent::Disconnected));
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_bus_dropped() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();
        drop(bus);
        assert_eq!(sub.recv().await, None);
    }
}
