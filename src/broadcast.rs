//! Fan-out of simulation snapshots to subscribers.
//!
//! Each subscriber owns a bounded `tokio::sync::broadcast` channel. Publishing
//! never blocks on a slow reader: when a channel is full its oldest event is
//! overwritten and the reader observes the gap as lag. A subscriber whose
//! receiving half has been dropped is removed on the next publish.

use ::log::{info, warn};
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use uuid::Uuid;

use crate::conflict::ActiveConflicts;
use crate::engine::TrainPosition;

/// Events pushed to subscribers, serialized as `{"event": ..., "data": ...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum SimulationEvent {
    PositionUpdate(Vec<TrainPosition>),
    ConflictUpdate(ActiveConflicts),
}

impl SimulationEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PositionUpdate(_) => "position-update",
            Self::ConflictUpdate(_) => "conflict-update",
        }
    }
}

pub type EventSender = broadcast::Sender<Arc<SimulationEvent>>;
pub type EventReceiver = broadcast::Receiver<Arc<SimulationEvent>>;

/// Receiving half of one subscriber channel
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    receiver: EventReceiver,
    dropped: u64,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next event, waiting if none is queued
    ///
    /// Returns `None` once the channel has been closed and drained.
    pub async fn recv(&mut self) -> Option<Arc<SimulationEvent>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(missed)) => self.dropped += missed,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next queued event without waiting
    pub fn try_recv(&mut self) -> Option<Arc<SimulationEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(missed)) => self.dropped += missed,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Events discarded because this subscriber fell behind
    ///
    /// Lag is only noticed while receiving, so the count covers events
    /// skipped up to the last `recv`/`try_recv`.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Whether the sending side is gone; queued events may still be pending
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed()
    }
}

#[derive(Debug)]
pub struct Broadcaster {
    subscribers: Mutex<IndexMap<Uuid, EventSender>>,
    capacity: usize,
}

impl Broadcaster {
    /// `capacity` is the per-subscriber queue length (tokio rounds it up to a
    /// power of two)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(IndexMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Register a subscriber, queueing `initial` for it before any later push
    pub fn subscribe(&self, initial: Vec<SimulationEvent>) -> Subscription {
        let id = Uuid::new_v4();
        let (sender, receiver) = broadcast::channel(self.capacity);
        for event in initial {
            // Cannot fail: the receiver is held right here
            let _ = sender.send(Arc::new(event));
        }

        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.insert(id, sender);
        info!("Subscriber {id} registered ({} open)", subscribers.len());
        Subscription { id, receiver, dropped: 0 }
    }

    /// Remove a subscriber; it can still drain what was already queued
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let removed = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(&id)
            .is_some();
        if removed {
            info!("Subscriber {id} unregistered");
        }
        removed
    }

    /// Queue `events` for every subscriber, returning how many remain registered
    pub fn publish(&self, events: Vec<SimulationEvent>) -> usize {
        let events: Vec<Arc<SimulationEvent>> = events.into_iter().map(Arc::new).collect();
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|id, sender| {
            for event in &events {
                if sender.send(Arc::clone(event)).is_err() {
                    warn!("Subscriber {id} is no longer receiving, dropping it");
                    return false;
                }
            }
            true
        });
        subscribers.len()
    }

    /// Close and unregister every subscriber
    ///
    /// Events already queued remain readable until each receiver drains them.
    pub fn close_all(&self) -> usize {
        let closed: Vec<(Uuid, EventSender)> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let count = closed.len();
        for (id, sender) in closed {
            let pending = sender.len();
            drop(sender);
            info!("Closed subscriber {id} ({pending} event(s) pending delivery)");
        }
        count
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
