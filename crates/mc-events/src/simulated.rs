//! In-process notification source for tests and demos.
//!
//! Handlers run inline on the caller of [`SimulatedSource::emit`], which
//! keeps delivery order deterministic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::{ChangeEvent, ChangeHandler, NotificationSource, Subscription};

#[derive(Default)]
pub struct SimulatedSource {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(u64, String, ChangeHandler)>>,
}

impl SimulatedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `change` to every handler subscribed to `topic`; returns how
    /// many handlers were called.
    pub fn emit(&self, topic: &str, change: ChangeEvent) -> usize {
        let targets: Vec<ChangeHandler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, t, _)| t == topic)
            .map(|(_, _, h)| h.clone())
            .collect();
        for handler in &targets {
            handler(change.clone());
        }
        targets.len()
    }

    /// Drop every handler, as a lost connection would.
    pub fn disconnect(&self) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, t, _)| t == topic)
            .count()
    }
}

impl NotificationSource for SimulatedSource {
    fn subscribe(&self, topic: &str, handler: ChangeHandler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, topic.to_string(), handler));
        Subscription::new(id, topic)
    }

    fn unsubscribe(&self, subscription: Subscription) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _, _)| *id != subscription.id());
    }
}
