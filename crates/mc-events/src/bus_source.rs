use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{Bus, ChangeEvent, ChangeHandler, NotificationSource, Subscription};

/// [`NotificationSource`] backed by an in-process [`Bus`].
///
/// Every subscription owns a bus receiver and a listener task that forwards
/// matching envelopes to the handler.
pub struct BusSource {
    bus: Bus,
    next_id: AtomicU64,
    active: Mutex<HashMap<u64, Listener>>,
}

struct Listener {
    live: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl BusSource {
    pub fn new(bus: Bus) -> Self {
        Self {
            bus,
            next_id: AtomicU64::new(1),
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn active_count(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl NotificationSource for BusSource {
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    fn subscribe(&self, topic: &str, handler: ChangeHandler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        // Receiver is created before returning so nothing published after
        // subscribe() is missed.
        let mut rx = self.bus.subscribe();
        let live = Arc::new(AtomicBool::new(true));
        let flag = live.clone();
        let topic_owned = topic.to_string();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(env) => {
                        if env.kind != topic_owned {
                            continue;
                        }
                        if !flag.load(Ordering::SeqCst) {
                            break;
                        }
                        match serde_json::from_value::<ChangeEvent>(env.payload) {
                            Ok(change) => handler(change),
                            Err(err) => warn!(
                                target: "mc.live",
                                topic = %topic_owned,
                                %err,
                                "dropping undecodable change envelope"
                            ),
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(target: "mc.live", topic = %topic_owned, skipped, "listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!(target: "mc.live", topic = %topic_owned, "listener stopped");
        });
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Listener { live, task });
        debug!(target: "mc.live", id, topic, "subscribed");
        Subscription::new(id, topic)
    }

    fn unsubscribe(&self, subscription: Subscription) {
        let removed = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&subscription.id());
        if let Some(listener) = removed {
            listener.live.store(false, Ordering::SeqCst);
            listener.task.abort();
            debug!(
                target: "mc.live",
                id = subscription.id(),
                topic = subscription.topic(),
                "unsubscribed"
            );
        }
    }
}

impl Drop for BusSource {
    fn drop(&mut self) {
        let active = self.active.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, listener) in active.drain() {
            listener.live.store(false, Ordering::SeqCst);
            listener.task.abort();
        }
    }
}
