//! A live collection bound to a notification source.
//!
//! Each UI context owns its own [`LiveFeed`]; the source only pushes raw
//! changes onto the feed's queue, and every `apply` happens on the owner
//! through `&mut self`.

use std::sync::Arc;

use mc_events::{ChangeEvent, ChangeHandler, NotificationSource, Subscription};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::collection::{CollectionPolicy, LiveCollection};
use crate::error::SyncError;
use crate::notification::{ChangeNotification, Decoded};
use crate::record::LiveRecord;

/// What one drain of the queue did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PumpReport {
    pub applied: usize,
    pub rejected: usize,
    pub ignored: usize,
    pub evicted: usize,
}

impl PumpReport {
    pub fn changed(&self) -> bool {
        self.applied > 0
    }

    pub fn merge(&mut self, other: PumpReport) {
        self.applied += other.applied;
        self.rejected += other.rejected;
        self.ignored += other.ignored;
        self.evicted += other.evicted;
    }
}

pub struct LiveFeed<R: LiveRecord> {
    collection: LiveCollection<R>,
    source: Arc<dyn NotificationSource>,
    subscription: Option<Subscription>,
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl<R: LiveRecord> LiveFeed<R> {
    /// Start with an empty collection and subscribe to `R`'s topic.
    pub fn subscribe(policy: CollectionPolicy, source: Arc<dyn NotificationSource>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: ChangeHandler = Arc::new(move |change| {
            let _ = tx.send(change);
        });
        let subscription = source.subscribe(R::KIND.topic(), handler);
        debug!(
            target: "mc.live",
            kind = R::KIND.as_str(),
            ordering = policy.ordering.as_str(),
            capacity = ?policy.capacity,
            "live feed subscribed"
        );
        Self {
            collection: LiveCollection::new(policy),
            source,
            subscription: Some(subscription),
            rx,
        }
    }

    /// Replace the collection with a snapshot from the row store. Changes
    /// queued before the call are applied on top by the next `pump`.
    pub fn seed(&mut self, snapshot: impl IntoIterator<Item = R>) {
        self.collection.reset(snapshot);
        debug!(
            target: "mc.live",
            kind = R::KIND.as_str(),
            len = self.collection.len(),
            "live feed seeded"
        );
    }

    /// Apply every queued change in arrival order.
    pub fn pump(&mut self) -> PumpReport {
        let mut report = PumpReport::default();
        while let Ok(change) = self.rx.try_recv() {
            report.merge(self.handle(change));
        }
        report
    }

    /// Wait for at least one change, then drain the queue. `None` once the
    /// source is gone; the collection keeps its last contents.
    pub async fn next_change(&mut self) -> Option<PumpReport> {
        let first = self.rx.recv().await?;
        let mut report = self.handle(first);
        report.merge(self.pump());
        Some(report)
    }

    /// Stop receiving. Changes already applied stay; queued ones are dropped.
    pub fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.source.unsubscribe(subscription);
            self.rx.close();
            let mut dropped = 0usize;
            while self.rx.try_recv().is_ok() {
                dropped += 1;
            }
            debug!(
                target: "mc.live",
                kind = R::KIND.as_str(),
                dropped,
                "live feed unsubscribed"
            );
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn collection(&self) -> &LiveCollection<R> {
        &self.collection
    }

    fn handle(&mut self, change: ChangeEvent) -> PumpReport {
        let mut report = PumpReport::default();
        match ChangeNotification::<R>::decode(change) {
            Ok(Decoded::Change(notification)) => match self.collection.apply(notification) {
                Ok(outcome) => {
                    report.applied = 1;
                    report.evicted = outcome.evicted;
                }
                Err(err) => {
                    report.rejected = 1;
                    warn!(target: "mc.live", kind = R::KIND.as_str(), %err, "rejected change");
                }
            },
            Ok(Decoded::Foreign(other)) => {
                report.ignored = 1;
                debug!(
                    target: "mc.live",
                    kind = R::KIND.as_str(),
                    other = other.as_str(),
                    "ignored change for another kind"
                );
            }
            Ok(Decoded::Unsupported(change_type)) => {
                report.ignored = 1;
                debug!(
                    target: "mc.live",
                    kind = R::KIND.as_str(),
                    change_type = change_type.as_str(),
                    "ignored unsupported change type"
                );
            }
            Err(err @ SyncError::UnknownEntityKind(_)) => {
                report.ignored = 1;
                debug!(target: "mc.live", kind = R::KIND.as_str(), %err, "ignored change");
            }
            Err(err) => {
                report.rejected = 1;
                warn!(target: "mc.live", kind = R::KIND.as_str(), %err, "rejected change");
            }
        }
        report
    }
}

impl<R: LiveRecord> Drop for LiveFeed<R> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AgentState, AgentStatus, ChatMessage};
    use mc_events::{ChangeType, SimulatedSource};
    use serde_json::json;

    fn agents_feed(source: &Arc<SimulatedSource>) -> LiveFeed<AgentStatus> {
        let dyn_source: Arc<dyn NotificationSource> = source.clone();
        LiveFeed::subscribe(CollectionPolicy::stable_order(), dyn_source)
    }

    fn emit(source: &SimulatedSource, entity: &str, ty: ChangeType, record: serde_json::Value) {
        let topic = crate::EntityKind::from_slug(entity)
            .map(|k| k.topic())
            .unwrap_or(mc_topics::TOPIC_AGENT_STATUS_CHANGED);
        source.emit(topic, ChangeEvent::new(entity, ty, record));
    }

    #[test]
    fn pump_applies_in_arrival_order() {
        let source = Arc::new(SimulatedSource::new());
        let mut feed = agents_feed(&source);
        emit(&source, "agent_status", ChangeType::Insert, json!({"id": "main", "status": "idle"}));
        emit(
            &source,
            "agent_status",
            ChangeType::Update,
            json!({"id": "main", "status": "active"}),
        );

        let report = feed.pump();
        assert_eq!(report.applied, 2);
        assert_eq!(feed.collection().len(), 1);
        assert_eq!(feed.collection().items()[0].status, AgentState::Active);
        assert_eq!(feed.pump(), PumpReport::default());
    }

    #[test]
    fn malformed_and_foreign_changes_are_counted_not_applied() {
        let source = Arc::new(SimulatedSource::new());
        let mut feed = agents_feed(&source);
        emit(&source, "agent_status", ChangeType::Insert, json!({"status": "idle"}));
        emit(&source, "tasks", ChangeType::Insert, json!({"id": "t1"}));
        // foreign/unknown entities published on the agents topic
        source.emit(
            mc_topics::TOPIC_AGENT_STATUS_CHANGED,
            ChangeEvent::new("tasks", ChangeType::Insert, json!({"id": "t1"})),
        );
        source.emit(
            mc_topics::TOPIC_AGENT_STATUS_CHANGED,
            ChangeEvent::new("finances", ChangeType::Insert, json!({"id": "f1"})),
        );
        emit(&source, "agent_status", ChangeType::Unsupported, json!({"id": "main"}));

        let report = feed.pump();
        assert_eq!(report.applied, 0);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.ignored, 3);
        assert!(feed.collection().is_empty());
        assert_eq!(feed.collection().version(), 0);
    }

    #[test]
    fn unsubscribe_discards_queued_and_keeps_applied() {
        let source = Arc::new(SimulatedSource::new());
        let mut feed = agents_feed(&source);
        emit(&source, "agent_status", ChangeType::Insert, json!({"id": "a", "status": "active"}));
        feed.pump();
        emit(&source, "agent_status", ChangeType::Insert, json!({"id": "b", "status": "active"}));

        feed.unsubscribe();
        assert!(!feed.is_subscribed());
        assert_eq!(source.subscriber_count(mc_topics::TOPIC_AGENT_STATUS_CHANGED), 0);
        emit(&source, "agent_status", ChangeType::Insert, json!({"id": "c", "status": "active"}));

        assert_eq!(feed.pump(), PumpReport::default());
        let ids: Vec<&str> = feed.collection().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn drop_unsubscribes() {
        let source = Arc::new(SimulatedSource::new());
        {
            let _feed = agents_feed(&source);
            assert_eq!(source.subscriber_count(mc_topics::TOPIC_AGENT_STATUS_CHANGED), 1);
        }
        assert_eq!(source.subscriber_count(mc_topics::TOPIC_AGENT_STATUS_CHANGED), 0);
    }

    #[test]
    fn feeds_for_same_kind_are_independent() {
        let source = Arc::new(SimulatedSource::new());
        let dyn_source: Arc<dyn NotificationSource> = source.clone();
        let mut left: LiveFeed<ChatMessage> =
            LiveFeed::subscribe(CollectionPolicy::prepend_newest(Some(50)), dyn_source.clone());
        let mut right: LiveFeed<ChatMessage> =
            LiveFeed::subscribe(CollectionPolicy::prepend_newest(Some(1)), dyn_source);
        right.seed(vec![ChatMessage {
            id: "old".into(),
            ..Default::default()
        }]);

        emit(&source, "messages", ChangeType::Insert, json!({"id": "m1", "body": "hi"}));
        left.pump();
        right.pump();
        assert_eq!(left.collection().len(), 1);
        assert_eq!(right.collection().len(), 1);
        assert_eq!(right.collection().items()[0].id, "m1");
    }

    #[tokio::test]
    async fn disconnect_leaves_last_known_state() {
        let source = Arc::new(SimulatedSource::new());
        let mut feed = agents_feed(&source);
        emit(
            &source,
            "agent_status",
            ChangeType::Insert,
            json!({"id": "main", "status": "active"}),
        );
        let report = feed.next_change().await.expect("change");
        assert!(report.changed());

        source.disconnect();
        assert!(feed.next_change().await.is_none());
        assert_eq!(feed.collection().len(), 1);
        assert_eq!(feed.collection().items()[0].id, "main");
    }
}
