//! Ordered, bounded in-memory collection of live records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::SyncError;
use crate::notification::ChangeNotification;
use crate::record::{EntityKind, LiveRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderingPolicy {
    /// Upsert by identity; existing rows keep their position, new rows are
    /// appended in order of first appearance.
    StableOrder,
    /// Upsert by identity; existing rows keep their position, new rows go to
    /// the front.
    PrependNewest,
    /// Every notification becomes a new leading entry, even for an identity
    /// already present.
    AppendOnlyLog,
}

impl OrderingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderingPolicy::StableOrder => "stable_order",
            OrderingPolicy::PrependNewest => "prepend_newest",
            OrderingPolicy::AppendOnlyLog => "append_only_log",
        }
    }

    pub fn prepends(&self) -> bool {
        !matches!(self, OrderingPolicy::StableOrder)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionPolicy {
    pub ordering: OrderingPolicy,
    pub capacity: Option<usize>,
}

impl CollectionPolicy {
    pub const fn stable_order() -> Self {
        Self {
            ordering: OrderingPolicy::StableOrder,
            capacity: None,
        }
    }

    pub const fn prepend_newest(capacity: Option<usize>) -> Self {
        Self {
            ordering: OrderingPolicy::PrependNewest,
            capacity,
        }
    }

    pub const fn append_only_log(capacity: Option<usize>) -> Self {
        Self {
            ordering: OrderingPolicy::AppendOnlyLog,
            capacity,
        }
    }

    /// Built-in policy per kind, before config overrides.
    pub const fn default_for(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Agents => Self::stable_order(),
            EntityKind::Tasks => Self::prepend_newest(None),
            EntityKind::Events => Self::append_only_log(Some(30)),
            EntityKind::Messages => Self::prepend_newest(Some(50)),
            EntityKind::Memories => Self::prepend_newest(Some(100)),
            EntityKind::Content => Self::prepend_newest(None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Added { index: usize },
    Replaced { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub placement: Placement,
    /// Rows dropped from the tail to respect the capacity.
    pub evicted: usize,
}

#[derive(Debug, Clone)]
pub struct LiveCollection<R> {
    policy: CollectionPolicy,
    items: Vec<R>,
    version: u64,
}

impl<R: LiveRecord> LiveCollection<R> {
    pub fn new(policy: CollectionPolicy) -> Self {
        Self {
            policy,
            items: Vec::new(),
            version: 0,
        }
    }

    /// Exactly the snapshot rows, in the given order. The capacity is not
    /// applied here; a bounded fetch already respects it.
    pub fn initialize(policy: CollectionPolicy, snapshot: impl IntoIterator<Item = R>) -> Self {
        Self {
            policy,
            items: snapshot.into_iter().collect(),
            version: 0,
        }
    }

    /// Replace the contents with a fresh snapshot (no trimming).
    pub fn reset(&mut self, snapshot: impl IntoIterator<Item = R>) {
        self.items = snapshot.into_iter().collect();
        self.version += 1;
    }

    pub fn apply(
        &mut self,
        notification: ChangeNotification<R>,
    ) -> Result<ApplyOutcome, SyncError> {
        let record = notification.into_record();
        let Some(id) = record.identity() else {
            return Err(SyncError::invalid(R::KIND, "record has no identity"));
        };

        let placement = match self.policy.ordering {
            OrderingPolicy::StableOrder => match self.position(id) {
                Some(index) => {
                    self.items[index] = record;
                    Placement::Replaced { index }
                }
                None => {
                    self.items.push(record);
                    Placement::Added {
                        index: self.items.len() - 1,
                    }
                }
            },
            OrderingPolicy::PrependNewest => match self.position(id) {
                Some(index) => {
                    self.items[index] = record;
                    Placement::Replaced { index }
                }
                None => {
                    self.items.insert(0, record);
                    Placement::Added { index: 0 }
                }
            },
            OrderingPolicy::AppendOnlyLog => {
                self.items.insert(0, record);
                Placement::Added { index: 0 }
            }
        };

        let mut evicted = 0;
        if let Some(capacity) = self.policy.capacity {
            if self.items.len() > capacity {
                evicted = self.items.len() - capacity;
                self.items.truncate(capacity);
                trace!(
                    target: "mc.live",
                    kind = R::KIND.as_str(),
                    evicted,
                    capacity,
                    "trimmed tail"
                );
            }
        }
        self.version += 1;
        Ok(ApplyOutcome { placement, evicted })
    }

    /// Number of rows matching `predicate`, computed on every call.
    pub fn project(&self, predicate: impl Fn(&R) -> bool) -> usize {
        self.items.iter().filter(|r| predicate(r)).count()
    }

    pub fn get(&self, identity: &str) -> Option<&R> {
        self.position(identity).map(|i| &self.items[i])
    }

    pub fn items(&self) -> &[R] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn policy(&self) -> CollectionPolicy {
        self.policy
    }

    /// Bumped by every successful `apply` and `reset`.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn into_items(self) -> Vec<R> {
        self.items
    }

    fn position(&self, identity: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|r| r.identity() == Some(identity))
    }
}

impl<'a, R: LiveRecord> IntoIterator for &'a LiveCollection<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
