//! Live collections for the mission-control dashboard.
//!
//! A [`LiveCollection`] holds the rows of one entity kind and merges insert /
//! update notifications into them under an [`OrderingPolicy`] and optional
//! capacity. A [`LiveFeed`] binds one collection to a
//! [`mc_events::NotificationSource`]; the [`stats`] module projects counts
//! and sums from a collection on demand; the [`store`] module loads the
//! initial snapshot from the row store.

mod collection;
mod config;
pub mod entities;
mod error;
mod notification;
mod record;
pub mod stats;
pub mod store;
mod sync;

pub use collection::{ApplyOutcome, CollectionPolicy, LiveCollection, OrderingPolicy, Placement};
pub use config::{
    config_schema_json, load_config, parse_config, write_schema_file, BusConfig,
    CollectionConfig, CollectionsConfig, Config, DEFAULT_BUS_CAPACITY,
};
pub use error::SyncError;
pub use notification::{ChangeNotification, Decoded};
pub use record::{row_identity, usable_identity, EntityKind, LiveRecord};
pub use stats::{group_by_day, summarize, StatsSpec, Summary};
pub use store::{load_snapshot, RowStore, Snapshot, SnapshotQuery};
pub use sync::{LiveFeed, PumpReport};
