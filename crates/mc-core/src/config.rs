use anyhow::{Context, Result};
use jsonschema::{validator_for, Validator};
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::collection::{CollectionPolicy, OrderingPolicy};
use crate::record::EntityKind;

pub const DEFAULT_BUS_CAPACITY: usize = 1024;

#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub collections: CollectionsConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Broadcast channel capacity; slow listeners past this lag and skip.
    #[serde(default)]
    pub capacity: Option<usize>,
}

/// Per-kind overrides; a missing section keeps the built-in policy.
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CollectionsConfig {
    #[serde(default)]
    pub agents: Option<CollectionConfig>,
    #[serde(default)]
    pub tasks: Option<CollectionConfig>,
    #[serde(default)]
    pub events: Option<CollectionConfig>,
    #[serde(default)]
    pub messages: Option<CollectionConfig>,
    #[serde(default)]
    pub memories: Option<CollectionConfig>,
    #[serde(default)]
    pub content: Option<CollectionConfig>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CollectionConfig {
    /// "stable_order", "prepend_newest" or "append_only_log".
    #[serde(default)]
    pub ordering: Option<OrderingPolicy>,
    /// Maximum length kept after live changes (at least 1).
    #[serde(default)]
    pub capacity: Option<usize>,
    /// Drop the built-in capacity for this kind.
    #[serde(default)]
    pub unbounded: Option<bool>,
}

impl Config {
    pub fn bus_capacity(&self) -> usize {
        self.bus.capacity.unwrap_or(DEFAULT_BUS_CAPACITY)
    }

    /// Built-in policy for `kind` with this config's overrides on top.
    pub fn policy_for(&self, kind: EntityKind) -> CollectionPolicy {
        let mut policy = CollectionPolicy::default_for(kind);
        if let Some(over) = self.collections.get(kind) {
            if let Some(ordering) = over.ordering {
                policy.ordering = ordering;
            }
            if over.unbounded == Some(true) {
                policy.capacity = None;
            } else if over.capacity.is_some() {
                policy.capacity = over.capacity;
            }
        }
        policy
    }
}

impl CollectionsConfig {
    pub fn get(&self, kind: EntityKind) -> Option<&CollectionConfig> {
        match kind {
            EntityKind::Agents => self.agents.as_ref(),
            EntityKind::Tasks => self.tasks.as_ref(),
            EntityKind::Events => self.events.as_ref(),
            EntityKind::Messages => self.messages.as_ref(),
            EntityKind::Memories => self.memories.as_ref(),
            EntityKind::Content => self.content.as_ref(),
        }
    }
}

static CONFIG_SCHEMA: Lazy<Validator> = Lazy::new(|| {
    let schema = schemars::schema_for!(Config);
    let schema_value = serde_json::to_value(&schema).expect("schema value");
    validator_for(&schema_value).expect("valid schema")
});

/// Returns the JSON schema describing the configuration structure.
///
/// # Panics
///
/// Panics if schema generation fails; this indicates a programming error.
pub fn config_schema_json() -> serde_json::Value {
    let schema = schemars::schema_for!(Config);
    serde_json::to_value(&schema).expect("schema json")
}

pub fn write_schema_file(path: &str) -> std::io::Result<()> {
    let schema_json = config_schema_json();
    std::fs::write(path, serde_json::to_string_pretty(&schema_json)?)
}

pub fn load_config(path: &str) -> Result<Config> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
    parse_config(&content).with_context(|| format!("loading config {path}"))
}

pub fn parse_config(content: &str) -> Result<Config> {
    let raw: toml::Value = toml::from_str(content)?;
    let json_value = serde_json::to_value(&raw)?;
    let validation_errors: Vec<_> = CONFIG_SCHEMA
        .iter_errors(&json_value)
        .map(|e| e.to_string())
        .collect();
    if !validation_errors.is_empty() {
        return Err(anyhow::anyhow!(validation_errors.join(", ")));
    }
    let cfg: Config = toml::from_str(content)?;
    for kind in EntityKind::ALL {
        if let Some(section) = cfg.collections.get(kind) {
            if section.capacity == Some(0) {
                anyhow::bail!("collections.{kind}.capacity must be at least 1");
            }
        }
    }
    if cfg.bus.capacity == Some(0) {
        anyhow::bail!("bus.capacity must be at least 1");
    }
    Ok(cfg)
}
