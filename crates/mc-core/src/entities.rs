//! Typed rows for each live entity kind, plus the stats each dashboard
//! panel shows for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{de_identity, usable_identity, EntityKind, LiveRecord};
use crate::stats::StatsSpec;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    Active,
    Busy,
    Error,
    Offline,
    #[default]
    #[serde(other)]
    Unknown,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Idle => "idle",
            AgentState::Active => "active",
            AgentState::Busy => "busy",
            AgentState::Error => "error",
            AgentState::Offline => "offline",
            AgentState::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct AgentStatus {
    #[serde(default, deserialize_with = "de_identity")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: AgentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LiveRecord for AgentStatus {
    const KIND: EntityKind = EntityKind::Agents;

    fn identity(&self) -> Option<&str> {
        usable_identity(&self.id)
    }

    fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

pub fn agent_stats() -> StatsSpec<AgentStatus> {
    StatsSpec::new()
        .count("active", |a: &AgentStatus| a.status == AgentState::Active)
        .count("idle", |a: &AgentStatus| a.status == AgentState::Idle)
        .count("error", |a: &AgentStatus| a.status == AgentState::Error)
        .count("total", |_: &AgentStatus| true)
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Backlog,
    Todo,
    InProgress,
    Review,
    Done,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_open(&self) -> bool {
        !matches!(self, TaskStatus::Done)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct TaskItem {
    #[serde(default, deserialize_with = "de_identity")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LiveRecord for TaskItem {
    const KIND: EntityKind = EntityKind::Tasks;

    fn identity(&self) -> Option<&str> {
        usable_identity(&self.id)
    }

    fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

pub fn task_stats() -> StatsSpec<TaskItem> {
    StatsSpec::new()
        .count("open", |t: &TaskItem| t.status.is_open())
        .count("in_progress", |t: &TaskItem| {
            t.status == TaskStatus::InProgress
        })
        .count("done", |t: &TaskItem| t.status == TaskStatus::Done)
        .count("urgent", |t: &TaskItem| {
            t.priority == TaskPriority::Urgent && t.status.is_open()
        })
        .count("total", |_: &TaskItem| true)
}

/// One line in the agent activity log.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct ActivityEvent {
    #[serde(default, deserialize_with = "de_identity")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl LiveRecord for ActivityEvent {
    const KIND: EntityKind = EntityKind::Events;

    fn identity(&self) -> Option<&str> {
        usable_identity(&self.id)
    }

    fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct ChatMessage {
    #[serde(default, deserialize_with = "de_identity")]
    pub id: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

impl LiveRecord for ChatMessage {
    const KIND: EntityKind = EntityKind::Messages;

    fn identity(&self) -> Option<&str> {
        usable_identity(&self.id)
    }

    fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct MemoryEntry {
    #[serde(default, deserialize_with = "de_identity")]
    pub id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub content: String,
    /// 0.0 – 1.0
    #[serde(default)]
    pub importance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl LiveRecord for MemoryEntry {
    const KIND: EntityKind = EntityKind::Memories;

    fn identity(&self) -> Option<&str> {
        usable_identity(&self.id)
    }

    fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

pub fn memory_stats() -> StatsSpec<MemoryEntry> {
    StatsSpec::new()
        .count("total", |_: &MemoryEntry| true)
        .sum("importance", |m: &MemoryEntry| m.importance)
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentStage {
    #[default]
    Idea,
    Draft,
    Review,
    Scheduled,
    Published,
    #[serde(other)]
    Unknown,
}

impl ContentStage {
    pub const PIPELINE: [ContentStage; 5] = [
        ContentStage::Idea,
        ContentStage::Draft,
        ContentStage::Review,
        ContentStage::Scheduled,
        ContentStage::Published,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStage::Idea => "idea",
            ContentStage::Draft => "draft",
            ContentStage::Review => "review",
            ContentStage::Scheduled => "scheduled",
            ContentStage::Published => "published",
            ContentStage::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct ContentItem {
    #[serde(default, deserialize_with = "de_identity")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub stage: ContentStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default)]
    pub views: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LiveRecord for ContentItem {
    const KIND: EntityKind = EntityKind::Content;

    fn identity(&self) -> Option<&str> {
        usable_identity(&self.id)
    }

    fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

/// One count per pipeline stage plus total views.
pub fn content_stats() -> StatsSpec<ContentItem> {
    let mut spec = StatsSpec::new();
    for stage in ContentStage::PIPELINE {
        spec = spec.count(stage.as_str(), move |c: &ContentItem| c.stage == stage);
    }
    spec.sum("views", |c: &ContentItem| c.views as f64)
}
