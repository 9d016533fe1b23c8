use anyhow::Result;
use chrono::{Duration, Utc};
use mc_core::entities::{
    ActivityEvent, AgentState, AgentStatus, ChatMessage, ContentItem, ContentStage, MemoryEntry,
    TaskItem, TaskPriority, TaskStatus,
};
use mc_core::store::SqliteRowStore;
use mc_core::LiveRecord;
use mc_events::{Bus, ChangeEvent};
use tracing::debug;

const AGENTS: [&str; 3] = ["main", "ops", "research"];
const AGENT_CYCLE: [AgentState; 4] = [
    AgentState::Active,
    AgentState::Busy,
    AgentState::Idle,
    AgentState::Active,
];
const ACTIONS: [&str; 4] = ["planned", "deployed", "reviewed", "posted"];
const CHANNELS: [&str; 2] = ["general", "ops"];

/// Deterministic stand-in for the backend: each step writes one row and
/// publishes the matching change, cycling through every entity kind.
pub struct Simulator {
    bus: Bus,
    store: Option<SqliteRowStore>,
    tick: u64,
}

impl Simulator {
    pub fn new(bus: Bus, store: Option<SqliteRowStore>) -> Self {
        Self {
            bus,
            store,
            tick: 0,
        }
    }

    pub fn next_change(&mut self) -> ChangeEvent {
        let n = self.tick;
        self.tick += 1;
        let round = n / 6;
        let r = round as usize;
        let now = Utc::now();
        match n % 6 {
            0 => {
                let agent = AgentStatus {
                    id: AGENTS[r % AGENTS.len()].to_string(),
                    name: AGENTS[r % AGENTS.len()].to_string(),
                    status: AGENT_CYCLE[(r / AGENTS.len()) % AGENT_CYCLE.len()],
                    current_task: Some(format!("task-{}", round / 2)),
                    updated_at: Some(now),
                };
                change(round >= AGENTS.len() as u64, &agent)
            }
            1 => {
                // even rounds open a task, odd rounds move it forward
                let task = TaskItem {
                    id: format!("task-{}", round / 2),
                    title: format!("Task {}", round / 2),
                    status: if round % 2 == 0 {
                        TaskStatus::Todo
                    } else if round % 4 == 1 {
                        TaskStatus::InProgress
                    } else {
                        TaskStatus::Done
                    },
                    priority: if round % 5 == 0 {
                        TaskPriority::Urgent
                    } else {
                        TaskPriority::Medium
                    },
                    assignee: Some(AGENTS[r % AGENTS.len()].to_string()),
                    created_at: Some(now - Duration::seconds((round % 2) as i64)),
                    updated_at: Some(now),
                };
                change(round % 2 == 1, &task)
            }
            2 => change(
                false,
                &ActivityEvent {
                    id: format!("event-{round}"),
                    agent_id: Some(AGENTS[r % AGENTS.len()].to_string()),
                    action: ACTIONS[r % ACTIONS.len()].to_string(),
                    detail: None,
                    created_at: Some(now),
                },
            ),
            3 => change(
                false,
                &ChatMessage {
                    id: format!("msg-{round}"),
                    channel: CHANNELS[r % CHANNELS.len()].to_string(),
                    author: AGENTS[r % AGENTS.len()].to_string(),
                    body: format!("status update {round}"),
                    created_at: Some(now),
                    edited_at: None,
                },
            ),
            4 => change(
                false,
                &MemoryEntry {
                    id: format!("mem-{round}"),
                    category: "observation".to_string(),
                    content: format!("note {round}"),
                    importance: (round % 10) as f64 / 10.0,
                    created_at: Some(now),
                },
            ),
            _ => {
                // one item per pipeline length, advanced a stage each round
                let len = ContentStage::PIPELINE.len() as u64;
                let item = ContentItem {
                    id: format!("content-{}", round / len),
                    title: format!("Post {}", round / len),
                    stage: ContentStage::PIPELINE[(round % len) as usize],
                    platform: Some("blog".to_string()),
                    views: if round % len == len - 1 { 100 } else { 0 },
                    created_at: Some(now),
                    updated_at: Some(now),
                };
                change(round % len != 0, &item)
            }
        }
    }

    /// Persist the next row (when backed by sqlite) and publish its change.
    pub async fn step(&mut self) -> Result<ChangeEvent> {
        let change = self.next_change();
        let kind = mc_core::EntityKind::from_slug(&change.entity)?;
        if let Some(store) = &self.store {
            store.upsert_async(kind, change.record.clone()).await?;
        }
        debug!(
            target: "mc.live",
            kind = kind.as_str(),
            event_type = change.event_type.as_str(),
            "simulated change"
        );
        self.bus.publish_change(kind.topic(), &change);
        Ok(change)
    }
}

fn change<R: LiveRecord>(update: bool, record: &R) -> ChangeEvent {
    if update {
        ChangeEvent::update(R::KIND.table(), record)
    } else {
        ChangeEvent::insert(R::KIND.table(), record)
    }
}
