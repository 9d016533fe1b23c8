use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use mc_core::entities::{
    agent_stats, content_stats, memory_stats, task_stats, ActivityEvent, AgentStatus,
    ChatMessage, ContentItem, MemoryEntry, TaskItem,
};
use mc_core::{
    load_snapshot, summarize, Config, LiveFeed, LiveRecord, PumpReport, RowStore, SnapshotQuery,
    Summary,
};
use mc_events::NotificationSource;
use serde::Serialize;
use tracing::info;

/// Every live panel of the dashboard, each with its own feed.
pub struct Board {
    pub agents: LiveFeed<AgentStatus>,
    pub tasks: LiveFeed<TaskItem>,
    pub events: LiveFeed<ActivityEvent>,
    pub messages: LiveFeed<ChatMessage>,
    pub memories: LiveFeed<MemoryEntry>,
    pub content: LiveFeed<ContentItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSummary {
    pub agents: Summary,
    pub tasks: Summary,
    pub events: usize,
    pub messages: usize,
    pub memories: Summary,
    pub content: Summary,
}

fn feed<R: LiveRecord>(config: &Config, source: &Arc<dyn NotificationSource>) -> LiveFeed<R> {
    LiveFeed::subscribe(config.policy_for(R::KIND), source.clone())
}

async fn seed_one<R: LiveRecord>(feed: &mut LiveFeed<R>, store: &dyn RowStore) -> Result<usize> {
    let query = SnapshotQuery::for_policy(&feed.collection().policy());
    let snapshot = load_snapshot::<R>(store, &query)
        .await
        .with_context(|| format!("loading {} snapshot", R::KIND))?;
    let skipped = snapshot.skipped;
    feed.seed(snapshot.records);
    Ok(skipped)
}

impl Board {
    pub fn subscribe(config: &Config, source: Arc<dyn NotificationSource>) -> Self {
        Self {
            agents: feed(config, &source),
            tasks: feed(config, &source),
            events: feed(config, &source),
            messages: feed(config, &source),
            memories: feed(config, &source),
            content: feed(config, &source),
        }
    }

    /// Load every panel from the row store; returns how many rows were
    /// skipped as undecodable.
    pub async fn seed(&mut self, store: &dyn RowStore) -> Result<usize> {
        let skipped = seed_one(&mut self.agents, store).await?
            + seed_one(&mut self.tasks, store).await?
            + seed_one(&mut self.events, store).await?
            + seed_one(&mut self.messages, store).await?
            + seed_one(&mut self.memories, store).await?
            + seed_one(&mut self.content, store).await?;
        info!(target: "mc.live", skipped, "board seeded");
        Ok(skipped)
    }

    pub fn pump(&mut self) -> PumpReport {
        let mut report = self.agents.pump();
        report.merge(self.tasks.pump());
        report.merge(self.events.pump());
        report.merge(self.messages.pump());
        report.merge(self.memories.pump());
        report.merge(self.content.pump());
        report
    }

    /// Wait until any panel receives a change, then drain them all.
    pub async fn next_change(&mut self) -> Option<PumpReport> {
        let mut report = tokio::select! {
            r = self.agents.next_change() => r,
            r = self.tasks.next_change() => r,
            r = self.events.next_change() => r,
            r = self.messages.next_change() => r,
            r = self.memories.next_change() => r,
            r = self.content.next_change() => r,
        }?;
        report.merge(self.pump());
        Some(report)
    }

    pub fn summary(&self) -> BoardSummary {
        BoardSummary {
            agents: summarize(self.agents.collection(), &agent_stats()),
            tasks: summarize(self.tasks.collection(), &task_stats()),
            events: self.events.collection().len(),
            messages: self.messages.collection().len(),
            memories: summarize(self.memories.collection(), &memory_stats()),
            content: summarize(self.content.collection(), &content_stats()),
        }
    }
}

pub fn summary_line(s: &BoardSummary) -> String {
    format!(
        "agents active={}/{} tasks open={} done={} events={} messages={} memories={} content published={} views={:.0}",
        s.agents.count("active"),
        s.agents.count("total"),
        s.tasks.count("open"),
        s.tasks.count("done"),
        s.events,
        s.messages,
        s.memories.count("total"),
        s.content.count("published"),
        s.content.sum("views"),
    )
}

pub fn render(board: &Board, json_out: bool) {
    let summary = board.summary();
    if json_out {
        println!(
            "{}",
            serde_json::to_string(&summary).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let now = Local::now().format("%H:%M:%S");
        println!("[{}] {}", now, summary_line(&summary));
    }
}
