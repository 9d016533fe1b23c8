//! Canonical bus topics for live row-change notifications.
//!
//! One topic per entity kind the dashboard keeps live. Publishers and
//! subscribers must agree on these strings, so keep them here and favor
//! dot.case names.

// Agents
pub const TOPIC_AGENT_STATUS_CHANGED: &str = "live.agent_status.changed";

// Work
pub const TOPIC_TASKS_CHANGED: &str = "live.tasks.changed";
pub const TOPIC_CONTENT_CHANGED: &str = "live.content.changed";

// Logs
pub const TOPIC_EVENTS_CHANGED: &str = "live.events.changed";
pub const TOPIC_MESSAGES_CHANGED: &str = "live.messages.changed";

// Memory
pub const TOPIC_MEMORIES_CHANGED: &str = "live.memories.changed";

/// Every live topic, in the order dashboards usually render them.
pub const LIVE_TOPICS: [&str; 6] = [
    TOPIC_AGENT_STATUS_CHANGED,
    TOPIC_TASKS_CHANGED,
    TOPIC_EVENTS_CHANGED,
    TOPIC_MESSAGES_CHANGED,
    TOPIC_MEMORIES_CHANGED,
    TOPIC_CONTENT_CHANGED,
];

/// Prefix shared by all live topics.
pub const LIVE_PREFIX: &str = "live.";

pub fn is_live_topic(topic: &str) -> bool {
    LIVE_TOPICS.contains(&topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_topics_are_unique_and_prefixed() {
        let mut seen = std::collections::HashSet::new();
        for topic in LIVE_TOPICS {
            assert!(topic.starts_with(LIVE_PREFIX), "{topic} missing prefix");
            assert!(seen.insert(topic), "{topic} listed twice");
        }
        assert!(is_live_topic(TOPIC_TASKS_CHANGED));
        assert!(!is_live_topic("live.unknown.changed"));
    }
}
