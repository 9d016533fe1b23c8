//! Derived stats: counts and sums projected from a live collection on demand.

use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::collection::LiveCollection;
use crate::record::LiveRecord;

type Predicate<R> = Box<dyn Fn(&R) -> bool + Send + Sync>;
type Measure<R> = Box<dyn Fn(&R) -> f64 + Send + Sync>;

/// Labelled predicates and measures to evaluate against a collection.
pub struct StatsSpec<R> {
    counts: Vec<(String, Predicate<R>)>,
    sums: Vec<(String, Measure<R>)>,
}

impl<R> Default for StatsSpec<R> {
    fn default() -> Self {
        Self {
            counts: Vec::new(),
            sums: Vec::new(),
        }
    }
}

impl<R> StatsSpec<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(
        mut self,
        label: impl Into<String>,
        predicate: impl Fn(&R) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.counts.push((label.into(), Box::new(predicate)));
        self
    }

    pub fn sum(
        mut self,
        label: impl Into<String>,
        measure: impl Fn(&R) -> f64 + Send + Sync + 'static,
    ) -> Self {
        self.sums.push((label.into(), Box::new(measure)));
        self
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.counts
            .iter()
            .map(|(l, _)| l.as_str())
            .chain(self.sums.iter().map(|(l, _)| l.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub counts: BTreeMap<String, u64>,
    pub sums: BTreeMap<String, f64>,
}

impl Summary {
    /// Zero for labels the spec did not define.
    pub fn count(&self, label: &str) -> u64 {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Zero for labels the spec did not define.
    pub fn sum(&self, label: &str) -> f64 {
        self.sums.get(label).copied().unwrap_or(0.0)
    }
}

pub fn summarize<R: LiveRecord>(collection: &LiveCollection<R>, spec: &StatsSpec<R>) -> Summary {
    let mut summary = Summary::default();
    for (label, predicate) in &spec.counts {
        let n = collection.project(|r| predicate(r)) as u64;
        summary.counts.insert(label.clone(), n);
    }
    for (label, measure) in &spec.sums {
        let total: f64 = collection.iter().map(|r| measure(r)).sum();
        summary.sums.insert(label.clone(), total);
    }
    summary
}

/// Group records by calendar day in `tz`, keeping their relative order.
/// Records without a timestamp are left out.
pub fn group_by_day<'a, R, Tz>(
    records: impl IntoIterator<Item = &'a R>,
    tz: &Tz,
) -> BTreeMap<NaiveDate, Vec<&'a R>>
where
    R: LiveRecord,
    Tz: TimeZone,
{
    let mut days: BTreeMap<NaiveDate, Vec<&'a R>> = BTreeMap::new();
    for record in records {
        if let Some(ts) = record.occurred_at() {
            let day = ts.with_timezone(tz).date_naive();
            days.entry(day).or_default().push(record);
        }
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CollectionPolicy;
    use crate::entities::{ActivityEvent, AgentState, AgentStatus, ContentItem, ContentStage};
    use chrono::{DateTime, FixedOffset, Utc};

    fn agents() -> LiveCollection<AgentStatus> {
        let mk = |id: &str, status| AgentStatus {
            id: id.into(),
            status,
            ..Default::default()
        };
        LiveCollection::initialize(
            CollectionPolicy::stable_order(),
            vec![
                mk("main", AgentState::Active),
                mk("ops", AgentState::Active),
                mk("qa", AgentState::Idle),
            ],
        )
    }

    #[test]
    fn summarize_counts_and_defaults_unknown_labels() {
        let c = agents();
        let spec = StatsSpec::new()
            .count("active", |a: &AgentStatus| a.status == AgentState::Active)
            .count("error", |a: &AgentStatus| a.status == AgentState::Error);
        let summary = summarize(&c, &spec);
        assert_eq!(summary.count("active"), 2);
        assert_eq!(summary.count("error"), 0);
        assert_eq!(summary.count("not-a-label"), 0);
        assert_eq!(summary.sum("not-a-label"), 0.0);
        assert_eq!(spec.labels().collect::<Vec<_>>(), vec!["active", "error"]);
    }

    #[test]
    fn summarize_is_idempotent() {
        let c = agents();
        let spec = StatsSpec::new().count("active", |a: &AgentStatus| {
            a.status == AgentState::Active
        });
        assert_eq!(summarize(&c, &spec), summarize(&c, &spec));
    }

    #[test]
    fn sums_numeric_fields() {
        let items = vec![
            ContentItem {
                id: "c1".into(),
                stage: ContentStage::Published,
                views: 120,
                ..Default::default()
            },
            ContentItem {
                id: "c2".into(),
                stage: ContentStage::Draft,
                views: 30,
                ..Default::default()
            },
        ];
        let c = LiveCollection::initialize(CollectionPolicy::prepend_newest(None), items);
        let spec = StatsSpec::new().sum("views", |c: &ContentItem| c.views as f64);
        assert_eq!(summarize(&c, &spec).sum("views"), 150.0);
    }

    #[test]
    fn groups_by_local_day() {
        let at = |s: &str| Some(DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc));
        let events = vec![
            ActivityEvent {
                id: "late".into(),
                created_at: at("2024-03-02T23:30:00Z"),
                ..Default::default()
            },
            ActivityEvent {
                id: "early".into(),
                created_at: at("2024-03-02T08:00:00Z"),
                ..Default::default()
            },
            ActivityEvent {
                id: "undated".into(),
                ..Default::default()
            },
        ];

        let utc_days = group_by_day(&events, &Utc);
        assert_eq!(utc_days.len(), 1);
        let ids: Vec<&str> = utc_days
            .values()
            .next()
            .unwrap()
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["late", "early"]);

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let local_days = group_by_day(&events, &plus_two);
        assert_eq!(local_days.len(), 2);
        let first = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let second = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();
        assert_eq!(local_days[&first][0].id, "early");
        assert_eq!(local_days[&second][0].id, "late");
    }
}
