//! Append-only action log.
//!
//! Every committed operation records who did what to which item. Entries
//! carry free-form JSON details and can be filtered the same way the
//! operations console queries them.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::ItemId;

/// Kind of committed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Placement,
    Rearrangement,
    Retrieval,
    Place,
    ReturnPlan,
    Undocking,
    Simulation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: NaiveDateTime,
    pub actor: Option<String>,
    pub action: ActionKind,
    pub item_id: Option<ItemId>,
    pub details: Value,
}

/// Query over the log. Unset fields match everything; time bounds are inclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogFilter {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub item_id: Option<ItemId>,
    pub actor: Option<String>,
    pub action: Option<ActionKind>,
}

impl LogFilter {
    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.start.map_or(true, |s| entry.timestamp >= s)
            && self.end.map_or(true, |e| entry.timestamp <= e)
            && self
                .item_id
                .as_ref()
                .map_or(true, |id| entry.item_id.as_ref() == Some(id))
            && self
                .actor
                .as_ref()
                .map_or(true, |a| entry.actor.as_ref() == Some(a))
            && self.action.map_or(true, |k| entry.action == k)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionLog {
    entries: Vec<LogEntry>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        timestamp: NaiveDateTime,
        actor: Option<&str>,
        action: ActionKind,
        item_id: Option<&str>,
        details: Value,
    ) {
        self.entries.push(LogEntry {
            timestamp,
            actor: actor.map(str::to_string),
            action,
            item_id: item_id.map(str::to_string),
            details,
        });
    }

    pub fn query(&self, filter: &LogFilter) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| filter.matches(e)).collect()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn sample_log() -> ActionLog {
        let mut log = ActionLog::new();
        log.record(at(1), Some("astro1"), ActionKind::Retrieval, Some("7"), json!({}));
        log.record(at(2), Some("astro2"), ActionKind::Place, Some("7"), json!({}));
        log.record(at(3), None, ActionKind::Simulation, None, json!({ "days": 1 }));
        log
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let log = sample_log();
        assert_eq!(log.query(&LogFilter::default()).len(), 3);
    }

    #[test]
    fn test_filter_by_item_and_actor() {
        let log = sample_log();
        let by_item = LogFilter {
            item_id: Some("7".into()),
            ..LogFilter::default()
        };
        assert_eq!(log.query(&by_item).len(), 2);
        let by_actor = LogFilter {
            actor: Some("astro2".into()),
            ..LogFilter::default()
        };
        let hits = log.query(&by_actor);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].action, ActionKind::Place);
    }

    #[test]
    fn test_filter_by_time_range_inclusive() {
        let log = sample_log();
        let range = LogFilter {
            start: Some(at(2)),
            end: Some(at(3)),
            ..LogFilter::default()
        };
        assert_eq!(log.query(&range).len(), 2);
    }

    #[test]
    fn test_filter_by_action() {
        let log = sample_log();
        let sims = LogFilter {
            action: Some(ActionKind::Simulation),
            ..LogFilter::default()
        };
        assert_eq!(log.query(&sims).len(), 1);
    }
}
