//! Time-advance simulator.
//!
//! Steps the shared clock one day at a time, applies the day's item usage
//! and reports what was used, what expired and what ran out. Every request
//! field is checked before the clock moves.

use std::collections::HashSet;

use chrono::{Days, NaiveDate};
use indexmap::IndexSet;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::ActionKind;
use crate::error::{Result, StowageError};
use crate::inventory::Inventory;
use crate::model::{parse_timestamp, ItemId, ItemRef};

/// One item to use on every simulated day, named by id or by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageEntry {
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulateRequest {
    #[serde(default)]
    pub num_of_days: Option<u32>,
    #[serde(default)]
    pub to_timestamp: Option<String>,
    #[serde(default)]
    pub items_to_be_used_per_day: Vec<UsageEntry>,
}

/// How far to move the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Days(u32),
    Until(NaiveDate),
}

impl SimulateRequest {
    /// Exactly one of `num_of_days` and `to_timestamp` must be set.
    pub fn advance(&self) -> Result<Advance> {
        let target = self
            .to_timestamp
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        match (self.num_of_days, target) {
            (Some(days), None) => Ok(Advance::Days(days)),
            (None, Some(raw)) => Ok(Advance::Until(parse_timestamp(raw)?.date())),
            (Some(_), Some(_)) => Err(StowageError::validation(
                "give either num_of_days or to_timestamp, not both",
            )),
            (None, None) => Err(StowageError::validation(
                "one of num_of_days or to_timestamp is required",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsedItem {
    pub item_id: ItemId,
    pub name: String,
    pub remaining_uses: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub item_id: ItemId,
    pub name: String,
}

/// Outcome of a time advance. The three lists never share an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub new_date: NaiveDate,
    pub items_used: Vec<UsedItem>,
    pub items_expired: Vec<ItemSummary>,
    pub items_depleted_today: Vec<ItemSummary>,
}

/// Advance the clock and apply daily usage.
pub fn simulate(inventory: &mut Inventory, request: &SimulateRequest) -> Result<SimulationResult> {
    let start = inventory.clock();
    let days = match request.advance()? {
        Advance::Days(n) => u64::from(n),
        Advance::Until(target) if target < start => {
            return Err(StowageError::validation(format!(
                "target date {target} is before the current date {start}"
            )))
        }
        Advance::Until(target) => target.signed_duration_since(start).num_days().unsigned_abs(),
    };
    let target = start
        .checked_add_days(Days::new(days))
        .ok_or_else(|| {
            StowageError::validation(format!("cannot advance {days} days past {start}"))
        })?;

    let used_each_day = request
        .items_to_be_used_per_day
        .iter()
        .map(|entry| {
            let item_ref = ItemRef::from_parts(entry.item_id.as_deref(), entry.name.as_deref())?;
            inventory.resolve(&item_ref).map(|item| item.id.clone())
        })
        .collect::<Result<Vec<ItemId>>>()?;
    let mut listed: IndexSet<&str> = IndexSet::new();
    if let Some(dup) = used_each_day.iter().find(|id| !listed.insert(id.as_str())) {
        return Err(StowageError::validation(format!(
            "item {dup} listed more than once in daily usage"
        )));
    }

    let mut used: IndexSet<ItemId> = IndexSet::new();
    let mut expired: IndexSet<ItemId> = IndexSet::new();
    let mut depleted: IndexSet<ItemId> = IndexSet::new();

    while inventory.clock() < target {
        let yesterday = inventory.clock();
        let Some(today) = yesterday.succ_opt() else {
            break;
        };
        let expired_before: HashSet<ItemId> = inventory
            .items()
            .filter(|i| i.is_expired(yesterday))
            .map(|i| i.id.clone())
            .collect();
        inventory.set_clock(today);

        for id in &used_each_day {
            if !inventory.is_stowed(id) {
                continue;
            }
            let Some(item) = inventory.item_mut(id) else {
                continue;
            };
            if item.waste_reason(yesterday).is_some() {
                continue;
            }
            used.insert(id.clone());
            if item.remaining_uses.is_some() && item.consume_use() == Some(0) {
                depleted.insert(id.clone());
            }
        }

        expired.extend(
            inventory
                .items()
                .filter(|i| i.is_expired(today) && !expired_before.contains(&i.id))
                .map(|i| i.id.clone()),
        );
    }

    let summary = |id: &ItemId| ItemSummary {
        item_id: id.clone(),
        name: inventory.item(id).map(|i| i.name.clone()).unwrap_or_default(),
    };
    let result = SimulationResult {
        new_date: inventory.clock(),
        items_used: used
            .iter()
            .filter(|id| !depleted.contains(*id) && !expired.contains(*id))
            .map(|id| UsedItem {
                item_id: id.clone(),
                name: inventory.item(id).map(|i| i.name.clone()).unwrap_or_default(),
                remaining_uses: inventory.item(id).and_then(|i| i.remaining_uses),
            })
            .collect(),
        items_expired: expired
            .iter()
            .filter(|id| !depleted.contains(*id))
            .map(summary)
            .collect(),
        items_depleted_today: depleted.iter().map(summary).collect(),
    };

    if days > 0 {
        let now = inventory.now();
        inventory.log_mut().record(
            now,
            None,
            ActionKind::Simulation,
            None,
            json!({
                "days": days,
                "used": result.items_used.len(),
                "expired": result.items_expired.len(),
                "depleted": result.items_depleted_today.len(),
            }),
        );
        info!("Clock advanced {days} day(s) to {}", result.new_date);
    }
    Ok(result)
}
