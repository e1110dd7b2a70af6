//! Core data model: containers, items, placements and lifecycle status.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StowageError};
use crate::geometry::{BoundingBox, Dimensions};

pub type ItemId = String;
pub type ContainerId = String;

/// A storage container with a fixed interior. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    pub zone: String,
    pub dims: Dimensions,
}

impl Container {
    pub fn interior(&self) -> BoundingBox {
        BoundingBox::interior(self.dims)
    }

    pub fn volume(&self) -> f64 {
        self.dims.volume()
    }
}

/// A cargo item and its lifecycle counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub dims: Dimensions,
    pub mass: f64,
    pub priority: i32,
    pub preferred_zone: Option<String>,
    pub expiry: Option<NaiveDate>,
    pub usage_limit: Option<u32>,
    /// Starts at `usage_limit`; `None` for items without a limit.
    pub remaining_uses: Option<u32>,
}

impl Item {
    pub fn volume(&self) -> f64 {
        self.dims.volume()
    }

    /// Expired when the expiry date is strictly before `today`.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry.is_some_and(|d| d < today)
    }

    pub fn is_depleted(&self) -> bool {
        self.remaining_uses == Some(0)
    }

    pub fn waste_reason(&self, today: NaiveDate) -> Option<WasteReason> {
        if self.is_expired(today) {
            Some(WasteReason::Expired)
        } else if self.is_depleted() {
            Some(WasteReason::UsageDepleted)
        } else {
            None
        }
    }

    /// Consume one use. Returns the remaining count, or `None` when the item
    /// has no usage limit. Never goes below zero.
    pub fn consume_use(&mut self) -> Option<u32> {
        if let Some(uses) = self.remaining_uses.as_mut() {
            *uses = uses.saturating_sub(1);
        }
        self.remaining_uses
    }
}

/// Why an item counts as waste.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WasteReason {
    Expired,
    UsageDepleted,
}

impl WasteReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            WasteReason::Expired => "expired",
            WasteReason::UsageDepleted => "usage-depleted",
        }
    }
}

impl std::fmt::Display for WasteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived lifecycle status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Unplaced,
    Stowed,
    Retrieved,
    Waste,
    Returned,
}

/// Binding of one item to a box inside one container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub item_id: ItemId,
    pub container_id: ContainerId,
    pub position: BoundingBox,
}

/// Physical action in a rearrangement, retrieval or return sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Take an item out of its box.
    Remove,
    /// Put an item (back) into a box.
    Place,
    /// Relocate a stowed item from one box to another.
    Move,
    /// Load a waste item into the undocking container.
    Return,
}

/// How a request names an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRef {
    ById(ItemId),
    ByName(String),
}

impl ItemRef {
    /// Build a reference from the loose id/name pair found in requests.
    ///
    /// Blank strings count as absent. Exactly one of the two must remain.
    pub fn from_parts(id: Option<&str>, name: Option<&str>) -> Result<Self> {
        let id = id.map(str::trim).filter(|s| !s.is_empty());
        let name = name.map(str::trim).filter(|s| !s.is_empty());
        match (id, name) {
            (Some(id), None) => Ok(ItemRef::ById(id.to_string())),
            (None, Some(name)) => Ok(ItemRef::ByName(name.to_string())),
            (Some(id), Some(name)) => Err(StowageError::AmbiguousIdentifier(format!(
                "both id {id} and name {name} given"
            ))),
            (None, None) => Err(StowageError::AmbiguousIdentifier(
                "neither id nor name given".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemRef::ById(id) => write!(f, "id {id}"),
            ItemRef::ByName(name) => write!(f, "name '{name}'"),
        }
    }
}

// ── Dates ───────────────────────────────────────────────────────────────

/// Parse a calendar date.
///
/// Accepts `YYYY-MM-DD`, ISO/RFC 3339 date-times (the time of day is
/// dropped), `DD-MM-YY` and `DD-MM-YYYY`.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive());
    }
    let date_part = trimmed
        .split(['T', ' '])
        .next()
        .unwrap_or(trimmed)
        .trim_end_matches('Z');
    let leading = date_part.split('-').next().unwrap_or_default();
    let parsed = if leading.len() == 4 {
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
    } else if date_part.len() == 8 {
        NaiveDate::parse_from_str(date_part, "%d-%m-%y")
    } else {
        NaiveDate::parse_from_str(date_part, "%d-%m-%Y")
    };
    parsed.map_err(|_| StowageError::validation(format!("invalid date '{raw}'")))
}

/// Parse a timestamp. A bare date means midnight.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_utc());
    }
    let bare = trimmed.trim_end_matches('Z');
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(bare, fmt) {
            return Ok(dt);
        }
    }
    parse_date(trimmed).map(|d| d.and_time(NaiveTime::MIN))
}
