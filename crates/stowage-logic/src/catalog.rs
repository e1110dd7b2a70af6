//! Catalog entries, request validation, JSON import and arrangement export.
//!
//! Validation follows the collect-everything style: each check returns a
//! list of issues so a caller sees every problem in a catalog at once, and
//! only errors (not warnings) block a request.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StowageError};
use crate::geometry::{Coordinates, Dimensions};
use crate::inventory::Inventory;
use crate::model::{parse_date, Container, Item};

/// Item catalog entry as supplied by collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSpec {
    pub item_id: String,
    pub name: String,
    pub width: f64,
    pub depth: f64,
    pub height: f64,
    pub mass: f64,
    pub priority: i32,
    #[serde(default)]
    pub preferred_zone: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub usage_limit: Option<u32>,
}

impl ItemSpec {
    pub fn dims(&self) -> Dimensions {
        Dimensions::new(self.width, self.depth, self.height)
    }

    /// Convert into a stored item. The remaining-uses counter starts at the limit.
    pub fn to_item(&self) -> Result<Item> {
        let expiry = match self.expiry_date.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(parse_date(raw)?),
            _ => None,
        };
        let preferred_zone = self
            .preferred_zone
            .as_deref()
            .map(str::trim)
            .filter(|z| !z.is_empty())
            .map(str::to_string);
        Ok(Item {
            id: self.item_id.trim().to_string(),
            name: self.name.clone(),
            dims: self.dims(),
            mass: self.mass,
            priority: self.priority,
            preferred_zone,
            expiry,
            usage_limit: self.usage_limit,
            remaining_uses: self.usage_limit,
        })
    }
}

/// Container catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub container_id: String,
    pub zone: String,
    pub width: f64,
    pub depth: f64,
    pub height: f64,
}

impl ContainerSpec {
    pub fn dims(&self) -> Dimensions {
        Dimensions::new(self.width, self.depth, self.height)
    }

    pub fn to_container(&self) -> Container {
        Container {
            id: self.container_id.trim().to_string(),
            zone: self.zone.trim().to_string(),
            dims: self.dims(),
        }
    }
}

/// A batch of item and container entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub items: Vec<ItemSpec>,
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
}

impl Catalog {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| StowageError::validation(format!("invalid catalog: {e}")))
    }

    /// Every issue found across both lists.
    pub fn issues(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        issues.extend(check_item_entries(&self.items));
        issues.extend(check_container_entries(&self.containers));
        issues.extend(check_zone_coverage(&self.items, &self.containers));
        issues
    }

    /// Fail with every error-severity issue. Warnings pass.
    pub fn validate(&self) -> Result<()> {
        into_result(self.issues())
    }
}

// ── Validation ──────────────────────────────────────────────────────────

/// A catalog validation finding.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub category: &'static str,
    pub severity: Severity,
    pub message: String,
}

/// Issue severity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Severity {
    Error,
    Warning,
}

fn error(category: &'static str, message: String) -> ValidationIssue {
    ValidationIssue {
        category,
        severity: Severity::Error,
        message,
    }
}

/// Fold issues into a result: any error-severity issue rejects the batch.
pub fn into_result(issues: Vec<ValidationIssue>) -> Result<()> {
    let errors: Vec<String> = issues
        .into_iter()
        .filter(|i| i.severity == Severity::Error)
        .map(|i| i.message)
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(StowageError::Validation(errors))
    }
}

/// Ids, dimensions, mass, usage limits and expiry dates of item entries.
pub fn check_item_entries(items: &[ItemSpec]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();
    for spec in items {
        let id = spec.item_id.trim();
        if id.is_empty() {
            issues.push(error("item_identity", format!("item '{}' has an empty id", spec.name)));
        } else if !seen.insert(id.to_string()) {
            issues.push(error("item_identity", format!("item id {id} appears more than once")));
        }
        if !spec.dims().is_valid() {
            issues.push(error(
                "item_geometry",
                format!(
                    "item {id} has non-positive dimensions: {}×{}×{}",
                    spec.width, spec.depth, spec.height
                ),
            ));
        }
        if !spec.mass.is_finite() || spec.mass < 0.0 {
            issues.push(error(
                "item_mass",
                format!("item {id} has invalid mass {}", spec.mass),
            ));
        }
        if spec.usage_limit == Some(0) {
            issues.push(error(
                "item_lifecycle",
                format!("item {id} has a usage limit of zero"),
            ));
        }
        if let Some(raw) = spec.expiry_date.as_deref().filter(|s| !s.trim().is_empty()) {
            if parse_date(raw).is_err() {
                issues.push(error(
                    "item_lifecycle",
                    format!("item {id} has an unreadable expiry date '{raw}'"),
                ));
            }
        }
    }
    issues
}

/// Ids and dimensions of container entries.
pub fn check_container_entries(containers: &[ContainerSpec]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();
    for spec in containers {
        let id = spec.container_id.trim();
        if id.is_empty() {
            issues.push(error(
                "container_identity",
                format!("container in zone '{}' has an empty id", spec.zone),
            ));
        } else if !seen.insert(id.to_string()) {
            issues.push(error(
                "container_identity",
                format!("container id {id} appears more than once"),
            ));
        }
        if !spec.dims().is_valid() {
            issues.push(error(
                "container_geometry",
                format!(
                    "container {id} has non-positive dimensions: {}×{}×{}",
                    spec.width, spec.depth, spec.height
                ),
            ));
        }
    }
    issues
}

/// Warn about preferred zones that no listed container serves.
pub fn check_zone_coverage(
    items: &[ItemSpec],
    containers: &[ContainerSpec],
) -> Vec<ValidationIssue> {
    if containers.is_empty() {
        return Vec::new();
    }
    let zones: HashSet<&str> = containers.iter().map(|c| c.zone.trim()).collect();
    items
        .iter()
        .filter_map(|spec| {
            let zone = spec.preferred_zone.as_deref()?.trim();
            if zone.is_empty() || zones.contains(zone) {
                return None;
            }
            Some(ValidationIssue {
                category: "zone_coverage",
                severity: Severity::Warning,
                message: format!(
                    "item {} prefers zone '{zone}' which has no container in this batch",
                    spec.item_id
                ),
            })
        })
        .collect()
}

// ── Export ──────────────────────────────────────────────────────────────

/// One row of the current arrangement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrangementRow {
    pub item_id: String,
    pub container_id: String,
    pub start: Coordinates,
    pub end: Coordinates,
}

/// Every stowed item with its container and box, in stowing order.
pub fn export_arrangement(inventory: &Inventory) -> Vec<ArrangementRow> {
    inventory
        .placements()
        .map(|p| ArrangementRow {
            item_id: p.item_id.clone(),
            container_id: p.container_id.clone(),
            start: p.position.start,
            end: p.position.end,
        })
        .collect()
}

/// The arrangement as CSV text.
pub fn arrangement_csv(inventory: &Inventory) -> String {
    let mut out = String::from("Item ID,Container ID,Coordinates (W1,D1,H1),(W2,D2,H2)\n");
    for row in export_arrangement(inventory) {
        out.push_str(&format!(
            "{},{},({},{},{}),({},{},{})\n",
            row.item_id,
            row.container_id,
            row.start.width,
            row.start.depth,
            row.start.height,
            row.end.width,
            row.end.depth,
            row.end.height
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;
    use crate::model::Placement;
    use chrono::NaiveDate;

    fn spec(id: &str) -> ItemSpec {
        ItemSpec {
            item_id: id.into(),
            name: "Medical Kit".into(),
            width: 20.0,
            depth: 30.0,
            height: 10.0,
            mass: 2.5,
            priority: 90,
            preferred_zone: Some("Medical Bay".into()),
            expiry_date: Some("2025-06-01".into()),
            usage_limit: Some(3),
        }
    }

    fn container_spec(id: &str) -> ContainerSpec {
        ContainerSpec {
            container_id: id.into(),
            zone: "Medical Bay".into(),
            width: 100.0,
            depth: 85.0,
            height: 200.0,
        }
    }

    #[test]
    fn test_valid_catalog_passes() {
        let catalog = Catalog {
            items: vec![spec("1"), spec("2")],
            containers: vec![container_spec("contA")],
        };
        assert!(catalog.issues().is_empty());
        assert!(catalog.validate().is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut bad = spec("1");
        bad.width = 0.0;
        bad.mass = -1.0;
        bad.usage_limit = Some(0);
        let catalog = Catalog {
            items: vec![bad, spec("1")],
            containers: vec![],
        };
        let err = catalog.validate().unwrap_err();
        match err {
            StowageError::Validation(messages) => assert_eq!(messages.len(), 4),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_zone_is_only_a_warning() {
        let mut item = spec("1");
        item.preferred_zone = Some("Airlock".into());
        let catalog = Catalog {
            items: vec![item],
            containers: vec![container_spec("contA")],
        };
        let issues = catalog.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(catalog.validate().is_ok());
    }

    #[test]
    fn test_bad_expiry_rejected() {
        let mut item = spec("1");
        item.expiry_date = Some("someday".into());
        assert_eq!(check_item_entries(&[item]).len(), 1);
    }

    #[test]
    fn test_to_item_initializes_counter() {
        let item = spec("7").to_item().unwrap();
        assert_eq!(item.remaining_uses, Some(3));
        assert_eq!(item.expiry, NaiveDate::from_ymd_opt(2025, 6, 1));
        assert_eq!(item.preferred_zone.as_deref(), Some("Medical Bay"));
    }

    #[test]
    fn test_catalog_from_json_defaults_optional_fields() {
        let json = r#"{
            "items": [{
                "item_id": "9", "name": "Screwdriver",
                "width": 5, "depth": 20, "height": 2,
                "mass": 0.2, "priority": 10
            }]
        }"#;
        let catalog = Catalog::from_json(json).unwrap();
        assert_eq!(catalog.items.len(), 1);
        assert!(catalog.containers.is_empty());
        assert!(catalog.items[0].usage_limit.is_none());
    }

    #[test]
    fn test_arrangement_csv() {
        let mut inv = Inventory::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        inv.add_container(container_spec("contA").to_container()).unwrap();
        inv.add_item(spec("1").to_item().unwrap()).unwrap();
        inv.stow(Placement {
            item_id: "1".into(),
            container_id: "contA".into(),
            position: BoundingBox::at(Coordinates::ORIGIN, Dimensions::new(20.0, 30.0, 10.0)),
        });
        let csv = arrangement_csv(&inv);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "1,contA,(0,0,0),(20,30,10)");
    }
}
