//! Waste classification, return planning and undocking.
//!
//! An item is waste once it is expired or has used up its usage limit.
//! Return planning picks waste that is still aboard, fits it under the
//! undocking container's mass and volume limits, finds each pick a box in
//! that container and lists the retrievals needed to get it there. The
//! resulting manifest is kept until the container undocks.

use std::collections::HashSet;

use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::ActionKind;
use crate::config::PlannerConfig;
use crate::error::{Result, StowageError};
use crate::geometry::BoundingBox;
use crate::inventory::Inventory;
use crate::layout::{find_space, Layout};
use crate::model::{
    parse_date, parse_timestamp, ContainerId, Item, ItemId, StepAction, WasteReason,
};
use crate::retrieval::{steps_in, RetrievalStep};

// ── Classification ──────────────────────────────────────────────────────

/// A waste item and where it currently sits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteItem {
    pub item_id: ItemId,
    pub name: String,
    pub reason: WasteReason,
    pub container_id: Option<ContainerId>,
    pub position: Option<BoundingBox>,
}

/// Every live waste item at the current clock, in insertion order.
pub fn identify_waste(inventory: &Inventory) -> Vec<WasteItem> {
    let today = inventory.clock();
    inventory
        .items()
        .filter_map(|item| {
            let reason = item.waste_reason(today)?;
            let placement = inventory.placement(&item.id);
            Some(WasteItem {
                item_id: item.id.clone(),
                name: item.name.clone(),
                reason,
                container_id: placement.map(|p| p.container_id.clone()),
                position: placement.map(|p| p.position),
            })
        })
        .collect()
}

// ── Return planning ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnPlanRequest {
    pub undocking_container_id: ContainerId,
    pub undocking_date: String,
    pub max_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnItem {
    pub item_id: ItemId,
    pub name: String,
    pub reason: WasteReason,
    pub mass: f64,
    pub volume: f64,
}

/// Waste selected to leave with one undocking container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnManifest {
    pub undocking_container_id: ContainerId,
    pub undocking_date: NaiveDate,
    pub return_items: Vec<ReturnItem>,
    pub total_volume: f64,
    pub total_weight: f64,
}

/// Move of one waste item into the undocking container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStep {
    pub step: usize,
    pub action: StepAction,
    pub item_id: ItemId,
    pub item_name: String,
    pub from_container: Option<ContainerId>,
    pub to_container: ContainerId,
    pub position: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnPlan {
    pub return_plan: Vec<ReturnStep>,
    pub retrieval_steps: Vec<RetrievalStep>,
    pub return_manifest: ReturnManifest,
}

/// Waste that is physically aboard: stowed somewhere or retrieved.
fn return_candidates(inventory: &Inventory) -> Vec<&Item> {
    let today = inventory.clock();
    inventory
        .items()
        .filter(|i| i.waste_reason(today).is_some())
        .filter(|i| inventory.is_stowed(&i.id) || inventory.is_retrieved(&i.id))
        .collect()
}

/// Everything when both budgets allow it; otherwise lowest priority first,
/// skipping any item that would break either budget.
fn select_within_budget<'a>(
    candidates: &[&'a Item],
    max_weight: f64,
    max_volume: f64,
) -> Vec<&'a Item> {
    let total_mass: f64 = candidates.iter().map(|i| i.mass).sum();
    let total_volume: f64 = candidates.iter().map(|i| i.volume()).sum();
    if total_mass <= max_weight && total_volume <= max_volume {
        return candidates.to_vec();
    }
    // Candidates arrive in insertion order, so the stable sort keeps it for ties.
    let mut ordered = candidates.to_vec();
    ordered.sort_by_key(|i| i.priority);
    let (mut mass, mut volume) = (0.0, 0.0);
    let mut picked = Vec::new();
    for item in ordered {
        if mass + item.mass <= max_weight && volume + item.volume() <= max_volume {
            mass += item.mass;
            volume += item.volume();
            picked.push(item);
        }
    }
    picked
}

/// Plan which waste leaves with the undocking container and record the manifest.
///
/// Items are not moved; the steps describe what the crew has to do.
pub fn plan_return(
    inventory: &mut Inventory,
    request: &ReturnPlanRequest,
    config: &PlannerConfig,
) -> Result<ReturnPlan> {
    if !request.max_weight.is_finite() || request.max_weight < 0.0 {
        return Err(StowageError::validation(format!(
            "max weight must be a non-negative number, got {}",
            request.max_weight
        )));
    }
    let undocking_date = parse_date(&request.undocking_date)?;
    let container = inventory.require_container(&request.undocking_container_id)?.clone();
    let eps = config.epsilon;

    let candidates = return_candidates(inventory);
    let has_waste = !candidates.is_empty();
    let selected = select_within_budget(&candidates, request.max_weight, container.volume());

    // Find each selection a box; items already inside keep theirs.
    let mut occupied = inventory.occupied_boxes(&container.id);
    let mut boxed: Vec<(&Item, BoundingBox)> = Vec::with_capacity(selected.len());
    for item in selected {
        if let Some(p) = inventory.placement(&item.id).filter(|p| p.container_id == container.id) {
            boxed.push((item, p.position));
            continue;
        }
        match find_space(&container, &occupied, item.dims, eps) {
            Some(b) => {
                occupied.push(b);
                boxed.push((item, b));
            }
            None => warn!("Waste item {} has no room in {}", item.id, container.id),
        }
    }

    if boxed.is_empty() && has_waste {
        return Err(StowageError::Infeasible(format!(
            "no waste item fits the limits of container {}",
            container.id
        )));
    }

    let mut scratch = Layout::snapshot(inventory);
    let mut retrieval_steps: Vec<RetrievalStep> = Vec::new();
    let mut return_steps = Vec::with_capacity(boxed.len());
    for (item, position) in &boxed {
        let from = inventory.placement(&item.id).map(|p| p.container_id.clone());
        if from.as_deref().is_some_and(|c| c != container.id) {
            for mut step in steps_in(inventory, &scratch, &item.id, eps)? {
                step.step = retrieval_steps.len() + 1;
                retrieval_steps.push(step);
            }
            scratch.remove(&item.id);
        }
        return_steps.push(ReturnStep {
            step: return_steps.len() + 1,
            action: StepAction::Return,
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            from_container: from,
            to_container: container.id.clone(),
            position: *position,
        });
    }

    let today = inventory.clock();
    let return_items: Vec<ReturnItem> = boxed
        .iter()
        .filter_map(|(item, _)| {
            Some(ReturnItem {
                item_id: item.id.clone(),
                name: item.name.clone(),
                reason: item.waste_reason(today)?,
                mass: item.mass,
                volume: item.volume(),
            })
        })
        .collect();
    let manifest = ReturnManifest {
        undocking_container_id: container.id.clone(),
        undocking_date,
        total_volume: return_items.iter().map(|i| i.volume).sum(),
        total_weight: return_items.iter().map(|i| i.mass).sum(),
        return_items,
    };

    let now = inventory.now();
    inventory.log_mut().record(
        now,
        None,
        ActionKind::ReturnPlan,
        None,
        json!({
            "container": container.id,
            "items": manifest.return_items.len(),
            "total_weight": manifest.total_weight,
        }),
    );
    info!(
        "Return plan for {}: {} item(s), {:.2} kg",
        container.id,
        manifest.return_items.len(),
        manifest.total_weight
    );
    inventory.set_manifest(manifest.clone());
    Ok(ReturnPlan {
        return_plan: return_steps,
        retrieval_steps,
        return_manifest: manifest,
    })
}

// ── Undocking ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndockingRequest {
    pub undocking_container_id: ContainerId,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndockingResult {
    pub items_removed: usize,
}

/// Remove every manifest item from the live inventory and clear the manifest.
pub fn complete_undocking(
    inventory: &mut Inventory,
    request: &UndockingRequest,
) -> Result<UndockingResult> {
    let timestamp = match request.timestamp.as_deref() {
        Some(raw) => parse_timestamp(raw)?,
        None => inventory.now(),
    };
    let container_id = inventory.require_container(&request.undocking_container_id)?.id.clone();
    let manifest = inventory.take_manifest(&container_id).ok_or_else(|| {
        StowageError::StateConflict(format!("container {container_id} has no return manifest"))
    })?;

    let mut removed: HashSet<ItemId> = HashSet::new();
    for entry in &manifest.return_items {
        if inventory.dispose(&entry.item_id).is_some() {
            removed.insert(entry.item_id.clone());
        }
    }
    inventory.log_mut().record(
        timestamp,
        None,
        ActionKind::Undocking,
        None,
        json!({ "container": container_id, "items_removed": removed.len() }),
    );
    info!("Undocked {container_id}: {} item(s) returned", removed.len());
    Ok(UndockingResult {
        items_removed: removed.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::geometry::{Coordinates, Dimensions};
    use crate::model::{Container, ItemStatus, Placement};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn item(id: &str, mass: f64, priority: i32, expiry: Option<NaiveDate>) -> Item {
        Item {
            id: id.into(),
            name: format!("Ration {id}"),
            dims: Dimensions::new(10.0, 10.0, 10.0),
            mass,
            priority,
            preferred_zone: None,
            expiry,
            usage_limit: None,
            remaining_uses: None,
        }
    }

    fn stow(inv: &mut Inventory, id: &str, container: &str, depth: f64) {
        inv.stow(Placement {
            item_id: id.into(),
            container_id: container.into(),
            position: BoundingBox::at(
                Coordinates::new(0.0, depth, 0.0),
                Dimensions::new(10.0, 10.0, 10.0),
            ),
        });
    }

    /// Storage container with a fresh item in front of two expired ones,
    /// plus an empty undocking container.
    fn station() -> Inventory {
        let mut inv = Inventory::new(date(2025, 6, 1));
        for (id, w) in [("store", 10.0), ("undock", 20.0)] {
            inv.add_container(Container {
                id: id.into(),
                zone: "Airlock".into(),
                dims: Dimensions::new(w, 40.0, 10.0),
            })
            .unwrap();
        }
        inv.add_item(item("fresh", 1.0, 90, None)).unwrap();
        inv.add_item(item("old1", 5.0, 10, Some(date(2025, 1, 1)))).unwrap();
        inv.add_item(item("old2", 3.0, 20, Some(date(2025, 2, 1)))).unwrap();
        stow(&mut inv, "fresh", "store", 0.0);
        stow(&mut inv, "old1", "store", 10.0);
        stow(&mut inv, "old2", "store", 20.0);
        inv
    }

    fn request(max_weight: f64) -> ReturnPlanRequest {
        ReturnPlanRequest {
            undocking_container_id: "undock".into(),
            undocking_date: "2025-06-10".into(),
            max_weight,
        }
    }

    #[test]
    fn test_identify_waste_is_idempotent() {
        let inv = station();
        let first = identify_waste(&inv);
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|w| w.reason == WasteReason::Expired));
        assert_eq!(first, identify_waste(&inv));
    }

    #[test]
    fn test_plan_return_selects_all_when_within_limits() {
        let mut inv = station();
        let plan = plan_return(&mut inv, &request(100.0), &PlannerConfig::default()).unwrap();
        let manifest = &plan.return_manifest;
        assert_eq!(manifest.return_items.len(), 2);
        assert!((manifest.total_weight - 8.0).abs() < 1e-9);
        assert_eq!(plan.return_plan.len(), 2);
        // old1 sits behind fresh; old2 behind fresh and (after old1 is out) nothing else.
        let removed: Vec<&str> = plan
            .retrieval_steps
            .iter()
            .filter(|s| s.action == StepAction::Remove)
            .map(|s| s.item_id.as_str())
            .collect();
        assert_eq!(removed, vec!["fresh", "old1", "fresh", "old2"]);
        assert_eq!(plan.retrieval_steps.last().unwrap().step, plan.retrieval_steps.len());
        assert!(inv.manifest("undock").is_some());
        assert!(inv.is_stowed("old1"));
    }

    #[test]
    fn test_plan_return_respects_weight_limit() {
        let mut inv = station();
        let plan = plan_return(&mut inv, &request(6.0), &PlannerConfig::default()).unwrap();
        let ids: Vec<&str> = plan
            .return_manifest
            .return_items
            .iter()
            .map(|i| i.item_id.as_str())
            .collect();
        // Lowest priority first: old1 (5 kg) fits, old2 (3 kg) would exceed 6 kg.
        assert_eq!(ids, vec!["old1"]);
        assert!(plan.return_manifest.total_weight <= 6.0);
    }

    #[test]
    fn test_plan_return_respects_volume_limit() {
        let mut inv = Inventory::new(date(2025, 6, 1));
        for (id, depth) in [("store", 40.0), ("undock", 20.0)] {
            inv.add_container(Container {
                id: id.into(),
                zone: "Airlock".into(),
                dims: Dimensions::new(10.0, depth, 10.0),
            })
            .unwrap();
        }
        for (n, id) in ["w1", "w2", "w3"].into_iter().enumerate() {
            let priority = 10 * (n as i32 + 1);
            inv.add_item(item(id, 1.0, priority, Some(date(2025, 1, 1)))).unwrap();
            stow(&mut inv, id, "store", n as f64 * 10.0);
        }

        let plan = plan_return(&mut inv, &request(100.0), &PlannerConfig::default()).unwrap();
        let manifest = &plan.return_manifest;
        let ids: Vec<&str> = manifest.return_items.iter().map(|i| i.item_id.as_str()).collect();
        // 2000 cm³ of room: the two lowest-priority cubes go, w3 stays.
        assert_eq!(ids, vec!["w1", "w2"]);
        let capacity = inv.container("undock").unwrap().volume();
        assert!(manifest.total_volume <= capacity);
        assert!(manifest.total_weight < 100.0);
        assert!(plan
            .return_plan
            .iter()
            .all(|s| inv.container("undock").unwrap().interior().contains(&s.position, 1e-6)));
    }

    #[test]
    fn test_plan_return_ignores_waste_never_stowed() {
        let mut inv = Inventory::new(date(2025, 6, 1));
        inv.add_container(Container {
            id: "undock".into(),
            zone: "Airlock".into(),
            dims: Dimensions::new(20.0, 20.0, 20.0),
        })
        .unwrap();
        inv.add_item(item("stray", 2.0, 10, Some(date(2025, 1, 1)))).unwrap();

        let plan = plan_return(&mut inv, &request(100.0), &PlannerConfig::default()).unwrap();
        assert!(plan.return_manifest.return_items.is_empty());
        assert!(plan.retrieval_steps.is_empty());
        assert!(inv.manifest("undock").is_some());
    }

    #[test]
    fn test_plan_return_infeasible_when_nothing_fits() {
        let mut inv = station();
        let err = plan_return(&mut inv, &request(1.0), &PlannerConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Infeasible);
        assert!(inv.manifest("undock").is_none());
    }

    #[test]
    fn test_plan_return_without_waste_is_empty() {
        let mut inv = Inventory::new(date(2025, 1, 1));
        inv.add_container(Container {
            id: "undock".into(),
            zone: "Airlock".into(),
            dims: Dimensions::new(10.0, 10.0, 10.0),
        })
        .unwrap();
        let plan = plan_return(&mut inv, &request(10.0), &PlannerConfig::default()).unwrap();
        assert!(plan.return_manifest.return_items.is_empty());
        assert!(plan.return_plan.is_empty());
    }

    #[test]
    fn test_plan_return_rejects_bad_requests() {
        let mut inv = station();
        let config = PlannerConfig::default();
        assert_eq!(
            plan_return(&mut inv, &request(-1.0), &config).unwrap_err().kind(),
            ErrorKind::Validation
        );
        let mut unknown = request(10.0);
        unknown.undocking_container_id = "nope".into();
        assert_eq!(
            plan_return(&mut inv, &unknown, &config).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_complete_undocking() {
        let mut inv = station();
        let undock = UndockingRequest {
            undocking_container_id: "undock".into(),
            timestamp: None,
        };
        let err = complete_undocking(&mut inv, &undock).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        plan_return(&mut inv, &request(100.0), &PlannerConfig::default()).unwrap();
        let result = complete_undocking(&mut inv, &undock).unwrap();
        assert_eq!(result.items_removed, 2);
        assert_eq!(inv.status("old1"), Some(ItemStatus::Returned));
        assert!(inv.placement("old2").is_none());
        assert!(inv.manifest("undock").is_none());
        assert!(identify_waste(&inv).is_empty());
    }
}
