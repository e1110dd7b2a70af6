//! Retrieval planner.
//!
//! Depth is the access axis and depth 0 is the container's opening. An item
//! blocks another when it covers part of the other's width/height face and
//! starts strictly closer to the opening. Blockers come out nearest first
//! and go back in reverse, each to its original box.

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::ActionKind;
use crate::config::PlannerConfig;
use crate::error::{Result, StowageError};
use crate::geometry::BoundingBox;
use crate::inventory::Inventory;
use crate::layout::Layout;
use crate::model::{parse_timestamp, ContainerId, ItemId, StepAction};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalStep {
    pub step: usize,
    pub action: StepAction,
    pub item_id: ItemId,
    pub item_name: String,
    #[serde(default)]
    pub from_container: Option<ContainerId>,
    #[serde(default)]
    pub to_container: Option<ContainerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieveRequest {
    pub item_id: ItemId,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub item_id: ItemId,
    pub container_id: ContainerId,
    pub retrieval_steps: Vec<RetrievalStep>,
    /// Uses left after the retrieval; `None` for unlimited items.
    pub remaining_uses: Option<u32>,
}

/// Items in front of `target` in the same container, nearest to the opening
/// first. Equal depths keep stowing order.
pub fn blockers(
    layout: &Layout,
    container_id: &str,
    target_id: &str,
    target: &BoundingBox,
    epsilon: f64,
) -> Vec<ItemId> {
    let mut found: Vec<(&str, BoundingBox)> = layout
        .residents(container_id)
        .filter(|(id, b)| {
            *id != target_id
                && b.start.depth < target.start.depth - epsilon
                && b.overlaps_face(target, epsilon)
        })
        .collect();
    found.sort_by(|a, b| a.1.start.depth.total_cmp(&b.1.start.depth));
    found.into_iter().map(|(id, _)| id.to_string()).collect()
}

/// Steps to take `item_id` out of `layout`, numbered from 1.
pub(crate) fn steps_in(
    inventory: &Inventory,
    layout: &Layout,
    item_id: &str,
    epsilon: f64,
) -> Result<Vec<RetrievalStep>> {
    let (container_id, target) = layout
        .get(item_id)
        .ok_or_else(|| StowageError::StateConflict(format!("item {item_id} is not stowed")))?;
    let in_front = blockers(layout, container_id, item_id, &target, epsilon);
    let name_of = |id: &str| inventory.item(id).map(|i| i.name.clone()).unwrap_or_default();

    let mut steps = Vec::with_capacity(in_front.len() * 2 + 1);
    let mut push = |action: StepAction, id: &str, from: Option<&str>, to: Option<&str>| {
        steps.push(RetrievalStep {
            step: steps.len() + 1,
            action,
            item_id: id.to_string(),
            item_name: name_of(id),
            from_container: from.map(str::to_string),
            to_container: to.map(str::to_string),
        });
    };
    for id in &in_front {
        push(StepAction::Remove, id.as_str(), Some(container_id), None);
    }
    push(StepAction::Remove, item_id, Some(container_id), None);
    for id in in_front.iter().rev() {
        push(StepAction::Place, id.as_str(), None, Some(container_id));
    }
    Ok(steps)
}

/// Plan the retrieval of a stowed item without changing anything.
pub fn plan_retrieval(
    inventory: &Inventory,
    item_id: &str,
    config: &PlannerConfig,
) -> Result<Vec<RetrievalStep>> {
    if inventory.returned_items().any(|i| i.id == item_id) {
        return Err(StowageError::StateConflict(format!(
            "item {item_id} was already returned"
        )));
    }
    inventory.require_item(item_id)?;
    steps_in(inventory, &Layout::snapshot(inventory), item_id, config.epsilon)
}

/// Commit a retrieval: the item leaves storage and, when configured, uses
/// up one of its uses. Blockers keep their boxes.
pub fn retrieve(
    inventory: &mut Inventory,
    request: &RetrieveRequest,
    config: &PlannerConfig,
) -> Result<RetrievalResult> {
    let timestamp = match request.timestamp.as_deref() {
        Some(raw) => parse_timestamp(raw)?,
        None => inventory.now(),
    };
    let steps = plan_retrieval(inventory, &request.item_id, config)?;
    let placement = inventory
        .take_out(&request.item_id)
        .ok_or_else(|| {
            StowageError::StateConflict(format!("item {} is not stowed", request.item_id))
        })?;

    let remaining_uses = match inventory.item_mut(&request.item_id) {
        Some(item) if config.retrieval_consumes_use => item.consume_use(),
        Some(item) => item.remaining_uses,
        None => None,
    };
    inventory.log_mut().record(
        timestamp,
        request.user_id.as_deref(),
        ActionKind::Retrieval,
        Some(request.item_id.as_str()),
        json!({
            "from_container": placement.container_id,
            "steps": steps.len(),
            "remaining_uses": remaining_uses,
        }),
    );
    info!(
        "Retrieved item {} from {} in {} step(s)",
        request.item_id,
        placement.container_id,
        steps.len()
    );
    Ok(RetrievalResult {
        item_id: request.item_id.clone(),
        container_id: placement.container_id,
        retrieval_steps: steps,
        remaining_uses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::geometry::{Coordinates, Dimensions};
    use crate::model::{Container, Item, ItemStatus, Placement};
    use chrono::NaiveDate;

    fn item(id: &str, uses: Option<u32>) -> Item {
        Item {
            id: id.into(),
            name: format!("Tool {id}"),
            dims: Dimensions::new(10.0, 10.0, 10.0),
            mass: 1.0,
            priority: 50,
            preferred_zone: None,
            expiry: None,
            usage_limit: uses,
            remaining_uses: uses,
        }
    }

    /// Three items in a column along depth plus one off to the side.
    fn column() -> Inventory {
        let mut inv = Inventory::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        inv.add_container(Container {
            id: "contA".into(),
            zone: "Lab".into(),
            dims: Dimensions::new(50.0, 50.0, 50.0),
        })
        .unwrap();
        let boxes = [
            ("back", 0.0, 20.0),
            ("front", 0.0, 0.0),
            ("mid", 0.0, 10.0),
            ("side", 30.0, 0.0),
        ];
        for (id, w, d) in boxes {
            inv.add_item(item(id, Some(1))).unwrap();
            inv.stow(Placement {
                item_id: id.into(),
                container_id: "contA".into(),
                position: BoundingBox::at(
                    Coordinates::new(w, d, 0.0),
                    Dimensions::new(10.0, 10.0, 10.0),
                ),
            });
        }
        inv
    }

    #[test]
    fn test_front_item_has_no_blockers() {
        let inv = column();
        let steps = plan_retrieval(&inv, "front", &PlannerConfig::default()).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action, StepAction::Remove);
    }

    #[test]
    fn test_blockers_removed_nearest_first_and_replaced_in_reverse() {
        let inv = column();
        let steps = plan_retrieval(&inv, "back", &PlannerConfig::default()).unwrap();
        let order: Vec<(StepAction, &str)> =
            steps.iter().map(|s| (s.action, s.item_id.as_str())).collect();
        assert_eq!(
            order,
            vec![
                (StepAction::Remove, "front"),
                (StepAction::Remove, "mid"),
                (StepAction::Remove, "back"),
                (StepAction::Place, "mid"),
                (StepAction::Place, "front"),
            ]
        );
        assert_eq!(steps[4].step, 5);
        assert_eq!(steps[4].to_container.as_deref(), Some("contA"));
    }

    #[test]
    fn test_steps_are_reversible() {
        let inv = column();
        let steps = plan_retrieval(&inv, "back", &PlannerConfig::default()).unwrap();
        let mut layout = Layout::snapshot(&inv);
        let mut held = Vec::new();
        for s in &steps {
            match s.action {
                StepAction::Remove => {
                    held.push((s.item_id.clone(), layout.remove(&s.item_id).unwrap()))
                }
                StepAction::Place => {
                    let (id, (c, b)) = held
                        .iter()
                        .find(|(id, _)| *id == s.item_id)
                        .unwrap()
                        .clone();
                    layout.insert(&id, &c, b);
                }
                _ => unreachable!(),
            }
        }
        for id in ["front", "mid", "side"] {
            assert_eq!(layout.get(id).map(|(_, b)| b), inv.placement(id).map(|p| p.position));
        }
        assert!(layout.get("back").is_none());
    }

    #[test]
    fn test_retrieve_commits_and_consumes_use() {
        let mut inv = column();
        let req = RetrieveRequest {
            item_id: "mid".into(),
            user_id: Some("astro1".into()),
            timestamp: Some("2025-01-01T08:00:00".into()),
        };
        let result = retrieve(&mut inv, &req, &PlannerConfig::default()).unwrap();
        assert_eq!(result.retrieval_steps.len(), 3);
        assert_eq!(result.remaining_uses, Some(0));
        assert_eq!(inv.status("mid"), Some(ItemStatus::Waste));
        assert!(inv.placement("front").is_some());
        assert_eq!(inv.log().len(), 1);
        assert_eq!(inv.log().entries()[0].actor.as_deref(), Some("astro1"));
    }

    #[test]
    fn test_retrieve_without_consuming() {
        let mut inv = column();
        let config = PlannerConfig {
            retrieval_consumes_use: false,
            ..PlannerConfig::default()
        };
        let req = RetrieveRequest {
            item_id: "side".into(),
            user_id: None,
            timestamp: None,
        };
        let result = retrieve(&mut inv, &req, &config).unwrap();
        assert_eq!(result.remaining_uses, Some(1));
        assert_eq!(inv.status("side"), Some(ItemStatus::Retrieved));
    }

    #[test]
    fn test_retrieve_errors() {
        let mut inv = column();
        let config = PlannerConfig::default();
        let missing = RetrieveRequest {
            item_id: "ghost".into(),
            user_id: None,
            timestamp: None,
        };
        assert_eq!(retrieve(&mut inv, &missing, &config).unwrap_err().kind(), ErrorKind::NotFound);
        let front = RetrieveRequest {
            item_id: "front".into(),
            ..missing
        };
        retrieve(&mut inv, &front, &config).unwrap();
        assert_eq!(
            retrieve(&mut inv, &front, &config).unwrap_err().kind(),
            ErrorKind::StateConflict
        );
    }
}
