//! Placement planner: first-fit packing with priority-driven rearrangement.
//!
//! Items are placed highest priority first. Each item tries a direct fit in
//! every ranked container; when nothing fits, the planner evicts stowed items
//! from a candidate container and relocates them through a work-list on a
//! scratch layout. A plan commits only once every relocation in it has a home.
//!
//! Evicted items leave their old box *reserved*: it stays an obstacle for
//! everyone except the item that caused the eviction. Emitting relocations
//! deepest eviction first therefore never asks an item to move into space
//! that is still occupied.

use std::collections::{HashSet, VecDeque};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::ActionKind;
use crate::catalog::{Catalog, ContainerSpec, ItemSpec};
use crate::config::PlannerConfig;
use crate::error::{ErrorKind, Result, StowageError};
use crate::geometry::BoundingBox;
use crate::inventory::Inventory;
use crate::layout::{find_space, Layout};
use crate::model::{parse_timestamp, Container, ContainerId, Item, ItemId, Placement, StepAction};

/// Items and containers to register and place in one batch.
pub type PlaceRequest = Catalog;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RearrangementStep {
    pub step: usize,
    pub action: StepAction,
    pub item_id: ItemId,
    pub from_container: ContainerId,
    pub from_position: BoundingBox,
    pub to_container: ContainerId,
    pub to_position: BoundingBox,
}

/// An item the planner could not place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementFailure {
    pub item_id: ItemId,
    pub kind: ErrorKind,
    pub reason: String,
}

/// Outcome of a placement batch.
///
/// `placements` holds each placed item at its final box. `rearrangements`
/// lists every relocation in execution order; a step runs right before the
/// placement that needed it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementResult {
    pub success: bool,
    pub placements: Vec<Placement>,
    pub rearrangements: Vec<RearrangementStep>,
    pub failures: Vec<PlacementFailure>,
}

/// Register the batch's catalogs and place every item it lists.
///
/// Malformed entries reject the whole batch before anything is registered.
/// Per-item problems (already stowed, returned, no space) land in
/// `failures`; everything else is committed.
pub fn place_items(
    inventory: &mut Inventory,
    request: &PlaceRequest,
    config: &PlannerConfig,
) -> Result<PlacementResult> {
    request.validate()?;
    let containers: Vec<Container> = request
        .containers
        .iter()
        .map(ContainerSpec::to_container)
        .collect();
    let conflicts: Vec<String> = containers
        .iter()
        .filter(|c| inventory.container(&c.id).is_some_and(|existing| existing != *c))
        .map(|c| format!("container {} already exists with different zone or dimensions", c.id))
        .collect();
    if !conflicts.is_empty() {
        return Err(StowageError::Validation(conflicts));
    }
    let items = request
        .items
        .iter()
        .map(ItemSpec::to_item)
        .collect::<Result<Vec<Item>>>()?;

    for container in containers {
        inventory.add_container(container)?;
    }

    let mut result = PlacementResult::default();
    let mut queue: Vec<ItemId> = Vec::with_capacity(items.len());
    for item in items {
        let id = item.id.clone();
        match inventory.add_item(item) {
            Ok(()) => queue.push(id),
            Err(e) => result.failures.push(failure(&id, &e)),
        }
    }
    // Stable sort: equal priorities keep request order.
    queue.sort_by_key(|id| {
        std::cmp::Reverse(inventory.item(id).map_or(i32::MIN, |i| i.priority))
    });

    for id in &queue {
        let Some(item) = inventory.item(id).cloned() else {
            continue;
        };
        if let Some(p) = inventory.placement(id) {
            let err = StowageError::StateConflict(format!(
                "item {id} is already stowed in container {}",
                p.container_id
            ));
            result.failures.push(failure(id, &err));
            continue;
        }
        match plan_item(inventory, &item, config) {
            Ok(plan) => commit(inventory, plan, &mut result),
            Err(e) => {
                warn!("Item {id} left unplaced: {e}");
                result.failures.push(failure(id, &e));
            }
        }
    }

    for placement in result.placements.iter_mut() {
        if let Some(current) = inventory.placement(&placement.item_id) {
            *placement = current.clone();
        }
    }
    result.success = result.failures.is_empty();
    info!(
        "Placement batch: {} placed, {} moved, {} failed",
        result.placements.len(),
        result.rearrangements.len(),
        result.failures.len()
    );
    Ok(result)
}

fn failure(item_id: &str, err: &StowageError) -> PlacementFailure {
    PlacementFailure {
        item_id: item_id.to_string(),
        kind: err.kind(),
        reason: err.to_string(),
    }
}

// ── Planning ────────────────────────────────────────────────────────────

/// A relocation of an already-stowed item.
#[derive(Debug, Clone)]
struct Relocation {
    item_id: ItemId,
    from_container: ContainerId,
    from_position: BoundingBox,
    to_container: ContainerId,
    to_position: BoundingBox,
}

/// Where one item goes plus the relocations, in execution order, that make room.
#[derive(Debug, Clone)]
struct ItemPlan {
    placement: Placement,
    relocations: Vec<Relocation>,
}

#[derive(Debug, Clone)]
struct Reservation {
    container_id: ContainerId,
    position: BoundingBox,
    evictor: ItemId,
}

#[derive(Debug, Clone)]
struct Evicted {
    item_id: ItemId,
    from_container: ContainerId,
    from_position: BoundingBox,
}

/// Containers ranked for an item: preferred zone first, then most free
/// volume, then registration order.
fn ranked_containers<'a>(
    inventory: &'a Inventory,
    layout: &Layout,
    item: &Item,
) -> Vec<&'a Container> {
    let mut ranked: Vec<(&Container, bool, f64, usize)> = inventory
        .containers()
        .enumerate()
        .map(|(rank, c)| {
            let zone_match = item.preferred_zone.as_deref() == Some(c.zone.as_str());
            (c, zone_match, c.volume() - layout.used_volume(&c.id), rank)
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then(b.2.total_cmp(&a.2))
            .then(a.3.cmp(&b.3))
    });
    ranked.into_iter().map(|(c, ..)| c).collect()
}

struct Planner<'a> {
    inventory: &'a Inventory,
    epsilon: f64,
    layout: Layout,
    /// Items that may no longer be evicted: the item being placed and
    /// everything already relocated.
    pinned: HashSet<ItemId>,
    reserved: Vec<Reservation>,
    homeless: VecDeque<Evicted>,
    evictions: usize,
    budget: usize,
}

impl<'a> Planner<'a> {
    fn new(inventory: &'a Inventory, config: &PlannerConfig, item: &Item) -> Self {
        Self {
            inventory,
            epsilon: config.epsilon,
            layout: Layout::snapshot(inventory),
            pinned: HashSet::from([item.id.clone()]),
            reserved: Vec::new(),
            homeless: VecDeque::new(),
            evictions: 0,
            budget: config.move_budget(inventory.stowed_count()),
        }
    }

    /// Boxes `mover` must avoid in a container.
    fn obstacles(&self, container_id: &str, mover: &str) -> Vec<BoundingBox> {
        let mut boxes = self.layout.occupied(container_id);
        boxes.extend(
            self.reserved
                .iter()
                .filter(|r| r.container_id == container_id && r.evictor != mover)
                .map(|r| r.position),
        );
        boxes
    }

    fn direct_fit(&self, item: &Item) -> Option<(ContainerId, BoundingBox)> {
        ranked_containers(self.inventory, &self.layout, item)
            .into_iter()
            .find_map(|c| {
                let occupied = self.obstacles(&c.id, &item.id);
                find_space(c, &occupied, item.dims, self.epsilon).map(|b| (c.id.clone(), b))
            })
    }

    /// Open a box for `item` by evicting the smallest lowest-priority prefix
    /// of a container's movable residents. Evictees join the work-list.
    fn evict_for(&mut self, item: &Item) -> Option<(ContainerId, BoundingBox)> {
        let inventory = self.inventory;
        for container in ranked_containers(inventory, &self.layout, item) {
            let residents: Vec<(ItemId, BoundingBox)> = self
                .layout
                .residents(&container.id)
                .map(|(id, b)| (id.to_string(), b))
                .collect();
            let mut movable: Vec<&(ItemId, BoundingBox)> = residents
                .iter()
                .filter(|(id, _)| !self.pinned.contains(id))
                .collect();
            movable.sort_by_key(|(id, _)| {
                (
                    inventory.item(id).map_or(i32::MIN, |i| i.priority),
                    inventory.item_rank(id),
                )
            });
            let reserved: Vec<BoundingBox> = self
                .reserved
                .iter()
                .filter(|r| r.container_id == container.id && r.evictor != item.id)
                .map(|r| r.position)
                .collect();

            for k in 1..=movable.len() {
                let removed: HashSet<&str> =
                    movable[..k].iter().map(|(id, _)| id.as_str()).collect();
                let mut occupied: Vec<BoundingBox> = residents
                    .iter()
                    .filter(|(id, _)| !removed.contains(id.as_str()))
                    .map(|(_, b)| *b)
                    .collect();
                occupied.extend(reserved.iter().copied());
                let Some(target) = find_space(container, &occupied, item.dims, self.epsilon) else {
                    continue;
                };
                let evictees: Vec<(ItemId, BoundingBox)> = movable[..k]
                    .iter()
                    .filter(|(_, b)| b.overlaps(&target, self.epsilon))
                    .map(|(id, b)| (id.clone(), *b))
                    .collect();
                if self.evictions + evictees.len() > self.budget {
                    continue;
                }
                debug!(
                    "Evicting {} item(s) from {} for item {}",
                    evictees.len(),
                    container.id,
                    item.id
                );
                for (id, position) in evictees {
                    self.layout.remove(&id);
                    self.pinned.insert(id.clone());
                    self.reserved.push(Reservation {
                        container_id: container.id.clone(),
                        position,
                        evictor: item.id.clone(),
                    });
                    self.homeless.push_back(Evicted {
                        item_id: id,
                        from_container: container.id.clone(),
                        from_position: position,
                    });
                    self.evictions += 1;
                }
                return Some((container.id.clone(), target));
            }
        }
        None
    }

    /// Find a new home for an evicted item, evicting further if needed.
    fn settle(&mut self, evicted: Evicted) -> Result<Relocation> {
        let item = self.inventory.require_item(&evicted.item_id)?.clone();
        let (to_container, to_position) = match self.direct_fit(&item) {
            Some(dest) => dest,
            None => self.evict_for(&item).ok_or_else(|| {
                StowageError::Infeasible(format!("no room to relocate item {}", item.id))
            })?,
        };
        self.layout.insert(&item.id, &to_container, to_position);
        Ok(Relocation {
            item_id: evicted.item_id,
            from_container: evicted.from_container,
            from_position: evicted.from_position,
            to_container,
            to_position,
        })
    }
}

/// Plan one unstowed item against the current inventory without mutating it.
fn plan_item(inventory: &Inventory, item: &Item, config: &PlannerConfig) -> Result<ItemPlan> {
    if inventory.containers().next().is_none() {
        return Err(StowageError::Infeasible("no containers registered".to_string()));
    }
    if !inventory
        .containers()
        .any(|c| find_space(c, &[], item.dims, config.epsilon).is_some())
    {
        return Err(StowageError::Infeasible(format!(
            "item {} does not fit in any container in any orientation",
            item.id
        )));
    }

    let mut planner = Planner::new(inventory, config, item);
    let placement = |(container_id, position): (ContainerId, BoundingBox)| Placement {
        item_id: item.id.clone(),
        container_id,
        position,
    };
    if let Some(dest) = planner.direct_fit(item) {
        return Ok(ItemPlan {
            placement: placement(dest),
            relocations: Vec::new(),
        });
    }

    let (container_id, position) = planner.evict_for(item).ok_or_else(|| {
        StowageError::Infeasible(format!(
            "no space for item {} even after rearrangement",
            item.id
        ))
    })?;
    planner.layout.insert(&item.id, &container_id, position);

    let mut settled = Vec::new();
    while let Some(evicted) = planner.homeless.pop_front() {
        let relocation = planner.settle(evicted).map_err(|e| {
            StowageError::Infeasible(format!("cannot make room for item {}: {e}", item.id))
        })?;
        settled.push(relocation);
    }
    settled.reverse();
    Ok(ItemPlan {
        placement: placement((container_id, position)),
        relocations: settled,
    })
}

fn commit(inventory: &mut Inventory, plan: ItemPlan, result: &mut PlacementResult) {
    let now = inventory.now();
    for r in plan.relocations {
        inventory.unstow(&r.item_id);
        inventory.stow(Placement {
            item_id: r.item_id.clone(),
            container_id: r.to_container.clone(),
            position: r.to_position,
        });
        inventory.log_mut().record(
            now,
            None,
            ActionKind::Rearrangement,
            Some(r.item_id.as_str()),
            json!({
                "from_container": r.from_container,
                "to_container": r.to_container,
                "for_item": plan.placement.item_id,
            }),
        );
        result.rearrangements.push(RearrangementStep {
            step: result.rearrangements.len() + 1,
            action: StepAction::Move,
            item_id: r.item_id,
            from_container: r.from_container,
            from_position: r.from_position,
            to_container: r.to_container,
            to_position: r.to_position,
        });
    }
    inventory.log_mut().record(
        now,
        None,
        ActionKind::Placement,
        Some(plan.placement.item_id.as_str()),
        json!({ "container": plan.placement.container_id }),
    );
    inventory.stow(plan.placement.clone());
    result.placements.push(plan.placement);
}

// ── Manual place ────────────────────────────────────────────────────────

/// Put an item at an explicit box, typically after a retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualPlaceRequest {
    pub item_id: ItemId,
    pub container_id: ContainerId,
    pub position: BoundingBox,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

pub fn place_item(
    inventory: &mut Inventory,
    request: &ManualPlaceRequest,
    config: &PlannerConfig,
) -> Result<Placement> {
    let timestamp = match request.timestamp.as_deref() {
        Some(raw) => parse_timestamp(raw)?,
        None => inventory.now(),
    };
    if inventory.returned_items().any(|i| i.id == request.item_id) {
        return Err(StowageError::StateConflict(format!(
            "item {} was already returned",
            request.item_id
        )));
    }
    let item = inventory.require_item(&request.item_id)?;
    let container = inventory.require_container(&request.container_id)?;
    if let Some(p) = inventory.placement(&item.id) {
        return Err(StowageError::StateConflict(format!(
            "item {} is already stowed in container {}",
            item.id, p.container_id
        )));
    }
    let eps = config.epsilon;
    if !item.dims.is_orientation_of(&request.position.dims(), eps) {
        return Err(StowageError::Infeasible(format!(
            "box does not match any orientation of item {}",
            item.id
        )));
    }
    if !container.interior().contains(&request.position, eps) {
        return Err(StowageError::Infeasible(format!(
            "box lies outside container {}",
            container.id
        )));
    }
    if let Some(other) = inventory
        .placements_in(&container.id)
        .find(|p| p.position.overlaps(&request.position, eps))
    {
        return Err(StowageError::Infeasible(format!(
            "box overlaps item {} in container {}",
            other.item_id, container.id
        )));
    }

    let placement = Placement {
        item_id: item.id.clone(),
        container_id: container.id.clone(),
        position: request.position,
    };
    inventory.stow(placement.clone());
    inventory.log_mut().record(
        timestamp,
        request.user_id.as_deref(),
        ActionKind::Place,
        Some(placement.item_id.as_str()),
        json!({ "container": placement.container_id }),
    );
    info!("Placed item {} in {}", placement.item_id, placement.container_id);
    Ok(placement)
}
