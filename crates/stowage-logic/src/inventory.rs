//! The shared inventory store.
//!
//! One `Inventory` holds every container, item, placement, pending return
//! manifest and the simulated clock. Planners borrow it, compute against
//! the current state and commit through the crate-private mutators here, so
//! the item→box mapping has exactly one owner.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;

use crate::audit::ActionLog;
use crate::error::{Result, StowageError};
use crate::geometry::BoundingBox;
use crate::model::{Container, ContainerId, Item, ItemId, ItemRef, ItemStatus, Placement};
use crate::waste::ReturnManifest;

#[derive(Debug, Clone)]
pub struct Inventory {
    containers: IndexMap<ContainerId, Container>,
    items: IndexMap<ItemId, Item>,
    placements: IndexMap<ItemId, Placement>,
    retrieved: HashSet<ItemId>,
    returned: IndexMap<ItemId, Item>,
    manifests: HashMap<ContainerId, ReturnManifest>,
    clock: NaiveDate,
    log: ActionLog,
}

impl Inventory {
    /// Create an empty inventory with the clock set to `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            containers: IndexMap::new(),
            items: IndexMap::new(),
            placements: IndexMap::new(),
            retrieved: HashSet::new(),
            returned: IndexMap::new(),
            manifests: HashMap::new(),
            clock: today,
            log: ActionLog::new(),
        }
    }

    // ── Clock ───────────────────────────────────────────────────────────

    pub fn clock(&self) -> NaiveDate {
        self.clock
    }

    /// Midnight of the simulated date; the default timestamp for log entries.
    pub fn now(&self) -> NaiveDateTime {
        self.clock.and_time(NaiveTime::MIN)
    }

    pub(crate) fn set_clock(&mut self, date: NaiveDate) {
        debug_assert!(date >= self.clock, "clock must not run backwards");
        self.clock = date;
    }

    // ── Catalog ─────────────────────────────────────────────────────────

    /// Register a container. Re-registering an identical container is a
    /// no-op; changing an existing one is rejected.
    pub fn add_container(&mut self, container: Container) -> Result<()> {
        if let Some(existing) = self.containers.get(&container.id) {
            if *existing != container {
                return Err(StowageError::validation(format!(
                    "container {} already exists with different zone or dimensions",
                    container.id
                )));
            }
            return Ok(());
        }
        self.containers.insert(container.id.clone(), container);
        Ok(())
    }

    /// Register an item. A known id keeps its stored record and counters.
    pub fn add_item(&mut self, item: Item) -> Result<()> {
        if self.returned.contains_key(&item.id) {
            return Err(StowageError::StateConflict(format!(
                "item {} was already returned",
                item.id
            )));
        }
        self.items.entry(item.id.clone()).or_insert(item);
        Ok(())
    }

    pub fn container(&self, id: &str) -> Option<&Container> {
        self.containers.get(id)
    }

    pub fn require_container(&self, id: &str) -> Result<&Container> {
        self.containers
            .get(id)
            .ok_or_else(|| StowageError::ContainerNotFound(id.to_string()))
    }

    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.containers.values()
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn require_item(&self, id: &str) -> Result<&Item> {
        self.items
            .get(id)
            .ok_or_else(|| StowageError::ItemNotFound(id.to_string()))
    }

    pub(crate) fn item_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.items.get_mut(id)
    }

    /// Live items (not yet returned) in insertion order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Position of an item in insertion order, used to break priority ties.
    pub fn item_rank(&self, id: &str) -> usize {
        self.items.get_index_of(id).unwrap_or(usize::MAX)
    }

    pub fn returned_items(&self) -> impl Iterator<Item = &Item> {
        self.returned.values()
    }

    /// Look an item up by id or by exact name.
    ///
    /// A name shared by several live items is ambiguous.
    pub fn resolve(&self, item_ref: &ItemRef) -> Result<&Item> {
        match item_ref {
            ItemRef::ById(id) => self.require_item(id),
            ItemRef::ByName(name) => {
                let mut matches = self.items.values().filter(|i| i.name == *name);
                let first = matches
                    .next()
                    .ok_or_else(|| StowageError::ItemNotFound(format!("name '{name}'")))?;
                if matches.next().is_some() {
                    return Err(StowageError::AmbiguousIdentifier(format!(
                        "name '{name}' matches more than one item"
                    )));
                }
                Ok(first)
            }
        }
    }

    /// First live item whose name matches case-insensitively.
    pub fn find_by_name(&self, name: &str) -> Option<&Item> {
        let wanted = name.trim().to_lowercase();
        self.items
            .values()
            .find(|i| i.name.to_lowercase() == wanted)
    }

    // ── Status ──────────────────────────────────────────────────────────

    pub fn status(&self, id: &str) -> Option<ItemStatus> {
        if self.returned.contains_key(id) {
            return Some(ItemStatus::Returned);
        }
        let item = self.items.get(id)?;
        let status = if item.waste_reason(self.clock).is_some() {
            ItemStatus::Waste
        } else if self.placements.contains_key(id) {
            ItemStatus::Stowed
        } else if self.retrieved.contains(id) {
            ItemStatus::Retrieved
        } else {
            ItemStatus::Unplaced
        };
        Some(status)
    }

    pub fn is_stowed(&self, id: &str) -> bool {
        self.placements.contains_key(id)
    }

    pub fn is_retrieved(&self, id: &str) -> bool {
        self.retrieved.contains(id)
    }

    // ── Placements ──────────────────────────────────────────────────────

    pub fn placement(&self, item_id: &str) -> Option<&Placement> {
        self.placements.get(item_id)
    }

    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.placements.values()
    }

    pub fn placements_in<'a>(
        &'a self,
        container_id: &'a str,
    ) -> impl Iterator<Item = &'a Placement> + 'a {
        self.placements
            .values()
            .filter(move |p| p.container_id == container_id)
    }

    pub fn stowed_count(&self) -> usize {
        self.placements.len()
    }

    /// Boxes currently occupied in a container.
    pub fn occupied_boxes(&self, container_id: &str) -> Vec<BoundingBox> {
        self.placements_in(container_id).map(|p| p.position).collect()
    }

    pub(crate) fn stow(&mut self, placement: Placement) {
        self.retrieved.remove(&placement.item_id);
        self.placements.insert(placement.item_id.clone(), placement);
    }

    pub(crate) fn unstow(&mut self, item_id: &str) -> Option<Placement> {
        self.placements.shift_remove(item_id)
    }

    /// Take an item out of storage and mark it retrieved.
    pub(crate) fn take_out(&mut self, item_id: &str) -> Option<Placement> {
        let placement = self.unstow(item_id)?;
        self.retrieved.insert(item_id.to_string());
        Some(placement)
    }

    /// Remove an item from the live inventory for good.
    pub(crate) fn dispose(&mut self, item_id: &str) -> Option<Item> {
        let item = self.items.shift_remove(item_id)?;
        self.placements.shift_remove(item_id);
        self.retrieved.remove(item_id);
        self.returned.insert(item.id.clone(), item.clone());
        Some(item)
    }

    // ── Return manifests ────────────────────────────────────────────────

    pub fn manifest(&self, container_id: &str) -> Option<&ReturnManifest> {
        self.manifests.get(container_id)
    }

    pub(crate) fn set_manifest(&mut self, manifest: ReturnManifest) {
        self.manifests
            .insert(manifest.undocking_container_id.clone(), manifest);
    }

    pub(crate) fn take_manifest(&mut self, container_id: &str) -> Option<ReturnManifest> {
        self.manifests.remove(container_id)
    }

    // ── Log ─────────────────────────────────────────────────────────────

    pub fn log(&self) -> &ActionLog {
        &self.log
    }

    pub(crate) fn log_mut(&mut self) -> &mut ActionLog {
        &mut self.log
    }

    // ── Invariants ──────────────────────────────────────────────────────

    /// Check every placement against its container and its neighbours.
    ///
    /// Returns a description of each violation; empty when the layout is sound.
    pub fn layout_violations(&self, epsilon: f64) -> Vec<String> {
        let mut problems = Vec::new();
        let mut by_container: HashMap<&str, Vec<&Placement>> = HashMap::new();
        for p in self.placements.values() {
            match self.containers.get(&p.container_id) {
                None => problems.push(format!(
                    "item {} placed in unknown container {}",
                    p.item_id, p.container_id
                )),
                Some(c) if !c.interior().contains(&p.position, epsilon) => problems.push(
                    format!("item {} extends outside container {}", p.item_id, c.id),
                ),
                Some(_) => {}
            }
            by_container
                .entry(p.container_id.as_str())
                .or_default()
                .push(p);
        }
        for (container_id, placed) in by_container {
            for i in 0..placed.len() {
                for j in (i + 1)..placed.len() {
                    if placed[i].position.overlaps(&placed[j].position, epsilon) {
                        problems.push(format!(
                            "items {} and {} overlap in container {}",
                            placed[i].item_id, placed[j].item_id, container_id
                        ));
                    }
                }
            }
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Coordinates, Dimensions, EPSILON};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn container(id: &str) -> Container {
        Container {
            id: id.into(),
            zone: "Lab".into(),
            dims: Dimensions::new(100.0, 100.0, 100.0),
        }
    }

    fn item(id: &str, name: &str) -> Item {
        Item {
            id: id.into(),
            name: name.into(),
            dims: Dimensions::new(10.0, 10.0, 10.0),
            mass: 1.0,
            priority: 50,
            preferred_zone: None,
            expiry: None,
            usage_limit: Some(2),
            remaining_uses: Some(2),
        }
    }

    fn at(item_id: &str, x: f64) -> Placement {
        Placement {
            item_id: item_id.into(),
            container_id: "contA".into(),
            position: BoundingBox::at(
                Coordinates::new(x, 0.0, 0.0),
                Dimensions::new(10.0, 10.0, 10.0),
            ),
        }
    }

    #[test]
    fn test_container_is_immutable() {
        let mut inv = Inventory::new(today());
        inv.add_container(container("contA")).unwrap();
        inv.add_container(container("contA")).unwrap();
        let mut changed = container("contA");
        changed.zone = "Storage".into();
        assert!(inv.add_container(changed).is_err());
    }

    #[test]
    fn test_status_lifecycle() {
        let mut inv = Inventory::new(today());
        inv.add_container(container("contA")).unwrap();
        inv.add_item(item("1", "Wrench")).unwrap();
        assert_eq!(inv.status("1"), Some(ItemStatus::Unplaced));
        inv.stow(at("1", 0.0));
        assert_eq!(inv.status("1"), Some(ItemStatus::Stowed));
        inv.take_out("1");
        assert_eq!(inv.status("1"), Some(ItemStatus::Retrieved));
        inv.item_mut("1").unwrap().remaining_uses = Some(0);
        assert_eq!(inv.status("1"), Some(ItemStatus::Waste));
        inv.dispose("1");
        assert_eq!(inv.status("1"), Some(ItemStatus::Returned));
        assert!(inv.item("1").is_none());
        assert_eq!(inv.status("2"), None);
    }

    #[test]
    fn test_resolve_by_name_rejects_duplicates() {
        let mut inv = Inventory::new(today());
        inv.add_item(item("1", "Wrench")).unwrap();
        inv.add_item(item("2", "Wrench")).unwrap();
        inv.add_item(item("3", "Drill")).unwrap();
        let err = inv.resolve(&ItemRef::ByName("Wrench".into())).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::AmbiguousIdentifier);
        assert_eq!(inv.resolve(&ItemRef::ByName("Drill".into())).unwrap().id, "3");
        let missing = inv.resolve(&ItemRef::ById("9".into())).unwrap_err();
        assert_eq!(missing.kind(), crate::error::ErrorKind::NotFound);
    }

    #[test]
    fn test_layout_violations_detect_overlap() {
        let mut inv = Inventory::new(today());
        inv.add_container(container("contA")).unwrap();
        inv.stow(at("1", 0.0));
        inv.stow(at("2", 10.0));
        assert!(inv.layout_violations(EPSILON).is_empty());
        inv.stow(at("3", 5.0));
        assert_eq!(inv.layout_violations(EPSILON).len(), 2);
    }
}
