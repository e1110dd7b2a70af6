//! Scratch copy of the item→box mapping.
//!
//! Planners work against a `Layout` snapshot so a plan can be built,
//! inspected and thrown away without touching the inventory.

use indexmap::IndexMap;

use crate::geometry::{anchor_points, first_fit, BoundingBox, Dimensions};
use crate::inventory::Inventory;
use crate::model::{Container, ContainerId, ItemId};

#[derive(Debug, Clone, Default)]
pub struct Layout {
    boxes: IndexMap<ItemId, (ContainerId, BoundingBox)>,
}

impl Layout {
    /// Copy of every committed placement, in stowing order.
    pub fn snapshot(inventory: &Inventory) -> Self {
        let boxes = inventory
            .placements()
            .map(|p| (p.item_id.clone(), (p.container_id.clone(), p.position)))
            .collect();
        Self { boxes }
    }

    pub fn get(&self, item_id: &str) -> Option<(&str, BoundingBox)> {
        self.boxes
            .get(item_id)
            .map(|(container_id, b)| (container_id.as_str(), *b))
    }

    /// Items in a container with their boxes, in stowing order.
    pub fn residents<'a>(
        &'a self,
        container_id: &'a str,
    ) -> impl Iterator<Item = (&'a str, BoundingBox)> + 'a {
        self.boxes
            .iter()
            .filter(move |(_, (c, _))| c == container_id)
            .map(|(id, (_, b))| (id.as_str(), *b))
    }

    pub fn occupied(&self, container_id: &str) -> Vec<BoundingBox> {
        self.residents(container_id).map(|(_, b)| b).collect()
    }

    pub fn used_volume(&self, container_id: &str) -> f64 {
        self.residents(container_id).map(|(_, b)| b.volume()).sum()
    }

    pub fn insert(&mut self, item_id: &str, container_id: &str, position: BoundingBox) {
        self.boxes.insert(
            item_id.to_string(),
            (container_id.to_string(), position),
        );
    }

    pub fn remove(&mut self, item_id: &str) -> Option<(ContainerId, BoundingBox)> {
        self.boxes.shift_remove(item_id)
    }
}

/// First box for `dims` inside `container` that avoids every `occupied` box.
///
/// Anchors are tried nearest to the opening first and, at each anchor, every
/// distinct orientation of the footprint.
pub fn find_space(
    container: &Container,
    occupied: &[BoundingBox],
    dims: Dimensions,
    epsilon: f64,
) -> Option<BoundingBox> {
    let anchors = anchor_points(occupied, epsilon);
    let orientations = dims.distinct_orientations(epsilon);
    first_fit(
        &container.interior(),
        occupied,
        &anchors,
        &orientations,
        epsilon,
    )
}
