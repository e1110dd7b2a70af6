//! Item lookup with location and the retrieval it would take.

use serde::{Deserialize, Serialize};

use crate::config::PlannerConfig;
use crate::error::Result;
use crate::geometry::BoundingBox;
use crate::inventory::Inventory;
use crate::model::{ContainerId, Item, ItemId, ItemRef, ItemStatus};
use crate::retrieval::{plan_retrieval, RetrievalStep};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundItem {
    pub item_id: ItemId,
    pub name: String,
    pub status: ItemStatus,
    pub container_id: Option<ContainerId>,
    pub zone: Option<String>,
    pub position: Option<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub found: bool,
    pub item: Option<FoundItem>,
    pub retrieval_steps: Vec<RetrievalStep>,
}

/// Find an item by id, or by case-insensitive name (first match wins).
///
/// An unknown item is not an error: the result simply has `found = false`.
pub fn search(
    inventory: &Inventory,
    item_ref: &ItemRef,
    config: &PlannerConfig,
) -> Result<SearchResult> {
    let item: Option<&Item> = match item_ref {
        ItemRef::ById(id) => inventory.item(id),
        ItemRef::ByName(name) => inventory.find_by_name(name),
    };
    let Some(item) = item else {
        return Ok(SearchResult {
            found: false,
            item: None,
            retrieval_steps: Vec::new(),
        });
    };

    let placement = inventory.placement(&item.id);
    let retrieval_steps = match placement {
        Some(_) => plan_retrieval(inventory, &item.id, config)?,
        None => Vec::new(),
    };
    let status = inventory.status(&item.id).unwrap_or(ItemStatus::Unplaced);
    Ok(SearchResult {
        found: true,
        item: Some(FoundItem {
            item_id: item.id.clone(),
            name: item.name.clone(),
            status,
            container_id: placement.map(|p| p.container_id.clone()),
            zone: placement
                .and_then(|p| inventory.container(&p.container_id))
                .map(|c| c.zone.clone()),
            position: placement.map(|p| p.position),
        }),
        retrieval_steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Coordinates, Dimensions};
    use crate::model::{Container, Placement};
    use chrono::NaiveDate;

    fn inventory() -> Inventory {
        let mut inv = Inventory::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        inv.add_container(Container {
            id: "contA".into(),
            zone: "Medical Bay".into(),
            dims: Dimensions::new(20.0, 20.0, 20.0),
        })
        .unwrap();
        for (id, name, depth) in [("1", "Bandage", 0.0), ("2", "Splint", 10.0)] {
            inv.add_item(Item {
                id: id.into(),
                name: name.into(),
                dims: Dimensions::new(10.0, 10.0, 10.0),
                mass: 0.5,
                priority: 70,
                preferred_zone: None,
                expiry: None,
                usage_limit: None,
                remaining_uses: None,
            })
            .unwrap();
            inv.stow(Placement {
                item_id: id.into(),
                container_id: "contA".into(),
                position: BoundingBox::at(
                    Coordinates::new(0.0, depth, 0.0),
                    Dimensions::new(10.0, 10.0, 10.0),
                ),
            });
        }
        inv
    }

    #[test]
    fn test_search_by_name_case_insensitive() {
        let inv = inventory();
        let by_name = ItemRef::ByName("splint".into());
        let result = search(&inv, &by_name, &PlannerConfig::default()).unwrap();
        assert!(result.found);
        let item = result.item.unwrap();
        assert_eq!(item.item_id, "2");
        assert_eq!(item.zone.as_deref(), Some("Medical Bay"));
        assert_eq!(result.retrieval_steps.len(), 3);
    }

    #[test]
    fn test_search_unknown_is_not_found_but_ok() {
        let inv = inventory();
        let result = search(&inv, &ItemRef::ById("99".into()), &PlannerConfig::default()).unwrap();
        assert!(!result.found);
        assert!(result.item.is_none());
    }

    #[test]
    fn test_search_does_not_mutate() {
        let inv = inventory();
        search(&inv, &ItemRef::ById("2".into()), &PlannerConfig::default()).unwrap();
        assert!(inv.is_stowed("1"));
        assert!(inv.is_stowed("2"));
        assert!(inv.log().is_empty());
    }
}
