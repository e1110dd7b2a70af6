//! Thread-safe engine handle.
//!
//! `StowageEngine` owns the inventory behind a mutex. Every operation takes
//! the lock for its whole read-compute-commit cycle, so callers on any
//! thread see operations as if they ran one after another. Results come
//! back in a serializable [`Reply`] envelope.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;

use crate::audit::{LogEntry, LogFilter};
use crate::catalog::{arrangement_csv, export_arrangement, ArrangementRow};
use crate::config::PlannerConfig;
use crate::error::{ErrorKind, Result};
use crate::inventory::Inventory;
use crate::model::{ItemRef, Placement};
use crate::placement::{place_item, place_items, ManualPlaceRequest, PlaceRequest, PlacementResult};
use crate::retrieval::{retrieve, RetrievalResult, RetrieveRequest};
use crate::search::{search, SearchResult};
use crate::simulation::{simulate, SimulateRequest, SimulationResult};
use crate::waste::{
    complete_undocking, identify_waste, plan_return, ReturnPlan, ReturnPlanRequest,
    UndockingRequest, UndockingResult, WasteItem,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Uniform response: a success flag, an error on failure and the payload
/// fields inlined next to them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReplyError>,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T> From<Result<T>> for Reply<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Reply {
                success: true,
                error: None,
                data: Some(data),
            },
            Err(e) => Reply {
                success: false,
                error: Some(ReplyError {
                    kind: e.kind(),
                    message: e.to_string(),
                }),
                data: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WasteList {
    pub waste_items: Vec<WasteItem>,
}

pub struct StowageEngine {
    inventory: Mutex<Inventory>,
    config: PlannerConfig,
}

impl StowageEngine {
    /// Create an engine with an empty inventory. The clock starts at the
    /// configured date, or today's UTC date.
    pub fn new(config: PlannerConfig) -> Result<Self> {
        config.validate()?;
        let today = config.start_date.unwrap_or_else(|| Utc::now().date_naive());
        Ok(Self {
            inventory: Mutex::new(Inventory::new(today)),
            config,
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inventory> {
        // Poison is ignored: a panic mid-commit can leave a partial write,
        // which `layout_violations` will report.
        self.inventory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a read-only closure against the current inventory.
    pub fn with_inventory<R>(&self, f: impl FnOnce(&Inventory) -> R) -> R {
        f(&self.lock())
    }

    pub fn place(&self, request: &PlaceRequest) -> Reply<PlacementResult> {
        let mut reply = Reply::from(place_items(&mut self.lock(), request, &self.config));
        if let Some(result) = &reply.data {
            reply.success = result.success;
        }
        reply
    }

    pub fn place_item(&self, request: &ManualPlaceRequest) -> Reply<Placement> {
        place_item(&mut self.lock(), request, &self.config).into()
    }

    pub fn search(&self, item_id: Option<&str>, name: Option<&str>) -> Reply<SearchResult> {
        let result = ItemRef::from_parts(item_id, name)
            .and_then(|item_ref| search(&self.lock(), &item_ref, &self.config));
        result.into()
    }

    pub fn retrieve(&self, request: &RetrieveRequest) -> Reply<RetrievalResult> {
        retrieve(&mut self.lock(), request, &self.config).into()
    }

    pub fn waste(&self) -> Reply<WasteList> {
        let waste_items = identify_waste(&self.lock());
        let result: Result<WasteList> = Ok(WasteList { waste_items });
        result.into()
    }

    pub fn return_plan(&self, request: &ReturnPlanRequest) -> Reply<ReturnPlan> {
        plan_return(&mut self.lock(), request, &self.config).into()
    }

    pub fn complete_undocking(&self, request: &UndockingRequest) -> Reply<UndockingResult> {
        complete_undocking(&mut self.lock(), request).into()
    }

    pub fn simulate(&self, request: &SimulateRequest) -> Reply<SimulationResult> {
        simulate(&mut self.lock(), request).into()
    }

    pub fn logs(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.lock().log().query(filter).into_iter().cloned().collect()
    }

    pub fn arrangement(&self) -> Vec<ArrangementRow> {
        export_arrangement(&self.lock())
    }

    pub fn arrangement_csv(&self) -> String {
        arrangement_csv(&self.lock())
    }

    /// Descriptions of any broken layout invariant; empty when sound.
    pub fn layout_violations(&self) -> Vec<String> {
        self.lock().layout_violations(self.config.epsilon)
    }
}
