//! Planner configuration.
//!
//! Tunables shared by every planning operation. Defaults match the
//! behaviour described in the crate docs; a JSON document may override any
//! subset of fields.
//!
//! ```
//! use stowage_logic::config::PlannerConfig;
//!
//! let config = PlannerConfig::from_json(r#"{ "max_rearrangement_moves": 4 }"#).unwrap();
//! assert_eq!(config.max_rearrangement_moves, Some(4));
//! assert!(config.retrieval_consumes_use);
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StowageError};
use crate::geometry::EPSILON;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Tolerance for every boundary comparison.
    pub epsilon: f64,
    /// Upper bound on relocations in one rearrangement plan.
    /// `None` means the number of currently stowed items.
    pub max_rearrangement_moves: Option<usize>,
    /// Whether committing a retrieval uses up one of the item's uses.
    pub retrieval_consumes_use: bool,
    /// Initial simulated date. `None` starts the clock at today's UTC date.
    pub start_date: Option<NaiveDate>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            epsilon: EPSILON,
            max_rearrangement_moves: None,
            retrieval_consumes_use: true,
            start_date: None,
        }
    }
}

impl PlannerConfig {
    /// Parse a configuration document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PlannerConfig = serde_json::from_str(json)
            .map_err(|e| StowageError::validation(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(StowageError::validation(format!(
                "epsilon must be a non-negative number, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }

    /// Move cap for a plan over an inventory with `stowed` placed items.
    pub fn move_budget(&self, stowed: usize) -> usize {
        self.max_rearrangement_moves.unwrap_or(stowed)
    }
}
