//! Cost configuration.
//!
//! A planner cost is described in JSON as a list of weighted terms:
//!
//! ```json
//! {
//!   "dt": 0.5,
//!   "terms": [
//!     { "weight": 1.0, "feature": { "type": "Velocity" } },
//!     { "weight": 0.2, "feature": { "type": "Acceleration", "u0": [0.0, 0.0] } },
//!     { "weight": -5.0, "feature": { "type": "GoalReward", "goals": [[3.0, 4.0]], "radius": 2.0 } },
//!     { "weight": 0.8, "feature": { "type": "CollisionHR", "position_dims": 2 } }
//!   ]
//! }
//! ```

use std::path::Path;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collision::{CollisionGaussian, CollisionHR};
use crate::cost::LinearCost;
use crate::distance::EuclideanDistance;
use crate::error::{FeatureError, Result};
use crate::feature::Feature;
use crate::goal::{GoalReward, GoalRewardLinear, TerminationReward};
use crate::kinetic::{Acceleration, Velocity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostConfig {
    /// Control timestep (seconds), used by the acceleration term.
    pub dt: f64,
    pub terms: Vec<TermConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermConfig {
    pub weight: f64,
    pub feature: FeatureConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeatureConfig {
    Velocity,
    Acceleration {
        u0: Vec<f64>,
    },
    GoalReward {
        goals: Vec<Vec<f64>>,
        radius: f64,
    },
    GoalRewardLinear {
        goals: Vec<Vec<f64>>,
    },
    TerminationReward {
        goals: Vec<Vec<f64>>,
    },
    CollisionHR {
        /// Compare only this many leading state coordinates; whole states if absent.
        #[serde(default)]
        position_dims: Option<usize>,
    },
    CollisionGaussian {
        radius: f64,
        #[serde(default)]
        position_dims: Option<usize>,
    },
}

impl FeatureConfig {
    pub fn build(&self, dt: f64) -> Result<Box<dyn Feature>> {
        let feature: Box<dyn Feature> = match self {
            FeatureConfig::Velocity => Box::new(Velocity),
            FeatureConfig::Acceleration { u0 } => {
                Box::new(Acceleration::new(DVector::from_vec(u0.clone()), dt)?)
            }
            FeatureConfig::GoalReward { goals, radius } => {
                Box::new(GoalReward::new(matrix_from_rows(goals)?, *radius)?)
            }
            FeatureConfig::GoalRewardLinear { goals } => {
                Box::new(GoalRewardLinear::new(matrix_from_rows(goals)?)?)
            }
            FeatureConfig::TerminationReward { goals } => {
                Box::new(TerminationReward::new(matrix_from_rows(goals)?)?)
            }
            FeatureConfig::CollisionHR { position_dims } => {
                let distance = match position_dims {
                    Some(dims) => EuclideanDistance::positional(*dims),
                    None => EuclideanDistance::full(),
                };
                Box::new(CollisionHR::new(distance))
            }
            FeatureConfig::CollisionGaussian { radius, position_dims } => Box::new(match position_dims {
                Some(dims) => CollisionGaussian::positional(*radius, *dims)?,
                None => CollisionGaussian::new(*radius)?,
            }),
        };
        Ok(feature)
    }
}

impl CostConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn build(&self) -> Result<LinearCost> {
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(FeatureError::InvalidConfig(format!("dt must be positive, got {}", self.dt)));
        }

        let mut cost = LinearCost::new();
        for (index, term) in self.terms.iter().enumerate() {
            if !term.weight.is_finite() {
                return Err(FeatureError::InvalidConfig(format!(
                    "term {index} has non-finite weight {}",
                    term.weight
                )));
            }
            cost.add_feature(term.weight, term.feature.build(self.dt)?);
        }

        debug!(terms = cost.len(), dt = self.dt, "built linear cost from config");
        Ok(cost)
    }
}

/// Builds a matrix from equally long rows.
pub fn matrix_from_rows(rows: &[Vec<f64>]) -> Result<DMatrix<f64>> {
    let ncols = rows.first().map_or(0, Vec::len);
    if rows.is_empty() || ncols == 0 {
        return Err(FeatureError::InvalidConfig("matrix must have at least one non-empty row".to_string()));
    }
    if let Some(bad) = rows.iter().position(|r| r.len() != ncols) {
        return Err(FeatureError::InvalidConfig(format!(
            "row {bad} has {} entries, expected {ncols}",
            rows[bad].len()
        )));
    }
    Ok(DMatrix::from_fn(rows.len(), ncols, |r, c| rows[r][c]))
}
