//! # HRI Features
//!
//! Differentiable cost features for human-robot interaction planning. Each
//! feature maps a joint trajectory (states `x`, controls `u` of the planned
//! agent, states `xr`, controls `ur` of the other agent) to a scalar cost and
//! its exact gradient and Hessian w.r.t. the flattened control sequence, as
//! needed by Newton-type trajectory optimizers and inverse reinforcement
//! learning.
//!
//! ## Features
//!
//! - **Velocity / Acceleration**: control effort, defined directly on `u`.
//! - **GoalReward / GoalRewardLinear / TerminationReward**: attraction to
//!   per-agent goals, defined on states and lifted through the dynamics
//!   Jacobian.
//! - **CollisionHR**: inverse-distance barrier against the other agent,
//!   composed through a distance functional and the dynamics Jacobian.
//! - **CollisionGaussian**: smooth Gaussian proximity penalty against the
//!   other agent.
//!
//! ## Usage
//!
//! Propagate controls with a [`Dynamics`] model, wrap the resulting
//! [`Rollout`] in a [`FeatureInput`], and evaluate any [`Feature`] or a
//! weighted [`LinearCost`] of them. Costs can also be described in JSON via
//! [`CostConfig`]. With the `python` cargo feature the crate builds as a
//! Python extension module.

mod structs;
mod error;
mod dynamics;
mod distance;
mod lift;
mod feature;
mod kinetic;
mod goal;
mod collision;
mod cost;
mod config;

#[cfg(feature = "python")]
mod python;

pub use collision::{CollisionGaussian, CollisionHR};
pub use config::{matrix_from_rows, CostConfig, FeatureConfig, TermConfig};
pub use cost::LinearCost;
pub use distance::{closest_approach, DistanceField, DistanceFunction, EuclideanDistance};
pub use dynamics::{Dynamics, LinearDynamics, Rollout};
pub use error::{FeatureError, Result};
pub use feature::{Feature, StateFeature};
pub use goal::{GoalReward, GoalRewardLinear, TerminationReward};
pub use kinetic::{Acceleration, Velocity};
pub use lift::{lift_gradient, lift_hessian, BlockDiagonal};
pub use structs::{agent_count, flatten_rows, unflatten_rows, FeatureInput};
