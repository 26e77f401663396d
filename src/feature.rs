//! # Feature Contract
//!
//! A feature is a scalar cost over a joint trajectory together with its exact
//! gradient and Hessian w.r.t. the flattened control sequence `u`. Every call
//! recomputes from its input, so `gradient` and `hessian` never depend on a
//! prior `value` call.

use nalgebra::{DMatrix, DVector};

use crate::error::Result;
use crate::lift::BlockDiagonal;
use crate::structs::FeatureInput;

pub trait Feature {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    fn value(&self, input: &FeatureInput) -> Result<f64>;

    /// Gradient w.r.t. the row-major flattened `u`.
    fn gradient(&self, input: &FeatureInput) -> Result<DVector<f64>>;

    /// Hessian w.r.t. the row-major flattened `u`.
    fn hessian(&self, input: &FeatureInput) -> Result<DMatrix<f64>>;
}

/// A feature defined on states; its control-space derivatives are these
/// state derivatives lifted through the dynamics Jacobian.
pub trait StateFeature: Feature {
    /// Gradient w.r.t. the state vector the feature reads, flattened row-major.
    fn grad_x(&self, input: &FeatureInput) -> Result<DVector<f64>>;

    /// Block-diagonal Hessian w.r.t. the same state vector.
    fn hessian_x(&self, input: &FeatureInput) -> Result<BlockDiagonal>;
}
