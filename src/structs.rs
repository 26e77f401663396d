//! # Core Data Structures
//!
//! This module defines the data shared by every feature:
//!
//! - **FeatureInput**: the joint trajectory `(x, u, xr, ur)` a feature is
//!   evaluated on, plus the dynamics Jacobian `dx/du` when one is available
//! - **flatten_rows / unflatten_rows**: row-major conversion between `T × w`
//!   trajectory matrices and the flat vectors gradients live in
//!
//! Trajectories are `T × w` matrices; row `t` holds the states (or controls)
//! of every agent at timestep `t`, concatenated agent by agent.

use nalgebra::{DMatrix, DVector};

use crate::dynamics::Rollout;
use crate::error::{FeatureError, Result};

/// Joint robot/human trajectory a feature is evaluated on.
///
/// `x`/`u` belong to the differentiated agent(s), `xr`/`ur` to the reference
/// agent. All four must share the same horizon.
#[derive(Debug, Clone, Copy)]
pub struct FeatureInput<'a> {
    pub x: &'a DMatrix<f64>,
    pub u: &'a DMatrix<f64>,
    pub xr: &'a DMatrix<f64>,
    pub ur: &'a DMatrix<f64>,
    /// `(T·nA·nX) × (T·nA·nU)` Jacobian of the flattened `x` w.r.t. the flattened `u`.
    pub jacobian: Option<&'a DMatrix<f64>>,
}

impl<'a> FeatureInput<'a> {
    pub fn new(
        x: &'a DMatrix<f64>,
        u: &'a DMatrix<f64>,
        xr: &'a DMatrix<f64>,
        ur: &'a DMatrix<f64>,
    ) -> Self {
        FeatureInput {
            x,
            u,
            xr,
            ur,
            jacobian: None,
        }
    }

    /// Uses the states and Jacobian of a propagated rollout.
    pub fn from_rollout(
        rollout: &'a Rollout,
        u: &'a DMatrix<f64>,
        xr: &'a DMatrix<f64>,
        ur: &'a DMatrix<f64>,
    ) -> Self {
        FeatureInput {
            x: rollout.trajectory(),
            u,
            xr,
            ur,
            jacobian: Some(rollout.jacobian()),
        }
    }

    pub fn with_jacobian(mut self, jacobian: &'a DMatrix<f64>) -> Self {
        self.jacobian = Some(jacobian);
        self
    }

    pub fn horizon(&self) -> usize {
        self.x.nrows()
    }

    /// Checks that all trajectories share one non-empty horizon and that the
    /// Jacobian, if present, maps the flattened `u` onto the flattened `x`.
    pub fn validate(&self) -> Result<()> {
        let horizon = self.horizon();
        if horizon == 0 {
            return Err(FeatureError::shape("horizon of x (must be non-zero)", 1, 0));
        }

        for (name, m) in [("u", self.u), ("xr", self.xr), ("ur", self.ur)] {
            if m.nrows() != horizon {
                return Err(FeatureError::shape(
                    format!("horizon of {name}"),
                    horizon,
                    m.nrows(),
                ));
            }
        }

        if let Some(jacobian) = self.jacobian {
            if jacobian.nrows() != self.x.len() {
                return Err(FeatureError::shape("jacobian rows", self.x.len(), jacobian.nrows()));
            }
            if jacobian.ncols() != self.u.len() {
                return Err(FeatureError::shape("jacobian columns", self.u.len(), jacobian.ncols()));
            }
        }

        Ok(())
    }

    /// The Jacobian, or `MissingJacobian` naming the feature that needed it.
    pub fn jacobian_for(&self, feature: &'static str) -> Result<&'a DMatrix<f64>> {
        self.jacobian.ok_or(FeatureError::MissingJacobian { feature })
    }
}

/// Flattens a `T × w` matrix row by row, so element `(t, i)` lands at `t·w + i`.
pub fn flatten_rows(m: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(m.len(), m.transpose().iter().copied())
}

/// Inverse of [`flatten_rows`].
pub fn unflatten_rows(v: &DVector<f64>, nrows: usize, ncols: usize) -> Result<DMatrix<f64>> {
    if v.len() != nrows * ncols {
        return Err(FeatureError::shape("flattened length", nrows * ncols, v.len()));
    }
    Ok(DMatrix::from_row_slice(nrows, ncols, v.as_slice()))
}

/// Number of agents packed into a row of width `width` with per-agent blocks
/// of `block_dim` columns.
pub fn agent_count(width: usize, block_dim: usize, context: &str) -> Result<usize> {
    if block_dim == 0 || width % block_dim != 0 {
        return Err(FeatureError::shape(
            format!("{context} width (multiple of per-agent block {block_dim})"),
            block_dim * (width / block_dim.max(1)),
            width,
        ));
    }
    Ok(width / block_dim)
}
