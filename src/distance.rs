//! # Pairwise Distance Functionals
//!
//! Distance between every agent of a trajectory `x` (`T × nA·nX`) and a single
//! reference trajectory `xr` (`T × nX`), with derivatives w.r.t. `x`.
//!
//! Layouts:
//! - distances: `T × nA`
//! - gradient:  `T × (nA·nX)`, row `t` holds `∂d_{t,a}/∂x_{t,a}` per agent block
//! - hessian:   `(T·nX) × (nA·nX)`, block `(t, a)` is `∂²d_{t,a}/∂x_{t,a}²`

use nalgebra::DMatrix;
use ordered_float::OrderedFloat;
use tracing::warn;

use crate::error::{FeatureError, Result};
use crate::structs::agent_count;

/// Distances at or below this are treated as coincident points.
pub(crate) const SINGULAR_DISTANCE: f64 = 1e-12;

/// Distances plus their derivatives, all for the same `(x, xr)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceField {
    pub distances: DMatrix<f64>,
    pub gradient: DMatrix<f64>,
    pub hessian: DMatrix<f64>,
}

pub trait DistanceFunction {
    /// `T × nA` distances between each agent of `x` and `xr`.
    fn compute(&self, x: &DMatrix<f64>, xr: &DMatrix<f64>, state_dim: usize) -> Result<DMatrix<f64>>;

    /// Distances together with their gradient and Hessian w.r.t. `x`.
    fn derivatives(
        &self,
        x: &DMatrix<f64>,
        xr: &DMatrix<f64>,
        state_dim: usize,
    ) -> Result<DistanceField>;
}

/// Euclidean distance over the leading coordinates of each state block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EuclideanDistance {
    position_dims: Option<usize>,
}

impl EuclideanDistance {
    /// Compares whole state vectors.
    pub fn full() -> Self {
        EuclideanDistance { position_dims: None }
    }

    /// Compares only the first `dims` coordinates of each state, e.g. the
    /// position part of a `[position, velocity]` state.
    pub fn positional(dims: usize) -> Self {
        EuclideanDistance {
            position_dims: Some(dims),
        }
    }

    fn compared_dims(&self, state_dim: usize) -> Result<usize> {
        match self.position_dims {
            None => Ok(state_dim),
            Some(k) if k >= 1 && k <= state_dim => Ok(k),
            Some(k) => Err(FeatureError::shape("compared coordinates", state_dim, k)),
        }
    }

    /// Returns `(nA, k)` after checking `x`/`xr` agree.
    fn check_shapes(&self, x: &DMatrix<f64>, xr: &DMatrix<f64>, state_dim: usize) -> Result<(usize, usize)> {
        if xr.nrows() != x.nrows() {
            return Err(FeatureError::shape("horizon of xr", x.nrows(), xr.nrows()));
        }
        if xr.ncols() != state_dim {
            return Err(FeatureError::shape("width of xr", state_dim, xr.ncols()));
        }
        let n_agents = agent_count(x.ncols(), state_dim, "x")?;
        Ok((n_agents, self.compared_dims(state_dim)?))
    }

    fn offsets(x: &DMatrix<f64>, xr: &DMatrix<f64>, t: usize, col: usize, k: usize) -> Vec<f64> {
        (0..k).map(|i| x[(t, col + i)] - xr[(t, i)]).collect()
    }
}

impl DistanceFunction for EuclideanDistance {
    fn compute(&self, x: &DMatrix<f64>, xr: &DMatrix<f64>, state_dim: usize) -> Result<DMatrix<f64>> {
        let (n_agents, k) = self.check_shapes(x, xr, state_dim)?;

        Ok(DMatrix::from_fn(x.nrows(), n_agents, |t, a| {
            Self::offsets(x, xr, t, a * state_dim, k)
                .iter()
                .map(|d| d * d)
                .sum::<f64>()
                .sqrt()
        }))
    }

    fn derivatives(
        &self,
        x: &DMatrix<f64>,
        xr: &DMatrix<f64>,
        state_dim: usize,
    ) -> Result<DistanceField> {
        let (n_agents, k) = self.check_shapes(x, xr, state_dim)?;
        let horizon = x.nrows();

        let mut distances = DMatrix::zeros(horizon, n_agents);
        let mut gradient = DMatrix::zeros(horizon, n_agents * state_dim);
        let mut hessian = DMatrix::zeros(horizon * state_dim, n_agents * state_dim);

        for t in 0..horizon {
            for a in 0..n_agents {
                let col = a * state_dim;
                let delta = Self::offsets(x, xr, t, col, k);
                let d = delta.iter().map(|v| v * v).sum::<f64>().sqrt();
                let d = nonsingular(d, t, a)?;
                distances[(t, a)] = d;

                let row = t * state_dim;
                for i in 0..k {
                    gradient[(t, col + i)] = delta[i] / d;
                    for j in 0..k {
                        let identity = if i == j { 1.0 / d } else { 0.0 };
                        hessian[(row + i, col + j)] = identity - delta[i] * delta[j] / d.powi(3);
                    }
                }
            }
        }

        Ok(DistanceField {
            distances,
            gradient,
            hessian,
        })
    }
}

/// Passes `d` through unless it is (numerically) zero.
pub(crate) fn nonsingular(d: f64, timestep: usize, agent: usize) -> Result<f64> {
    if d <= SINGULAR_DISTANCE {
        warn!(timestep, agent, distance = d, "singular distance");
        return Err(FeatureError::SingularDistance {
            timestep,
            agent,
            distance: d,
        });
    }
    Ok(d)
}

/// `(timestep, agent, distance)` of the smallest entry, if any.
pub fn closest_approach(distances: &DMatrix<f64>) -> Option<(usize, usize, f64)> {
    (0..distances.nrows())
        .flat_map(|t| (0..distances.ncols()).map(move |a| (t, a)))
        .min_by_key(|&(t, a)| OrderedFloat(distances[(t, a)]))
        .map(|(t, a)| (t, a, distances[(t, a)]))
}
