//! # Robot-Human Collision Barrier
//!
//! `CollisionHR` charges `Σ_{t,a} 1/d_{t,a}`, where `d_{t,a}` is the distance
//! between agent `a` of the differentiated trajectory `x` and the reference
//! trajectory `xr` at timestep `t`. The cost diverges as separation goes to
//! zero, so optimizer iterates must stay collision free.
//!
//! Derivatives chain two maps per `(t, a)` block:
//! 1. cost vs distance: `c'(d) = -1/d²`, `c''(d) = 2/d³`
//! 2. distance vs state, from the [`DistanceFunction`]: `∇d`, `∇²d`
//!
//! giving `∇c = c'·∇d` and `∇²c = c''·∇d∇dᵗ + c'·∇²d`, which is then lifted
//! into control space through the dynamics Jacobian.
//!
//! `CollisionGaussian` is the smooth alternative `Σ_{t,a} exp(-‖p_{t,a} - p^r_t‖²/R²)`
//! over the compared (position) coordinates. It stays finite when the agents
//! coincide, so it works on the offsets directly rather than on a distance.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::distance::{closest_approach, nonsingular, DistanceField, DistanceFunction, EuclideanDistance};
use crate::error::{FeatureError, Result};
use crate::feature::{Feature, StateFeature};
use crate::lift::{lift_gradient, BlockDiagonal};
use crate::structs::{agent_count, FeatureInput};

#[derive(Debug, Clone, Default)]
pub struct CollisionHR<D = EuclideanDistance> {
    distance: D,
}

impl<D: DistanceFunction> CollisionHR<D> {
    pub fn new(distance: D) -> Self {
        CollisionHR { distance }
    }

    pub fn distance(&self) -> &D {
        &self.distance
    }

    /// Validates the input and returns `(nA, nX)`, with `nX` taken from the
    /// width of the reference trajectory.
    fn dims(&self, input: &FeatureInput) -> Result<(usize, usize)> {
        input.validate()?;
        let state_dim = input.xr.ncols();
        let n_agents = agent_count(input.x.ncols(), state_dim, "x")?;
        Ok((n_agents, state_dim))
    }

    /// Distance field for the input, checked against the `(T, nA, nX)` layout.
    fn field(&self, input: &FeatureInput) -> Result<(DistanceField, usize, usize)> {
        let (n_agents, state_dim) = self.dims(input)?;
        let field = self.distance.derivatives(input.x, input.xr, state_dim)?;

        let horizon = input.horizon();
        let width = n_agents * state_dim;
        for (name, actual, expected) in [
            ("distances", field.distances.shape(), (horizon, n_agents)),
            ("distance gradient", field.gradient.shape(), (horizon, width)),
            ("distance hessian", field.hessian.shape(), (horizon * state_dim, width)),
        ] {
            if actual.0 != expected.0 {
                return Err(FeatureError::shape(format!("{name} rows"), expected.0, actual.0));
            }
            if actual.1 != expected.1 {
                return Err(FeatureError::shape(format!("{name} columns"), expected.1, actual.1));
            }
        }
        Ok((field, n_agents, state_dim))
    }
}

impl<D: DistanceFunction> Feature for CollisionHR<D> {
    fn name(&self) -> &'static str {
        "CollisionHR"
    }

    fn value(&self, input: &FeatureInput) -> Result<f64> {
        let (_, state_dim) = self.dims(input)?;
        let distances = self.distance.compute(input.x, input.xr, state_dim)?;

        if let Some((timestep, agent, closest)) = closest_approach(&distances) {
            debug!(timestep, agent, closest, "collision feature closest approach");
        }

        let mut cost = 0.0;
        for t in 0..distances.nrows() {
            for a in 0..distances.ncols() {
                cost += 1.0 / nonsingular(distances[(t, a)], t, a)?;
            }
        }
        Ok(cost)
    }

    fn gradient(&self, input: &FeatureInput) -> Result<DVector<f64>> {
        lift_gradient(input.jacobian_for(self.name())?, &self.grad_x(input)?)
    }

    fn hessian(&self, input: &FeatureInput) -> Result<DMatrix<f64>> {
        let jacobian = input.jacobian_for(self.name())?;
        self.hessian_x(input)?.lift(jacobian)
    }
}

impl<D: DistanceFunction> StateFeature for CollisionHR<D> {
    fn grad_x(&self, input: &FeatureInput) -> Result<DVector<f64>> {
        let (field, n_agents, state_dim) = self.field(input)?;

        let mut grad = DVector::zeros(input.x.len());
        for t in 0..input.horizon() {
            for a in 0..n_agents {
                let d = nonsingular(field.distances[(t, a)], t, a)?;
                let dc_dd = -1.0 / (d * d);
                let start = (t * n_agents + a) * state_dim;
                for i in 0..state_dim {
                    grad[start + i] = dc_dd * field.gradient[(t, a * state_dim + i)];
                }
            }
        }
        Ok(grad)
    }

    fn hessian_x(&self, input: &FeatureInput) -> Result<BlockDiagonal> {
        let (field, n_agents, state_dim) = self.field(input)?;

        let mut hess = BlockDiagonal::with_capacity(state_dim, input.horizon() * n_agents);
        for t in 0..input.horizon() {
            for a in 0..n_agents {
                let d = nonsingular(field.distances[(t, a)], t, a)?;
                let dc_dd = -1.0 / (d * d);
                let d2c_dd2 = 2.0 / (d * d * d);

                let grad_d = field.gradient.view((t, a * state_dim), (1, state_dim));
                let hess_d = field.hessian.view((t * state_dim, a * state_dim), (state_dim, state_dim));

                let block = grad_d.tr_mul(&grad_d) * d2c_dd2 + hess_d * dc_dd;
                hess.push(block)?;
            }
        }
        Ok(hess)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollisionGaussian {
    radius: f64,
    position_dims: Option<usize>,
}

impl CollisionGaussian {
    /// Gaussian over whole state vectors.
    pub fn new(radius: f64) -> Result<Self> {
        Self::with_dims(radius, None)
    }

    /// Gaussian over the first `dims` coordinates of each state.
    pub fn positional(radius: f64, dims: usize) -> Result<Self> {
        Self::with_dims(radius, Some(dims))
    }

    fn with_dims(radius: f64, position_dims: Option<usize>) -> Result<Self> {
        if !(radius > 0.0 && radius.is_finite()) {
            return Err(FeatureError::InvalidConfig(format!(
                "collision radius must be positive, got {radius}"
            )));
        }
        if position_dims == Some(0) {
            return Err(FeatureError::InvalidConfig(
                "collision must compare at least one coordinate".to_string(),
            ));
        }
        Ok(CollisionGaussian { radius, position_dims })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Returns `(nA, nX, k)` with `k` the number of compared coordinates.
    fn dims(&self, input: &FeatureInput) -> Result<(usize, usize, usize)> {
        input.validate()?;
        let state_dim = input.xr.ncols();
        let n_agents = agent_count(input.x.ncols(), state_dim, "x")?;
        let k = match self.position_dims {
            None => state_dim,
            Some(k) if k <= state_dim => k,
            Some(k) => return Err(FeatureError::shape("compared coordinates", state_dim, k)),
        };
        Ok((n_agents, state_dim, k))
    }

    /// `(p_{t,a} - p^r_t, exp(-‖·‖²/R²))`.
    fn term(input: &FeatureInput, t: usize, a: usize, state_dim: usize, k: usize, r2: f64) -> (DVector<f64>, f64) {
        let delta = DVector::from_fn(k, |i, _| input.x[(t, a * state_dim + i)] - input.xr[(t, i)]);
        let c = (-delta.norm_squared() / r2).exp();
        (delta, c)
    }
}

impl Feature for CollisionGaussian {
    fn name(&self) -> &'static str {
        "CollisionGaussian"
    }

    fn value(&self, input: &FeatureInput) -> Result<f64> {
        let (n_agents, state_dim, k) = self.dims(input)?;
        let r2 = self.radius * self.radius;

        let mut cost = 0.0;
        for t in 0..input.horizon() {
            for a in 0..n_agents {
                cost += Self::term(input, t, a, state_dim, k, r2).1;
            }
        }
        Ok(cost)
    }

    fn gradient(&self, input: &FeatureInput) -> Result<DVector<f64>> {
        lift_gradient(input.jacobian_for(self.name())?, &self.grad_x(input)?)
    }

    fn hessian(&self, input: &FeatureInput) -> Result<DMatrix<f64>> {
        let jacobian = input.jacobian_for(self.name())?;
        self.hessian_x(input)?.lift(jacobian)
    }
}

impl StateFeature for CollisionGaussian {
    fn grad_x(&self, input: &FeatureInput) -> Result<DVector<f64>> {
        let (n_agents, state_dim, k) = self.dims(input)?;
        let r2 = self.radius * self.radius;

        let mut grad = DVector::zeros(input.x.len());
        for t in 0..input.horizon() {
            for a in 0..n_agents {
                let (delta, c) = Self::term(input, t, a, state_dim, k, r2);
                let start = (t * n_agents + a) * state_dim;
                grad.rows_mut(start, k).copy_from(&(delta * (-2.0 * c / r2)));
            }
        }
        Ok(grad)
    }

    fn hessian_x(&self, input: &FeatureInput) -> Result<BlockDiagonal> {
        let (n_agents, state_dim, k) = self.dims(input)?;
        let r2 = self.radius * self.radius;

        let mut hess = BlockDiagonal::with_capacity(state_dim, input.horizon() * n_agents);
        for t in 0..input.horizon() {
            for a in 0..n_agents {
                let (delta, c) = Self::term(input, t, a, state_dim, k, r2);
                let mut block = DMatrix::zeros(state_dim, state_dim);
                let compared = &delta * delta.transpose() * (4.0 * c / (r2 * r2))
                    - DMatrix::<f64>::identity(k, k) * (2.0 * c / r2);
                block.view_mut((0, 0), (k, k)).copy_from(&compared);
                hess.push(block)?;
            }
        }
        Ok(hess)
    }
}
