//! # Discrete Linear Dynamics
//!
//! Rolls a control sequence forward into a state trajectory and computes the
//! trajectory Jacobian `dx/du` that state-space features are lifted through.
//!
//! The model is `x_t = A·x_{t-1} + B·u_t` with `x_{-1} = x0`: the initial
//! state is an input, not a row of the trajectory. Block `(t, s)` of the
//! Jacobian is `A^{t-s}·B` for `s <= t` and zero otherwise.

use nalgebra::{DMatrix, DVector};
use tracing::trace;

use crate::error::{FeatureError, Result};

/// A dynamics model that features can be lifted through.
pub trait Dynamics {
    fn state_dim(&self) -> usize;
    fn control_dim(&self) -> usize;

    /// Propagates `u` (`T × nU`) from `x0` and returns the trajectory with
    /// its Jacobian.
    fn propagate(&self, x0: &DVector<f64>, u: &DMatrix<f64>) -> Result<Rollout>;
}

/// States produced by one propagation together with `dx/du` for exactly
/// those states.
#[derive(Debug, Clone)]
pub struct Rollout {
    states: DMatrix<f64>,
    jacobian: DMatrix<f64>,
}

impl Rollout {
    /// `T × nX` state trajectory.
    pub fn trajectory(&self) -> &DMatrix<f64> {
        &self.states
    }

    /// `(T·nX) × (T·nU)` Jacobian of the flattened trajectory.
    pub fn jacobian(&self) -> &DMatrix<f64> {
        &self.jacobian
    }

    pub fn horizon(&self) -> usize {
        self.states.nrows()
    }

    pub fn into_parts(self) -> (DMatrix<f64>, DMatrix<f64>) {
        (self.states, self.jacobian)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearDynamics {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
}

impl LinearDynamics {
    pub fn new(a: DMatrix<f64>, b: DMatrix<f64>) -> Result<Self> {
        if !a.is_square() {
            return Err(FeatureError::shape("columns of A", a.nrows(), a.ncols()));
        }
        if b.nrows() != a.nrows() {
            return Err(FeatureError::shape("rows of B", a.nrows(), b.nrows()));
        }
        Ok(LinearDynamics { a, b })
    }

    /// Velocity-controlled point: `x_t = x_{t-1} + dt·u_t`.
    pub fn single_integrator(dt: f64, dim: usize) -> Self {
        LinearDynamics {
            a: DMatrix::<f64>::identity(dim, dim),
            b: DMatrix::<f64>::identity(dim, dim) * dt,
        }
    }

    /// Acceleration-controlled point with state `[position, velocity]`.
    pub fn double_integrator(dt: f64, dim: usize) -> Self {
        let mut a = DMatrix::<f64>::identity(2 * dim, 2 * dim);
        let mut b = DMatrix::zeros(2 * dim, dim);
        for i in 0..dim {
            a[(i, dim + i)] = dt;
            b[(i, i)] = 0.5 * dt * dt;
            b[(dim + i, i)] = dt;
        }
        LinearDynamics { a, b }
    }

    /// Replicates the model for `n` independent agents. States and controls
    /// of each agent stay contiguous.
    pub fn for_agents(&self, n: usize) -> Self {
        let (nx, nu) = (self.a.nrows(), self.b.ncols());
        let mut a = DMatrix::zeros(n * nx, n * nx);
        let mut b = DMatrix::zeros(n * nx, n * nu);
        for agent in 0..n {
            a.view_mut((agent * nx, agent * nx), (nx, nx)).copy_from(&self.a);
            b.view_mut((agent * nx, agent * nu), (nx, nu)).copy_from(&self.b);
        }
        LinearDynamics { a, b }
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn b(&self) -> &DMatrix<f64> {
        &self.b
    }

    fn jacobian(&self, horizon: usize) -> DMatrix<f64> {
        let (nx, nu) = (self.state_dim(), self.control_dim());
        let mut jacobian = DMatrix::zeros(horizon * nx, horizon * nu);

        for s in 0..horizon {
            jacobian.view_mut((s * nx, s * nu), (nx, nu)).copy_from(&self.b);
            for t in (s + 1)..horizon {
                let next = &self.a * jacobian.view(((t - 1) * nx, s * nu), (nx, nu));
                jacobian.view_mut((t * nx, s * nu), (nx, nu)).copy_from(&next);
            }
        }

        jacobian
    }
}

impl Dynamics for LinearDynamics {
    fn state_dim(&self) -> usize {
        self.a.nrows()
    }

    fn control_dim(&self) -> usize {
        self.b.ncols()
    }

    fn propagate(&self, x0: &DVector<f64>, u: &DMatrix<f64>) -> Result<Rollout> {
        if x0.len() != self.state_dim() {
            return Err(FeatureError::shape("initial state", self.state_dim(), x0.len()));
        }
        if u.ncols() != self.control_dim() {
            return Err(FeatureError::shape("control width", self.control_dim(), u.ncols()));
        }

        let horizon = u.nrows();
        trace!(horizon, nx = self.state_dim(), nu = self.control_dim(), "propagating linear dynamics");

        let mut states = DMatrix::zeros(horizon, self.state_dim());
        let mut x_last = x0.clone();
        for t in 0..horizon {
            let x_next = &self.a * &x_last + &self.b * u.row(t).transpose();
            states.set_row(t, &x_next.transpose());
            x_last = x_next;
        }

        Ok(Rollout {
            states,
            jacobian: self.jacobian(horizon),
        })
    }
}
