//! # Kinetic-Energy Features
//!
//! Control-space costs: no dynamics Jacobian is involved.
//!
//! - **Velocity**: `Σ ‖u_t‖²`
//! - **Acceleration**: `Σ ‖(u_{t+1} - u_t)/dt‖²` plus the boundary term
//!   `‖(u_0 - u_prev)/dt‖²` that keeps the plan continuous with the control
//!   currently being executed.

use nalgebra::{DMatrix, DVector};

use crate::error::{FeatureError, Result};
use crate::feature::Feature;
use crate::structs::{flatten_rows, FeatureInput};

#[derive(Debug, Clone, Copy, Default)]
pub struct Velocity;

impl Feature for Velocity {
    fn name(&self) -> &'static str {
        "Velocity"
    }

    fn value(&self, input: &FeatureInput) -> Result<f64> {
        input.validate()?;
        Ok(input.u.norm_squared())
    }

    fn gradient(&self, input: &FeatureInput) -> Result<DVector<f64>> {
        input.validate()?;
        Ok(flatten_rows(input.u) * 2.0)
    }

    fn hessian(&self, input: &FeatureInput) -> Result<DMatrix<f64>> {
        input.validate()?;
        let n = input.u.len();
        Ok(DMatrix::<f64>::identity(n, n) * 2.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Acceleration {
    u0: DVector<f64>,
    dt: f64,
}

impl Acceleration {
    /// `u0` is the control applied just before the planned sequence starts.
    pub fn new(u0: DVector<f64>, dt: f64) -> Result<Self> {
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(FeatureError::InvalidConfig(format!(
                "acceleration timestep must be positive, got {dt}"
            )));
        }
        Ok(Acceleration { u0, dt })
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Row `r` holds `a_{r-1}`: row 0 is the boundary term against `u0`,
    /// row `t + 1` is `(u_{t+1} - u_t)/dt`.
    fn accelerations(&self, u: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if self.u0.len() != u.ncols() {
            return Err(FeatureError::shape("width of prior control u0", u.ncols(), self.u0.len()));
        }
        Ok(DMatrix::from_fn(u.nrows(), u.ncols(), |t, i| {
            let prev = if t == 0 { self.u0[i] } else { u[(t - 1, i)] };
            (u[(t, i)] - prev) / self.dt
        }))
    }
}

impl Feature for Acceleration {
    fn name(&self) -> &'static str {
        "Acceleration"
    }

    fn value(&self, input: &FeatureInput) -> Result<f64> {
        input.validate()?;
        Ok(self.accelerations(input.u)?.norm_squared())
    }

    fn gradient(&self, input: &FeatureInput) -> Result<DVector<f64>> {
        input.validate()?;
        let acc = self.accelerations(input.u)?;
        let (horizon, nu) = acc.shape();

        // ∂f/∂u_s = 2/dt · (a_{s-1} - a_s), with no a_s past the last step.
        let grad = DMatrix::from_fn(horizon, nu, |s, i| {
            let next = if s + 1 < horizon { acc[(s + 1, i)] } else { 0.0 };
            2.0 / self.dt * (acc[(s, i)] - next)
        });
        Ok(flatten_rows(&grad))
    }

    fn hessian(&self, input: &FeatureInput) -> Result<DMatrix<f64>> {
        input.validate()?;
        if self.u0.len() != input.u.ncols() {
            return Err(FeatureError::shape(
                "width of prior control u0",
                input.u.ncols(),
                self.u0.len(),
            ));
        }

        let (horizon, nu) = input.u.shape();
        let n = horizon * nu;
        let dt2 = self.dt * self.dt;

        let mut hess = DMatrix::zeros(n, n);
        for idx in 0..n {
            let last_step = idx / nu + 1 == horizon;
            hess[(idx, idx)] = (if last_step { 2.0 } else { 4.0 }) / dt2;
            if idx + nu < n {
                hess[(idx, idx + nu)] = -2.0 / dt2;
                hess[(idx + nu, idx)] = -2.0 / dt2;
            }
        }
        Ok(hess)
    }
}
