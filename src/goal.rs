//! # Goal-Attraction Features
//!
//! State-space costs pulling each agent toward its own goal, lifted into
//! control space through the dynamics Jacobian.
//!
//! - **GoalReward**: `Σ_{t,a} exp(-‖x_{t,a} - g_a‖²/R²)`, a smooth reward that
//!   peaks at 1 per agent and timestep on the goal
//! - **GoalRewardLinear**: `Σ_{t,a} ‖x_{t,a} - g_a‖`
//! - **TerminationReward**: `Σ_a ‖x_{T-1,a} - g_a‖`, final timestep only
//!
//! Goals are an `nA × nX` matrix, one row per agent. Each term depends only on
//! its own `(t, a)` state block, so the state Hessians are block diagonal.

use nalgebra::{DMatrix, DVector};

use crate::distance::nonsingular;
use crate::error::{FeatureError, Result};
use crate::feature::{Feature, StateFeature};
use crate::lift::{lift_gradient, BlockDiagonal};
use crate::structs::FeatureInput;

fn check_goals(goals: &DMatrix<f64>) -> Result<()> {
    if goals.nrows() == 0 || goals.ncols() == 0 {
        return Err(FeatureError::InvalidConfig("goal matrix must be non-empty".to_string()));
    }
    Ok(())
}

/// Validates the input and that `x` holds exactly one state block per goal.
fn check_input(input: &FeatureInput, goals: &DMatrix<f64>) -> Result<()> {
    input.validate()?;
    if input.x.ncols() != goals.len() {
        return Err(FeatureError::shape("width of x (agents × state dim)", goals.len(), input.x.ncols()));
    }
    Ok(())
}

/// `x_{t,a} - g_a`.
fn offset(x: &DMatrix<f64>, goals: &DMatrix<f64>, t: usize, a: usize) -> DVector<f64> {
    let nx = goals.ncols();
    DVector::from_fn(nx, |i, _| x[(t, a * nx + i)] - goals[(a, i)])
}

/// Hessian of `‖Δ‖` at `Δ`, i.e. `I/d - ΔΔᵗ/d³`.
fn norm_hessian(delta: &DVector<f64>, d: f64) -> DMatrix<f64> {
    let n = delta.len();
    DMatrix::<f64>::identity(n, n) / d - delta * delta.transpose() / d.powi(3)
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalReward {
    goals: DMatrix<f64>,
    radius: f64,
}

impl GoalReward {
    pub fn new(goals: DMatrix<f64>, radius: f64) -> Result<Self> {
        check_goals(&goals)?;
        if !(radius > 0.0 && radius.is_finite()) {
            return Err(FeatureError::InvalidConfig(format!(
                "goal reward radius must be positive, got {radius}"
            )));
        }
        Ok(GoalReward { goals, radius })
    }

    pub fn goals(&self) -> &DMatrix<f64> {
        &self.goals
    }

    /// `T × nA` matrix of `r_{t,a}`.
    pub fn rewards(&self, input: &FeatureInput) -> Result<DMatrix<f64>> {
        check_input(input, &self.goals)?;
        let r2 = self.radius * self.radius;
        Ok(DMatrix::from_fn(input.horizon(), self.goals.nrows(), |t, a| {
            (-offset(input.x, &self.goals, t, a).norm_squared() / r2).exp()
        }))
    }
}

impl Feature for GoalReward {
    fn name(&self) -> &'static str {
        "GoalReward"
    }

    fn value(&self, input: &FeatureInput) -> Result<f64> {
        Ok(self.rewards(input)?.sum())
    }

    fn gradient(&self, input: &FeatureInput) -> Result<DVector<f64>> {
        lift_gradient(input.jacobian_for(self.name())?, &self.grad_x(input)?)
    }

    fn hessian(&self, input: &FeatureInput) -> Result<DMatrix<f64>> {
        let jacobian = input.jacobian_for(self.name())?;
        self.hessian_x(input)?.lift(jacobian)
    }
}

impl StateFeature for GoalReward {
    fn grad_x(&self, input: &FeatureInput) -> Result<DVector<f64>> {
        let rewards = self.rewards(input)?;
        let (n_agents, nx) = self.goals.shape();
        let r2 = self.radius * self.radius;

        let mut grad = DVector::zeros(input.x.len());
        for t in 0..input.horizon() {
            for a in 0..n_agents {
                let start = (t * n_agents + a) * nx;
                let delta = offset(input.x, &self.goals, t, a);
                grad.rows_mut(start, nx).copy_from(&(delta * (-2.0 * rewards[(t, a)] / r2)));
            }
        }
        Ok(grad)
    }

    fn hessian_x(&self, input: &FeatureInput) -> Result<BlockDiagonal> {
        let rewards = self.rewards(input)?;
        let (n_agents, nx) = self.goals.shape();
        let r2 = self.radius * self.radius;

        let mut hess = BlockDiagonal::with_capacity(nx, input.horizon() * n_agents);
        for t in 0..input.horizon() {
            for a in 0..n_agents {
                let r = rewards[(t, a)];
                let delta = offset(input.x, &self.goals, t, a);
                let block = &delta * delta.transpose() * (4.0 * r / (r2 * r2))
                    - DMatrix::<f64>::identity(nx, nx) * (2.0 * r / r2);
                hess.push(block)?;
            }
        }
        Ok(hess)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalRewardLinear {
    goals: DMatrix<f64>,
}

impl GoalRewardLinear {
    pub fn new(goals: DMatrix<f64>) -> Result<Self> {
        check_goals(&goals)?;
        Ok(GoalRewardLinear { goals })
    }

    pub fn goals(&self) -> &DMatrix<f64> {
        &self.goals
    }

    /// `T × nA` matrix of distances to goal.
    pub fn goal_distances(&self, input: &FeatureInput) -> Result<DMatrix<f64>> {
        check_input(input, &self.goals)?;
        Ok(DMatrix::from_fn(input.horizon(), self.goals.nrows(), |t, a| {
            offset(input.x, &self.goals, t, a).norm()
        }))
    }
}

impl Feature for GoalRewardLinear {
    fn name(&self) -> &'static str {
        "GoalRewardLinear"
    }

    fn value(&self, input: &FeatureInput) -> Result<f64> {
        Ok(self.goal_distances(input)?.sum())
    }

    fn gradient(&self, input: &FeatureInput) -> Result<DVector<f64>> {
        lift_gradient(input.jacobian_for(self.name())?, &self.grad_x(input)?)
    }

    fn hessian(&self, input: &FeatureInput) -> Result<DMatrix<f64>> {
        let jacobian = input.jacobian_for(self.name())?;
        self.hessian_x(input)?.lift(jacobian)
    }
}

impl StateFeature for GoalRewardLinear {
    fn grad_x(&self, input: &FeatureInput) -> Result<DVector<f64>> {
        check_input(input, &self.goals)?;
        let (n_agents, nx) = self.goals.shape();

        let mut grad = DVector::zeros(input.x.len());
        for t in 0..input.horizon() {
            for a in 0..n_agents {
                let delta = offset(input.x, &self.goals, t, a);
                let d = nonsingular(delta.norm(), t, a)?;
                grad.rows_mut((t * n_agents + a) * nx, nx).copy_from(&(delta / d));
            }
        }
        Ok(grad)
    }

    fn hessian_x(&self, input: &FeatureInput) -> Result<BlockDiagonal> {
        check_input(input, &self.goals)?;
        let (n_agents, nx) = self.goals.shape();

        let mut hess = BlockDiagonal::with_capacity(nx, input.horizon() * n_agents);
        for t in 0..input.horizon() {
            for a in 0..n_agents {
                let delta = offset(input.x, &self.goals, t, a);
                let d = nonsingular(delta.norm(), t, a)?;
                hess.push(norm_hessian(&delta, d))?;
            }
        }
        Ok(hess)
    }
}

/// Distance to goal at the final timestep. Its state derivatives cover only
/// the `nA·nX` states of that timestep.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminationReward {
    goals: DMatrix<f64>,
}

impl TerminationReward {
    pub fn new(goals: DMatrix<f64>) -> Result<Self> {
        check_goals(&goals)?;
        Ok(TerminationReward { goals })
    }

    pub fn goals(&self) -> &DMatrix<f64> {
        &self.goals
    }

    /// Rows of the Jacobian belonging to the final state.
    fn final_rows(&self, input: &FeatureInput) -> Result<DMatrix<f64>> {
        let jacobian = input.jacobian_for(self.name())?;
        let width = self.goals.len();
        Ok(jacobian.rows((input.horizon() - 1) * width, width).into_owned())
    }
}

impl Feature for TerminationReward {
    fn name(&self) -> &'static str {
        "TerminationReward"
    }

    fn value(&self, input: &FeatureInput) -> Result<f64> {
        check_input(input, &self.goals)?;
        let last = input.horizon() - 1;
        Ok((0..self.goals.nrows())
            .map(|a| offset(input.x, &self.goals, last, a).norm())
            .sum())
    }

    fn gradient(&self, input: &FeatureInput) -> Result<DVector<f64>> {
        let grad_x = self.grad_x(input)?;
        lift_gradient(&self.final_rows(input)?, &grad_x)
    }

    fn hessian(&self, input: &FeatureInput) -> Result<DMatrix<f64>> {
        let hess_x = self.hessian_x(input)?;
        hess_x.lift(&self.final_rows(input)?)
    }
}

impl StateFeature for TerminationReward {
    fn grad_x(&self, input: &FeatureInput) -> Result<DVector<f64>> {
        check_input(input, &self.goals)?;
        let (n_agents, nx) = self.goals.shape();
        let last = input.horizon() - 1;

        let mut grad = DVector::zeros(n_agents * nx);
        for a in 0..n_agents {
            let delta = offset(input.x, &self.goals, last, a);
            let d = nonsingular(delta.norm(), last, a)?;
            grad.rows_mut(a * nx, nx).copy_from(&(delta / d));
        }
        Ok(grad)
    }

    fn hessian_x(&self, input: &FeatureInput) -> Result<BlockDiagonal> {
        check_input(input, &self.goals)?;
        let (n_agents, nx) = self.goals.shape();
        let last = input.horizon() - 1;

        let mut hess = BlockDiagonal::with_capacity(nx, n_agents);
        for a in 0..n_agents {
            let delta = offset(input.x, &self.goals, last, a);
            let d = nonsingular(delta.norm(), last, a)?;
            hess.push(norm_hessian(&delta, d))?;
        }
        Ok(hess)
    }
}
