//! Shared helpers for the integration tests: random scenarios and central
//! finite-difference checks of feature derivatives.

#![allow(dead_code)]

use hri_features::{
    flatten_rows, unflatten_rows, DistanceField, DistanceFunction, Dynamics, Feature, FeatureInput,
    LinearDynamics, Result,
};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::Rng;

pub const STEP: f64 = 1e-5;
pub const TOLERANCE: f64 = 1e-4;

/// A planned agent driven by `dynamics` from `x0`, plus a fixed reference agent.
pub struct Scenario {
    pub dynamics: LinearDynamics,
    pub x0: DVector<f64>,
    pub u: DMatrix<f64>,
    pub xr: DMatrix<f64>,
    pub ur: DMatrix<f64>,
}

impl Scenario {
    pub fn random(rng: &mut StdRng, dynamics: LinearDynamics, horizon: usize, reference_dim: usize) -> Self {
        let nx = dynamics.state_dim();
        let nu = dynamics.control_dim();
        let x0 = DVector::from_fn(nx, |_, _| rng.gen_range(-1.0..1.0));
        let u = DMatrix::from_fn(horizon, nu, |_, _| rng.gen_range(-1.0..1.0));
        // reference walks along y = -6, well clear of the planned agent
        let xr = DMatrix::from_fn(horizon, reference_dim, |t, c| match c {
            0 => t as f64 * 0.5 + rng.gen_range(-0.2..0.2),
            1 => -6.0 + rng.gen_range(-0.2..0.2),
            _ => rng.gen_range(-0.5..0.5),
        });
        let ur = DMatrix::zeros(horizon, 2);
        Scenario { dynamics, x0, u, xr, ur }
    }
}

pub fn value_at(feature: &dyn Feature, s: &Scenario, u: &DMatrix<f64>) -> f64 {
    let rollout = s.dynamics.propagate(&s.x0, u).unwrap();
    feature
        .value(&FeatureInput::from_rollout(&rollout, u, &s.xr, &s.ur))
        .unwrap()
}

pub fn gradient_at(feature: &dyn Feature, s: &Scenario, u: &DMatrix<f64>) -> DVector<f64> {
    let rollout = s.dynamics.propagate(&s.x0, u).unwrap();
    feature
        .gradient(&FeatureInput::from_rollout(&rollout, u, &s.xr, &s.ur))
        .unwrap()
}

pub fn hessian_at(feature: &dyn Feature, s: &Scenario, u: &DMatrix<f64>) -> DMatrix<f64> {
    let rollout = s.dynamics.propagate(&s.x0, u).unwrap();
    feature
        .hessian(&FeatureInput::from_rollout(&rollout, u, &s.xr, &s.ur))
        .unwrap()
}

fn perturbed(u: &DMatrix<f64>, index: usize, delta: f64) -> DMatrix<f64> {
    let mut flat = flatten_rows(u);
    flat[index] += delta;
    unflatten_rows(&flat, u.nrows(), u.ncols()).unwrap()
}

fn assert_close(analytic: f64, numeric: f64, what: &str) {
    let scale = 1.0 + analytic.abs().max(numeric.abs());
    assert!(
        (analytic - numeric).abs() <= TOLERANCE * scale,
        "{what}: analytic {analytic} vs finite difference {numeric}"
    );
}

/// Checks `gradient` against differences of `value`, and `hessian` against
/// differences of `gradient`, at the scenario's controls.
pub fn check_derivatives(feature: &dyn Feature, s: &Scenario) {
    let n = s.u.len();
    let grad = gradient_at(feature, s, &s.u);
    let hess = hessian_at(feature, s, &s.u);
    assert_eq!(grad.len(), n);
    assert_eq!(hess.shape(), (n, n));

    for i in 0..n {
        let plus = perturbed(&s.u, i, STEP);
        let minus = perturbed(&s.u, i, -STEP);

        let numeric = (value_at(feature, s, &plus) - value_at(feature, s, &minus)) / (2.0 * STEP);
        assert_close(grad[i], numeric, &format!("{} gradient[{i}]", feature.name()));

        let column = (gradient_at(feature, s, &plus) - gradient_at(feature, s, &minus)) / (2.0 * STEP);
        for j in 0..n {
            assert_close(hess[(j, i)], column[j], &format!("{} hessian[{j}, {i}]", feature.name()));
        }
    }
}

/// Anisotropic distance `sqrt(Σ w_i Δ_i²)` over the first `weights.len()`
/// coordinates of each state.
pub struct WeightedDistance {
    pub weights: Vec<f64>,
}

impl WeightedDistance {
    fn offsets(&self, x: &DMatrix<f64>, xr: &DMatrix<f64>, t: usize, col: usize) -> Vec<f64> {
        (0..self.weights.len()).map(|i| x[(t, col + i)] - xr[(t, i)]).collect()
    }

    fn norm(&self, delta: &[f64]) -> f64 {
        delta.iter().zip(&self.weights).map(|(d, w)| w * d * d).sum::<f64>().sqrt()
    }
}

impl DistanceFunction for WeightedDistance {
    fn compute(&self, x: &DMatrix<f64>, xr: &DMatrix<f64>, state_dim: usize) -> Result<DMatrix<f64>> {
        let n_agents = x.ncols() / state_dim;
        Ok(DMatrix::from_fn(x.nrows(), n_agents, |t, a| {
            self.norm(&self.offsets(x, xr, t, a * state_dim))
        }))
    }

    fn derivatives(&self, x: &DMatrix<f64>, xr: &DMatrix<f64>, state_dim: usize) -> Result<DistanceField> {
        let horizon = x.nrows();
        let n_agents = x.ncols() / state_dim;
        let k = self.weights.len();

        let mut distances = DMatrix::zeros(horizon, n_agents);
        let mut gradient = DMatrix::zeros(horizon, n_agents * state_dim);
        let mut hessian = DMatrix::zeros(horizon * state_dim, n_agents * state_dim);
        for t in 0..horizon {
            for a in 0..n_agents {
                let col = a * state_dim;
                let delta = self.offsets(x, xr, t, col);
                let d = self.norm(&delta);
                distances[(t, a)] = d;

                let scaled: Vec<f64> = delta.iter().zip(&self.weights).map(|(d, w)| w * d).collect();
                for i in 0..k {
                    gradient[(t, col + i)] = scaled[i] / d;
                    for j in 0..k {
                        let diagonal = if i == j { self.weights[i] / d } else { 0.0 };
                        hessian[(t * state_dim + i, col + j)] = diagonal - scaled[i] * scaled[j] / d.powi(3);
                    }
                }
            }
        }
        Ok(DistanceField { distances, gradient, hessian })
    }
}
