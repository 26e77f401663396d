//! Python bindings, enabled with the `python` cargo feature.
//!
//! Matrices cross the boundary as lists of rows.

use nalgebra::{DMatrix, DVector};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::CostConfig;
use crate::cost::LinearCost;
use crate::dynamics::{Dynamics, LinearDynamics};
use crate::error::{FeatureError, Result};
use crate::feature::Feature;
use crate::structs::FeatureInput;

impl From<FeatureError> for PyErr {
    fn from(err: FeatureError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

type Rows = Vec<Vec<f64>>;

fn to_matrix(rows: &[Vec<f64>]) -> PyResult<DMatrix<f64>> {
    let ncols = rows.first().map_or(0, Vec::len);
    if let Some(bad) = rows.iter().position(|r| r.len() != ncols) {
        return Err(PyValueError::new_err(format!(
            "row {bad} has {} entries, expected {ncols}",
            rows[bad].len()
        )));
    }
    Ok(DMatrix::from_fn(rows.len(), ncols, |r, c| rows[r][c]))
}

fn to_rows(m: &DMatrix<f64>) -> Rows {
    m.row_iter().map(|row| row.iter().copied().collect()).collect()
}

/// Weighted feature cost built from a JSON config.
#[pyclass(name = "LinearCost", unsendable)]
pub struct PyLinearCost {
    cost: LinearCost,
}

impl PyLinearCost {
    fn evaluate<T>(
        &self,
        x: &[Vec<f64>],
        u: &[Vec<f64>],
        xr: &[Vec<f64>],
        ur: &[Vec<f64>],
        jacobian: Option<&[Vec<f64>]>,
        f: impl FnOnce(&LinearCost, &FeatureInput) -> Result<T>,
    ) -> PyResult<T> {
        let (x, u, xr, ur) = (to_matrix(x)?, to_matrix(u)?, to_matrix(xr)?, to_matrix(ur)?);
        let jacobian = jacobian.map(to_matrix).transpose()?;

        let mut input = FeatureInput::new(&x, &u, &xr, &ur);
        if let Some(j) = jacobian.as_ref() {
            input = input.with_jacobian(j);
        }
        Ok(f(&self.cost, &input)?)
    }
}

#[pymethods]
impl PyLinearCost {
    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let cost = CostConfig::from_json_str(json)?.build()?;
        Ok(PyLinearCost { cost })
    }

    #[pyo3(signature = (x, u, xr, ur, jacobian=None))]
    fn value(&self, x: Rows, u: Rows, xr: Rows, ur: Rows, jacobian: Option<Rows>) -> PyResult<f64> {
        self.evaluate(&x, &u, &xr, &ur, jacobian.as_deref(), |c, i| c.value(i))
    }

    #[pyo3(signature = (x, u, xr, ur, jacobian=None))]
    fn gradient(&self, x: Rows, u: Rows, xr: Rows, ur: Rows, jacobian: Option<Rows>) -> PyResult<Vec<f64>> {
        self.evaluate(&x, &u, &xr, &ur, jacobian.as_deref(), |c, i| {
            c.gradient(i).map(|g| g.iter().copied().collect())
        })
    }

    #[pyo3(signature = (x, u, xr, ur, jacobian=None))]
    fn hessian(&self, x: Rows, u: Rows, xr: Rows, ur: Rows, jacobian: Option<Rows>) -> PyResult<Rows> {
        self.evaluate(&x, &u, &xr, &ur, jacobian.as_deref(), |c, i| {
            c.hessian(i).map(|h| to_rows(&h))
        })
    }

    /// Unweighted per-term values.
    #[pyo3(signature = (x, u, xr, ur, jacobian=None))]
    fn feature_values(&self, x: Rows, u: Rows, xr: Rows, ur: Rows, jacobian: Option<Rows>) -> PyResult<Vec<f64>> {
        self.evaluate(&x, &u, &xr, &ur, jacobian.as_deref(), |c, i| c.feature_values(i))
    }

    fn weights(&self) -> Vec<f64> {
        self.cost.weights()
    }

    fn __len__(&self) -> usize {
        self.cost.len()
    }

    fn __str__(&self) -> String {
        format!("{:?}", self.cost)
    }
}

fn propagate(dynamics: &LinearDynamics, x0: Vec<f64>, u: &[Vec<f64>]) -> PyResult<(Rows, Rows)> {
    let rollout = dynamics.propagate(&DVector::from_vec(x0), &to_matrix(u)?)?;
    Ok((to_rows(rollout.trajectory()), to_rows(rollout.jacobian())))
}

/// Returns `(states, jacobian)` for a velocity-controlled point.
#[pyfunction]
fn propagate_single_integrator(dt: f64, x0: Vec<f64>, u: Rows) -> PyResult<(Rows, Rows)> {
    let dynamics = LinearDynamics::single_integrator(dt, x0.len());
    propagate(&dynamics, x0, &u)
}

/// Returns `(states, jacobian)` for an acceleration-controlled point with
/// state `[position, velocity]`.
#[pyfunction]
fn propagate_double_integrator(dt: f64, x0: Vec<f64>, u: Rows) -> PyResult<(Rows, Rows)> {
    let dynamics = LinearDynamics::double_integrator(dt, x0.len() / 2);
    propagate(&dynamics, x0, &u)
}

#[pymodule]
fn hri_features(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyLinearCost>()?;
    m.add_function(wrap_pyfunction!(propagate_single_integrator, m)?)?;
    m.add_function(wrap_pyfunction!(propagate_double_integrator, m)?)?;
    Ok(())
}
