//! # Linear Cost
//!
//! Weighted sum of features, `c = Σ w_i·f_i`. The per-feature values
//! (`feature_values`) are the feature counts inverse reinforcement learning
//! matches against demonstrations; the weighted sum is what the trajectory
//! optimizer minimizes.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, trace};

use crate::error::{FeatureError, Result};
use crate::feature::Feature;
use crate::structs::FeatureInput;

#[derive(Default)]
pub struct LinearCost {
    terms: Vec<(f64, Box<dyn Feature>)>,
}

impl LinearCost {
    pub fn new() -> Self {
        LinearCost { terms: Vec::new() }
    }

    pub fn add_feature(&mut self, weight: f64, feature: Box<dyn Feature>) {
        debug!(feature = feature.name(), weight, "adding cost term");
        self.terms.push((weight, feature));
    }

    pub fn with_feature(mut self, weight: f64, feature: impl Feature + 'static) -> Self {
        self.add_feature(weight, Box::new(feature));
        self
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.terms.iter().map(|(w, _)| *w).collect()
    }

    /// Unweighted value of every term, in insertion order.
    pub fn feature_values(&self, input: &FeatureInput) -> Result<Vec<f64>> {
        self.terms.iter().map(|(_, f)| f.value(input)).collect()
    }
}

impl std::fmt::Debug for LinearCost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.terms.iter().map(|(w, feature)| (w, feature.name())))
            .finish()
    }
}

impl Feature for LinearCost {
    fn name(&self) -> &'static str {
        "LinearCost"
    }

    fn value(&self, input: &FeatureInput) -> Result<f64> {
        input.validate()?;
        let mut cost = 0.0;
        for (weight, feature) in &self.terms {
            let value = feature.value(input)?;
            trace!(feature = feature.name(), value, "term value");
            cost += weight * value;
        }
        Ok(cost)
    }

    fn gradient(&self, input: &FeatureInput) -> Result<DVector<f64>> {
        input.validate()?;
        let n = input.u.len();
        let mut grad = DVector::zeros(n);
        for (weight, feature) in &self.terms {
            let term = feature.gradient(input)?;
            if term.len() != n {
                return Err(FeatureError::shape(
                    format!("gradient length of {}", feature.name()),
                    n,
                    term.len(),
                ));
            }
            grad += term * *weight;
        }
        Ok(grad)
    }

    fn hessian(&self, input: &FeatureInput) -> Result<DMatrix<f64>> {
        input.validate()?;
        let n = input.u.len();
        let mut hess = DMatrix::zeros(n, n);
        for (weight, feature) in &self.terms {
            let term = feature.hessian(input)?;
            if term.shape() != (n, n) {
                let actual = if term.nrows() != n { term.nrows() } else { term.ncols() };
                return Err(FeatureError::shape(
                    format!("hessian side of {}", feature.name()),
                    n,
                    actual,
                ));
            }
            hess += term * *weight;
        }
        Ok(hess)
    }
}
