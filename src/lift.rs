//! # Chain Rule Through the Dynamics
//!
//! Maps state-space derivatives into control space with the trajectory
//! Jacobian `J = dx/du`:
//!
//! - `grad_u = Jᵗ·grad_x`
//! - `hess_u = Jᵗ·hess_x·J`
//!
//! The second term of the full chain rule, `Σ grad_x_i·∂²x_i/∂u²`, vanishes
//! for the linear dynamics the planner runs on and is not included.
//!
//! State Hessians of per-(timestep, agent) costs are block diagonal; keeping
//! them as [`BlockDiagonal`] makes the lift linear in the horizon.

use nalgebra::{DMatrix, DVector};

use crate::error::{FeatureError, Result};

/// `Jᵗ·grad_x`.
pub fn lift_gradient(jacobian: &DMatrix<f64>, grad_x: &DVector<f64>) -> Result<DVector<f64>> {
    if jacobian.nrows() != grad_x.len() {
        return Err(FeatureError::shape("jacobian rows vs state gradient", grad_x.len(), jacobian.nrows()));
    }
    Ok(jacobian.tr_mul(grad_x))
}

/// `Jᵗ·hess_x·J` for a dense state Hessian.
pub fn lift_hessian(jacobian: &DMatrix<f64>, hess_x: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if !hess_x.is_square() || hess_x.nrows() != jacobian.nrows() {
        return Err(FeatureError::shape("jacobian rows vs state hessian", hess_x.nrows(), jacobian.nrows()));
    }
    Ok(jacobian.tr_mul(hess_x) * jacobian)
}

/// Square matrix made of equally sized blocks on its diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDiagonal {
    block_dim: usize,
    blocks: Vec<DMatrix<f64>>,
}

impl BlockDiagonal {
    pub fn new(block_dim: usize) -> Self {
        BlockDiagonal {
            block_dim,
            blocks: Vec::new(),
        }
    }

    pub fn with_capacity(block_dim: usize, n_blocks: usize) -> Self {
        BlockDiagonal {
            block_dim,
            blocks: Vec::with_capacity(n_blocks),
        }
    }

    /// Appends the next diagonal block.
    pub fn push(&mut self, block: DMatrix<f64>) -> Result<()> {
        if block.nrows() != self.block_dim {
            return Err(FeatureError::shape("hessian block rows", self.block_dim, block.nrows()));
        }
        if block.ncols() != self.block_dim {
            return Err(FeatureError::shape("hessian block columns", self.block_dim, block.ncols()));
        }
        self.blocks.push(block);
        Ok(())
    }

    pub fn block_dim(&self) -> usize {
        self.block_dim
    }

    pub fn blocks(&self) -> &[DMatrix<f64>] {
        &self.blocks
    }

    /// Side length of the full matrix.
    pub fn dim(&self) -> usize {
        self.block_dim * self.blocks.len()
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let k = self.block_dim;
        let mut dense = DMatrix::zeros(self.dim(), self.dim());
        for (b, block) in self.blocks.iter().enumerate() {
            dense.view_mut((b * k, b * k), (k, k)).copy_from(block);
        }
        dense
    }

    /// `Jᵗ·H·J` accumulated block by block, touching only the rows of `J`
    /// each block covers.
    pub fn lift(&self, jacobian: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if jacobian.nrows() != self.dim() {
            return Err(FeatureError::shape("jacobian rows vs state hessian", self.dim(), jacobian.nrows()));
        }

        let k = self.block_dim;
        let mut lifted = DMatrix::zeros(jacobian.ncols(), jacobian.ncols());
        for (b, block) in self.blocks.iter().enumerate() {
            let rows = jacobian.rows(b * k, k);
            lifted += rows.tr_mul(block) * rows;
        }
        Ok(lifted)
    }
}
