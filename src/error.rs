//! Error types for feature evaluation.

use thiserror::Error;

/// Errors raised while evaluating cost features or building them from config.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// Trajectory, goal or Jacobian dimensions disagree.
    #[error("invalid trajectory shape ({context}): expected {expected}, got {actual}")]
    InvalidTrajectoryShape {
        /// Which dimension was checked.
        context: String,
        /// Expected size.
        expected: usize,
        /// Actual size.
        actual: usize,
    },

    /// A distance reached zero where the feature's derivatives are undefined.
    #[error("singular distance {distance:e} at timestep {timestep}, agent {agent}")]
    SingularDistance {
        /// Timestep of the offending distance.
        timestep: usize,
        /// Agent index within the trajectory.
        agent: usize,
        /// The distance itself.
        distance: f64,
    },

    /// A state-space feature was evaluated without a dynamics Jacobian.
    #[error("feature `{feature}` needs a dynamics jacobian to lift into control space")]
    MissingJacobian {
        /// Name of the feature.
        feature: &'static str,
    },

    /// Configuration could not be turned into features.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FeatureError {
    /// Creates a shape mismatch error.
    #[must_use]
    pub fn shape(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::InvalidTrajectoryShape {
            context: context.into(),
            expected,
            actual,
        }
    }
}

pub type Result<T> = std::result::Result<T, FeatureError>;
