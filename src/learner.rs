use crate::data::{Matrix, OutputMatrix};
use crate::errors::BoostError;
use crate::executor::Executor;
use crate::gradient::GradientPairs;
use crate::krr::KernelRidge;
use crate::linear::Linear;
use crate::tree::Tree;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deepest tree that can be allocated, the arrays hold `2^(max_depth + 1)` nodes.
pub const MAX_TREE_DEPTH: usize = 24;

/// The operations every weak learner of an ensemble supports.
pub trait BaseLearner {
    /// Train from scratch on the gradients of the current ensemble.
    fn fit(&mut self, data: &Matrix<f64>, gradients: &GradientPairs, rng: &mut StdRng, executor: &Executor);
    /// Adapt to new gradients, returning the learner's new prediction for `data`.
    fn update(&mut self, data: &Matrix<f64>, gradients: &GradientPairs, executor: &Executor) -> OutputMatrix;
    fn predict(&self, data: &Matrix<f64>, executor: &Executor) -> OutputMatrix;
    /// Zero the learned parameters, keeping any learned structure.
    fn clear(&mut self);
}

/// The weak learners an ensemble can be built from. Configured values of
/// this type act as prototypes, every boosting round fits a fresh clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BaseModel {
    Tree(Tree),
    Linear(Linear),
    KernelRidge(KernelRidge),
}

impl BaseModel {
    /// A depth-limited tree.
    pub fn tree(max_depth: usize) -> Self {
        BaseModel::Tree(Tree::new(max_depth))
    }

    pub fn linear() -> Self {
        BaseModel::Linear(Linear::default())
    }

    pub fn kernel_ridge(n_components: usize) -> Self {
        BaseModel::KernelRidge(KernelRidge::new(n_components))
    }

    /// Check the hyperparameters of the learner.
    pub fn validate(&self) -> Result<(), BoostError> {
        match self {
            BaseModel::Tree(t) => {
                if t.max_depth > MAX_TREE_DEPTH {
                    return Err(BoostError::InvalidParameter(
                        "max_depth".to_string(),
                        format!("at most {}", MAX_TREE_DEPTH),
                        t.max_depth.to_string(),
                    ));
                }
            }
            BaseModel::Linear(l) => validate_alpha(l.alpha)?,
            BaseModel::KernelRidge(k) => {
                validate_alpha(k.alpha)?;
                if k.n_components == 0 {
                    return Err(BoostError::InvalidParameter(
                        "n_components".to_string(),
                        "at least 1".to_string(),
                        k.n_components.to_string(),
                    ));
                }
                if let Some(s) = k.sigma {
                    if !(s > 0.0 && s.is_finite()) {
                        return Err(BoostError::InvalidParameter(
                            "sigma".to_string(),
                            "positive and finite".to_string(),
                            s.to_string(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn validate_alpha(alpha: f64) -> Result<(), BoostError> {
    if alpha >= 0.0 && alpha.is_finite() {
        Ok(())
    } else {
        Err(BoostError::InvalidParameter(
            "alpha".to_string(),
            "non-negative and finite".to_string(),
            alpha.to_string(),
        ))
    }
}

impl BaseLearner for BaseModel {
    fn fit(&mut self, data: &Matrix<f64>, gradients: &GradientPairs, rng: &mut StdRng, executor: &Executor) {
        match self {
            BaseModel::Tree(t) => t.fit(data, gradients, rng, executor),
            BaseModel::Linear(l) => l.fit(data, gradients, executor),
            BaseModel::KernelRidge(k) => k.fit(data, gradients, rng, executor),
        }
    }

    fn update(&mut self, data: &Matrix<f64>, gradients: &GradientPairs, executor: &Executor) -> OutputMatrix {
        match self {
            BaseModel::Tree(t) => t.update(data, gradients, executor),
            BaseModel::Linear(l) => l.update(data, gradients, executor),
            BaseModel::KernelRidge(k) => k.update(data, gradients, executor),
        }
    }

    fn predict(&self, data: &Matrix<f64>, executor: &Executor) -> OutputMatrix {
        match self {
            BaseModel::Tree(t) => t.predict(data, executor),
            BaseModel::Linear(l) => l.predict(data, executor),
            BaseModel::KernelRidge(k) => k.predict(data, executor),
        }
    }

    fn clear(&mut self) {
        match self {
            BaseModel::Tree(t) => t.clear(),
            BaseModel::Linear(l) => l.clear(),
            BaseModel::KernelRidge(k) => k.clear(),
        }
    }
}

impl fmt::Display for BaseModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BaseModel::Tree(t) => write!(f, "{}", t),
            BaseModel::Linear(l) => write!(f, "{}", l),
            BaseModel::KernelRidge(k) => write!(f, "{}", k),
        }
    }
}
