//! Booster configuration.
//!
//! Every parameter of a booster, serializable to and from JSON. Custom
//! objectives and metrics are code rather than data, so they are skipped.
use crate::errors::BoostError;
use crate::learner::BaseModel;
use crate::metric::Metric;
use crate::objective::Objective;
use crate::utils::items_to_strings;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the constant base prediction of an ensemble is chosen.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum InitPolicy {
    /// The constant prediction minimising the loss on the training data.
    #[default]
    #[serde(rename = "average")]
    Average,
    #[serde(rename = "zero")]
    Zero,
}

impl FromStr for InitPolicy {
    type Err = BoostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "average" => Ok(InitPolicy::Average),
            "zero" => Ok(InitPolicy::Zero),
            _ => Err(BoostError::ParseString(
                s.to_string(),
                "InitPolicy".to_string(),
                items_to_strings(vec!["average", "zero"]),
            )),
        }
    }
}

fn default_n_estimators() -> usize {
    100
}
fn default_learning_rate() -> f64 {
    0.1
}
fn default_base_models() -> Vec<BaseModel> {
    vec![BaseModel::tree(3)]
}
fn default_seed() -> u64 {
    0
}
fn default_log_iterations() -> usize {
    0
}

#[derive(Serialize, Deserialize, Clone)]
pub struct BoosterConfig {
    #[serde(default)]
    pub objective: Objective,
    /// Metrics recorded every round, `None` means the objective's default metric.
    #[serde(default)]
    pub metrics: Option<Vec<Metric>>,
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default)]
    pub init: InitPolicy,
    /// Learner prototypes, round `i` fits a clone of `base_models[i % len]`.
    #[serde(default = "default_base_models")]
    pub base_models: Vec<BaseModel>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Worker threads, `None` uses as many as rayon's global pool.
    #[serde(default)]
    pub num_threads: Option<usize>,
    /// Log the metrics every this many rounds, 0 to disable.
    #[serde(default = "default_log_iterations")]
    pub log_iterations: usize,
}

impl Default for BoosterConfig {
    fn default() -> Self {
        BoosterConfig {
            objective: Objective::default(),
            metrics: None,
            n_estimators: default_n_estimators(),
            learning_rate: default_learning_rate(),
            init: InitPolicy::default(),
            base_models: default_base_models(),
            seed: default_seed(),
            num_threads: None,
            log_iterations: default_log_iterations(),
        }
    }
}

impl BoosterConfig {
    pub fn from_json(json: &str) -> Result<Self, BoostError> {
        let config: BoosterConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, BoostError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), BoostError> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(BoostError::InvalidParameter(
                "learning_rate".to_string(),
                "positive and finite".to_string(),
                self.learning_rate.to_string(),
            ));
        }
        if self.base_models.is_empty() {
            return Err(BoostError::InvalidParameter(
                "base_models".to_string(),
                "at least one model".to_string(),
                "none".to_string(),
            ));
        }
        if let Some(0) = self.num_threads {
            return Err(BoostError::InvalidParameter(
                "num_threads".to_string(),
                "at least 1".to_string(),
                "0".to_string(),
            ));
        }
        for model in self.base_models.iter() {
            model.validate()?;
        }
        Ok(())
    }
}
