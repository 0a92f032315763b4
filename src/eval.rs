use crate::data::Matrix;
use crate::errors::BoostError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A held out dataset the booster reports metrics on while training.
/// Without weights every row counts once.
pub struct EvalSet<'a> {
    pub data: Matrix<'a, f64>,
    pub y: Matrix<'a, f64>,
    pub sample_weight: Option<&'a [f64]>,
}

impl<'a> EvalSet<'a> {
    pub fn new(data: Matrix<'a, f64>, y: Matrix<'a, f64>, sample_weight: Option<&'a [f64]>) -> Self {
        EvalSet { data, y, sample_weight }
    }

    /// Check the set lines up with itself and with the training data.
    pub fn validate(&self, index: usize, n_features: usize, label_cols: usize) -> Result<(), BoostError> {
        if self.data.rows != self.y.rows {
            return Err(BoostError::InvalidEvalSet(
                index,
                format!("X has {} rows but y has {}.", self.data.rows, self.y.rows),
            ));
        }
        if let Some(w) = self.sample_weight {
            if w.len() != self.data.rows {
                return Err(BoostError::InvalidEvalSet(
                    index,
                    format!("X has {} rows but sample_weight has {}.", self.data.rows, w.len()),
                ));
            }
        }
        if self.y.cols != label_cols {
            return Err(BoostError::InvalidEvalSet(
                index,
                format!("y has {} columns, the training labels have {}.", self.y.cols, label_cols),
            ));
        }
        if self.data.cols != n_features {
            return Err(BoostError::FeatureMismatch(self.data.cols, n_features));
        }
        Ok(())
    }

    pub fn weights(&self) -> Vec<f64> {
        match self.sample_weight {
            Some(w) => w.to_vec(),
            None => vec![1.0; self.data.rows],
        }
    }
}

/// Name of a dataset in an eval result, `"train"` or `"eval-{i}"`.
pub fn set_name(eval_index: Option<usize>) -> String {
    match eval_index {
        None => "train".to_string(),
        Some(i) => format!("eval-{}", i),
    }
}

/// Per round metric values, keyed by dataset name then metric name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalResult(pub BTreeMap<String, BTreeMap<String, Vec<f64>>>);

impl EvalResult {
    pub fn new() -> Self {
        EvalResult(BTreeMap::new())
    }

    /// Append the value of one round.
    pub fn record(&mut self, set: &str, metric: &str, value: f64) {
        self.0
            .entry(set.to_string())
            .or_default()
            .entry(metric.to_string())
            .or_default()
            .push(value);
    }

    pub fn get(&self, set: &str, metric: &str) -> Option<&[f64]> {
        self.0.get(set).and_then(|m| m.get(metric)).map(|v| v.as_slice())
    }

    /// Most recent value of every recorded series, in key order.
    pub fn latest(&self) -> Vec<(String, String, f64)> {
        let mut out = Vec::new();
        for (set, metrics) in self.0.iter() {
            for (metric, values) in metrics.iter() {
                if let Some(v) = values.last() {
                    out.push((set.clone(), metric.clone(), *v));
                }
            }
        }
        out
    }

    pub fn to_json(&self) -> Result<String, BoostError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, BoostError> {
        Ok(serde_json::from_str(json)?)
    }
}
