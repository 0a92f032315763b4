use crate::data::{Matrix, OutputMatrix};
use crate::errors::BoostError;
use crate::metric::Metric;
use crate::utils::{items_to_strings, weighted_mean};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Probabilities are kept this far away from 0 and 1.
const PROB_EPS: f64 = 1e-15;

/// A loss to be minimised by the booster.
///
/// `y` is always the caller's label matrix, one row per sample. The
/// prediction matrices have one column per model output, which is the
/// length of the vector returned by `initialise_prediction`.
pub trait ObjectiveFunction: Send + Sync {
    /// Gradient and hessian of the loss, given the *transformed* prediction.
    fn gradient(&self, y: &Matrix<f64>, pred: &OutputMatrix) -> (OutputMatrix, OutputMatrix);
    /// Map a raw additive prediction onto the output space of the loss.
    fn transform(&self, pred: &OutputMatrix) -> OutputMatrix;
    /// The constant prediction the model starts from. With `use_average` false
    /// this is all zeros, otherwise the constant minimising the loss.
    fn initialise_prediction(
        &self,
        y: &Matrix<f64>,
        sample_weight: &[f64],
        use_average: bool,
    ) -> Vec<f64>;
    /// The constant prediction for a model that already has `n_outputs`
    /// outputs, whatever the labels in `y` alone would imply. The caller
    /// checks the length of the result.
    fn initialise_prediction_for(
        &self,
        y: &Matrix<f64>,
        sample_weight: &[f64],
        use_average: bool,
        _n_outputs: usize,
    ) -> Vec<f64> {
        self.initialise_prediction(y, sample_weight, use_average)
    }
    fn default_metric(&self) -> Metric;
    /// Check that the labels are usable with this loss.
    fn validate_labels(&self, _y: &Matrix<f64>) -> Result<(), BoostError> {
        Ok(())
    }
    /// Check that the labels fit a model with `n_outputs` outputs.
    fn validate_label_range(&self, _y: &Matrix<f64>, _n_outputs: usize) -> Result<(), BoostError> {
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub enum Objective {
    #[serde(rename = "squared_error")]
    SquaredLoss,
    #[serde(rename = "log_loss")]
    LogLoss,
    #[serde(skip)]
    Custom(Arc<dyn ObjectiveFunction>),
}

impl Objective {
    pub fn new_custom<T>(objective: T) -> Self
    where
        T: ObjectiveFunction + 'static,
    {
        Objective::Custom(Arc::new(objective))
    }
}

impl Default for Objective {
    fn default() -> Self {
        Objective::SquaredLoss
    }
}

impl FromStr for Objective {
    type Err = BoostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "squared_error" => Ok(Objective::SquaredLoss),
            "log_loss" => Ok(Objective::LogLoss),
            _ => Err(BoostError::ParseString(
                s.to_string(),
                "Objective".to_string(),
                items_to_strings(vec!["squared_error", "log_loss"]),
            )),
        }
    }
}

impl ObjectiveFunction for Objective {
    fn gradient(&self, y: &Matrix<f64>, pred: &OutputMatrix) -> (OutputMatrix, OutputMatrix) {
        match self {
            Objective::SquaredLoss => SquaredLoss::default().gradient(y, pred),
            Objective::LogLoss => LogLoss::default().gradient(y, pred),
            Objective::Custom(arc) => arc.gradient(y, pred),
        }
    }

    fn transform(&self, pred: &OutputMatrix) -> OutputMatrix {
        match self {
            Objective::SquaredLoss => SquaredLoss::default().transform(pred),
            Objective::LogLoss => LogLoss::default().transform(pred),
            Objective::Custom(arc) => arc.transform(pred),
        }
    }

    fn initialise_prediction(
        &self,
        y: &Matrix<f64>,
        sample_weight: &[f64],
        use_average: bool,
    ) -> Vec<f64> {
        match self {
            Objective::SquaredLoss => {
                SquaredLoss::default().initialise_prediction(y, sample_weight, use_average)
            }
            Objective::LogLoss => {
                LogLoss::default().initialise_prediction(y, sample_weight, use_average)
            }
            Objective::Custom(arc) => arc.initialise_prediction(y, sample_weight, use_average),
        }
    }

    fn initialise_prediction_for(
        &self,
        y: &Matrix<f64>,
        sample_weight: &[f64],
        use_average: bool,
        n_outputs: usize,
    ) -> Vec<f64> {
        match self {
            Objective::SquaredLoss => SquaredLoss::default().initialise_prediction_for(
                y,
                sample_weight,
                use_average,
                n_outputs,
            ),
            Objective::LogLoss => {
                LogLoss::default().initialise_prediction_for(y, sample_weight, use_average, n_outputs)
            }
            Objective::Custom(arc) => {
                arc.initialise_prediction_for(y, sample_weight, use_average, n_outputs)
            }
        }
    }

    fn default_metric(&self) -> Metric {
        match self {
            Objective::SquaredLoss => SquaredLoss::default().default_metric(),
            Objective::LogLoss => LogLoss::default().default_metric(),
            Objective::Custom(arc) => arc.default_metric(),
        }
    }

    fn validate_labels(&self, y: &Matrix<f64>) -> Result<(), BoostError> {
        match self {
            Objective::SquaredLoss => SquaredLoss::default().validate_labels(y),
            Objective::LogLoss => LogLoss::default().validate_labels(y),
            Objective::Custom(arc) => arc.validate_labels(y),
        }
    }

    fn validate_label_range(&self, y: &Matrix<f64>, n_outputs: usize) -> Result<(), BoostError> {
        match self {
            Objective::SquaredLoss => SquaredLoss::default().validate_label_range(y, n_outputs),
            Objective::LogLoss => LogLoss::default().validate_label_range(y, n_outputs),
            Objective::Custom(arc) => arc.validate_label_range(y, n_outputs),
        }
    }
}

/// Squared Error loss, one model output per label column.
#[derive(Default, Debug, Clone)]
pub struct SquaredLoss {}

impl ObjectiveFunction for SquaredLoss {
    fn gradient(&self, y: &Matrix<f64>, pred: &OutputMatrix) -> (OutputMatrix, OutputMatrix) {
        assert_eq!((y.rows, y.cols), pred.shape());
        let mut g = OutputMatrix::zeros(pred.rows, pred.cols);
        for i in 0..pred.rows {
            let g_row = g.row_mut(i);
            for (j, g_) in g_row.iter_mut().enumerate() {
                *g_ = pred.get(i, j) - *y.get(i, j);
            }
        }
        let h = OutputMatrix::new(vec![1.0; pred.rows * pred.cols], pred.rows, pred.cols);
        (g, h)
    }

    fn transform(&self, pred: &OutputMatrix) -> OutputMatrix {
        pred.clone()
    }

    fn initialise_prediction(
        &self,
        y: &Matrix<f64>,
        sample_weight: &[f64],
        use_average: bool,
    ) -> Vec<f64> {
        if !use_average {
            return vec![0.0; y.cols];
        }
        (0..y.cols)
            .map(|j| weighted_mean(y.get_col(j), sample_weight))
            .collect()
    }

    fn default_metric(&self) -> Metric {
        Metric::MeanSquaredError
    }
}

/// Logistic loss. Binary labels use a single output with a sigmoid
/// transform, more than two classes use one output per class with a
/// softmax transform.
#[derive(Default, Debug, Clone)]
pub struct LogLoss {}

impl LogLoss {
    fn n_classes(y: &Matrix<f64>) -> usize {
        let max_label = y.get_col(0).iter().copied().fold(0.0, f64::max);
        (max_label as usize) + 1
    }

    fn n_outputs(y: &Matrix<f64>) -> usize {
        match LogLoss::n_classes(y) {
            0..=2 => 1,
            k => k,
        }
    }
}

impl ObjectiveFunction for LogLoss {
    fn gradient(&self, y: &Matrix<f64>, pred: &OutputMatrix) -> (OutputMatrix, OutputMatrix) {
        assert_eq!(y.rows, pred.rows);
        let mut g = OutputMatrix::zeros(pred.rows, pred.cols);
        let mut h = OutputMatrix::zeros(pred.rows, pred.cols);
        let labels = y.get_col(0);
        for i in 0..pred.rows {
            for j in 0..pred.cols {
                let p = pred.get(i, j);
                let target = if pred.cols == 1 {
                    labels[i]
                } else if labels[i] as usize == j {
                    1.0
                } else {
                    0.0
                };
                g.row_mut(i)[j] = p - target;
                h.row_mut(i)[j] = (p * (1.0 - p)).max(PROB_EPS);
            }
        }
        (g, h)
    }

    fn transform(&self, pred: &OutputMatrix) -> OutputMatrix {
        let mut out = pred.clone();
        if pred.cols == 1 {
            out.data
                .iter_mut()
                .for_each(|v| *v = 1.0 / (1.0 + (-*v).exp()));
        } else {
            for i in 0..out.rows {
                let row = out.row_mut(i);
                let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mut total = 0.0;
                row.iter_mut().for_each(|v| {
                    *v = (*v - max).exp();
                    total += *v;
                });
                row.iter_mut().for_each(|v| *v /= total);
            }
        }
        out
    }

    fn initialise_prediction(
        &self,
        y: &Matrix<f64>,
        sample_weight: &[f64],
        use_average: bool,
    ) -> Vec<f64> {
        self.initialise_prediction_for(y, sample_weight, use_average, LogLoss::n_outputs(y))
    }

    /// Classes missing from `y` get the clipped floor probability.
    fn initialise_prediction_for(
        &self,
        y: &Matrix<f64>,
        sample_weight: &[f64],
        use_average: bool,
        n_outputs: usize,
    ) -> Vec<f64> {
        if !use_average {
            return vec![0.0; n_outputs];
        }
        let labels = y.get_col(0);
        let w_sum: f64 = sample_weight.iter().sum();
        if n_outputs == 1 {
            let p = (weighted_mean(labels, sample_weight)).clamp(PROB_EPS, 1.0 - PROB_EPS);
            return vec![(p / (1.0 - p)).ln()];
        }
        let mut freq = vec![0.0; n_outputs];
        labels
            .iter()
            .zip(sample_weight)
            .for_each(|(y_, w_)| freq[*y_ as usize] += *w_);
        freq.iter()
            .map(|f| (f / w_sum).clamp(PROB_EPS, 1.0 - PROB_EPS).ln())
            .collect()
    }

    fn default_metric(&self) -> Metric {
        Metric::LogLoss
    }

    fn validate_labels(&self, y: &Matrix<f64>) -> Result<(), BoostError> {
        if y.rows * y.cols <= 1 {
            return Err(BoostError::TooFewSamples(y.rows * y.cols));
        }
        if y.cols != 1 {
            return Err(BoostError::InvalidLabels(format!(
                "expected a single column of class labels, found {} columns",
                y.cols
            )));
        }
        if let Some(bad) = y
            .get_col(0)
            .iter()
            .find(|v| !v.is_finite() || **v < 0.0 || v.floor() != **v)
        {
            return Err(BoostError::InvalidLabels(format!(
                "class labels must be non-negative whole numbers, found {}",
                bad
            )));
        }
        Ok(())
    }

    fn validate_label_range(&self, y: &Matrix<f64>, n_outputs: usize) -> Result<(), BoostError> {
        // A single output is the binary case.
        let n_classes = if n_outputs == 1 { 2 } else { n_outputs };
        match y.get_col(0).iter().find(|v| **v >= n_classes as f64) {
            Some(bad) => Err(BoostError::InvalidLabels(format!(
                "class label {} is out of range for a model with {} classes",
                bad, n_classes
            ))),
            None => Ok(()),
        }
    }
}
