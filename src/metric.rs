use crate::data::{Matrix, OutputMatrix};
use crate::errors::BoostError;
use crate::utils::items_to_strings;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

const PROB_EPS: f64 = 1e-15;

/// An evaluation metric, computed on the *transformed* prediction.
pub trait MetricFunction: Send + Sync {
    fn metric(&self, y: &Matrix<f64>, pred: &OutputMatrix, sample_weight: &[f64]) -> f64;
    /// The key this metric is recorded under in an eval result.
    fn name(&self) -> String;
}

#[derive(Deserialize, Serialize, Clone)]
pub enum Metric {
    #[serde(rename = "mse")]
    MeanSquaredError,
    #[serde(rename = "rmse")]
    RootMeanSquaredError,
    #[serde(rename = "log_loss")]
    LogLoss,
    #[serde(rename = "auc")]
    AUC,
    #[serde(skip)]
    Custom(Arc<dyn MetricFunction>),
}

impl Metric {
    pub fn new_custom<T>(metric: T) -> Self
    where
        T: MetricFunction + 'static,
    {
        Metric::Custom(Arc::new(metric))
    }
}

impl FromStr for Metric {
    type Err = BoostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mse" => Ok(Metric::MeanSquaredError),
            "rmse" => Ok(Metric::RootMeanSquaredError),
            "log_loss" => Ok(Metric::LogLoss),
            "auc" => Ok(Metric::AUC),
            _ => Err(BoostError::ParseString(
                s.to_string(),
                "Metric".to_string(),
                items_to_strings(vec!["mse", "rmse", "log_loss", "auc"]),
            )),
        }
    }
}

impl MetricFunction for Metric {
    fn metric(&self, y: &Matrix<f64>, pred: &OutputMatrix, sample_weight: &[f64]) -> f64 {
        match self {
            Metric::MeanSquaredError => mean_squared_error(y, pred, sample_weight),
            Metric::RootMeanSquaredError => mean_squared_error(y, pred, sample_weight).sqrt(),
            Metric::LogLoss => log_loss(y, pred, sample_weight),
            Metric::AUC => {
                if pred.cols != 1 {
                    return f64::NAN;
                }
                auc(y.get_col(0), &pred.data, sample_weight)
            }
            Metric::Custom(arc) => arc.metric(y, pred, sample_weight),
        }
    }

    fn name(&self) -> String {
        match self {
            Metric::MeanSquaredError => "mse".to_string(),
            Metric::RootMeanSquaredError => "rmse".to_string(),
            Metric::LogLoss => "log_loss".to_string(),
            Metric::AUC => "auc".to_string(),
            Metric::Custom(arc) => arc.name(),
        }
    }
}

/// Weighted mean over rows of the mean squared error over outputs.
pub fn mean_squared_error(y: &Matrix<f64>, pred: &OutputMatrix, sample_weight: &[f64]) -> f64 {
    assert_eq!((y.rows, y.cols), pred.shape());
    let mut w_sum = 0.;
    let res = sample_weight
        .iter()
        .enumerate()
        .map(|(i, w_)| {
            w_sum += *w_;
            let row_err = pred
                .row(i)
                .iter()
                .enumerate()
                .map(|(j, p_)| (*y.get(i, j) - *p_).powi(2))
                .sum::<f64>();
            row_err / (pred.cols as f64) * *w_
        })
        .sum::<f64>();
    res / w_sum
}

/// Weighted average negative log likelihood. A single output column holds
/// the probability of the positive class, otherwise there is one
/// probability column per class.
pub fn log_loss(y: &Matrix<f64>, pred: &OutputMatrix, sample_weight: &[f64]) -> f64 {
    let labels = y.get_col(0);
    let mut w_sum = 0.;
    let res = labels
        .iter()
        .zip(sample_weight)
        .enumerate()
        .map(|(i, (y_, w_))| {
            w_sum += *w_;
            if pred.cols == 1 {
                let p = pred.get(i, 0).clamp(PROB_EPS, 1.0 - PROB_EPS);
                -(*y_ * p.ln() + (1.0 - *y_) * (1.0 - p).ln()) * *w_
            } else {
                let p = pred.get(i, *y_ as usize).clamp(PROB_EPS, 1.0 - PROB_EPS);
                -p.ln() * *w_
            }
        })
        .sum::<f64>();
    res / w_sum
}

fn trapezoid_area(x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    (x0 - x1).abs() * (y0 + y1) * 0.5
}

pub fn auc(y: &[f64], yhat: &[f64], sample_weight: &[f64]) -> f64 {
    let mut indices = (0..y.len()).collect::<Vec<_>>();
    indices.sort_unstable_by(|&a, &b| yhat[b].total_cmp(&yhat[a]));
    let mut auc: f64 = 0.0;

    let mut label = y[indices[0]];
    let mut w = sample_weight[indices[0]];
    let mut fp = (1.0 - label) * w;
    let mut tp: f64 = label * w;
    let mut tp_prev: f64 = 0.0;
    let mut fp_prev: f64 = 0.0;

    for i in 1..indices.len() {
        if yhat[indices[i]] != yhat[indices[i - 1]] {
            auc += trapezoid_area(fp_prev, fp, tp_prev, tp);
            tp_prev = tp;
            fp_prev = fp;
        }
        label = y[indices[i]];
        w = sample_weight[indices[i]];
        fp += (1.0 - label) * w;
        tp += label * w;
    }

    auc += trapezoid_area(fp_prev, fp, tp_prev, tp);
    if fp <= 0.0 || tp <= 0.0 {
        auc = 0.0;
        fp = 0.0;
        tp = 0.0;
    }

    auc / (tp * fp)
}
