use crate::config::{BoosterConfig, InitPolicy};
use crate::data::{Matrix, OutputMatrix};
use crate::errors::BoostError;
use crate::eval::{set_name, EvalResult, EvalSet};
use crate::executor::Executor;
use crate::gradient::weighted_gradient;
use crate::learner::{BaseLearner, BaseModel};
use crate::metric::{Metric, MetricFunction};
use crate::objective::{Objective, ObjectiveFunction};
use crate::utils::format_vector;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Instant;

/// Gradient boosted ensemble.
///
/// The prediction of the ensemble is `init + sum(model.predict(X))` over its
/// models in order, passed through the objective's transform. Every
/// operation that fails leaves the booster exactly as it was.
pub struct GradientBooster {
    pub cfg: BoosterConfig,
    /// Constant base prediction, one value per output.
    pub init: Vec<f64>,
    /// Total sample weight of all the data the ensemble has been fitted
    /// or updated on.
    pub sum_model_weights: f64,
    pub models: Vec<BaseModel>,
    /// Number of features seen in fit, `None` until fitted.
    pub n_features: Option<usize>,
    rng: StdRng,
    executor: Option<Arc<Executor>>,
}

impl Default for GradientBooster {
    fn default() -> Self {
        GradientBooster::new(BoosterConfig::default())
    }
}

impl GradientBooster {
    pub fn new(cfg: BoosterConfig) -> Self {
        let rng = StdRng::seed_from_u64(cfg.seed);
        GradientBooster {
            cfg,
            init: Vec::new(),
            sum_model_weights: 0.0,
            models: Vec::new(),
            n_features: None,
            rng,
            executor: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features.is_some()
    }

    /// The metrics recorded every round.
    pub fn metrics(&self) -> Vec<Metric> {
        match &self.cfg.metrics {
            Some(m) => m.clone(),
            None => vec![self.cfg.objective.default_metric()],
        }
    }

    /// The executor sized to the configured thread count, creating it
    /// if there is none or the setting has changed.
    fn executor(&mut self) -> Result<Arc<Executor>, BoostError> {
        let wanted = self
            .cfg
            .num_threads
            .unwrap_or_else(rayon::current_num_threads)
            .max(1);
        match &self.executor {
            Some(e) if e.available_workers() == wanted => Ok(Arc::clone(e)),
            _ => {
                let e = Arc::new(Executor::new(Some(wanted))?);
                self.executor = Some(Arc::clone(&e));
                Ok(e)
            }
        }
    }

    /// Validate training data, returning the sample weights to use and the
    /// number of model outputs. A fitted model passes its own output count,
    /// which every label set must fit; otherwise it is derived from `y`.
    fn check_data(
        &self,
        data: &Matrix<f64>,
        y: &Matrix<f64>,
        sample_weight: Option<&[f64]>,
        eval_sets: &[EvalSet],
        n_outputs: Option<usize>,
    ) -> Result<(Vec<f64>, usize), BoostError> {
        if data.rows != y.rows {
            return Err(BoostError::ShapeMismatch(
                "the rows of y".to_string(),
                data.rows,
                y.rows,
            ));
        }
        if data.rows == 0 {
            return Err(BoostError::TooFewSamples(0));
        }
        let w = match sample_weight {
            Some(w) if w.len() != data.rows => {
                return Err(BoostError::ShapeMismatch(
                    "the length of sample_weight".to_string(),
                    data.rows,
                    w.len(),
                ))
            }
            Some(w) => w.to_vec(),
            None => vec![1.0; data.rows],
        };
        let objective = &self.cfg.objective;
        objective.validate_labels(y)?;
        let n_outputs = match n_outputs {
            Some(n) => {
                objective.validate_label_range(y, n)?;
                n
            }
            None => objective.initialise_prediction(y, &w, false).len(),
        };
        for (i, e) in eval_sets.iter().enumerate() {
            e.validate(i, data.cols, y.cols)?;
            objective
                .validate_labels(&e.y)
                .and_then(|_| objective.validate_label_range(&e.y, n_outputs))
                .map_err(|err| BoostError::InvalidEvalSet(i, err.to_string()))?;
        }
        Ok((w, n_outputs))
    }

    /// A fitted ensemble can only take more data with the same features
    /// and the same number of outputs.
    fn check_fitted_shape(&self, data: &Matrix<f64>, n_outputs: usize) -> Result<(), BoostError> {
        if let Some(n) = self.n_features {
            if data.cols != n {
                return Err(BoostError::FeatureMismatch(data.cols, n));
            }
        }
        if n_outputs != self.init.len() {
            return Err(BoostError::ShapeMismatch(
                "the number of outputs".to_string(),
                self.init.len(),
                n_outputs,
            ));
        }
        Ok(())
    }

    /// Fit the ensemble from scratch, replacing any existing models.
    ///
    /// * `data` - Features, one row per sample.
    /// * `y` - Labels, one row per sample.
    /// * `sample_weight` - Weight of every sample, all ones if `None`.
    /// * `eval_sets` - Datasets to record metrics on every round.
    pub fn fit(
        &mut self,
        data: &Matrix<f64>,
        y: &Matrix<f64>,
        sample_weight: Option<&[f64]>,
        eval_sets: &[EvalSet],
    ) -> Result<EvalResult, BoostError> {
        self.cfg.validate()?;
        let (w, _) = self.check_data(data, y, sample_weight, eval_sets, None)?;
        let executor = self.executor()?;

        let use_average = self.cfg.init == InitPolicy::Average;
        self.init = self.cfg.objective.initialise_prediction(y, &w, use_average);
        self.sum_model_weights = w.iter().sum();
        self.models = Vec::new();
        self.n_features = Some(data.cols);
        self.rng = StdRng::seed_from_u64(self.cfg.seed);

        let pred = OutputMatrix::from_row(&self.init, data.rows);
        let eval_preds = eval_sets
            .iter()
            .map(|e| OutputMatrix::from_row(&self.init, e.data.rows))
            .collect();
        Ok(self.boost(data, y, &w, eval_sets, pred, eval_preds, &executor))
    }

    /// Add `n_estimators` more models to a fitted ensemble, leaving the
    /// existing models untouched. Fits from scratch if the ensemble was
    /// never fitted.
    pub fn partial_fit(
        &mut self,
        data: &Matrix<f64>,
        y: &Matrix<f64>,
        sample_weight: Option<&[f64]>,
        eval_sets: &[EvalSet],
    ) -> Result<EvalResult, BoostError> {
        if !self.is_fitted() {
            return self.fit(data, y, sample_weight, eval_sets);
        }
        self.cfg.validate()?;
        let n_outputs = self.init.len();
        let (w, _) = self.check_data(data, y, sample_weight, eval_sets, Some(n_outputs))?;
        let batch_outputs = self
            .cfg
            .objective
            .initialise_prediction_for(y, &w, false, n_outputs)
            .len();
        self.check_fitted_shape(data, batch_outputs)?;
        let executor = self.executor()?;

        let pred = self.predict_raw(data)?;
        let eval_preds = eval_sets
            .iter()
            .map(|e| self.predict_raw(&e.data))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.boost(data, y, &w, eval_sets, pred, eval_preds, &executor))
    }

    #[allow(clippy::too_many_arguments)]
    fn boost(
        &mut self,
        data: &Matrix<f64>,
        y: &Matrix<f64>,
        sample_weight: &[f64],
        eval_sets: &[EvalSet],
        mut pred: OutputMatrix,
        mut eval_preds: Vec<OutputMatrix>,
        executor: &Executor,
    ) -> EvalResult {
        let start = Instant::now();
        let metrics = self.metrics();
        let eval_weights: Vec<Vec<f64>> = eval_sets.iter().map(|e| e.weights()).collect();
        let mut result = EvalResult::new();

        for round in 0..self.cfg.n_estimators {
            let gradients = weighted_gradient(
                &self.cfg.objective,
                y,
                &pred,
                sample_weight,
                self.cfg.learning_rate,
            );
            let prototype = &self.cfg.base_models[self.models.len() % self.cfg.base_models.len()];
            let mut model = prototype.clone();
            model.fit(data, &gradients, &mut self.rng, executor);
            pred += &model.predict(data, executor);
            for (e, e_pred) in eval_sets.iter().zip(eval_preds.iter_mut()) {
                *e_pred += &model.predict(&e.data, executor);
            }
            self.models.push(model);

            self.record_round(&mut result, &metrics, None, y, &pred, sample_weight);
            for (i, ((e, e_pred), e_w)) in eval_sets
                .iter()
                .zip(eval_preds.iter())
                .zip(eval_weights.iter())
                .enumerate()
            {
                self.record_round(&mut result, &metrics, Some(i), &e.y, e_pred, e_w);
            }
            self.log_round(round, &result);
        }

        info!(
            "Finished boosting {} rounds in {} seconds, the ensemble has {} models.",
            self.cfg.n_estimators,
            start.elapsed().as_secs_f64(),
            self.models.len()
        );
        result
    }

    /// Adapt the ensemble to new data without changing the structure of
    /// its models.
    ///
    /// The base prediction becomes the weighted blend of the old one and
    /// the one fitted to the new data, weighted by the total sample weight
    /// behind each. Then every model, in order, is updated against the
    /// gradients of the running prediction, which starts from the new
    /// data's base prediction.
    pub fn update(
        &mut self,
        data: &Matrix<f64>,
        y: &Matrix<f64>,
        sample_weight: Option<&[f64]>,
        eval_sets: &[EvalSet],
    ) -> Result<EvalResult, BoostError> {
        if !self.is_fitted() {
            return Err(BoostError::NotFitted("update".to_string()));
        }
        self.cfg.validate()?;
        let (w, n_outputs) =
            self.check_data(data, y, sample_weight, eval_sets, Some(self.init.len()))?;
        let use_average = self.cfg.init == InitPolicy::Average;
        let new_init = self
            .cfg
            .objective
            .initialise_prediction_for(y, &w, use_average, n_outputs);
        self.check_fitted_shape(data, new_init.len())?;
        let executor = self.executor()?;
        let start = Instant::now();

        let old_weight = self.sum_model_weights;
        let new_weight: f64 = w.iter().sum();
        let total = old_weight + new_weight;
        if total > 0.0 {
            self.init = self
                .init
                .iter()
                .zip(new_init.iter())
                .map(|(old, new)| (old * old_weight + new * new_weight) / total)
                .collect();
        }
        self.sum_model_weights = total;

        let metrics = self.metrics();
        let eval_weights: Vec<Vec<f64>> = eval_sets.iter().map(|e| e.weights()).collect();
        let mut result = EvalResult::new();
        let mut pred = OutputMatrix::from_row(&new_init, data.rows);
        for round in 0..self.models.len() {
            let gradients = weighted_gradient(
                &self.cfg.objective,
                y,
                &pred,
                &w,
                self.cfg.learning_rate,
            );
            pred += &self.models[round].update(data, &gradients, &executor);

            self.record_round(&mut result, &metrics, None, y, &pred, &w);
            // Eval sets are scored on the whole ensemble, as updated so far.
            for (i, (e, e_w)) in eval_sets.iter().zip(eval_weights.iter()).enumerate() {
                let e_pred = self.predict_raw_with(&e.data, &executor);
                self.record_round(&mut result, &metrics, Some(i), &e.y, &e_pred, e_w);
            }
            self.log_round(round, &result);
        }

        info!(
            "Finished updating {} models in {} seconds, total sample weight is now {}.",
            self.models.len(),
            start.elapsed().as_secs_f64(),
            self.sum_model_weights
        );
        Ok(result)
    }

    fn record_round(
        &self,
        result: &mut EvalResult,
        metrics: &[Metric],
        eval_index: Option<usize>,
        y: &Matrix<f64>,
        raw_pred: &OutputMatrix,
        sample_weight: &[f64],
    ) {
        let pred = self.cfg.objective.transform(raw_pred);
        let name = set_name(eval_index);
        for metric in metrics.iter() {
            result.record(&name, &metric.name(), metric.metric(y, &pred, sample_weight));
        }
    }

    fn log_round(&self, round: usize, result: &EvalResult) {
        let every = self.cfg.log_iterations;
        if every == 0 || (round + 1) % every != 0 {
            return;
        }
        let values: Vec<String> = result
            .latest()
            .iter()
            .map(|(set, metric, v)| format!("{}-{}: {:.6}", set, metric, v))
            .collect();
        info!("round {}, {}", round, values.join(", "));
    }

    fn predict_raw_with(&self, data: &Matrix<f64>, executor: &Executor) -> OutputMatrix {
        let mut pred = OutputMatrix::from_row(&self.init, data.rows);
        for model in self.models.iter() {
            pred += &model.predict(data, executor);
        }
        pred
    }

    /// The untransformed prediction, `init + sum(model.predict(X))`.
    pub fn predict_raw(&self, data: &Matrix<f64>) -> Result<OutputMatrix, BoostError> {
        let n_features = match self.n_features {
            Some(n) => n,
            None => return Err(BoostError::NotFitted("predict".to_string())),
        };
        if data.cols != n_features {
            return Err(BoostError::FeatureMismatch(data.cols, n_features));
        }
        let executor = match &self.executor {
            Some(e) => e,
            None => return Err(BoostError::NotFitted("predict".to_string())),
        };
        Ok(self.predict_raw_with(data, executor))
    }

    /// The prediction passed through the objective's transform.
    pub fn predict(&self, data: &Matrix<f64>) -> Result<OutputMatrix, BoostError> {
        Ok(self.cfg.objective.transform(&self.predict_raw(data)?))
    }

    /// Class probabilities, one column per class. A single output is
    /// taken to be the probability of the positive class and expanded to
    /// `[1 - p, p]`.
    pub fn predict_proba(&self, data: &Matrix<f64>) -> Result<OutputMatrix, BoostError> {
        let pred = self.predict(data)?;
        if pred.cols != 1 {
            return Ok(pred);
        }
        let data = pred.data.iter().flat_map(|p| [1.0 - p, *p]).collect();
        Ok(OutputMatrix::new(data, pred.rows, 2))
    }

    /// Most probable class of every row.
    pub fn predict_class(&self, data: &Matrix<f64>) -> Result<Vec<usize>, BoostError> {
        let proba = self.predict_proba(data)?;
        Ok((0..proba.rows)
            .map(|i| {
                proba
                    .row(i)
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (j, p)| {
                        if *p > best.1 {
                            (j, *p)
                        } else {
                            best
                        }
                    })
                    .0
            })
            .collect())
    }

    /// Human readable dump of the base prediction and every model.
    pub fn dump(&self) -> Result<String, BoostError> {
        if !self.is_fitted() {
            return Err(BoostError::NotFitted("dump".to_string()));
        }
        let mut r = format!("init={}\n", format_vector(&self.init));
        for model in self.models.iter() {
            r += model.to_string().as_str();
        }
        Ok(r)
    }

    /// Set the objective of the booster.
    pub fn set_objective(mut self, objective: Objective) -> Self {
        self.cfg.objective = objective;
        self
    }

    /// Set the metrics, `None` to use the objective's default.
    pub fn set_metrics(mut self, metrics: Option<Vec<Metric>>) -> Self {
        self.cfg.metrics = metrics;
        self
    }

    pub fn set_n_estimators(mut self, n_estimators: usize) -> Self {
        self.cfg.n_estimators = n_estimators;
        self
    }

    pub fn set_learning_rate(mut self, learning_rate: f64) -> Self {
        self.cfg.learning_rate = learning_rate;
        self
    }

    pub fn set_init(mut self, init: InitPolicy) -> Self {
        self.cfg.init = init;
        self
    }

    /// Set the learner prototypes the ensemble cycles through.
    pub fn set_base_models(mut self, base_models: Vec<BaseModel>) -> Self {
        self.cfg.base_models = base_models;
        self
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.cfg.seed = seed;
        self
    }

    pub fn set_num_threads(mut self, num_threads: Option<usize>) -> Self {
        self.cfg.num_threads = num_threads;
        self
    }

    pub fn set_log_iterations(mut self, log_iterations: usize) -> Self {
        self.cfg.log_iterations = log_iterations;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::mean_squared_error;
    use crate::testing::{separable_binary, step_sine, three_class};
    use crate::utils::precision_round;

    fn regressor(n_estimators: usize) -> GradientBooster {
        GradientBooster::default()
            .set_n_estimators(n_estimators)
            .set_num_threads(Some(2))
    }

    #[test]
    fn test_predict_is_init_plus_models() {
        let (x, y) = step_sine(200, 0);
        let data = Matrix::new(&x, 200, 1);
        let labels = Matrix::new(&y, 200, 1);
        let mut booster = regressor(10);
        booster.fit(&data, &labels, None, &[]).unwrap();
        assert_eq!(booster.models.len(), 10);

        let executor = Executor::new(Some(3)).unwrap();
        let mut expected = OutputMatrix::from_row(&booster.init, 200);
        for model in booster.models.iter() {
            expected += &model.predict(&data, &executor);
        }
        assert_eq!(booster.predict_raw(&data).unwrap(), expected);
        // Squared error has an identity transform.
        assert_eq!(booster.predict(&data).unwrap(), expected);
        let mean = y.iter().sum::<f64>() / 200.0;
        assert_eq!(precision_round(booster.init[0], 10), precision_round(mean, 10));
    }

    #[test]
    fn test_training_loss_decreases() {
        let (x, y) = step_sine(300, 1);
        let data = Matrix::new(&x, 300, 1);
        let labels = Matrix::new(&y, 300, 1);
        let mut booster = regressor(30);
        let result = booster.fit(&data, &labels, None, &[]).unwrap();
        let mse = result.get("train", "mse").unwrap();
        assert_eq!(mse.len(), 30);
        for pair in mse.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-12);
        }
        assert!(mse[29] < mse[0]);
        let pred = booster.predict(&data).unwrap();
        let final_mse = mean_squared_error(&labels, &pred, &vec![1.0; 300]);
        assert_eq!(precision_round(final_mse, 10), precision_round(mse[29], 10));
    }

    #[test]
    fn test_binary_classification() {
        let (x, y) = separable_binary(400, 2);
        let data = Matrix::new(&x, 400, 2);
        let labels = Matrix::new(&y, 400, 1);
        let mut booster = GradientBooster::default()
            .set_objective(Objective::LogLoss)
            .set_n_estimators(40)
            .set_learning_rate(0.3)
            .set_metrics(Some(vec![Metric::LogLoss, Metric::AUC]));
        let result = booster.fit(&data, &labels, None, &[]).unwrap();
        let loss = result.get("train", "log_loss").unwrap();
        assert!(loss[39] < loss[0]);
        assert!(result.get("train", "auc").unwrap()[39] > 0.95);

        let proba = booster.predict_proba(&data).unwrap();
        assert_eq!(proba.shape(), (400, 2));
        for i in 0..400 {
            assert_eq!(precision_round(proba.row(i).iter().sum::<f64>(), 10), 1.0);
        }
        let classes = booster.predict_class(&data).unwrap();
        let correct = classes
            .iter()
            .zip(y.iter())
            .filter(|(c, y_)| **c as f64 == **y_)
            .count();
        assert!(correct as f64 / 400.0 > 0.9);
    }

    #[test]
    fn test_multiclass_classification() {
        let (x, y) = three_class(300, 3);
        let data = Matrix::new(&x, 300, 1);
        let labels = Matrix::new(&y, 300, 1);
        let mut booster = GradientBooster::default()
            .set_objective(Objective::LogLoss)
            .set_n_estimators(20)
            .set_learning_rate(0.5)
            .set_base_models(vec![BaseModel::tree(2)]);
        booster.fit(&data, &labels, None, &[]).unwrap();
        assert_eq!(booster.init.len(), 3);
        let proba = booster.predict_proba(&data).unwrap();
        assert_eq!(proba.shape(), (300, 3));
        let classes = booster.predict_class(&data).unwrap();
        let correct = classes
            .iter()
            .zip(y.iter())
            .filter(|(c, y_)| **c as f64 == **y_)
            .count();
        assert!(correct as f64 / 300.0 > 0.9);
    }

    #[test]
    fn test_labels_outside_fitted_classes() {
        let (x, y) = three_class(150, 13);
        let data = Matrix::new(&x, 150, 1);
        let labels = Matrix::new(&y, 150, 1);
        let x_eval = vec![0.5, 1.5, 2.5];
        let y_eval = vec![0.0, 1.0, 3.0];
        let eval_sets = vec![EvalSet::new(
            Matrix::new(&x_eval, 3, 1),
            Matrix::new(&y_eval, 3, 1),
            None,
        )];
        let mut booster = GradientBooster::default()
            .set_objective(Objective::LogLoss)
            .set_n_estimators(3);
        assert!(matches!(
            booster.fit(&data, &labels, None, &eval_sets),
            Err(BoostError::InvalidEvalSet(0, _))
        ));
        assert!(!booster.is_fitted());

        booster.fit(&data, &labels, None, &[]).unwrap();
        let models = booster.models.clone();
        let y_eval = Matrix::new(&y_eval, 3, 1);
        let x_eval = Matrix::new(&x_eval, 3, 1);
        assert!(matches!(
            booster.partial_fit(&x_eval, &y_eval, None, &[]),
            Err(BoostError::InvalidLabels(_))
        ));
        assert!(matches!(
            booster.update(&x_eval, &y_eval, None, &[]),
            Err(BoostError::InvalidLabels(_))
        ));
        assert_eq!(booster.models, models);
        assert_eq!(booster.sum_model_weights, 150.0);

        // A binary model only knows the labels 0 and 1.
        let (xb, yb) = separable_binary(100, 14);
        let mut binary = GradientBooster::default()
            .set_objective(Objective::LogLoss)
            .set_n_estimators(2);
        let y_two = vec![0.0, 1.0, 2.0];
        let eval_sets = vec![EvalSet::new(
            Matrix::new(&xb[..6], 3, 2),
            Matrix::new(&y_two, 3, 1),
            None,
        )];
        assert!(matches!(
            binary.fit(&Matrix::new(&xb, 100, 2), &Matrix::new(&yb, 100, 1), None, &eval_sets),
            Err(BoostError::InvalidEvalSet(0, _))
        ));
    }

    #[test]
    fn test_batches_missing_a_class() {
        let (x, y) = three_class(300, 15);
        let data = Matrix::new(&x, 300, 1);
        let labels = Matrix::new(&y, 300, 1);
        let mut booster = GradientBooster::default()
            .set_objective(Objective::LogLoss)
            .set_n_estimators(4)
            .set_base_models(vec![BaseModel::tree(2)]);
        booster.fit(&data, &labels, None, &[]).unwrap();
        let init = booster.init.clone();

        // Only classes 0 and 1 in the new batch.
        let (x_batch, y_batch): (Vec<f64>, Vec<f64>) = x
            .iter()
            .zip(y.iter())
            .filter(|(_, y_)| **y_ < 2.0)
            .map(|(x_, y_)| (*x_, *y_))
            .unzip();
        let n = x_batch.len();
        let batch = Matrix::new(&x_batch, n, 1);
        let batch_labels = Matrix::new(&y_batch, n, 1);

        let mut booster = booster.set_n_estimators(2);
        booster.partial_fit(&batch, &batch_labels, None, &[]).unwrap();
        assert_eq!(booster.models.len(), 6);
        assert_eq!(booster.init, init);
        assert_eq!(booster.predict_proba(&batch).unwrap().shape(), (n, 3));

        booster.update(&batch, &batch_labels, None, &[]).unwrap();
        assert_eq!(booster.models.len(), 6);
        assert_eq!(booster.init.len(), 3);
        // The missing class pulls its share of the base prediction down.
        assert!(booster.init[2] < init[2]);
        assert_eq!(booster.sum_model_weights, 300.0 + n as f64);
    }

    #[test]
    fn test_partial_fit_appends_models() {
        let (x, y) = step_sine(200, 4);
        let data = Matrix::new(&x, 200, 1);
        let labels = Matrix::new(&y, 200, 1);

        // Without a previous fit, partial_fit is fit.
        let mut booster = regressor(5);
        booster.partial_fit(&data, &labels, None, &[]).unwrap();
        assert_eq!(booster.models.len(), 5);
        let before = booster.models.clone();
        let init = booster.init.clone();

        let mut booster = booster.set_n_estimators(3);
        let r = booster.partial_fit(&data, &labels, None, &[]).unwrap();
        assert_eq!(booster.models.len(), 8);
        assert_eq!(&booster.models[..5], &before[..]);
        assert_eq!(booster.init, init);
        assert_eq!(r.get("train", "mse").unwrap().len(), 3);

        let wide = vec![0.0; 400];
        let wide_data = Matrix::new(&wide, 200, 2);
        assert!(matches!(
            booster.partial_fit(&wide_data, &labels, None, &[]),
            Err(BoostError::FeatureMismatch(2, 1))
        ));
        assert_eq!(booster.models.len(), 8);
    }

    #[test]
    fn test_update_blends_init_and_keeps_structure() {
        let (x, y) = step_sine(200, 5);
        let data = Matrix::new(&x, 200, 1);
        let labels = Matrix::new(&y, 200, 1);
        let mut booster = regressor(8);
        booster.fit(&data, &labels, None, &[]).unwrap();
        let fitted = booster.models.clone();
        let init = booster.init[0];

        // Updating on the training data changes nothing.
        let result = booster.update(&data, &labels, None, &[]).unwrap();
        assert_eq!(precision_round(booster.init[0], 10), precision_round(init, 10));
        assert_eq!(booster.sum_model_weights, 400.0);
        assert_eq!(result.get("train", "mse").unwrap().len(), 8);

        let shifted: Vec<f64> = y.iter().map(|v| v + 10.0).collect();
        let shifted_labels = Matrix::new(&shifted, 200, 1);
        booster.update(&data, &shifted_labels, None, &[]).unwrap();
        assert_eq!(booster.models.len(), 8);
        // 400 weight at the old init, 200 at the new one.
        assert_eq!(
            precision_round(booster.init[0], 8),
            precision_round((init * 400.0 + (init + 10.0) * 200.0) / 600.0, 8)
        );
        assert_eq!(booster.sum_model_weights, 600.0);
        for (new, old) in booster.models.iter().zip(fitted.iter()) {
            match (new, old) {
                (BaseModel::Tree(a), BaseModel::Tree(b)) => {
                    assert_eq!(a.feature, b.feature);
                    assert_eq!(a.split_value, b.split_value);
                }
                _ => panic!("Expected trees."),
            }
        }
    }

    #[test]
    fn test_not_fitted() {
        let x = vec![1.0, 2.0];
        let data = Matrix::new(&x, 2, 1);
        let mut booster = GradientBooster::default();
        assert!(matches!(booster.predict(&data), Err(BoostError::NotFitted(_))));
        assert!(matches!(booster.dump(), Err(BoostError::NotFitted(_))));
        assert!(matches!(
            booster.update(&data, &data, None, &[]),
            Err(BoostError::NotFitted(_))
        ));
        assert!(!booster.is_fitted());
    }

    #[test]
    fn test_feature_mismatch_does_not_mutate() {
        let (x, y) = step_sine(100, 6);
        let data = Matrix::new(&x, 100, 1);
        let labels = Matrix::new(&y, 100, 1);
        let mut booster = regressor(4);
        booster.fit(&data, &labels, None, &[]).unwrap();
        let dump = booster.dump().unwrap();
        let models = booster.models.clone();

        let wide = vec![0.5; 30];
        let wide_data = Matrix::new(&wide, 10, 3);
        assert!(matches!(
            booster.predict(&wide_data),
            Err(BoostError::FeatureMismatch(3, 1))
        ));
        let wide_labels = Matrix::new(&y[..10], 10, 1);
        assert!(matches!(
            booster.update(&wide_data, &wide_labels, None, &[]),
            Err(BoostError::FeatureMismatch(3, 1))
        ));
        assert_eq!(booster.dump().unwrap(), dump);
        assert_eq!(booster.models, models);
        assert_eq!(booster.sum_model_weights, 100.0);
    }

    #[test]
    fn test_fit_errors() {
        let x = vec![1.0, 2.0, 3.0];
        let data = Matrix::new(&x, 3, 1);
        let short = vec![1.0, 2.0];
        let mut booster = GradientBooster::default();
        assert!(matches!(
            booster.fit(&data, &Matrix::new(&short, 2, 1), None, &[]),
            Err(BoostError::ShapeMismatch(..))
        ));
        let y = vec![1.0, 2.0, 3.0];
        assert!(matches!(
            booster.fit(&data, &Matrix::new(&y, 3, 1), Some(&short[..]), &[]),
            Err(BoostError::ShapeMismatch(..))
        ));

        let mut classifier = GradientBooster::default().set_objective(Objective::LogLoss);
        let fractional = vec![0.0, 0.5, 1.0];
        assert!(matches!(
            classifier.fit(&data, &Matrix::new(&fractional, 3, 1), None, &[]),
            Err(BoostError::InvalidLabels(_))
        ));
        let one = vec![1.0];
        assert!(matches!(
            classifier.fit(&Matrix::new(&one, 1, 1), &Matrix::new(&one, 1, 1), None, &[]),
            Err(BoostError::TooFewSamples(1))
        ));
        let mut bad_rate = GradientBooster::default().set_learning_rate(0.0);
        assert!(matches!(
            bad_rate.fit(&data, &Matrix::new(&y, 3, 1), None, &[]),
            Err(BoostError::InvalidParameter(..))
        ));
        assert!(!booster.is_fitted());
        assert!(!classifier.is_fitted());
    }

    #[test]
    fn test_eval_sets() {
        let (x, y) = step_sine(200, 7);
        let (x_eval, y_eval) = step_sine(50, 8);
        let data = Matrix::new(&x, 200, 1);
        let labels = Matrix::new(&y, 200, 1);
        let w_eval = vec![2.0; 50];
        let eval_sets = vec![
            EvalSet::new(Matrix::new(&x_eval, 50, 1), Matrix::new(&y_eval, 50, 1), None),
            EvalSet::new(Matrix::new(&x_eval, 50, 1), Matrix::new(&y_eval, 50, 1), Some(&w_eval[..])),
        ];
        let mut booster = regressor(6)
            .set_metrics(Some(vec![Metric::MeanSquaredError, Metric::RootMeanSquaredError]))
            .set_log_iterations(2);
        let result = booster.fit(&data, &labels, None, &eval_sets).unwrap();
        let keys: Vec<&String> = result.0.keys().collect();
        assert_eq!(keys, vec!["eval-0", "eval-1", "train"]);
        for set in ["train", "eval-0", "eval-1"] {
            assert_eq!(result.get(set, "mse").unwrap().len(), 6);
            assert_eq!(result.get(set, "rmse").unwrap().len(), 6);
        }
        // Uniform weights do not change a weighted average.
        assert_eq!(
            precision_round(result.get("eval-0", "mse").unwrap()[5], 10),
            precision_round(result.get("eval-1", "mse").unwrap()[5], 10)
        );
        // The running eval prediction matches the final model.
        let pred = booster.predict(&eval_sets[0].data).unwrap();
        let mse = mean_squared_error(&eval_sets[0].y, &pred, &vec![1.0; 50]);
        assert_eq!(
            precision_round(mse, 10),
            precision_round(result.get("eval-0", "mse").unwrap()[5], 10)
        );

        let bad = vec![EvalSet::new(Matrix::new(&x_eval, 50, 1), Matrix::new(&y_eval[..10], 10, 1), None)];
        assert!(matches!(
            booster.fit(&data, &labels, None, &bad),
            Err(BoostError::InvalidEvalSet(0, _))
        ));
        assert_eq!(booster.models.len(), 6);
    }

    #[test]
    fn test_worker_count_does_not_change_model() {
        let (x, y) = step_sine(1000, 9);
        let data = Matrix::new(&x, 1000, 1);
        let labels = Matrix::new(&y, 1000, 1);
        let mut one = regressor(5).set_num_threads(Some(1));
        one.fit(&data, &labels, None, &[]).unwrap();
        let mut four = regressor(5).set_num_threads(Some(4));
        four.fit(&data, &labels, None, &[]).unwrap();
        assert_eq!(one.models, four.models);
        assert_eq!(one.predict(&data).unwrap(), four.predict(&data).unwrap());
        assert_eq!(one.dump().unwrap(), four.dump().unwrap());
    }

    #[test]
    fn test_mixed_base_models() {
        let (x, y) = step_sine(200, 10);
        let data = Matrix::new(&x, 200, 1);
        let labels = Matrix::new(&y, 200, 1);
        let mut booster = regressor(9)
            .set_learning_rate(0.5)
            .set_base_models(vec![
                BaseModel::kernel_ridge(20),
                BaseModel::linear(),
                BaseModel::tree(1),
            ]);
        let result = booster.fit(&data, &labels, None, &[]).unwrap();
        assert!(matches!(booster.models[0], BaseModel::KernelRidge(_)));
        assert!(matches!(booster.models[1], BaseModel::Linear(_)));
        assert!(matches!(booster.models[2], BaseModel::Tree(_)));
        assert!(matches!(booster.models[3], BaseModel::KernelRidge(_)));
        let mse = result.get("train", "mse").unwrap();
        assert!(mse[8] < mse[0]);
        // update works the same across all of the learner types.
        booster.update(&data, &labels, None, &[]).unwrap();
        assert_eq!(booster.models.len(), 9);
    }

    #[test]
    fn test_dump_and_zero_init() {
        let (x, y) = step_sine(100, 11);
        let data = Matrix::new(&x, 100, 1);
        let labels = Matrix::new(&y, 100, 1);
        let mut booster = regressor(2)
            .set_init(InitPolicy::Zero)
            .set_base_models(vec![BaseModel::tree(1)]);
        booster.fit(&data, &labels, None, &[]).unwrap();
        assert_eq!(booster.init, vec![0.0]);
        let dump = booster.dump().unwrap();
        assert!(dump.starts_with("init=0.0000\n0:[f0<="));
        assert_eq!(dump.matches("0:[f0<=").count(), 2);
        assert_eq!(dump.lines().count(), 7);
    }

    #[test]
    fn test_from_config() {
        let cfg = BoosterConfig::from_json(
            r#"{"n_estimators": 3, "base_models": [{"Tree": {"max_depth": 2}}], "seed": 7}"#,
        )
        .unwrap();
        let (x, y) = step_sine(100, 12);
        let data = Matrix::new(&x, 100, 1);
        let labels = Matrix::new(&y, 100, 1);
        let mut a = GradientBooster::new(cfg.clone());
        a.fit(&data, &labels, None, &[]).unwrap();
        let mut b = GradientBooster::new(cfg);
        b.fit(&data, &labels, None, &[]).unwrap();
        assert_eq!(a.models.len(), 3);
        assert_eq!(a.dump().unwrap(), b.dump().unwrap());
    }
}
