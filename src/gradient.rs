use crate::data::{Matrix, OutputMatrix};
use crate::objective::ObjectiveFunction;
use crate::utils::preround;

/// Per row, per output gradient and hessian values, ready to be
/// summed in any order by the learners.
#[derive(Debug, Clone)]
pub struct GradientPairs {
    pub grad: OutputMatrix,
    pub hess: OutputMatrix,
}

impl GradientPairs {
    pub fn n_outputs(&self) -> usize {
        self.grad.cols
    }
}

/// Compute the weighted gradient and hessian of the objective at the
/// current raw prediction.
///
/// The gradient is scaled by the sample weight and the learning rate, the
/// hessian by the sample weight only. Both are then prerounded so that
/// any reduction over them is bit reproducible, regardless of how the
/// rows are split across workers.
///
/// Panics if the objective returns matrices that do not match the shape
/// of the prediction, this is a broken objective, not bad input.
pub fn weighted_gradient<O>(
    objective: &O,
    y: &Matrix<f64>,
    pred: &OutputMatrix,
    sample_weight: &[f64],
    learning_rate: f64,
) -> GradientPairs
where
    O: ObjectiveFunction + ?Sized,
{
    assert_eq!(sample_weight.len(), pred.rows);
    let (mut grad, mut hess) = objective.gradient(y, &objective.transform(pred));
    assert_eq!(
        grad.shape(),
        hess.shape(),
        "Objective returned gradient and hessian of different shapes."
    );
    assert_eq!(
        grad.shape(),
        pred.shape(),
        "Objective returned gradients that do not match the prediction shape."
    );

    for (i, w) in sample_weight.iter().enumerate() {
        grad.row_mut(i)
            .iter_mut()
            .for_each(|g| *g *= *w * learning_rate);
        hess.row_mut(i).iter_mut().for_each(|h| *h *= *w);
    }
    preround(&mut grad.data);
    preround(&mut hess.data);
    GradientPairs { grad, hess }
}
