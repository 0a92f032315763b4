use crate::data::JaggedMatrix;
use crate::histogram::LevelHistogram;

#[derive(Debug, Clone, PartialEq)]
pub struct SplitInfo {
    pub split_feature: usize,
    pub split_value: f64,
    pub split_gain: f64,
}

/// Gain of splitting a node with sums `(G, H)` into `(GL, HL)` and
/// `(GR, HR)`, summed over the outputs.
///
/// `0.5 * (GL^2 / HL + GR^2 / HR - G^2 / H)`
pub fn split_gain(left_grad: &[f64], left_hess: &[f64], right_grad: &[f64], right_hess: &[f64]) -> f64 {
    left_grad
        .iter()
        .zip(left_hess)
        .zip(right_grad.iter().zip(right_hess))
        .map(|((gl, hl), (gr, hr))| {
            let g = gl + gr;
            let h = hl + hr;
            0.5 * (gl * gl / hl + gr * gr / hr - g * g / h)
        })
        .sum()
}

/// Leaf weight `-G / H` for every output, 0 where the hessian is not positive.
pub fn leaf_weight(grad: &[f64], hess: &[f64]) -> Vec<f64> {
    grad.iter()
        .zip(hess)
        // 0 - g / h rather than -g / h, a zero gradient must not give -0.
        .map(|(g, h)| if *h > 0.0 { 0.0 - g / h } else { 0.0 })
        .collect()
}

/// Find the best split of the node in `slot`, considering every candidate
/// threshold of every feature.
///
/// Left sums at candidate `k` are the cumulative sums of bins `0..=k`, and
/// right sums are the node totals minus the left sums. A candidate is only
/// considered if both sides have a positive hessian for every output. The
/// first candidate with the highest gain wins, and `None` is returned if no
/// candidate has a positive gain.
pub fn best_split(hist: &LevelHistogram, slot: usize, cuts: &JaggedMatrix<f64>) -> Option<SplitInfo> {
    let n_outputs = hist.n_outputs;
    let (node_grad, node_hess) = hist.totals(slot);
    let mut best: Option<SplitInfo> = None;
    let mut best_gain = 0.0;

    let mut cuml_grad = vec![0.0; n_outputs];
    let mut cuml_hess = vec![0.0; n_outputs];
    let mut right_grad = vec![0.0; n_outputs];
    let mut right_hess = vec![0.0; n_outputs];

    for feature in 0..cuts.cols {
        cuml_grad.iter_mut().for_each(|v| *v = 0.0);
        cuml_hess.iter_mut().for_each(|v| *v = 0.0);
        for (k, cut) in cuts.get_col(feature).iter().enumerate() {
            let (bin_grad, bin_hess) = hist.bin(slot, feature, k);
            for o in 0..n_outputs {
                cuml_grad[o] += bin_grad[o];
                cuml_hess[o] += bin_hess[o];
                right_grad[o] = node_grad[o] - cuml_grad[o];
                right_hess[o] = node_hess[o] - cuml_hess[o];
            }
            let valid = cuml_hess
                .iter()
                .zip(right_hess.iter())
                .all(|(hl, hr)| *hl > 0.0 && *hr > 0.0);
            if !valid {
                continue;
            }
            let gain = split_gain(&cuml_grad, &cuml_hess, &right_grad, &right_hess);
            if gain > best_gain {
                best_gain = gain;
                best = Some(SplitInfo {
                    split_feature: feature,
                    split_value: *cut,
                    split_gain: gain,
                });
            }
        }
    }
    best
}
