use crate::binning::{split_proposals, BinnedTile};
use crate::data::{JaggedMatrix, Matrix, OutputMatrix};
use crate::executor::{Executor, Worker};
use crate::gradient::GradientPairs;
use crate::histogram::LevelHistogram;
use crate::splitter::{best_split, leaf_weight};
use crate::utils::format_vector;
use log::{debug, warn};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_SPLIT_SAMPLES: usize = 256;

/// A complete binary tree of fixed depth, stored as arrays indexed by node id.
///
/// Node 0 is the root, the children of node `id` are `2 * id + 1` and
/// `2 * id + 2`, and `feature[id] == -1` marks a leaf. All arrays are
/// allocated for `2^(max_depth + 1)` nodes whatever depth the tree actually
/// reaches. `leaf_value` and `hessian` are row major, `n_outputs` values per
/// node. Every node that received rows has its `-G / H` weight and hessian
/// sum recorded, internal nodes included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tree {
    pub max_depth: usize,
    pub split_samples: usize,
    pub n_outputs: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub feature: Vec<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub split_value: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub leaf_value: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gain: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hessian: Vec<f64>,
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new(3)
    }
}

impl Tree {
    pub fn new(max_depth: usize) -> Self {
        Tree {
            max_depth,
            split_samples: DEFAULT_SPLIT_SAMPLES,
            n_outputs: 0,
            feature: Vec::new(),
            split_value: Vec::new(),
            leaf_value: Vec::new(),
            gain: Vec::new(),
            hessian: Vec::new(),
        }
    }

    /// Set the number of rows the candidate thresholds are drawn from.
    pub fn set_split_samples(mut self, split_samples: usize) -> Self {
        self.split_samples = split_samples;
        self
    }

    pub fn n_nodes(&self) -> usize {
        1 << (self.max_depth + 1)
    }

    pub fn left_child(id: usize) -> usize {
        2 * id + 1
    }

    pub fn right_child(id: usize) -> usize {
        2 * id + 2
    }

    pub fn is_fitted(&self) -> bool {
        !self.feature.is_empty()
    }

    pub fn is_leaf(&self, id: usize) -> bool {
        self.feature[id] < 0
    }

    pub fn node_value(&self, id: usize) -> &[f64] {
        &self.leaf_value[id * self.n_outputs..(id + 1) * self.n_outputs]
    }

    pub fn node_hessian(&self, id: usize) -> &[f64] {
        &self.hessian[id * self.n_outputs..(id + 1) * self.n_outputs]
    }

    /// A copy of the configuration with all arrays allocated and every node a leaf.
    fn empty(&self, n_outputs: usize) -> Tree {
        let n_nodes = self.n_nodes();
        Tree {
            max_depth: self.max_depth,
            split_samples: self.split_samples,
            n_outputs,
            feature: vec![-1; n_nodes],
            split_value: vec![0.0; n_nodes],
            leaf_value: vec![0.0; n_nodes * n_outputs],
            gain: vec![0.0; n_nodes],
            hessian: vec![0.0; n_nodes * n_outputs],
        }
    }

    fn set_node_sums(&mut self, id: usize, grad: &[f64], hess: &[f64]) {
        let n = self.n_outputs;
        self.leaf_value[id * n..(id + 1) * n].copy_from_slice(&leaf_weight(grad, hess));
        self.hessian[id * n..(id + 1) * n].copy_from_slice(hess);
    }

    /// The child of an internal node that a row is sent to.
    fn route(&self, id: usize, data: &Matrix<f64>, row: usize) -> usize {
        let feature = self.feature[id] as usize;
        if *data.get(row, feature) <= self.split_value[id] {
            Tree::left_child(id)
        } else {
            Tree::right_child(id)
        }
    }

    /// The leaf a row ends up in.
    pub fn leaf_of(&self, data: &Matrix<f64>, row: usize) -> usize {
        let mut id = 0;
        while !self.is_leaf(id) {
            id = self.route(id, data, row);
        }
        id
    }

    /// Build the tree from scratch, level by level.
    ///
    /// Candidate thresholds are drawn from the rows once, using `rng`. Then
    /// every worker bins its tile and, for each level, accumulates the
    /// histograms of the nodes still open, sums them with every other
    /// worker, and decides the splits of that level from the summed
    /// histograms. All workers make the same decisions, so they all route
    /// their rows the same way without any further communication.
    pub fn fit(&mut self, data: &Matrix<f64>, gradients: &GradientPairs, rng: &mut StdRng, executor: &Executor) {
        assert_eq!(
            data.rows, gradients.grad.rows,
            "Gradients must have one row per row of data."
        );
        let n_samples = self.split_samples.max(2).max(self.max_depth);
        let cuts = split_proposals(data, n_samples, rng);
        let built = executor
            .dispatch(data.rows, |w| self.build_on_worker(w, data, gradients, &cuts))
            .into_iter()
            .flatten()
            .next();
        // Worker 0 always runs, and returns the tree.
        if let Some(tree) = built {
            *self = tree;
        }
    }

    fn build_on_worker(
        &self,
        w: &Worker,
        data: &Matrix<f64>,
        gradients: &GradientPairs,
        cuts: &JaggedMatrix<f64>,
    ) -> Option<Tree> {
        let n_outputs = gradients.n_outputs();
        let rows = w.rows();
        let binned = BinnedTile::new(data, cuts, rows.clone());
        let mut tree = self.empty(n_outputs);
        // The node each row of the tile currently sits in.
        let mut position = vec![0; rows.len()];
        // Always sorted.
        let mut open: Vec<usize> = vec![0];

        for depth in 0..=self.max_depth {
            let last_level = depth == self.max_depth;
            let mut hist = if last_level {
                LevelHistogram::totals_only(open.len(), n_outputs)
            } else {
                LevelHistogram::new(open.len(), cuts, n_outputs)
            };
            for (i, row) in rows.clone().enumerate() {
                if let Ok(slot) = open.binary_search(&position[i]) {
                    hist.add_row(slot, &binned, i, gradients.grad.row(row), gradients.hess.row(row));
                }
            }
            w.all_reduce_sum(&mut hist.data);

            let mut next_open = Vec::new();
            for (slot, id) in open.iter().enumerate() {
                let (grad, hess) = hist.totals(slot);
                tree.set_node_sums(*id, grad, hess);
                if last_level {
                    continue;
                }
                if hess.iter().any(|h| *h <= 0.0) {
                    if w.is_coordinator() {
                        warn!("Node {} has a hessian sum that is not positive, making it a leaf.", id);
                    }
                    continue;
                }
                if let Some(info) = best_split(&hist, slot, cuts) {
                    tree.feature[*id] = info.split_feature as i32;
                    tree.split_value[*id] = info.split_value;
                    tree.gain[*id] = info.split_gain;
                    next_open.push(Tree::left_child(*id));
                    next_open.push(Tree::right_child(*id));
                }
            }
            if w.is_coordinator() {
                debug!(
                    "Depth {}, {} open node(s), {} split(s).",
                    depth,
                    open.len(),
                    next_open.len() / 2
                );
            }
            if next_open.is_empty() {
                break;
            }
            for (i, row) in rows.clone().enumerate() {
                let id = position[i];
                if !tree.is_leaf(id) {
                    position[i] = tree.route(id, data, row);
                }
            }
            open = next_open;
        }

        if w.is_coordinator() {
            Some(tree)
        } else {
            None
        }
    }

    /// Refresh the leaf values from new gradients, leaving the splits as
    /// they are. Every node's sums are recomputed from the rows routed
    /// through it, nodes no row reaches end up with zeros. Returns the
    /// prediction of the refreshed tree.
    pub fn update(&mut self, data: &Matrix<f64>, gradients: &GradientPairs, executor: &Executor) -> OutputMatrix {
        let n_outputs = self.n_outputs;
        assert_eq!(
            gradients.n_outputs(),
            n_outputs,
            "Gradients must have as many outputs as the tree."
        );
        let n_nodes = self.feature.len();
        let tree = &*self;
        let sums = executor
            .dispatch(data.rows, |w| {
                let mut buf = vec![0.0; n_nodes * 2 * n_outputs];
                for row in w.rows() {
                    let grad = gradients.grad.row(row);
                    let hess = gradients.hess.row(row);
                    let mut id = 0;
                    loop {
                        let start = id * 2 * n_outputs;
                        let (g_sum, h_sum) = buf[start..start + 2 * n_outputs].split_at_mut(n_outputs);
                        g_sum.iter_mut().zip(grad).for_each(|(a, g)| *a += *g);
                        h_sum.iter_mut().zip(hess).for_each(|(a, h)| *a += *h);
                        if tree.is_leaf(id) {
                            break;
                        }
                        id = tree.route(id, data, row);
                    }
                }
                w.all_reduce_sum(&mut buf);
                if w.is_coordinator() {
                    Some(buf)
                } else {
                    None
                }
            })
            .into_iter()
            .flatten()
            .next();

        if let Some(buf) = sums {
            for (id, node) in buf.chunks(2 * n_outputs).enumerate() {
                let (grad, hess) = node.split_at(n_outputs);
                self.set_node_sums(id, grad, hess);
            }
        }
        self.predict(data, executor)
    }

    pub fn predict(&self, data: &Matrix<f64>, executor: &Executor) -> OutputMatrix {
        if !self.is_fitted() {
            return OutputMatrix::zeros(data.rows, self.n_outputs);
        }
        let tiles = executor.dispatch(data.rows, |w| {
            let mut out = Vec::with_capacity(w.rows().len() * self.n_outputs);
            for row in w.rows() {
                out.extend_from_slice(self.node_value(self.leaf_of(data, row)));
            }
            out
        });
        OutputMatrix::new(tiles.concat(), data.rows, self.n_outputs)
    }

    /// Zero the leaf values and hessians, keeping the splits.
    pub fn clear(&mut self) {
        self.leaf_value.iter_mut().for_each(|v| *v = 0.0);
        self.hessian.iter_mut().for_each(|v| *v = 0.0);
    }
}

impl fmt::Display for Tree {
    // This trait requires `fmt` with this exact signature.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.is_fitted() {
            return Ok(());
        }
        let mut print_buffer: Vec<(usize, usize)> = vec![(0, 0)];
        let mut r = String::new();
        while let Some((id, depth)) = print_buffer.pop() {
            r += "\t".repeat(depth).as_str();
            if self.is_leaf(id) {
                r += format!(
                    "{}:leaf={},hess={}\n",
                    id,
                    format_vector(self.node_value(id)),
                    format_vector(self.node_hessian(id))
                )
                .as_str();
            } else {
                let (left, right) = (Tree::left_child(id), Tree::right_child(id));
                r += format!(
                    "{}:[f{}<={:.4}] yes={},no={},gain={:.4},hess={}\n",
                    id,
                    self.feature[id],
                    self.split_value[id],
                    left,
                    right,
                    self.gain[id],
                    format_vector(self.node_hessian(id))
                )
                .as_str();
                print_buffer.push((right, depth + 1));
                print_buffer.push((left, depth + 1));
            }
        }
        write!(f, "{}", r)
    }
}
