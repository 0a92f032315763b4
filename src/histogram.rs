use crate::binning::BinnedTile;
use crate::data::JaggedMatrix;

/// Gradient and hessian sums for every open node of one tree level.
///
/// Every node owns a block of `(total_bins + 1) * 2 * n_outputs` values. For
/// each bin of each feature the block holds the gradient sums of every
/// output followed by the hessian sums of every output, and the block ends
/// with the node's totals in the same layout. All of it is a single flat
/// buffer so it can be summed across workers in one call.
pub struct LevelHistogram {
    pub data: Vec<f64>,
    pub n_nodes: usize,
    pub n_outputs: usize,
    feature_offsets: Vec<usize>,
    total_bins: usize,
}

impl LevelHistogram {
    /// Histogram with one bin more than there are cuts for every feature.
    pub fn new(n_nodes: usize, cuts: &JaggedMatrix<f64>, n_outputs: usize) -> Self {
        let bins_per_feature: Vec<usize> = (0..cuts.cols).map(|c| cuts.get_col(c).len() + 1).collect();
        LevelHistogram::with_bins(n_nodes, &bins_per_feature, n_outputs)
    }

    /// Histogram holding nothing but the node totals.
    pub fn totals_only(n_nodes: usize, n_outputs: usize) -> Self {
        LevelHistogram::with_bins(n_nodes, &[], n_outputs)
    }

    fn with_bins(n_nodes: usize, bins_per_feature: &[usize], n_outputs: usize) -> Self {
        let mut feature_offsets = Vec::with_capacity(bins_per_feature.len());
        let mut total_bins = 0;
        for b in bins_per_feature {
            feature_offsets.push(total_bins);
            total_bins += b;
        }
        let mut hist = LevelHistogram {
            data: Vec::new(),
            n_nodes,
            n_outputs,
            feature_offsets,
            total_bins,
        };
        hist.data = vec![0.0; n_nodes * hist.node_size()];
        hist
    }

    pub fn n_features(&self) -> usize {
        self.feature_offsets.len()
    }

    fn node_size(&self) -> usize {
        (self.total_bins + 1) * 2 * self.n_outputs
    }

    fn bin_start(&self, slot: usize, bin: usize) -> usize {
        slot * self.node_size() + bin * 2 * self.n_outputs
    }

    fn add(&mut self, start: usize, grad: &[f64], hess: &[f64]) {
        let n = self.n_outputs;
        self.data[start..start + n]
            .iter_mut()
            .zip(grad)
            .for_each(|(a, g)| *a += *g);
        self.data[start + n..start + 2 * n]
            .iter_mut()
            .zip(hess)
            .for_each(|(a, h)| *a += *h);
    }

    /// Add the gradient and hessian of the `i`th row of a binned tile to
    /// the node in `slot`.
    pub fn add_row(&mut self, slot: usize, binned: &BinnedTile, i: usize, grad: &[f64], hess: &[f64]) {
        for feature in 0..self.n_features() {
            let bin = self.feature_offsets[feature] + binned.get(i, feature);
            let start = self.bin_start(slot, bin);
            self.add(start, grad, hess);
        }
        let start = self.bin_start(slot, self.total_bins);
        self.add(start, grad, hess);
    }

    /// Gradient and hessian sums of one bin of one feature.
    pub fn bin(&self, slot: usize, feature: usize, bin: usize) -> (&[f64], &[f64]) {
        self.pair_at(self.bin_start(slot, self.feature_offsets[feature] + bin))
    }

    /// Gradient and hessian sums of everything routed to the node.
    pub fn totals(&self, slot: usize) -> (&[f64], &[f64]) {
        self.pair_at(self.bin_start(slot, self.total_bins))
    }

    fn pair_at(&self, start: usize) -> (&[f64], &[f64]) {
        let n = self.n_outputs;
        (&self.data[start..start + n], &self.data[start + n..start + 2 * n])
    }
}
