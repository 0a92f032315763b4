use crate::data::{JaggedMatrix, Matrix};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use std::ops::Range;

// Rather than sorting every value of every feature, the candidate
// thresholds are drawn from a small random set of rows. For each feature
// the sampled values are sorted and de-duplicated, and a row goes left
// at candidate `t` if `x <= t`.
//
// With cuts [1.0, 2.5, 4.0] a value is placed in the first bin whose cut
// is >= the value:
//   x <= 1.0        -> bin 0
//   1.0 < x <= 2.5  -> bin 1
//   2.5 < x <= 4.0  -> bin 2
//   4.0 < x         -> bin 3
// so a split at candidate k sends bins 0..=k left.

/// Draw `n_samples` rows (capped at the number of rows) without
/// replacement, and collect their values as the candidate thresholds of
/// every feature.
pub fn split_proposals(data: &Matrix<f64>, n_samples: usize, rng: &mut StdRng) -> JaggedMatrix<f64> {
    let n_samples = n_samples.min(data.rows);
    let mut rows = sample(rng, data.rows, n_samples).into_vec();
    rows.sort_unstable();
    let cuts = (0..data.cols)
        .map(|col| {
            let mut col_cuts: Vec<f64> = rows
                .iter()
                .map(|r| *data.get(*r, col))
                .filter(|v| !v.is_nan())
                .collect();
            col_cuts.sort_by(|a, b| a.total_cmp(b));
            col_cuts.dedup();
            col_cuts
        })
        .collect();
    JaggedMatrix::from_vecs(cuts)
}

/// Index of the first cut that is greater than or equal to `value`,
/// or the number of cuts if there is none. Missing values compare false
/// against every cut, so they land in the last bin and always go right.
pub fn bin_of(cuts: &[f64], value: f64) -> usize {
    if value.is_nan() {
        return cuts.len();
    }
    cuts.partition_point(|c| *c < value)
}

/// The bin of every value of a tile of rows, stored column major.
pub struct BinnedTile {
    pub bins: Vec<u32>,
    pub rows: Range<usize>,
    pub cols: usize,
}

impl BinnedTile {
    pub fn new(data: &Matrix<f64>, cuts: &JaggedMatrix<f64>, rows: Range<usize>) -> Self {
        let bins = (0..data.cols)
            .flat_map(|col| {
                let col_cuts = cuts.get_col(col);
                data.get_col_slice(col, rows.start, rows.end)
                    .iter()
                    .map(move |v| bin_of(col_cuts, *v) as u32)
            })
            .collect();
        BinnedTile {
            bins,
            rows,
            cols: data.cols,
        }
    }

    /// Bin of the `i`th row of the tile, not the `i`th row of the data.
    pub fn get(&self, i: usize, col: usize) -> usize {
        self.bins[col * self.rows.len() + i] as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_bin_of() {
        let cuts = vec![1.0, 2.5, 4.0];
        assert_eq!(bin_of(&cuts, 0.0), 0);
        assert_eq!(bin_of(&cuts, 1.0), 0);
        assert_eq!(bin_of(&cuts, 1.5), 1);
        assert_eq!(bin_of(&cuts, 2.5), 1);
        assert_eq!(bin_of(&cuts, 4.0), 2);
        assert_eq!(bin_of(&cuts, 4.1), 3);
        assert_eq!(bin_of(&[], 4.1), 0);
        assert_eq!(bin_of(&cuts, f64::NAN), 3);
    }

    #[test]
    fn test_split_proposals() {
        let data_vec = vec![3., 1., 1., 2., 3., 10., 10., 20., 20., 30.];
        let data = Matrix::new(&data_vec, 5, 2);
        let mut rng = StdRng::seed_from_u64(0);
        // Asking for more rows than exist uses every row.
        let cuts = split_proposals(&data, 256, &mut rng);
        assert_eq!(cuts.get_col(0), &[1., 2., 3.]);
        assert_eq!(cuts.get_col(1), &[10., 20., 30.]);

        let mut rng = StdRng::seed_from_u64(0);
        let cuts = split_proposals(&data, 2, &mut rng);
        assert!(cuts.get_col(0).len() <= 2);
        assert!(cuts.get_col(0).windows(2).all(|w| w[0] < w[1]));
        let mut rng = StdRng::seed_from_u64(0);
        let again = split_proposals(&data, 2, &mut rng);
        assert_eq!(cuts.data, again.data);
    }

    #[test]
    fn test_binned_tile() {
        let data_vec = vec![0., 1., 2., 3., 4., 5., 5., 4., 3., 2., 1., 0.];
        let data = Matrix::new(&data_vec, 6, 2);
        let cuts = JaggedMatrix::from_vecs(vec![vec![1.5, 3.5], vec![2.0]]);
        let tile = BinnedTile::new(&data, &cuts, 2..5);
        assert_eq!(tile.bins, vec![1, 1, 2, 1, 0, 0]);
        assert_eq!(tile.get(0, 0), 1);
        assert_eq!(tile.get(2, 1), 0);
        // Every value is <= its cut iff its bin is <= the cut index.
        for i in 0..3 {
            for col in 0..2 {
                let v = *data.get(i + 2, col);
                for (k, c) in cuts.get_col(col).iter().enumerate() {
                    assert_eq!(v <= *c, tile.get(i, col) <= k);
                }
            }
        }
    }
}
