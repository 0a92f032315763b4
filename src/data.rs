use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

/// Contigious Column major matrix data container. This is
/// used throughout the crate to view the user provided
/// features and labels without copying them.
pub struct Matrix<'a, T> {
    pub data: &'a [T],
    pub rows: usize,
    pub cols: usize,
    stride1: usize,
    stride2: usize,
}

impl<'a, T> Matrix<'a, T> {
    pub fn new(data: &'a [T], rows: usize, cols: usize) -> Self {
        assert_eq!(
            data.len(),
            rows * cols,
            "Matrix data length does not match rows * cols."
        );
        Matrix {
            data,
            rows,
            cols,
            stride1: rows,
            stride2: 1,
        }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[self.item_index(i, j)]
    }

    fn item_index(&self, i: usize, j: usize) -> usize {
        let mut idx: usize;
        idx = self.stride2 * i;
        idx += j * self.stride1;
        idx
    }

    /// Get a slice of a column in the matrix.
    ///
    /// * `col` - The index of the column to select.
    /// * `start_row` - The index of the start of the slice.
    /// * `end_row` - The index of the end of the slice of the column to select.
    pub fn get_col_slice(&self, col: usize, start_row: usize, end_row: usize) -> &[T] {
        let i = self.item_index(start_row, col);
        let j = self.item_index(end_row, col);
        &self.data[i..j]
    }

    /// Get an entire column in the matrix.
    ///
    /// * `col` - The index of the column to get.
    pub fn get_col(&self, col: usize) -> &[T] {
        self.get_col_slice(col, 0, self.rows)
    }
}

impl<'a, T: Copy> Matrix<'a, T> {
    /// Copy out a single row, rows are strided in this layout.
    pub fn get_row(&self, row: usize) -> Vec<T> {
        (0..self.cols).map(|j| *self.get(row, j)).collect()
    }
}

impl<'a, T> fmt::Display for Matrix<'a, T>
where
    T: FromStr + std::fmt::Display,
    <T as FromStr>::Err: 'static + std::error::Error,
{
    // This trait requires `fmt` with this exact signature.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut val = String::new();
        for i in 0..self.rows {
            for j in 0..self.cols {
                val.push_str(self.get(i, j).to_string().as_str());
                if j == (self.cols - 1) {
                    val.push('\n');
                } else {
                    val.push(' ');
                }
            }
        }
        write!(f, "{}", val)
    }
}

/// Owned row major matrix, with one row per sample and
/// one column per model output. Predictions, gradients and
/// hessians all live in this layout, so that a tile of rows
/// is a single contiguous slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputMatrix {
    pub data: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
}

impl OutputMatrix {
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> Self {
        assert_eq!(
            data.len(),
            rows * cols,
            "OutputMatrix data length does not match rows * cols."
        );
        OutputMatrix { data, rows, cols }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        OutputMatrix::new(vec![0.0; rows * cols], rows, cols)
    }

    /// Repeat a single row of values `rows` times, this is how
    /// a base prediction is broadcast over a dataset.
    pub fn from_row(row: &[f64], rows: usize) -> Self {
        let mut data = Vec::with_capacity(row.len() * rows);
        for _ in 0..rows {
            data.extend_from_slice(row);
        }
        OutputMatrix::new(data, rows, row.len())
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }

}

impl AddAssign<&OutputMatrix> for OutputMatrix {
    fn add_assign(&mut self, other: &OutputMatrix) {
        assert_eq!(self.shape(), other.shape());
        self.data
            .iter_mut()
            .zip(other.data.iter())
            .for_each(|(a, b)| *a += b);
    }
}

/// A jagged column aligned matrix, every column can have
/// a different number of records. Column `i` occupies
/// `data[ends[i-1]..ends[i]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JaggedMatrix<T> {
    pub data: Vec<T>,
    pub ends: Vec<usize>,
    pub cols: usize,
}

impl<T> JaggedMatrix<T> {
    pub fn from_vecs(vecs: Vec<Vec<T>>) -> Self {
        let cols = vecs.len();
        let mut ends = Vec::with_capacity(cols);
        let mut data = Vec::new();
        for v in vecs {
            data.extend(v);
            ends.push(data.len());
        }
        JaggedMatrix {
            data,
            ends,
            cols,
        }
    }

    /// Get an entire column of the jagged matrix.
    pub fn get_col(&self, col: usize) -> &[T] {
        let start = if col == 0 { 0 } else { self.ends[col - 1] };
        &self.data[start..self.ends[col]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_get() {
        let v = vec![1, 2, 3, 5, 6, 7];
        let m = Matrix::new(&v, 2, 3);
        println!("{}", m);
        assert_eq!(m.get(0, 0), &1);
        assert_eq!(m.get(1, 0), &2);
        assert_eq!(m.get(0, 2), &6);
    }

    #[test]
    fn test_get_col_slice() {
        let v = vec![1, 2, 3, 5, 6, 7];
        let m = Matrix::new(&v, 3, 2);
        assert_eq!(m.get_col_slice(0, 0, 3), &vec![1, 2, 3]);
        assert_eq!(m.get_col_slice(1, 0, 2), &vec![5, 6]);
        assert_eq!(m.get_col_slice(1, 1, 3), &vec![6, 7]);
        assert_eq!(m.get_col_slice(0, 1, 2), &vec![2]);
    }

    #[test]
    fn test_get_col_and_row() {
        let v = vec![1, 2, 3, 5, 6, 7];
        let m = Matrix::new(&v, 3, 2);
        assert_eq!(m.get_col(1), &vec![5, 6, 7]);
        assert_eq!(m.get_row(2), vec![3, 7]);
    }

    #[test]
    fn test_output_matrix_rows() {
        let mut m = OutputMatrix::from_row(&[1.0, 2.0], 3);
        assert_eq!(m.shape(), (3, 2));
        assert_eq!(m.row(2), &[1.0, 2.0]);
        m.row_mut(1)[0] = 5.0;
        assert_eq!(m.data, vec![1.0, 2.0, 5.0, 2.0, 1.0, 2.0]);
        let other = OutputMatrix::from_row(&[1.0, 1.0], 3);
        m += &other;
        assert_eq!(m.get(1, 0), 6.0);
    }

    #[test]
    fn test_jagged_columns() {
        let j = JaggedMatrix::from_vecs(vec![vec![1.0, 2.0], vec![], vec![3.0]]);
        assert_eq!(j.cols, 3);
        assert_eq!(j.data.len(), 3);
        assert_eq!(j.get_col(0), &[1.0, 2.0]);
        assert!(j.get_col(1).is_empty());
        assert_eq!(j.get_col(2), &[3.0]);
        assert_eq!(j.ends, vec![2, 2, 3]);
    }
}
