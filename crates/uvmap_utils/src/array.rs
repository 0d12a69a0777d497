use ndarray as nd;
use num_traits;

//there is no gather in ndarray, see https://github.com/rust-ndarray/ndarray/issues/526#issuecomment-434917877
pub trait Gather2D<T: nd::ScalarOperand + num_traits::identities::Zero + Copy> {
    fn gather(&self, indices_rows: &[usize], indices_cols: &[usize]) -> nd::Array2<T>; //equivalent of python dst=src[indices_rows][:, indices_cols]
}
impl<T: nd::ScalarOperand + num_traits::identities::Zero + Copy> Gather2D<T> for nd::Array2<T> {
    fn gather(&self, indices_rows: &[usize], indices_cols: &[usize]) -> nd::Array2<T> {
        let mut res = nd::Array2::zeros((indices_rows.len(), indices_cols.len()));
        for (i_out, &i_in) in indices_rows.iter().enumerate() {
            for (j_out, &j_in) in indices_cols.iter().enumerate() {
                res[(i_out, j_out)] = self[(i_in, j_in)];
            }
        }
        res
    }
}

/// Accumulates rows of ``self`` into ``dst`` at ``indices_rows`` and counts
/// how many rows landed on each destination row. Used to average values that
/// are duplicated along uv seams.
pub trait ScatterAdd2D<T: nd::ScalarOperand + num_traits::identities::Zero + Copy + std::ops::AddAssign> {
    fn scatter_add(&self, indices_rows: &[usize], dst: &mut nd::Array2<T>, counts: &mut [usize]);
}
impl<T: nd::ScalarOperand + num_traits::identities::Zero + Copy + std::ops::AddAssign> ScatterAdd2D<T> for nd::Array2<T> {
    fn scatter_add(&self, indices_rows: &[usize], dst: &mut nd::Array2<T>, counts: &mut [usize]) {
        for (i_in, &i_out) in indices_rows.iter().enumerate() {
            for j in 0..self.ncols() {
                dst[(i_out, j)] += self[(i_in, j)];
            }
            counts[i_out] += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn gather_picks_rows_and_cols() {
        let src = array![[0.0f32, 1.0, 2.0], [3.0, 4.0, 5.0], [6.0, 7.0, 8.0]];
        let dst = src.gather(&[2, 0, 2], &[1, 2]);
        assert_eq!(dst, array![[7.0, 8.0], [1.0, 2.0], [7.0, 8.0]]);
    }

    #[test]
    fn scatter_add_counts_duplicates() {
        let src = array![[1.0f32, 1.0], [3.0, 5.0], [2.0, 2.0]];
        let mut dst = nd::Array2::<f32>::zeros((2, 2));
        let mut counts = vec![0; 2];
        src.scatter_add(&[1, 1, 0], &mut dst, &mut counts);
        assert_eq!(dst, array![[2.0, 2.0], [4.0, 6.0]]);
        assert_eq!(counts, vec![1, 2]);
    }
}
