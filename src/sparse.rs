use nalgebra::{DVector, Scalar};
use nalgebra_sparse::{CooMatrix, CscMatrix, CsrMatrix};
use num_complex::Complex64;
use num_traits::Zero;
use std::ops::Mul;

/// Sparse matrix-vector product `a * x`.
pub fn spmv<T: Scalar>(a: &CsrMatrix<T>, x: &[T]) -> Vec<T>
where
    for<'a> &'a CsrMatrix<T>: Mul<&'a DVector<T>, Output = DVector<T>>,
{
    let x = DVector::from_column_slice(x);
    (a * &x).as_slice().to_vec()
}

/// Dot product of row `i` of `a` with `x`. Used by sweeps that update
/// `x` in place between rows.
pub(crate) fn row_dot(a: &CsrMatrix<Complex64>, i: usize, x: &[Complex64]) -> Complex64 {
    let row = a.row(i);
    row.col_indices()
        .iter()
        .zip(row.values())
        .map(|(&j, v)| v * x[j])
        .sum()
}

/// Returns the diagonal of a square matrix, zero where no entry is stored.
pub(crate) fn diagonal(a: &CsrMatrix<Complex64>) -> Vec<Complex64> {
    let mut diag = vec![Complex64::zero(); a.nrows()];
    for (i, j, v) in a.triplet_iter() {
        if i == j {
            diag[i] += v;
        }
    }
    diag
}

/// Pushes the sub-matrix `a[rows, cols]`, transformed by `f`, into `coo`
/// with its top-left corner at `offset`. Row and column selections may be
/// in any order.
pub(crate) fn push_block<T, F>(
    coo: &mut CooMatrix<f64>,
    a: &CsrMatrix<T>,
    rows: &[usize],
    cols: &[usize],
    offset: (usize, usize),
    f: F,
) where
    F: Fn(&T) -> f64,
{
    let mut col_map = vec![None; a.ncols()];
    for (k, &j) in cols.iter().enumerate() {
        col_map[j] = Some(k);
    }
    let (r0, c0) = offset;
    for (k, &i) in rows.iter().enumerate() {
        let row = a.row(i);
        for (&j, v) in row.col_indices().iter().zip(row.values()) {
            if let Some(l) = col_map[j] {
                coo.push(r0 + k, c0 + l, f(v));
            }
        }
    }
}

/// Selects `a[rows, cols]` as a compressed column matrix ready for
/// factorization.
pub fn select_csc(a: &CsrMatrix<f64>, rows: &[usize], cols: &[usize]) -> CscMatrix<f64> {
    let mut coo = CooMatrix::new(rows.len(), cols.len());
    push_block(&mut coo, a, rows, cols, (0, 0), |&v| v);
    CscMatrix::from(&coo)
}

/// Returns `-imag(a)`.
pub(crate) fn neg_imag(a: &CsrMatrix<Complex64>) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(a.nrows(), a.ncols());
    for (i, j, v) in a.triplet_iter() {
        coo.push(i, j, -v.im);
    }
    CsrMatrix::from(&coo)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CsrMatrix<f64> {
        // | 1 0 2 |
        // | 0 3 0 |
        // | 4 0 5 |
        let mut coo = CooMatrix::new(3, 3);
        coo.push(0, 0, 1.0);
        coo.push(0, 2, 2.0);
        coo.push(1, 1, 3.0);
        coo.push(2, 0, 4.0);
        coo.push(2, 2, 5.0);
        CsrMatrix::from(&coo)
    }

    #[test]
    fn test_spmv() {
        let a = sample();
        assert_eq!(spmv(&a, &[1.0, 1.0, 1.0]), vec![3.0, 3.0, 9.0]);
    }

    #[test]
    fn test_select_reordered() {
        let a = sample();
        let s = select_csc(&a, &[2, 0], &[2, 0]);
        let dense: Vec<(usize, usize, f64)> = s.triplet_iter().map(|(i, j, &v)| (i, j, v)).collect();
        assert!(dense.contains(&(0, 0, 5.0)));
        assert!(dense.contains(&(0, 1, 4.0)));
        assert!(dense.contains(&(1, 0, 2.0)));
        assert!(dense.contains(&(1, 1, 1.0)));
        assert_eq!(s.nnz(), 4);
    }
}
