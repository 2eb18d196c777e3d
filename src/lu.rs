use crate::traits::{Factorization, LinearSolver};
use crate::PowerFlowError;
use nalgebra_sparse::CscMatrix;
use rsparse::data::Sprs;
use rsparse::{lsolve, lu, sqr, usolve};

/// Sparse LU solver with approximate minimum degree column ordering.
pub struct RLU {
    /// Partial pivoting tolerance. 1.0 selects the largest entry in
    /// each column, smaller values prefer the diagonal.
    pub pivot_tol: f64,
}

impl Default for RLU {
    fn default() -> Self {
        Self { pivot_tol: 1.0 }
    }
}

struct LUFactors {
    l: Sprs<f64>,
    u: Sprs<f64>,
    pinv: Option<Vec<isize>>,
    q: Option<Vec<isize>>,
}

struct Empty;

impl LinearSolver for RLU {
    fn factor(&self, a_mat: &CscMatrix<f64>) -> Result<Box<dyn Factorization>, PowerFlowError> {
        let n = a_mat.nrows();
        if a_mat.ncols() != n {
            return Err(PowerFlowError::DimensionMismatch {
                what: "columns of square matrix",
                expected: n,
                actual: a_mat.ncols(),
            });
        }
        if n == 0 {
            return Ok(Box::new(Empty));
        }

        let a = Sprs {
            m: n,
            n,
            p: a_mat.col_offsets().iter().map(|&p| p as isize).collect(),
            i: a_mat.row_indices().to_vec(),
            x: a_mat.values().to_vec(),
            nzmax: a_mat.nnz(),
        };

        let mut s = sqr(&a, 1, false); // AMD ordering of A+A'
        let num = lu(&a, &mut s, self.pivot_tol).map_err(|_| PowerFlowError::Singular)?;

        Ok(Box::new(LUFactors {
            l: num.l,
            u: num.u,
            pinv: num.pinv,
            q: s.q,
        }))
    }
}

impl Factorization for LUFactors {
    fn solve(&self, b: &[f64]) -> Result<Vec<f64>, PowerFlowError> {
        let n = self.l.n;
        if b.len() != n {
            return Err(PowerFlowError::DimensionMismatch {
                what: "right-hand side",
                expected: n,
                actual: b.len(),
            });
        }
        let mut x = vec![0.0; n];
        ipvec(&self.pinv, b, &mut x); // x = P*b
        lsolve(&self.l, &mut x); // x = L\x
        usolve(&self.u, &mut x); // x = U\x
        let mut y = vec![0.0; n];
        ipvec(&self.q, &x, &mut y); // y = Q*x

        if y.iter().all(|v| v.is_finite()) {
            Ok(y)
        } else {
            Err(PowerFlowError::Singular)
        }
    }
}

impl Factorization for Empty {
    fn solve(&self, b: &[f64]) -> Result<Vec<f64>, PowerFlowError> {
        if !b.is_empty() {
            return Err(PowerFlowError::DimensionMismatch {
                what: "right-hand side",
                expected: 0,
                actual: b.len(),
            });
        }
        Ok(Vec::new())
    }
}

fn ipvec(p: &Option<Vec<isize>>, b: &[f64], x: &mut [f64]) {
    match p {
        Some(p) => {
            for k in 0..b.len() {
                x[p[k] as usize] = b[k];
            }
        }
        None => x.copy_from_slice(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    fn csc(n: usize, entries: &[(usize, usize, f64)]) -> CscMatrix<f64> {
        let mut coo = CooMatrix::new(n, n);
        for &(i, j, v) in entries {
            coo.push(i, j, v);
        }
        CscMatrix::from(&coo)
    }

    #[test]
    fn test_solve() -> Result<(), PowerFlowError> {
        // | 4 1 0 |   | 1 |   | 6 |
        // | 1 3 1 | * | 2 | = | 10 |
        // | 0 2 5 |   | 3 |   | 19 |
        let a = csc(
            3,
            &[
                (0, 0, 4.0),
                (0, 1, 1.0),
                (1, 0, 1.0),
                (1, 1, 3.0),
                (1, 2, 1.0),
                (2, 1, 2.0),
                (2, 2, 5.0),
            ],
        );
        let x = RLU::default().solve(&a, &[6.0, 10.0, 19.0])?;
        for (xi, ei) in x.iter().zip([1.0, 2.0, 3.0]) {
            assert!((xi - ei).abs() < 1e-12, "x = {:?}", x);
        }
        Ok(())
    }

    #[test]
    fn test_factor_reuse() -> Result<(), PowerFlowError> {
        let a = csc(2, &[(0, 1, 2.0), (1, 0, 4.0)]);
        let lu = RLU::default().factor(&a)?;
        assert_eq!(lu.solve(&[2.0, 4.0])?, vec![1.0, 1.0]);
        assert_eq!(lu.solve(&[4.0, 8.0])?, vec![2.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_singular() {
        let a = csc(2, &[(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 1.0)]);
        let result = RLU::default().solve(&a, &[1.0, 2.0]);
        assert_eq!(result, Err(PowerFlowError::Singular));
    }

    #[test]
    fn test_empty() -> Result<(), PowerFlowError> {
        let a = CscMatrix::from(&CooMatrix::<f64>::new(0, 0));
        assert!(RLU::default().solve(&a, &[])?.is_empty());
        Ok(())
    }
}
