use crate::PowerFlowError;
use nalgebra_sparse::CscMatrix;

/// Sparse linear system solver used by the power flow methods.
///
/// Implementations return `PowerFlowError::Singular` when the matrix
/// cannot be factored or the solution is not finite.
pub trait LinearSolver {
    /// Factors a square matrix so that it can be solved against any
    /// number of right-hand sides.
    fn factor(&self, a_mat: &CscMatrix<f64>) -> Result<Box<dyn Factorization>, PowerFlowError>;

    /// Solves `a_mat * x = b`.
    fn solve(&self, a_mat: &CscMatrix<f64>, b: &[f64]) -> Result<Vec<f64>, PowerFlowError> {
        self.factor(a_mat)?.solve(b)
    }
}

/// A factored matrix.
pub trait Factorization {
    fn solve(&self, b: &[f64]) -> Result<Vec<f64>, PowerFlowError>;
}

/// Receives the mismatch norm after each solver iteration.
pub trait ProgressMonitor {
    fn update(&self, i: usize, norm_f: f64);
}

/// Writes the iteration table to the log.
pub struct LogProgress {}

impl ProgressMonitor for LogProgress {
    fn update(&self, i: usize, norm_f: f64) {
        if i == 0 {
            log::info!(" it    max P & Q mismatch (p.u.)");
            log::info!("----  ---------------------------");
        }
        log::info!("{:3}        {:10.3e}", i, norm_f);
    }
}
