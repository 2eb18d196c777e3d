use crate::dc::{dc_p_bus, dc_pf, make_b_dc};
use crate::fd::{fdpf, make_b};
use crate::gauss::gausspf;
use crate::mpc::{Branch, Bus};
use crate::mpopt::{Alg, MPOpt};
use crate::newton::newtonpf;
use crate::traits::{LinearSolver, ProgressMonitor};
use crate::PowerFlowError;
use nalgebra_sparse::CsrMatrix;
use num_complex::Complex64;

/// Outcome of a power flow solve. `v` is the last iterate whether or not
/// the method converged.
#[derive(Debug, Clone)]
pub struct PFSolution {
    pub v: Vec<Complex64>,
    pub converged: bool,
    pub iterations: usize,
}

/// Inputs shared by all power flow methods. Tables must use internal
/// consecutive bus numbering.
pub struct PFProblem<'a> {
    pub base_mva: f64,
    pub bus: &'a [Bus],
    pub branch: &'a [Branch],
    pub y_bus: &'a CsrMatrix<Complex64>,
    pub s_bus: &'a [Complex64],
    pub v0: &'a [Complex64],
    pub ref_: &'a [usize],
    pub pv: &'a [usize],
    pub pq: &'a [usize],
}

impl Alg {
    /// Solves the power flow with this method.
    ///
    /// Non-convergence and singular matrices are reported through
    /// `PFSolution::converged`. The DC method returns `1∠Va` for every bus.
    pub fn solve(
        &self,
        pf: &PFProblem,
        lin_solver: &dyn LinearSolver,
        mpopt: &MPOpt,
        progress: Option<&dyn ProgressMonitor>,
    ) -> Result<PFSolution, PowerFlowError> {
        let soln = match self {
            Alg::NR => newtonpf(
                pf.y_bus, pf.s_bus, pf.v0, pf.ref_, pf.pv, pf.pq, lin_solver, mpopt, progress,
            ),
            Alg::FD(variant) => {
                let (b_p, b_pp) = make_b(pf.base_mva, pf.bus, pf.branch, *variant)?;
                fdpf(
                    pf.y_bus, pf.s_bus, pf.v0, &b_p, &b_pp, pf.ref_, pf.pv, pf.pq, lin_solver,
                    mpopt, progress,
                )
            }
            Alg::GS => gausspf(
                pf.y_bus, pf.s_bus, pf.v0, pf.ref_, pf.pv, pf.pq, mpopt, progress,
            ),
            Alg::DC => {
                let (b_bus, _, pbusinj, _) = make_b_dc(pf.bus, pf.branch)?;
                let s_re: Vec<f64> = pf.s_bus.iter().map(|s| s.re).collect();
                let p_bus = dc_p_bus(pf.base_mva, pf.bus, &s_re, &pbusinj);
                let va0: Vec<f64> = pf.v0.iter().map(|v| v.arg()).collect();

                let (va, success) =
                    dc_pf(&b_bus, &p_bus, &va0, pf.ref_, pf.pv, pf.pq, lin_solver);
                PFSolution {
                    v: va.iter().map(|&va| Complex64::from_polar(1.0, va)).collect(),
                    converged: success,
                    iterations: 1,
                }
            }
        };
        Ok(soln)
    }
}
