use crate::debug::format_polar_vec;
use crate::math::norm_inf;
use crate::mpopt::MPOpt;
use crate::newton::{mismatch, mismatch_f};
use crate::sparse::{diagonal, row_dot};
use crate::traits::ProgressMonitor;
use crate::PFSolution;
use nalgebra_sparse::CsrMatrix;
use num_complex::Complex64;

/// Solves the power flow using a Gauss-Seidel method.
///
/// Solves for bus voltages given the full system admittance matrix (for
/// all buses), the complex bus power injection vector (for all buses),
/// the initial vector of complex bus voltages, and the lists of bus
/// indices for the swing bus, PV buses, and PQ buses, respectively.
///
/// Each sweep updates the PQ buses and then the PV buses one at a time,
/// always using the latest voltages. PV bus magnitudes are held at their
/// initial values.
pub fn gausspf(
    y_bus: &CsrMatrix<Complex64>,
    s_bus: &[Complex64],
    v0: &[Complex64],
    _ref: &[usize],
    pv: &[usize],
    pq: &[usize],
    mpopt: &MPOpt,
    progress: Option<&dyn ProgressMonitor>,
) -> PFSolution {
    let pvpq = [pv, pq].concat();

    let tol = mpopt.pf.tolerance;
    let max_it = mpopt.pf.max_it();

    // initialize
    let mut converged = false;
    let mut i = 0;
    let mut v = v0.to_vec();
    let vm0: Vec<f64> = v.iter().map(|v| v.norm()).collect();
    let mut s_bus = s_bus.to_vec();
    let y_diag = diagonal(y_bus);

    // evaluate F(x0)
    let mis = mismatch(y_bus, &s_bus, &v);
    let f = mismatch_f(&mis, &pvpq, pq);

    // check tolerance
    let norm_f = norm_inf(&f);
    if let Some(pm) = progress {
        pm.update(i, norm_f);
    }
    if norm_f < tol {
        converged = true;
        log::info!("Gauss-Seidel power flow converged in {} iterations.", i);
    }

    // do Gauss-Seidel iterations
    while !converged && i < max_it {
        // update iteration counter
        i += 1;

        // update voltage
        // at PQ buses
        for &k in pq {
            let i_k = row_dot(y_bus, k, &v);
            let v_k = v[k];
            v[k] = v_k + ((s_bus[k] / v_k).conj() - i_k) / y_diag[k];
        }

        // at PV buses
        for &k in pv {
            let i_k = row_dot(y_bus, k, &v);
            let v_k = v[k];
            s_bus[k].im = (v_k * i_k.conj()).im;
            let v_k = v_k + ((s_bus[k] / v_k).conj() - i_k) / y_diag[k];
            v[k] = v_k * vm0[k] / v_k.norm();
        }

        // evalute F(x)
        let mis = mismatch(y_bus, &s_bus, &v);
        let f = mismatch_f(&mis, &pvpq, pq);

        // check for convergence
        let norm_f = norm_inf(&f);
        if let Some(pm) = progress {
            pm.update(i, norm_f);
        }
        if norm_f < tol {
            converged = true;
            log::info!("Gauss-Seidel power flow converged in {} iterations.", i);
        }
    }

    if !converged {
        log::warn!("Gauss-Seidel power flow did not converge in {} iterations.", i);
    }
    log::debug!("V: {}", format_polar_vec(&v));

    PFSolution {
        v,
        converged,
        iterations: i,
    }
}
