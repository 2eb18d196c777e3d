use crate::debug::{format_f64_vec, format_polar_vec};
use crate::jac::jacobian;
use crate::math::{from_polar, norm_inf};
use crate::mpopt::MPOpt;
use crate::sbus::d_sbus_d_v;
use crate::sparse::spmv;
use crate::traits::{LinearSolver, ProgressMonitor};
use crate::PFSolution;
use nalgebra_sparse::CsrMatrix;
use num_complex::Complex64;

/// Complex power mismatch `V .* conj(Ybus * V) - Sbus`.
pub(crate) fn mismatch(
    y_bus: &CsrMatrix<Complex64>,
    s_bus: &[Complex64],
    v: &[Complex64],
) -> Vec<Complex64> {
    let i_bus = spmv(y_bus, v);
    v.iter()
        .zip(i_bus)
        .zip(s_bus)
        .map(|((v, i), s)| v * i.conj() - s)
        .collect()
}

/// Real mismatch vector `[real(mis[pvpq]); imag(mis[pq])]`.
pub(crate) fn mismatch_f(mis: &[Complex64], pvpq: &[usize], pq: &[usize]) -> Vec<f64> {
    pvpq.iter()
        .map(|&i| mis[i].re)
        .chain(pq.iter().map(|&i| mis[i].im))
        .collect()
}

/// Solves power flow using full Newton's method (power/polar).
///
/// Solves for bus voltages given the full system admittance matrix (for
/// all buses), the complex bus power injection vector (for all buses),
/// the initial vector of complex bus voltages, and the lists of bus
/// indices for the swing bus, PV buses, and PQ buses, respectively. The
/// bus voltage vector contains the set point for generator (including
/// ref bus) buses, and the reference angle of the swing bus, as well as
/// an initial guess for remaining magnitudes and angles.
///
/// A singular Jacobian ends the iterations without convergence.
pub fn newtonpf(
    y_bus: &CsrMatrix<Complex64>,
    s_bus: &[Complex64],
    v0: &[Complex64],
    _ref: &[usize],
    pv: &[usize],
    pq: &[usize],
    lin_solver: &dyn LinearSolver,
    mpopt: &MPOpt,
    progress: Option<&dyn ProgressMonitor>,
) -> PFSolution {
    let pv_pq = [pv, pq].concat();

    let tol = mpopt.pf.tolerance;
    let max_it = mpopt.pf.max_it();

    let mut converged = false;
    let mut i = 0;
    let mut v = v0.to_vec();
    let mut va: Vec<f64> = v.iter().map(|v| v.arg()).collect();
    let mut vm: Vec<f64> = v.iter().map(|v| v.norm()).collect();

    // set up indexing for updating V
    let npv = pv.len();
    let npq = pq.len();
    let (j1, j2) = (0, npv); // j1:j2 - V angle of pv buses
    let (j3, j4) = (j2, j2 + npq); // j3:j4 - V angle of pq buses
    let (j5, j6) = (j4, j4 + npq); // j5:j6 - V mag of pq buses

    // evaluate F(x0)
    let mis = mismatch(y_bus, s_bus, &v);
    let mut f = mismatch_f(&mis, &pv_pq, pq);

    // check tolerance
    let norm_f = norm_inf(&f);
    if let Some(pm) = progress {
        pm.update(i, norm_f);
    }
    if norm_f < tol {
        converged = true;
        log::info!("Newton's method power flow converged in {} iterations.", i);
    }

    // do Newton iterations
    while !converged && i < max_it {
        // update iteration counter
        i += 1;

        // evaluate Jacobian
        let (d_sbus_d_va, d_sbus_d_vm) = d_sbus_d_v(y_bus, &v);
        let jac = jacobian(&d_sbus_d_va, &d_sbus_d_vm, &pv_pq, pq);

        // compute update step
        let neg_f: Vec<f64> = f.iter().map(|f| -f).collect();
        let dx = match lin_solver.solve(&jac, &neg_f) {
            Ok(dx) => dx,
            Err(err) => {
                log::warn!("Newton's method power flow stopped at iteration {}: {}", i, err);
                break;
            }
        };
        log::trace!("dx: {}", format_f64_vec(&dx));

        // update voltage
        pv.iter().zip(j1..j2).for_each(|(&k, j)| va[k] += dx[j]);
        pq.iter().zip(j3..j4).for_each(|(&k, j)| va[k] += dx[j]);
        pq.iter().zip(j5..j6).for_each(|(&k, j)| vm[k] += dx[j]);

        // update Vm and Va again in case we wrapped around with a negative Vm
        v = from_polar(&vm, &va);
        va = v.iter().map(|v| v.arg()).collect();
        vm = v.iter().map(|v| v.norm()).collect();

        // evalute F(x)
        let mis = mismatch(y_bus, s_bus, &v);
        f = mismatch_f(&mis, &pv_pq, pq);

        // check for convergence
        let norm_f = norm_inf(&f);
        if let Some(pm) = progress {
            pm.update(i, norm_f);
        }
        if norm_f < tol {
            converged = true;
            log::info!(
                "Newton's method power flow (power balance, polar) converged in {} iterations.",
                i
            );
        }
    }

    if !converged {
        log::warn!(
            "Newton's method power flow (power balance, polar) did not converge in {} iterations.",
            i
        );
    }
    log::debug!("V: {}", format_polar_vec(&v));

    PFSolution {
        v,
        converged,
        iterations: i,
    }
}
