use crate::debug::format_polar_vec;
use crate::math::{from_polar, norm_inf};
use crate::mpc::{Branch, Bus};
use crate::mpopt::{FdVariant, MPOpt};
use crate::newton::{mismatch, mismatch_f};
use crate::sparse::{neg_imag, select_csc};
use crate::traits::{Factorization, LinearSolver, ProgressMonitor};
use crate::ybus::make_ybus;
use crate::{PFSolution, PowerFlowError};
use nalgebra_sparse::CsrMatrix;
use num_complex::Complex64;

/// Builds the two matrices B prime and B double prime used in the fast
/// decoupled power flow.
///
/// B' ignores bus shunts, line charging and taps. B'' ignores phase
/// shifters. The variant selects which of the two also ignores series
/// resistance: B' for XB, B'' for BX.
pub fn make_b(
    base_mva: f64,
    bus: &[Bus],
    branch: &[Branch],
    variant: FdVariant,
) -> Result<(CsrMatrix<f64>, CsrMatrix<f64>), PowerFlowError> {
    // Form Bp (B prime).
    let b_p = {
        let mut bus = bus.to_vec(); // modify a copy of bus
        for b in bus.iter_mut() {
            b.bs = 0.0; // zero out shunts at buses
        }
        let mut branch = branch.to_vec(); // modify a copy of branch
        for br in branch.iter_mut() {
            br.br_b = 0.0; // zero out line charging shunts
            br.tap = 1.0; // cancel out taps
            if variant == FdVariant::XB {
                br.br_r = 0.0; // zero out line resistance
            }
        }
        let (y_p, _, _) = make_ybus(base_mva, &bus, &branch)?;
        neg_imag(&y_p)
    };

    // Form Bpp (B double prime).
    let b_pp = {
        let mut branch = branch.to_vec(); // modify a copy of branch
        for br in branch.iter_mut() {
            br.shift = 0.0; // zero out phase shifters
            if variant == FdVariant::BX {
                br.br_r = 0.0; // zero out line resistance
            }
        }
        let (y_pp, _, _) = make_ybus(base_mva, bus, &branch)?;
        neg_imag(&y_pp)
    };

    Ok((b_p, b_pp))
}

/// Solves power flow using fast decoupled method.
///
/// Solves for bus voltages given the full system admittance matrix (for
/// all buses), the complex bus power injection vector (for all buses),
/// the initial vector of complex bus voltages, the FDPF matrices B prime
/// and B double prime, and the lists of bus indices for the swing bus,
/// PV buses, and PQ buses, respectively.
///
/// The reduced B matrices are factored once and reused by every
/// iteration. Convergence is tested on the same mismatch as Newton's
/// method, after both the P and the Q half iteration.
pub fn fdpf(
    y_bus: &CsrMatrix<Complex64>,
    s_bus: &[Complex64],
    v0: &[Complex64],
    b_p: &CsrMatrix<f64>,
    b_pp: &CsrMatrix<f64>,
    _ref: &[usize],
    pv: &[usize],
    pq: &[usize],
    lin_solver: &dyn LinearSolver,
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
    let mut va: Vec<f64> = v.iter().map(|v| v.arg()).collect();
    let mut vm: Vec<f64> = v.iter().map(|v| v.norm()).collect();

    // evaluate initial mismatch
    let (mut p, mut q, norm_f) = fd_mismatch(y_bus, s_bus, &v, &vm, &pvpq, pq);

    // check tolerance
    if let Some(pm) = progress {
        pm.update(i, norm_f);
    }
    if norm_f < tol {
        log::info!("Fast-decoupled power flow converged in {} iterations.", i);
        return PFSolution {
            v,
            converged: true,
            iterations: i,
        };
    }

    // reduce B matrices and factor them once
    let factors = lin_solver
        .factor(&select_csc(b_p, &pvpq, &pvpq))
        .and_then(|bp| Ok((bp, lin_solver.factor(&select_csc(b_pp, pq, pq))?)));
    let (bp_factor, bpp_factor): (Box<dyn Factorization>, Box<dyn Factorization>) = match factors {
        Ok(factors) => factors,
        Err(err) => {
            log::warn!("Fast-decoupled power flow: B matrix factorization failed: {}", err);
            return PFSolution {
                v,
                converged: false,
                iterations: i,
            };
        }
    };

    // do P and Q iterations
    while !converged && i < max_it {
        // update iteration counter
        i += 1;

        // do P iteration, update Va
        let neg_p: Vec<f64> = p.iter().map(|p| -p).collect();
        let dva = match bp_factor.solve(&neg_p) {
            Ok(dva) => dva,
            Err(err) => {
                log::warn!("Fast-decoupled power flow stopped at iteration {}: {}", i, err);
                break;
            }
        };
        pvpq.iter().zip(dva).for_each(|(&k, dva)| va[k] += dva);
        v = from_polar(&vm, &va);

        // evaluate mismatch
        let norm_f;
        (p, q, norm_f) = fd_mismatch(y_bus, s_bus, &v, &vm, &pvpq, pq);

        // check tolerance
        if let Some(pm) = progress {
            pm.update(i, norm_f);
        }
        if norm_f < tol {
            converged = true;
            log::info!(
                "Fast-decoupled power flow converged in {} P-iterations and {} Q-iterations.",
                i,
                i - 1
            );
            break;
        }

        // do Q iteration, update Vm
        let neg_q: Vec<f64> = q.iter().map(|q| -q).collect();
        let dvm = match bpp_factor.solve(&neg_q) {
            Ok(dvm) => dvm,
            Err(err) => {
                log::warn!("Fast-decoupled power flow stopped at iteration {}: {}", i, err);
                break;
            }
        };
        pq.iter().zip(dvm).for_each(|(&k, dvm)| vm[k] += dvm);
        v = from_polar(&vm, &va);

        // evaluate mismatch
        let norm_f;
        (p, q, norm_f) = fd_mismatch(y_bus, s_bus, &v, &vm, &pvpq, pq);

        // check tolerance
        if let Some(pm) = progress {
            pm.update(i, norm_f);
        }
        if norm_f < tol {
            converged = true;
            log::info!(
                "Fast-decoupled power flow converged in {} P-iterations and {} Q-iterations.",
                i,
                i
            );
        }
    }

    if !converged {
        log::warn!("Fast-decoupled power flow did not converge in {} iterations.", i);
    }
    log::debug!("V: {}", format_polar_vec(&v));

    PFSolution {
        v,
        converged,
        iterations: i,
    }
}

/// Returns the normalized mismatches `P = real(mis[pvpq]) / Vm[pvpq]` and
/// `Q = imag(mis[pq]) / Vm[pq]` together with the infinity norm of the
/// un-normalized mismatch.
fn fd_mismatch(
    y_bus: &CsrMatrix<Complex64>,
    s_bus: &[Complex64],
    v: &[Complex64],
    vm: &[f64],
    pvpq: &[usize],
    pq: &[usize],
) -> (Vec<f64>, Vec<f64>, f64) {
    let mis = mismatch(y_bus, s_bus, v);
    let norm_f = norm_inf(&mismatch_f(&mis, pvpq, pq));

    let p = pvpq.iter().map(|&k| mis[k].re / vm[k]).collect();
    let q = pq.iter().map(|&k| mis[k].im / vm[k]).collect();

    (p, q, norm_f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::spmv;

    fn network() -> (Vec<Bus>, Vec<Branch>) {
        let bus = (0..2)
            .map(|i| Bus {
                bus_i: i,
                bs: 20.0,
                ..Default::default()
            })
            .collect();
        let branch = vec![Branch {
            f_bus: 0,
            t_bus: 1,
            br_r: 0.1,
            br_x: 0.2,
            br_b: 0.04,
            tap: 1.1,
            shift: 5.0,
            br_status: true,
            ..Default::default()
        }];
        (bus, branch)
    }

    #[test]
    fn test_make_b_xb() -> Result<(), PowerFlowError> {
        let (bus, branch) = network();
        let (b_p, b_pp) = make_b(100.0, &bus, &branch, FdVariant::XB)?;

        // B' = 1/x with no shunts or taps, phase shift kept.
        assert!((spmv(&b_p, &[1.0, 0.0])[0] - 5.0).abs() < 1e-12);
        let b_ft = -5.0 * (5.0f64).to_radians().cos();
        assert!((spmv(&b_p, &[0.0, 1.0])[0] - b_ft).abs() < 1e-12);

        // B'' keeps r, taps, line charging and bus shunts.
        let b_s = 0.2 / (0.1 * 0.1 + 0.2 * 0.2);
        let b_tt = b_s - 0.02 - 0.2;
        assert!((spmv(&b_pp, &[0.0, 1.0])[1] - b_tt).abs() < 1e-12);
        let b_ff = (b_s - 0.02) / (1.1 * 1.1) - 0.2;
        assert!((spmv(&b_pp, &[1.0, 0.0])[0] - b_ff).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_make_b_bx() -> Result<(), PowerFlowError> {
        let (bus, branch) = network();
        let (b_p, b_pp) = make_b(100.0, &bus, &branch, FdVariant::BX)?;

        // B' keeps r.
        let b_s = 0.2 / (0.1 * 0.1 + 0.2 * 0.2);
        assert!((spmv(&b_p, &[1.0, 0.0])[0] - b_s).abs() < 1e-12);

        // B'' = 1/x with taps, line charging and shunts.
        let b_tt = 5.0 - 0.02 - 0.2;
        assert!((spmv(&b_pp, &[0.0, 1.0])[1] - b_tt).abs() < 1e-12);
        Ok(())
    }
}
