use crate::math::{norm_inf, select};
use crate::mpc::{Branch, Bus};
use crate::sparse::{select_csc, spmv};
use crate::traits::LinearSolver;
use crate::ybus::check_internal;
use crate::PowerFlowError;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use std::f64::consts::PI;

/// Solves a DC power flow.
///
/// Solves for the bus voltage angles at all but the reference bus,
/// given the full system B matrix and the vector of bus real power injections,
/// the initial vector of bus voltage angles (in radians), and the lists of
/// bus indices for the swing bus, PV buses, and PQ buses, respectively.
/// Returns a vector of bus voltage angles in radians and a success flag.
/// A singular system (e.g. an island without a reference bus) is reported
/// as failure with the initial angles.
pub fn dc_pf(
    b_mat: &CsrMatrix<f64>,
    p_bus: &[f64],
    va0: &[f64],
    ref_: &[usize],
    pv: &[usize],
    pq: &[usize],
    lin_solver: &dyn LinearSolver,
) -> (Vec<f64>, bool) {
    let va_threshold = 1e5; // arbitrary threshold on |Va| for declaring failure

    // initialize result vector
    let mut va = va0.to_vec();

    // update angles for non-reference buses
    let pvpq = [pv, pq].concat();

    // Va([pv; pq]) = B([pv; pq], [pv; pq]) \ ...
    //                     (Pbus([pv; pq]) - B([pv; pq], ref) * Va0(ref));
    let b_pvpq = select_csc(b_mat, &pvpq, &pvpq);
    let rhs = dc_rhs(b_mat, p_bus, va0, ref_, &pvpq);

    let va_pvpq = match lin_solver.solve(&b_pvpq, &rhs) {
        Ok(va_pvpq) => va_pvpq,
        Err(err) => {
            log::warn!("DC power flow failed: {}", err);
            return (va, false);
        }
    };
    pvpq.iter()
        .zip(va_pvpq)
        .for_each(|(&i, va_i)| va[i] = va_i);

    let success = norm_inf(&va) <= va_threshold;
    if !success {
        log::warn!("DC power flow failed: voltage angles exceed {} radians", va_threshold);
    }

    (va, success)
}

/// Returns `Pbus[pvpq] - B[pvpq, ref] * Va0[ref]`.
pub(crate) fn dc_rhs(
    b_mat: &CsrMatrix<f64>,
    p_bus: &[f64],
    va0: &[f64],
    ref_: &[usize],
    pvpq: &[usize],
) -> Vec<f64> {
    let mut va_ref = vec![0.0; va0.len()];
    ref_.iter().for_each(|&i| va_ref[i] = va0[i]);
    let p_ref = spmv(b_mat, &va_ref);

    pvpq.iter().map(|&i| p_bus[i] - p_ref[i]).collect()
}

/// Builds the B matrices and phase shift injections for DC power flow.
///
/// Returns the B matrices and phase shift injection vectors needed for
/// a DC power flow. The bus real power injections are related to bus
/// voltage angles by
///     P = BBUS * Va + PBUSINJ
/// The real power flows at the from end the lines are related to the bus
/// voltage angles by
///     Pf = BF * Va + PFINJ
/// Does appropriate conversions to p.u.
/// Bus numbers must be consecutive beginning at 0 (i.e. internal ordering).
pub fn make_b_dc(
    bus: &[Bus],
    branch: &[Branch],
) -> Result<(CsrMatrix<f64>, CsrMatrix<f64>, Vec<f64>, Vec<f64>), PowerFlowError> {
    check_internal(bus)?;

    let (nl, nb) = (branch.len(), bus.len());

    fn br_b(br: &Branch) -> f64 {
        let b = if br.is_on() { 1.0 / br.br_x } else { 0.0 }; // series susceptance
        b / br.ratio()
    }

    // Build Bf such that Bf * Va is the vector of real branch powers injected
    // at each branch's "from" bus, and Bbus = Cft' * Bf where Cft = Cf - Ct.
    let mut b_f = CooMatrix::new(nl, nb);
    let mut b_bus = CooMatrix::new(nb, nb);
    for (i, br) in branch.iter().enumerate() {
        let b = br_b(br);
        let (f, t) = (br.f_bus, br.t_bus);

        b_f.push(i, f, b);
        b_f.push(i, t, -b);

        b_bus.push(f, f, b);
        b_bus.push(f, t, -b);
        b_bus.push(t, f, -b);
        b_bus.push(t, t, b);
    }

    // Build phase shift injection vectors.
    let pfinj = branch
        .iter()
        .map(|br| br_b(br) * -br.shift * PI / 180.0)
        .collect::<Vec<f64>>(); // injected at the from bus ...

    let mut pbusinj = vec![0.0; nb]; // ... and extracted at the to bus
    for (br, p) in branch.iter().zip(&pfinj) {
        pbusinj[br.f_bus] += p;
        pbusinj[br.t_bus] -= p;
    }

    Ok((
        CsrMatrix::from(&b_bus),
        CsrMatrix::from(&b_f),
        pbusinj,
        pfinj,
    ))
}

/// Real power injection vector for the DC power flow (p.u.): generation
/// minus load, phase shift injections and shunt conductance.
pub(crate) fn dc_p_bus(
    base_mva: f64,
    bus: &[Bus],
    s_bus_re: &[f64],
    pbusinj: &[f64],
) -> Vec<f64> {
    bus.iter()
        .zip(s_bus_re)
        .zip(pbusinj)
        .map(|((b, p), inj)| p - inj - b.gs / base_mva)
        .collect()
}

/// Residual `B[pvpq, pvpq] * Va[pvpq] - rhs`, used to check solutions.
pub fn dc_residual(
    b_mat: &CsrMatrix<f64>,
    p_bus: &[f64],
    va: &[f64],
    ref_: &[usize],
    pv: &[usize],
    pq: &[usize],
) -> Vec<f64> {
    let pvpq = [pv, pq].concat();
    let rhs = dc_rhs(b_mat, p_bus, va, ref_, &pvpq);

    let mut va_pvpq = vec![0.0; va.len()];
    pvpq.iter().for_each(|&i| va_pvpq[i] = va[i]);
    let lhs = select(&spmv(b_mat, &va_pvpq), &pvpq);

    lhs.iter().zip(rhs).map(|(l, r)| l - r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lu::RLU;
    use crate::tests::case9;
    use crate::{bus_types, make_sbus};
    use anyhow::Result;

    #[test]
    fn test_make_b_dc() -> Result<()> {
        let bus: Vec<Bus> = (0..2)
            .map(|i| Bus {
                bus_i: i,
                ..Default::default()
            })
            .collect();
        let br = Branch {
            f_bus: 0,
            t_bus: 1,
            br_x: 0.1,
            tap: 0.5,
            shift: -30.0,
            br_status: true,
            ..Default::default()
        };
        let (b_bus, b_f, pbusinj, pfinj) = make_b_dc(&bus, &[br])?;

        let b = 1.0 / (0.1 * 0.5);
        assert_eq!(spmv(&b_f, &[1.0, 0.0]), vec![b]);
        assert_eq!(spmv(&b_bus, &[1.0, 0.0]), vec![b, -b]);
        assert!((pfinj[0] - b * PI / 6.0).abs() < 1e-12);
        assert_eq!(pbusinj, vec![pfinj[0], -pfinj[0]]);
        Ok(())
    }

    #[test]
    fn test_dc_pf_residual() -> Result<()> {
        let mpc = case9()?;
        let (b_bus, _, pbusinj, _) = make_b_dc(&mpc.bus, &mpc.branch)?;
        let (ref_, pv, pq) = bus_types(&mpc.bus, &mpc.gen)?;

        let s_bus = make_sbus(mpc.base_mva, &mpc.bus, &mpc.gen);
        let s_re: Vec<f64> = s_bus.iter().map(|s| s.re).collect();
        let p_bus = dc_p_bus(mpc.base_mva, &mpc.bus, &s_re, &pbusinj);
        let va0 = vec![0.0; mpc.bus.len()];

        let (va, success) = dc_pf(&b_bus, &p_bus, &va0, &ref_, &pv, &pq, &RLU::default());
        assert!(success);
        assert_eq!(va[ref_[0]], 0.0);

        let residual = dc_residual(&b_bus, &p_bus, &va, &ref_, &pv, &pq);
        assert!(norm_inf(&residual) < 1e-10, "residual: {:?}", residual);
        Ok(())
    }

    #[test]
    fn test_dc_pf_island() -> Result<()> {
        let mut mpc = case9()?;
        // Disconnect buses 3 and 6 (internal 2 and 5) from the rest of the network.
        for br in mpc.branch.iter_mut() {
            let island = [br.f_bus, br.t_bus].iter().any(|&b| b == 2 || b == 5)
                && !(br.f_bus == 2 && br.t_bus == 5 || br.f_bus == 5 && br.t_bus == 2);
            if island {
                br.br_status = false;
            }
        }
        let (b_bus, _, _, _) = make_b_dc(&mpc.bus, &mpc.branch)?;
        let (ref_, pv, pq) = bus_types(&mpc.bus, &mpc.gen)?;
        let p_bus = vec![0.1; mpc.bus.len()];
        let va0 = vec![0.0; mpc.bus.len()];

        let (va, success) = dc_pf(&b_bus, &p_bus, &va0, &ref_, &pv, &pq, &RLU::default());
        assert!(!success, "island without reference must fail");
        assert_eq!(va.len(), mpc.bus.len());
        Ok(())
    }
}
