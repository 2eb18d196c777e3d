use anyhow::Result;
use nalgebra_sparse::{CooMatrix, CscMatrix, CsrMatrix};
use num_complex::Complex64;

use crate::debug::format_polar_vec;
use crate::sparse::push_block;
use crate::{bus_types, d_sbus_d_v, MPC};

/// Assembles the real power flow Jacobian
///
/// ```text
/// | dP/dVa[pvpq, pvpq]  dP/dVm[pvpq, pq] |
/// | dQ/dVa[pq, pvpq]    dQ/dVm[pq, pq]   |
/// ```
///
/// from the complex partial derivatives of the bus power injections.
pub fn jacobian(
    d_sbus_d_va: &CsrMatrix<Complex64>,
    d_sbus_d_vm: &CsrMatrix<Complex64>,
    pvpq: &[usize],
    pq: &[usize],
) -> CscMatrix<f64> {
    let (n1, n2) = (pvpq.len(), pq.len());
    let mut jac = CooMatrix::new(n1 + n2, n1 + n2);

    push_block(&mut jac, d_sbus_d_va, pvpq, pvpq, (0, 0), |s| s.re);
    push_block(&mut jac, d_sbus_d_vm, pvpq, pq, (0, n1), |s| s.re);
    push_block(&mut jac, d_sbus_d_va, pq, pvpq, (n1, 0), |s| s.im);
    push_block(&mut jac, d_sbus_d_vm, pq, pq, (n1, n1), |s| s.im);

    CscMatrix::from(&jac)
}

/// Forms the power flow Jacobian.
///
/// Input is a MATPOWER case struct and the bus admittance matrix.
/// Bus numbers must be consecutive beginning at 0 (i.e. internal ordering).
/// If the `full_jac` argument is true, it returns the full Jacobian
/// (sensitivities of all bus injections w.r.t all voltage angles/magnitudes)
/// as opposed to the reduced version used in the Newton power flow updates.
/// The units for all quantities are in per unit with radians for voltage
/// angles.
pub fn make_jac(mpc: &MPC, y_bus: &CsrMatrix<Complex64>, full_jac: bool) -> Result<CscMatrix<f64>> {
    // extract voltage
    let mut v: Vec<Complex64> = mpc
        .bus
        .iter()
        .map(|bus| Complex64::from_polar(bus.vm, bus.va.to_radians()))
        .collect();

    // make sure we use generator setpoint voltage for PV and slack buses
    for g in mpc.gen.iter().filter(|g| g.is_on()) {
        let gbus = g.gen_bus;
        if mpc.bus[gbus].is_pv() || mpc.bus[gbus].is_ref() {
            v[gbus] = v[gbus] * g.vg / v[gbus].norm();
        }
    }
    log::debug!("V0: {}", format_polar_vec(&v));

    // build Jacobian
    let (d_sbus_d_va, d_sbus_d_vm) = d_sbus_d_v(y_bus, &v);

    let jac = if full_jac {
        let all: Vec<usize> = (0..mpc.bus.len()).collect();
        jacobian(&d_sbus_d_va, &d_sbus_d_vm, &all, &all)
    } else {
        // get bus index lists of each type of bus
        let (_, pv, pq) = bus_types(&mpc.bus, &mpc.gen)?;
        let pv_pq = [pv, pq.clone()].concat();
        jacobian(&d_sbus_d_va, &d_sbus_d_vm, &pv_pq, &pq)
    };
    log::trace!("J: {}x{}, {} non-zeros", jac.nrows(), jac.ncols(), jac.nnz());

    Ok(jac)
}
