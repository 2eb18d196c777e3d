use crate::math::J;
use crate::mpc::{Bus, Gen};
use crate::sparse::spmv;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use num_complex::Complex64;

/// Builds the vector of complex bus power injections.
///
/// Returns the vector of complex bus power injections, that is, generation
/// minus load. Power is expressed in per unit. Only in-service generators
/// contribute. Requires internal consecutive bus numbering.
pub fn make_sbus(base_mva: f64, bus: &[Bus], gen: &[Gen]) -> Vec<Complex64> {
    let nb = bus.len();

    // Form net complex bus power injection vector
    // (power injected by generators + power injected by loads).
    let mut s_bus = vec![Complex64::default(); nb];

    gen.iter().filter(|g| g.is_on()).for_each(|g| {
        s_bus[g.gen_bus] += Complex64::new(g.pg, g.qg) / base_mva;
    });

    bus.iter()
        .filter(|b| b.pd != 0.0 || b.qd != 0.0)
        .for_each(|b| {
            s_bus[b.bus_i] -= Complex64::new(b.pd, b.qd) / base_mva;
        });

    s_bus
}

/// Computes partial derivatives of power injection w.r.t. voltage
/// angle and magnitude.
///
/// Returns `(dSbus/dVa, dSbus/dVm)` where
///
/// ```text
/// dSbus/dVa = 1j * diagV * conj(diagIbus - Ybus * diagV)
/// dSbus/dVm = diagV * conj(Ybus * diagVnorm) + conj(diagIbus) * diagVnorm
/// ```
pub fn d_sbus_d_v(
    y_bus: &CsrMatrix<Complex64>,
    v: &[Complex64],
) -> (CsrMatrix<Complex64>, CsrMatrix<Complex64>) {
    let n = v.len();
    let i_bus = spmv(y_bus, v);
    let v_norm: Vec<Complex64> = v.iter().map(|v| v / v.norm()).collect();

    let mut d_sbus_d_va = CooMatrix::new(n, n);
    let mut d_sbus_d_vm = CooMatrix::new(n, n);

    for (i, j, y) in y_bus.triplet_iter() {
        d_sbus_d_va.push(i, j, -J * v[i] * (y * v[j]).conj());
        d_sbus_d_vm.push(i, j, v[i] * (y * v_norm[j]).conj());
    }
    for i in 0..n {
        d_sbus_d_va.push(i, i, J * v[i] * i_bus[i].conj());
        d_sbus_d_vm.push(i, i, i_bus[i].conj() * v_norm[i]);
    }

    (
        CsrMatrix::from(&d_sbus_d_va),
        CsrMatrix::from(&d_sbus_d_vm),
    )
}
