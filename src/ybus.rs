use crate::math::J;
use crate::mpc::{Branch, Bus};
use crate::PowerFlowError;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use num_complex::Complex64;
use std::f64::consts::PI;

/// Checks that buses are numbered consecutively from 0, as they are
/// after `ext_to_int`.
pub(crate) fn check_internal(bus: &[Bus]) -> Result<(), PowerFlowError> {
    match bus.iter().enumerate().find(|(i, b)| b.bus_i != *i) {
        Some((index, b)) => Err(PowerFlowError::NonConsecutiveBus {
            index,
            bus: b.bus_i,
        }),
        None => Ok(()),
    }
}

/// Builds the bus admittance matrix and branch admittance matrices.
///
/// Returns the full bus admittance matrix (i.e. for all buses) and the
/// matrices `Yf` and `Yt` which, when multiplied by a complex voltage
/// vector, yield the vector currents injected into each line from the
/// "from" and "to" buses respectively of each line. Requires internal
/// consecutive bus numbering.
pub fn make_ybus(
    base_mva: f64,
    bus: &[Bus],
    branch: &[Branch],
) -> Result<
    (
        CsrMatrix<Complex64>,
        CsrMatrix<Complex64>,
        CsrMatrix<Complex64>,
    ),
    PowerFlowError,
> {
    check_internal(bus)?;

    let nb = bus.len();
    let nl = branch.len();

    // For each branch, compute the elements of the branch admittance matrix where:
    //
    //      | If |   | Yff  Yft |   | Vf |
    //      |    | = |          | * |    |
    //      | It |   | Ytf  Ytt |   | Vt |
    let mut y_bus = CooMatrix::new(nb, nb);
    let mut y_f = CooMatrix::new(nl, nb);
    let mut y_t = CooMatrix::new(nl, nb);

    for (i, br) in branch.iter().enumerate() {
        let y_s = br.y_s(); // series admittance
        let b_c = if br.is_on() { br.br_b } else { 0.0 }; // line charging susceptance
        let tap = Complex64::from_polar(br.ratio(), br.shift * PI / 180.0); // add phase shifters

        let y_tt = y_s + J * b_c / 2.0;
        let y_ff = y_tt / (tap * tap.conj());
        let y_ft = -y_s / tap.conj();
        let y_tf = -y_s / tap;

        let (f, t) = (br.f_bus, br.t_bus);

        y_f.push(i, f, y_ff);
        y_f.push(i, t, y_ft);

        y_t.push(i, f, y_tf);
        y_t.push(i, t, y_tt);

        y_bus.push(f, f, y_ff);
        y_bus.push(f, t, y_ft);
        y_bus.push(t, f, y_tf);
        y_bus.push(t, t, y_tt);
    }

    // Shunt admittance. If Psh is the real power consumed by the shunt
    // at V = 1.0 p.u. and Qsh is the reactive power injected by the shunt
    // at V = 1.0 p.u. then Psh - j Qsh = V * conj(Ysh * V) = conj(Ysh) = Gs - j Bs,
    // i.e. Ysh = Psh + j Qsh.
    for (i, b) in bus.iter().enumerate() {
        y_bus.push(i, i, b.y_sh(base_mva));
    }

    Ok((
        CsrMatrix::from(&y_bus),
        CsrMatrix::from(&y_f),
        CsrMatrix::from(&y_t),
    ))
}
