use crate::dc::{dc_p_bus, make_b_dc};
use crate::mpc::{Branch, Bus, Gen};
use crate::sbus::make_sbus;
use crate::sparse::spmv;
use crate::PowerFlowError;
use nalgebra_sparse::CsrMatrix;
use num_complex::Complex64;
use std::collections::HashMap;
use std::f64::consts::PI;

/// Updates bus, gen, branch data to match power flow solution.
///
/// Bus voltages are copied from `v`. Reactive power dispatch is computed
/// for every in-service generator and the real power of the first
/// in-service generator at each reference bus is set to balance the
/// injection there. Branch flows are computed at both ends, out-of-service
/// branches get zero flows.
pub fn pfsoln(
    base_mva: f64,
    bus0: &[Bus],
    gen0: &[Gen],
    branch0: &[Branch],
    y_bus: &CsrMatrix<Complex64>,
    y_f: &CsrMatrix<Complex64>,
    y_t: &CsrMatrix<Complex64>,
    v: &[Complex64],
    refbus: &[usize],
) -> (Vec<Bus>, Vec<Gen>, Vec<Branch>) {
    let (mut bus, mut gen, mut branch) = (bus0.to_vec(), gen0.to_vec(), branch0.to_vec());

    // update bus voltages
    for (b, v) in bus.iter_mut().zip(v) {
        b.vm = v.norm();
        b.va = v.arg() * 180.0 / PI;
    }

    // compute total injected bus powers
    let i_bus = spmv(y_bus, v);
    let s_bus: Vec<Complex64> = v.iter().zip(&i_bus).map(|(v, i)| v * i.conj()).collect();

    // update Qg for all gens
    for g in gen.iter_mut() {
        g.qg = if g.is_on() {
            s_bus[g.gen_bus].im * base_mva + bus[g.gen_bus].qd // inj Q + local Qd
        } else {
            0.0
        };
    }

    // ...at this point any buses with more than one generator will have
    // the total Q dispatch for the bus assigned to each generator. This
    // must be split between them. We do it first equally, then in proportion
    // to the reactive range of the generator.
    split_qg(&mut gen);

    // update Pg for slack gen(s)
    for &r in refbus {
        let mut refgen = gen
            .iter()
            .enumerate()
            .filter(|(_, g)| g.is_on() && g.gen_bus == r)
            .map(|(i, _)| i);

        if let Some(first) = refgen.next() {
            // subtract off what is generated by other gens at this bus
            let pg_other: f64 = refgen.map(|i| gen[i].pg).sum();
            gen[first].pg = s_bus[r].re * base_mva + bus[r].pd - pg_other; // inj P + local Pd
        }
    }

    // update/compute branch power flows
    let i_f = spmv(y_f, v);
    let i_t = spmv(y_t, v);
    for (l, br) in branch.iter_mut().enumerate() {
        if br.is_on() {
            let s_f = v[br.f_bus] * i_f[l].conj() * base_mva; // complex power at "from" bus
            let s_t = v[br.t_bus] * i_t[l].conj() * base_mva; // complex power injected at "to" bus
            br.pf = s_f.re;
            br.qf = s_f.im;
            br.pt = s_t.re;
            br.qt = s_t.im;
        } else {
            br.pf = 0.0;
            br.qf = 0.0;
            br.pt = 0.0;
            br.qt = 0.0;
        }
    }

    (bus, gen, branch)
}

/// Updates bus, gen, branch data to match a DC power flow solution.
///
/// Only the voltage angles of `v` are used, all magnitudes are set to
/// 1 p.u. Branch reactive flows are zero and the "to" end real flow is
/// the negated "from" end flow.
pub fn pfsoln_dc(
    base_mva: f64,
    bus0: &[Bus],
    gen0: &[Gen],
    branch0: &[Branch],
    v: &[Complex64],
    refbus: &[usize],
) -> Result<(Vec<Bus>, Vec<Gen>, Vec<Branch>), PowerFlowError> {
    let (mut bus, mut gen, mut branch) = (bus0.to_vec(), gen0.to_vec(), branch0.to_vec());
    let va: Vec<f64> = v.iter().map(|v| v.arg()).collect();

    // build B matrices and phase shift injections
    let (b_bus, b_f, pbusinj, pfinj) = make_b_dc(&bus, &branch)?;

    // bus real power injections adjusted for phase shifters and real shunts
    let s_re: Vec<f64> = make_sbus(base_mva, &bus, &gen).iter().map(|s| s.re).collect();
    let p_bus = dc_p_bus(base_mva, &bus, &s_re, &pbusinj);

    let p_f = spmv(&b_f, &va);
    for ((br, p_f), p_finj) in branch.iter_mut().zip(p_f).zip(pfinj) {
        br.qf = 0.0;
        br.qt = 0.0;
        br.pf = (p_f + p_finj) * base_mva;
        br.pt = -br.pf;
    }
    for (b, va) in bus.iter_mut().zip(&va) {
        b.vm = 1.0;
        b.va = va * 180.0 / PI;
    }

    // update Pg for slack generator (1st gen at ref bus)
    // (note: other gens at ref bus are accounted for in Pbus)
    //      Pg = Pinj + Pload + Gs
    //      newPg = oldPg + newPinj - oldPinj
    let p_inj = spmv(&b_bus, &va);
    for &r in refbus {
        if let Some(g) = gen.iter_mut().find(|g| g.is_on() && g.gen_bus == r) {
            g.pg += (p_inj[r] - p_bus[r]) * base_mva;
        }
    }

    Ok((bus, gen, branch))
}

/// Divides the total reactive dispatch of each bus among its in-service
/// generators. Each generator starts with the bus total in `qg`.
///
/// The total is split equally and then in proportion to each generator's
/// reactive range. Generators at buses where the total range is zero keep
/// the equal split. Infinite limits are replaced by a proxy equal to the
/// sum of absolute Qg and finite limits of all generators at the bus.
fn split_qg(gen: &mut [Gen]) {
    let mut cg = HashMap::<usize, Vec<usize>>::new();
    for (i, g) in gen.iter().enumerate() {
        if g.is_on() {
            cg.entry(g.gen_bus).or_default().push(i);
        }
    }

    for l in cg.values() {
        // divide Qg by number of generators at the bus to distribute equally
        let ngg = l.len() as f64;
        for &i in l {
            gen[i].qg /= ngg;
        }
        if l.len() < 2 {
            continue;
        }

        let qg_tot: f64 = l.iter().map(|&i| gen[i].qg).sum(); // total Qg at the bus

        // proxy for infinite limits
        let m: f64 = l
            .iter()
            .map(|&i| {
                let g = &gen[i];
                let mut mg = g.qg.abs();
                if g.qmax.is_finite() {
                    mg += g.qmax.abs();
                }
                if g.qmin.is_finite() {
                    mg += g.qmin.abs();
                }
                mg
            })
            .sum();
        let finite = |q: f64| {
            if q.is_infinite() {
                m.copysign(q)
            } else {
                q
            }
        };
        let qmin: Vec<f64> = l.iter().map(|&i| finite(gen[i].qmin)).collect();
        let qmax: Vec<f64> = l.iter().map(|&i| finite(gen[i].qmax)).collect();

        let qg_min: f64 = qmin.iter().sum();
        let qg_max: f64 = qmax.iter().sum();
        if qg_min == qg_max {
            continue; // Qg range = 0
        }

        // divide proportionally
        let ratio = (qg_tot - qg_min) / (qg_max - qg_min + f64::EPSILON);
        for (k, &i) in l.iter().enumerate() {
            gen[i].qg = qmin[k] + ratio * (qmax[k] - qmin[k]);
        }
    }
}
