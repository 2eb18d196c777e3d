use crate::bus_types::bus_types;
use crate::ext_to_int::ext_to_int;
use crate::int_to_ext::int_to_ext;
use crate::mpc::MPC;
use crate::mpopt::{Alg, GenQLimits, MPOpt};
use crate::pfsoln::{pfsoln, pfsoln_dc};
use crate::qlim::{QLimStatus, QLimitController};
use crate::sbus::make_sbus;
use crate::solver::PFProblem;
use crate::traits::{LinearSolver, LogProgress, ProgressMonitor};
use crate::ybus::make_ybus;
use anyhow::Result;
use num_complex::Complex64;
use std::time::Instant;

/// Runs a power flow.
///
/// The case is converted to internal indexing, solved with the algorithm
/// selected in `mpopt` and converted back. Solved voltages, flows and
/// dispatch are written into the returned case together with the
/// convergence flag, elapsed time and total iteration count. If
/// generator reactive limits are enforced the case is solved again each
/// time a generator is fixed at a limit.
///
/// Errors are returned for malformed cases and for cases without a
/// reference bus. A power flow that does not converge is not an error,
/// it is reported through the returned flag.
pub fn runpf(casedata: &MPC, mpopt: &MPOpt, lin_solver: &dyn LinearSolver) -> Result<(MPC, bool)> {
    // options
    let alg = mpopt.pf.algorithm;
    let dc = alg == Alg::DC; // use DC formulation?
    let qlim = mpopt.pf.enforce_q_limits != GenQLimits::IgnoreLimits && !dc; // enforce Q limits on gens?

    // convert to internal indexing
    let mut mpc = ext_to_int(casedata)?;
    let base_mva = mpc.base_mva;
    let (mut bus, mut gen, mut branch) = (mpc.bus.clone(), mpc.gen.clone(), mpc.branch.clone());

    //-----  run the power flow  -----
    let t0 = Instant::now();
    let (success, its) = if !bus.is_empty() {
        // get bus index lists of each type of bus
        let (mut ref_, mut pv, mut pq) = bus_types(&bus, &gen)?;

        if mpopt.verbose > 0 {
            if dc {
                log::info!(" -- DC Power Flow");
            } else {
                log::info!(" -- AC Power Flow ({})", alg);
            }
        }
        let log_progress = LogProgress {};
        let progress: Option<&dyn ProgressMonitor> = if mpopt.verbose > 1 {
            Some(&log_progress)
        } else {
            None
        };

        // initial state
        let mut v0: Vec<Complex64> = bus
            .iter()
            .map(|b| Complex64::from_polar(if dc { 1.0 } else { b.vm }, b.va.to_radians()))
            .collect();
        if !dc {
            // generator voltage set points at PV and reference buses
            let mut is_pq = vec![false; bus.len()];
            pq.iter().for_each(|&i| is_pq[i] = true);
            for g in gen.iter().filter(|g| g.is_on() && !is_pq[g.gen_bus]) {
                let v = v0[g.gen_bus];
                v0[g.gen_bus] = v * g.vg / v.norm();
            }
        }

        let mut qlim_ctl = if qlim {
            Some(QLimitController::new(
                mpopt.pf.enforce_q_limits,
                mpopt.pf.q_lim_tol,
                &bus,
                &gen,
                &ref_,
            ))
        } else {
            None
        };

        let mut success;
        let mut its = 0; // total iterations
        loop {
            // build admittance matrices
            let (y_bus, y_f, y_t) = make_ybus(base_mva, &bus, &branch)?;

            // compute complex bus power injections (generation - load)
            let s_bus = make_sbus(base_mva, &bus, &gen);

            // run the power flow
            let problem = PFProblem {
                base_mva,
                bus: &bus,
                branch: &branch,
                y_bus: &y_bus,
                s_bus: &s_bus,
                v0: &v0,
                ref_: &ref_,
                pv: &pv,
                pq: &pq,
            };
            let soln = alg.solve(&problem, lin_solver, mpopt, progress)?;
            success = soln.converged;
            its += soln.iterations;

            // update data matrices with solution
            if dc {
                (bus, gen, branch) = pfsoln_dc(base_mva, &bus, &gen, &branch, &soln.v, &ref_)?;
                break;
            }
            (bus, gen, branch) =
                pfsoln(base_mva, &bus, &gen, &branch, &y_bus, &y_f, &y_t, &soln.v, &ref_);

            // enforce generator Q limits
            let ctl = match qlim_ctl.as_mut() {
                Some(ctl) if success => ctl,
                _ => break, // don't enforce generator Q limits, once is enough
            };
            match ctl.enforce(&mut bus, &mut gen, &ref_, &pv)? {
                QLimStatus::Satisfied => break, // no more generator Q limits violated
                QLimStatus::Infeasible => {
                    success = false;
                    break;
                }
                QLimStatus::Changed(r, p, q) => {
                    (ref_, pv, pq) = (r, p, q);
                }
            }
        }
        if let Some(ctl) = qlim_ctl {
            ctl.restore(&mut bus, &mut gen, &ref_);
        }

        (success, its)
    } else {
        log::warn!("Power flow not valid : Case contains no connected buses");
        (false, 0)
    };
    let et = t0.elapsed().as_secs_f64();

    if mpopt.verbose > 0 {
        if success {
            log::info!("Converged in {:.2} seconds", et);
        } else {
            log::info!("Did not converge ({:.2} seconds)", et);
        }
    }

    mpc.success = Some(success);
    mpc.et = Some(et);
    mpc.iterations = Some(its);

    // -----  output results  ----- //
    // convert back to original bus numbering
    mpc.bus = bus;
    mpc.gen = gen;
    mpc.branch = branch;
    let mut results = int_to_ext(&mpc)?;

    // zero out result fields of out-of-service gens & branches
    if let Some(order) = results.order.as_ref() {
        for &i in &order.gen.status.off {
            results.gen[i].pg = 0.0;
            results.gen[i].qg = 0.0;
        }
        for &i in &order.branch.status.off {
            let br = &mut results.branch[i];
            br.pf = 0.0;
            br.qf = 0.0;
            br.pt = 0.0;
            br.qt = 0.0;
        }
    }

    Ok((results, success))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lu::RLU;
    use crate::mpc::BusType;
    use crate::mpopt::{FdVariant, PFOptBuilder};
    use crate::tests::load;
    use crate::PowerFlowError;
    use anyhow::format_err;

    fn options(alg: Alg, qlim: GenQLimits) -> Result<MPOpt> {
        Ok(MPOpt {
            pf: PFOptBuilder::default()
                .algorithm(alg)
                .enforce_q_limits(qlim)
                .build()?,
            verbose: 0,
        })
    }

    fn run(mpc: &MPC, alg: Alg, qlim: GenQLimits) -> Result<MPC> {
        let (results, success) = runpf(mpc, &options(alg, qlim)?, &RLU::default())?;
        if !success {
            return Err(format_err!("{} power flow did not converge", alg));
        }
        Ok(results)
    }

    #[test]
    fn test_case4gs() -> Result<()> {
        let results = run(&load("case4gs")?, Alg::NR, GenQLimits::IgnoreLimits)?;

        let expected = [(1.0, 0.0), (0.982, -0.976), (0.969, -1.872), (1.02, 1.523)];
        for (b, (vm, va)) in results.bus.iter().zip(expected) {
            assert!((b.vm - vm).abs() < 1e-3, "bus {}: Vm = {}", b.bus_i, b.vm);
            assert!((b.va - va).abs() < 1e-3, "bus {}: Va = {}", b.bus_i, b.va);
            assert!(b.vm >= b.vmin && b.vm <= b.vmax);
        }

        assert_eq!(results.success, Some(true));
        let its = results.iterations.unwrap_or_default();
        assert!(its > 0 && its <= 10, "iterations = {}", its);
        assert!(results.et.is_some());
        Ok(())
    }

    #[test]
    fn test_algorithms_agree() -> Result<()> {
        let mpc = load("case9")?;
        let nr = run(&mpc, Alg::NR, GenQLimits::IgnoreLimits)?;

        for alg in [Alg::FD(FdVariant::XB), Alg::FD(FdVariant::BX), Alg::GS] {
            let results = run(&mpc, alg, GenQLimits::IgnoreLimits)?;
            for (b, b_nr) in results.bus.iter().zip(&nr.bus) {
                assert!((b.vm - b_nr.vm).abs() < 1e-5, "{}: bus {} Vm", alg, b.bus_i);
                assert!((b.va - b_nr.va).abs() < 1e-4, "{}: bus {} Va", alg, b.bus_i);
            }
            for (g, g_nr) in results.gen.iter().zip(&nr.gen) {
                assert!((g.pg - g_nr.pg).abs() < 1e-3, "{}: Pg", alg);
                assert!((g.qg - g_nr.qg).abs() < 1e-3, "{}: Qg", alg);
            }
        }
        Ok(())
    }

    #[test]
    fn test_dc() -> Result<()> {
        let results = run(&load("case9")?, Alg::DC, GenQLimits::IgnoreLimits)?;

        assert!(results.bus.iter().all(|b| b.vm == 1.0));
        assert_eq!(results.bus[0].va, 0.0);
        for br in &results.branch {
            assert_eq!(br.pf, -br.pt);
            assert_eq!(br.qf, 0.0);
            assert_eq!(br.qt, 0.0);
        }

        // lossless: slack gen picks up the remaining load
        assert!((results.gen[0].pg - 67.0).abs() < 1e-9, "Pg = {}", results.gen[0].pg);
        assert_eq!(results.iterations, Some(1));
        Ok(())
    }

    #[test]
    fn test_qg_distribution() -> Result<()> {
        let mut mpc = load("case9")?;
        mpc.gen[0].qmin = 20.0;
        mpc.gen[0].qmax = 20.0;
        let results = run(&mpc, Alg::NR, GenQLimits::IgnoreLimits)?;
        assert!((results.gen[0].qg - 24.07).abs() < 0.01, "single gen, Qmin = Qmax");

        mpc.gen.insert(0, mpc.gen[0].clone());
        let cases = [
            ([(10.0, 10.0), (0.0, 50.0)], [10.0, 14.07], "Qmin = Qmax for one"),
            ([(10.0, 10.0), (-50.0, -50.0)], [12.03, 12.03], "Qmin = Qmax for both"),
            ([(0.0, 50.0), (0.0, 100.0)], [8.02, 16.05], "proportional"),
            ([(-50.0, 0.0), (50.0, 150.0)], [-50.0 + 8.02, 50.0 + 16.05], "proportional"),
        ];
        for (limits, expected, msg) in cases {
            for (g, (qmin, qmax)) in mpc.gen.iter_mut().zip(limits) {
                g.qmin = qmin;
                g.qmax = qmax;
            }
            let results = run(&mpc, Alg::NR, GenQLimits::IgnoreLimits)?;
            for (g, qg) in results.gen.iter().zip(expected) {
                assert!((g.qg - qg).abs() < 0.01, "2 gens, {}: {} != {}", msg, g.qg, qg);
            }
        }
        Ok(())
    }

    #[test]
    fn test_q_limits() -> Result<()> {
        let mut mpc = load("case9")?;
        mpc.gen[1].qmax = 10.0;

        for mode in [GenQLimits::Simultaneous, GenQLimits::OneAtATime] {
            let results = run(&mpc, Alg::NR, mode)?;

            assert!((results.gen[1].qg - 10.0).abs() < 1e-9, "Qg = {}", results.gen[1].qg);
            assert_eq!(results.bus[1].bus_type, BusType::PQ);
            assert!(results.bus[1].vm < 1.0);
            assert_eq!(results.bus[1].pd, 0.0);
            assert_eq!(results.bus[1].qd, 0.0);
            assert!(results.gen.iter().all(|g| g.is_on()));
            for g in &results.gen {
                assert!(g.qg <= g.qmax + 1e-5 && g.qg >= g.qmin - 1e-5);
            }
        }
        Ok(())
    }

    #[test]
    fn test_q_limits_pv_gen() -> Result<()> {
        let mut mpc = load("case4gs")?;
        mpc.gen[1].qmin = -1000.0; // slack
        mpc.gen[1].qmax = 1000.0;
        let results = run(&mpc, Alg::NR, GenQLimits::IgnoreLimits)?;
        let qg = results.gen[0].qg; // gen at bus 4
        assert_eq!(results.bus[3].bus_type, BusType::PV);

        mpc.gen[0].qmax = qg - 10.0;
        let results = run(&mpc, Alg::NR, GenQLimits::Simultaneous)?;

        assert_eq!(results.gen[0].qg, qg - 10.0);
        assert_eq!(results.bus[3].bus_type, BusType::PQ);
        assert!(results.bus[3].vm < 1.02);
        Ok(())
    }

    #[test]
    fn test_q_limits_slack() -> Result<()> {
        let mut mpc = load("case9")?;
        mpc.gen[0].qmax = 10.0;
        let results = run(&mpc, Alg::NR, GenQLimits::Simultaneous)?;

        assert!((results.gen[0].qg - 10.0).abs() < 1e-9);
        assert_eq!(results.bus[0].bus_type, BusType::PQ);

        // original reference bus keeps its angle
        assert!(results.bus[0].va.abs() < 1e-9, "Va = {}", results.bus[0].va);
        Ok(())
    }

    #[test]
    fn test_q_limits_infeasible() -> Result<()> {
        let mpc0 = load("case4gs")?;
        let mut mpc = mpc0.clone();
        for g in mpc.gen.iter_mut() {
            g.qmin = -500.0;
            g.qmax = -500.0;
        }
        let mpopt = options(Alg::NR, GenQLimits::Simultaneous)?;
        let (results, success) = runpf(&mpc, &mpopt, &RLU::default())?;

        assert!(!success);
        assert_eq!(results.success, Some(false));

        // gens fixed at their limits are back in service and bus loads
        // are unchanged
        for g in &results.gen {
            assert!(g.is_on(), "gen at bus {} is off", g.gen_bus);
            assert_eq!(g.qg, -500.0);
        }
        for (b, b0) in results.bus.iter().zip(&mpc0.bus) {
            assert!((b.pd - b0.pd).abs() < 1e-9, "bus {}: Pd = {}", b.bus_i, b.pd);
            assert!((b.qd - b0.qd).abs() < 1e-9, "bus {}: Qd = {}", b.bus_i, b.qd);
        }
        Ok(())
    }

    #[test]
    fn test_not_converged() -> Result<()> {
        let mpopt = MPOpt {
            pf: PFOptBuilder::default().max_it(Some(1)).build()?,
            verbose: 0,
        };
        let (results, success) = runpf(&load("case9")?, &mpopt, &RLU::default())?;

        assert!(!success);
        assert_eq!(results.success, Some(false));
        assert_eq!(results.iterations, Some(1));
        assert!(results.bus.iter().all(|b| b.vm.is_finite()));
        Ok(())
    }

    #[test]
    fn test_reference_fallback() -> Result<()> {
        let mut mpc = load("case9")?;
        mpc.gen[0].gen_status = false;
        let results = run(&mpc, Alg::NR, GenQLimits::IgnoreLimits)?;

        assert_eq!(results.gen[0].pg, 0.0);
        assert_eq!(results.gen[0].qg, 0.0);

        // bus 2 takes up the slack
        let pd: f64 = results.bus.iter().map(|b| b.pd).sum();
        let pg: f64 = results.gen.iter().map(|g| g.pg).sum();
        assert!(pg > pd);
        assert!(results.gen[1].pg > 163.0);
        Ok(())
    }

    #[test]
    fn test_no_reference() -> Result<()> {
        let mut mpc = load("case9")?;
        mpc.gen.iter_mut().for_each(|g| g.gen_status = false);

        let err = match runpf(&mpc, &options(Alg::NR, GenQLimits::IgnoreLimits)?, &RLU::default()) {
            Ok(_) => return Err(format_err!("expected an error")),
            Err(err) => err,
        };
        assert_eq!(
            err.downcast_ref::<PowerFlowError>(),
            Some(&PowerFlowError::NoReferenceBus)
        );
        Ok(())
    }

    #[test]
    fn test_duplicate_bus() -> Result<()> {
        let mut mpc = load("case9")?;
        mpc.bus[4].bus_i = 4;

        let result = runpf(&mpc, &options(Alg::NR, GenQLimits::IgnoreLimits)?, &RLU::default());
        let err = result.err().ok_or_else(|| format_err!("expected an error"))?;
        assert_eq!(
            err.downcast_ref::<PowerFlowError>(),
            Some(&PowerFlowError::DuplicateBus(4))
        );
        Ok(())
    }

    #[test]
    fn test_out_of_service_branch() -> Result<()> {
        let mut mpc = load("case9")?;
        mpc.branch[8].br_status = false; // 9-4
        let results = run(&mpc, Alg::NR, GenQLimits::IgnoreLimits)?;

        let br = &results.branch[8];
        assert_eq!((br.pf, br.qf, br.pt, br.qt), (0.0, 0.0, 0.0, 0.0));
        assert!(results.branch[7].pf.abs() > 0.0);
        Ok(())
    }
}
