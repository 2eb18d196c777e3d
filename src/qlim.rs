use crate::bus_types::bus_types;
use crate::mpc::{Bus, BusType, Gen};
use crate::mpopt::GenQLimits;
use crate::PowerFlowError;

/// Result of checking a solved case against generator reactive limits.
#[derive(Debug, Clone, PartialEq)]
pub enum QLimStatus {
    /// No generator violates its limits.
    Satisfied,
    /// Limits are violated and no PV bus is left to take over.
    Infeasible,
    /// Generators were fixed at their limits. The new `(ref, pv, pq)`
    /// bus index lists must be used to solve again.
    Changed(Vec<usize>, Vec<usize>, Vec<usize>),
}

/// Enforces generator reactive power limits by converting the buses of
/// violating generators to PQ buses and solving again.
///
/// Generators fixed at a limit are switched off and their injection moved
/// into the bus load while the loop runs. `restore` undoes this once the
/// case has been solved without violations.
pub struct QLimitController {
    mode: GenQLimits,
    q_lim_tol: f64,

    /// Index of the original reference bus.
    ref0: usize,
    /// Voltage angle of the original reference bus (degrees).
    va_ref0: f64,

    /// Qg of gens at Q limits.
    fixed_qg: Vec<f64>,
    /// Indices of gens at Q limits.
    limited: Vec<usize>,
}

impl QLimitController {
    pub fn new(mode: GenQLimits, q_lim_tol: f64, bus: &[Bus], gen: &[Gen], refbus: &[usize]) -> Self {
        let ref0 = refbus.first().copied().unwrap_or_default();
        Self {
            mode,
            q_lim_tol,
            ref0,
            va_ref0: bus.get(ref0).map(|b| b.va).unwrap_or_default(),
            fixed_qg: vec![0.0; gen.len()],
            limited: Vec::new(),
        }
    }

    /// Generators held at a reactive limit so far.
    pub fn limited(&self) -> &[usize] {
        &self.limited
    }

    /// Checks the solved generator dispatch and fixes violating generators
    /// at their limits.
    ///
    /// Returns an error if a reference bus generator must be fixed in a
    /// case with more than one reference bus.
    pub fn enforce(
        &mut self,
        bus: &mut [Bus],
        gen: &mut [Gen],
        refbus: &[usize],
        pv: &[usize],
    ) -> Result<QLimStatus, PowerFlowError> {
        // find gens with violated Q constraints
        let (mut mx, mut mn) = violations(gen, self.q_lim_tol);

        if mx.is_empty() && mn.is_empty() {
            return Ok(QLimStatus::Satisfied);
        }

        if pv.is_empty() {
            match (mx.first(), mn.first()) {
                (Some(&g), _) => log::error!(
                    "Gen {} (only one left) exceeds upper Q limit : INFEASIBLE PROBLEM",
                    g
                ),
                (None, Some(&g)) => log::error!(
                    "Gen {} (only one left) exceeds lower Q limit : INFEASIBLE PROBLEM",
                    g
                ),
                (None, None) => {}
            }
            return Ok(QLimStatus::Infeasible);
        }

        if self.mode == GenQLimits::OneAtATime {
            // fix largest violation, ignore the rest
            let upper = mx.iter().map(|&i| (i, true, gen[i].qg - gen[i].qmax));
            let lower = mn.iter().map(|&i| (i, false, gen[i].qmin - gen[i].qg));

            let mut largest: Option<(usize, bool, f64)> = None;
            for v in upper.chain(lower) {
                if largest.map_or(true, |(_, _, max)| v.2 > max) {
                    largest = Some(v);
                }
            }
            if let Some((k, is_upper, _)) = largest {
                if is_upper {
                    mx = vec![k];
                    mn.clear();
                } else {
                    mx.clear();
                    mn = vec![k];
                }
            }
        }

        for &i in &mx {
            log::info!("Gen {} at upper Q limit, converting to PQ bus", i);
        }
        for &i in &mn {
            log::info!("Gen {} at lower Q limit, converting to PQ bus", i);
        }

        // save corresponding limit values
        mx.iter().for_each(|&i| self.fixed_qg[i] = gen[i].qmax);
        mn.iter().for_each(|&i| self.fixed_qg[i] = gen[i].qmin);
        let fixed = [mx, mn].concat();

        if refbus.len() > 1 {
            if let Some(&i) = fixed.iter().find(|&&i| bus[gen[i].gen_bus].is_ref()) {
                return Err(PowerFlowError::MultipleSlackQLimit(gen[i].gen_bus));
            }
        }

        // convert to PQ bus
        for &i in &fixed {
            let g = &mut gen[i];
            g.qg = self.fixed_qg[i]; // set Qg to binding limit
            g.gen_status = false; // temporarily turn off gen

            // one at a time, since they may be at same bus
            let b = &mut bus[g.gen_bus];
            b.pd -= g.pg; // adjust load accordingly
            b.qd -= g.qg;
            b.bus_type = BusType::PQ; // & set bus type to PQ
        }
        self.limited.extend(&fixed);

        // update bus index lists of each type of bus
        let ref_temp = refbus.first().copied();
        let (refbus, pv, pq) = match bus_types(bus, gen) {
            Ok(types) => types,
            Err(PowerFlowError::NoReferenceBus) => {
                log::error!("No generator left to be the slack bus : INFEASIBLE PROBLEM");
                return Ok(QLimStatus::Infeasible);
            }
            Err(err) => return Err(err),
        };
        if refbus.first().copied() != ref_temp {
            log::warn!("Bus {} is new slack bus", refbus[0]);
        }

        Ok(QLimStatus::Changed(refbus, pv, pq))
    }

    /// Restores injections from generators held at their Q limits and,
    /// if the reference bus changed, shifts all voltage angles so that
    /// the original reference bus keeps its angle.
    pub fn restore(&self, bus: &mut [Bus], gen: &mut [Gen], refbus: &[usize]) {
        if self.limited.is_empty() {
            return;
        }
        for &i in &self.limited {
            let g = &mut gen[i];
            g.qg = self.fixed_qg[i]; // restore Qg value

            // one at a time, since they may be at same bus
            let b = &mut bus[g.gen_bus];
            b.pd += g.pg; // re-adjust load
            b.qd += g.qg;

            g.gen_status = true; // and turn gen back on
        }

        if refbus.first().copied() != Some(self.ref0) {
            // adjust voltage angles to make original ref bus correct
            let shift = bus[self.ref0].va - self.va_ref0;
            bus.iter_mut().for_each(|b| b.va -= shift);
        }
    }
}

/// Indices of in-service generators above their upper and below their
/// lower reactive power limit, by more than `tol` MVAr.
pub fn violations(gen: &[Gen], tol: f64) -> (Vec<usize>, Vec<usize>) {
    let on = || gen.iter().enumerate().filter(|(_, g)| g.is_on());
    let mx = on()
        .filter(|(_, g)| g.qg > g.qmax + tol)
        .map(|(i, _)| i)
        .collect();
    let mn = on()
        .filter(|(_, g)| g.qg < g.qmin - tol)
        .map(|(i, _)| i)
        .collect();
    (mx, mn)
}
