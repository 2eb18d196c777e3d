use crate::mpc::{Bus, Gen};
use crate::PowerFlowError;
use std::collections::HashSet;

/// Builds index lists for each type of bus (REF, PV, PQ).
///
/// Generators with "out-of-service" status are treated as PQ buses with
/// zero generation (regardless of Pg/Qg values in gen). Expects `bus` and
/// `gen` have been converted to use internal consecutive bus numbering.
///
/// If no reference bus has an in-service generator, the first PV bus is
/// used as the reference instead. It is an error if there is no PV bus
/// either.
pub fn bus_types(
    bus: &[Bus],
    gen: &[Gen],
) -> Result<(Vec<usize>, Vec<usize>, Vec<usize>), PowerFlowError> {
    // Buses with generators that are ON.
    let bus_gen_status = gen
        .iter()
        .filter(|g| g.is_on())
        .map(|g| g.gen_bus)
        .collect::<HashSet<usize>>();

    // Form index lists for slack, PV, and PQ buses.
    let mut refbus = bus
        .iter()
        .filter(|b| b.is_ref() && bus_gen_status.contains(&b.bus_i))
        .map(|b| b.bus_i)
        .collect::<Vec<usize>>();
    let mut pv = bus
        .iter()
        .filter(|b| b.is_pv() && bus_gen_status.contains(&b.bus_i))
        .map(|b| b.bus_i)
        .collect::<Vec<usize>>();
    let pq = bus
        .iter()
        .filter(|b| !bus_gen_status.contains(&b.bus_i) || !(b.is_ref() || b.is_pv()))
        .map(|b| b.bus_i)
        .collect::<Vec<usize>>();

    // Pick a new reference bus if for some reason there is none
    // (may have been shut down).
    if refbus.is_empty() {
        if pv.is_empty() {
            return Err(PowerFlowError::NoReferenceBus);
        }
        let r = pv.remove(0);
        log::debug!("no reference bus, using PV bus {} as reference", r);
        refbus.push(r);
    }

    Ok((refbus, pv, pq))
}
