use crate::order::{Saved, State};
use crate::{PowerFlowError, MPC};
use anyhow::Result;

/// Converts a case from internal back to external indexing.
///
/// Rows removed by `ext_to_int` are restored from the saved external
/// data, the remaining rows are overwritten with the internal values and
/// the original bus numbers and generator order are reinstated.
pub fn int_to_ext(mpc: &MPC) -> Result<MPC> {
    let order = match &mpc.order {
        Some(order) => {
            if order.state == State::External {
                return Ok(mpc.clone());
            }
            order
        }
        None => {
            return Err(PowerFlowError::MissingOrder.into());
        }
    };
    let external = order.external.as_ref().ok_or(PowerFlowError::MissingOrder)?;

    let mut bus = external.bus.clone();
    let mut gen = external.gen.clone();
    let mut branch = external.branch.clone();

    // Update data (in bus, branch, and gen only) and revert to
    // original bus numbers.
    for (i, &j) in order.bus.status.on.iter().enumerate() {
        bus[j] = mpc.bus[i].clone();
        bus[j].bus_i = order.bus.i2e[mpc.bus[i].bus_i];
    }
    for (i, &j) in order.branch.status.on.iter().enumerate() {
        let br = &mpc.branch[i];
        branch[j] = br.clone();
        branch[j].f_bus = order.bus.i2e[br.f_bus];
        branch[j].t_bus = order.bus.i2e[br.t_bus];
    }
    for (i, &j) in order.gen.status.on.iter().enumerate() {
        let g = &mpc.gen[order.gen.i2e[i]];
        gen[j] = g.clone();
        gen[j].gen_bus = order.bus.i2e[g.gen_bus];
    }

    let mut order = order.clone();
    order.internal = Some(Saved {
        bus: mpc.bus.clone(),
        gen: mpc.gen.clone(),
        branch: mpc.branch.clone(),
    });
    order.external = None;
    order.state = State::External;

    Ok(MPC {
        base_mva: mpc.base_mva,
        bus,
        gen,
        branch,
        order: Some(order),
        success: mpc.success,
        et: mpc.et,
        iterations: mpc.iterations,
    })
}
