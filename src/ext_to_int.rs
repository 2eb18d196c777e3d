use crate::order::{Order, Saved, State};
use crate::{PowerFlowError, MPC};
use anyhow::Result;
use std::collections::{HashMap, HashSet};

/// Converts a case from external to internal indexing.
///
/// Isolated buses, off-line generators and branches, and generators or
/// branches connected to isolated buses are removed. The remaining buses
/// are numbered consecutively from 0 in ascending order of external bus
/// number and the generators are sorted by internal bus index. The
/// mappings needed to invert the conversion are stored in `order`.
///
/// A case that is already internal is returned unchanged. Duplicate bus
/// numbers and references to buses that do not exist are errors.
pub fn ext_to_int(mpc: &MPC) -> Result<MPC> {
    if let Some(order) = mpc.order.as_ref() {
        if order.state == State::Internal {
            return Ok(mpc.clone());
        }
    }

    validate(mpc)?;

    // sizes
    let nb = mpc.bus.len();
    let ng = mpc.gen.len();
    let nl = mpc.branch.len();

    let mut order = Order::new(nb, ng, nl);

    // save data with external ordering
    order.external = Some(Saved {
        bus: mpc.bus.clone(),
        gen: mpc.gen.clone(),
        branch: mpc.branch.clone(),
    });

    // determine which buses, branches, gens are connected & in-service
    let bs: HashSet<usize> = mpc
        .bus
        .iter()
        .filter(|b| !b.is_isolated())
        .map(|b| b.bus_i)
        .collect();
    for (i, b) in mpc.bus.iter().enumerate() {
        if b.is_isolated() {
            order.bus.status.off.push(i);
        } else {
            order.bus.status.on.push(i);
        }
    }
    order.bus.status.on.sort_by_key(|&i| mpc.bus[i].bus_i);

    for (i, g) in mpc.gen.iter().enumerate() {
        if g.is_on() && bs.contains(&g.gen_bus) {
            order.gen.status.on.push(i);
        } else {
            order.gen.status.off.push(i);
        }
    }
    for (i, br) in mpc.branch.iter().enumerate() {
        if br.is_on() && bs.contains(&br.f_bus) && bs.contains(&br.t_bus) {
            order.branch.status.on.push(i);
        } else {
            order.branch.status.off.push(i);
        }
    }

    // apply consecutive bus numbering
    for (i, &j) in order.bus.status.on.iter().enumerate() {
        let bus_i = mpc.bus[j].bus_i;
        order.bus.i2e.push(bus_i);
        order.bus.e2i.insert(bus_i, i);
    }
    let e2i = &order.bus.e2i;

    let bus = order
        .bus
        .status
        .on
        .iter()
        .enumerate()
        .map(|(i, &j)| {
            let mut b = mpc.bus[j].clone();
            b.bus_i = i;
            b
        })
        .collect();
    let gen_on: Vec<_> = order
        .gen
        .status
        .on
        .iter()
        .map(|&j| {
            let mut g = mpc.gen[j].clone();
            g.gen_bus = e2i[&g.gen_bus];
            g
        })
        .collect();
    let branch = order
        .branch
        .status
        .on
        .iter()
        .map(|&j| {
            let mut br = mpc.branch[j].clone();
            br.f_bus = e2i[&br.f_bus];
            br.t_bus = e2i[&br.t_bus];
            br
        })
        .collect();

    // reorder gens in order of increasing bus number
    let mut gen_e2i: Vec<usize> = (0..gen_on.len()).collect();
    gen_e2i.sort_by_key(|&k| gen_on[k].gen_bus);
    let mut gen_i2e = vec![0; gen_e2i.len()];
    for (i, &k) in gen_e2i.iter().enumerate() {
        gen_i2e[k] = i;
    }
    let gen = gen_e2i.iter().map(|&k| gen_on[k].clone()).collect();
    order.gen.e2i = gen_e2i;
    order.gen.i2e = gen_i2e;

    order.internal = None;
    order.state = State::Internal;

    log::debug!(
        "internal case: {} of {} buses, {} of {} gens, {} of {} branches",
        order.bus.status.on.len(),
        nb,
        order.gen.status.on.len(),
        ng,
        order.branch.status.on.len(),
        nl
    );

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

fn validate(mpc: &MPC) -> Result<(), PowerFlowError> {
    let mut ids = HashMap::with_capacity(mpc.bus.len());
    for (i, b) in mpc.bus.iter().enumerate() {
        if ids.insert(b.bus_i, i).is_some() {
            return Err(PowerFlowError::DuplicateBus(b.bus_i));
        }
    }
    for (i, g) in mpc.gen.iter().enumerate() {
        if !ids.contains_key(&g.gen_bus) {
            return Err(PowerFlowError::MissingBus {
                kind: "generator",
                index: i,
                bus: g.gen_bus,
            });
        }
    }
    for (i, br) in mpc.branch.iter().enumerate() {
        for bus in [br.f_bus, br.t_bus] {
            if !ids.contains_key(&bus) {
                return Err(PowerFlowError::MissingBus {
                    kind: "branch",
                    index: i,
                    bus,
                });
            }
        }
    }
    Ok(())
}
