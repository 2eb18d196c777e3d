use crate::mpc::{Branch, Bus, BusType, Gen};

/// Describes one column of a MATPOWER bus, gen or branch matrix as an
/// accessor pair on the corresponding struct. Tables are in column order.
pub struct Field<E> {
    pub name: &'static str,
    pub get: fn(&E) -> f64,
    pub set: fn(&mut E, f64),
}

pub static BUS_FIELDS: &[Field<Bus>] = &[
    Field { name: "BUS_I", get: |b| b.bus_i as f64, set: |b, v| b.bus_i = v as usize },
    Field {
        name: "BUS_TYPE",
        get: |b| b.bus_type.code() as f64,
        set: |b, v| b.bus_type = BusType::try_from(v as usize).unwrap_or_default(),
    },
    Field { name: "PD", get: |b| b.pd, set: |b, v| b.pd = v },
    Field { name: "QD", get: |b| b.qd, set: |b, v| b.qd = v },
    Field { name: "GS", get: |b| b.gs, set: |b, v| b.gs = v },
    Field { name: "BS", get: |b| b.bs, set: |b, v| b.bs = v },
    Field { name: "BUS_AREA", get: |b| b.bus_area as f64, set: |b, v| b.bus_area = v as usize },
    Field { name: "VM", get: |b| b.vm, set: |b, v| b.vm = v },
    Field { name: "VA", get: |b| b.va, set: |b, v| b.va = v },
    Field { name: "BASE_KV", get: |b| b.base_kv, set: |b, v| b.base_kv = v },
    Field { name: "ZONE", get: |b| b.zone as f64, set: |b, v| b.zone = v as usize },
    Field { name: "VMAX", get: |b| b.vmax, set: |b, v| b.vmax = v },
    Field { name: "VMIN", get: |b| b.vmin, set: |b, v| b.vmin = v },
];

pub static GEN_FIELDS: &[Field<Gen>] = &[
    Field { name: "GEN_BUS", get: |g| g.gen_bus as f64, set: |g, v| g.gen_bus = v as usize },
    Field { name: "PG", get: |g| g.pg, set: |g, v| g.pg = v },
    Field { name: "QG", get: |g| g.qg, set: |g, v| g.qg = v },
    Field { name: "QMAX", get: |g| g.qmax, set: |g, v| g.qmax = v },
    Field { name: "QMIN", get: |g| g.qmin, set: |g, v| g.qmin = v },
    Field { name: "VG", get: |g| g.vg, set: |g, v| g.vg = v },
    Field { name: "MBASE", get: |g| g.mbase, set: |g, v| g.mbase = v },
    Field {
        name: "GEN_STATUS",
        get: |g| if g.gen_status { 1.0 } else { 0.0 },
        set: |g, v| g.gen_status = v > 0.0,
    },
    Field { name: "PMAX", get: |g| g.pmax, set: |g, v| g.pmax = v },
    Field { name: "PMIN", get: |g| g.pmin, set: |g, v| g.pmin = v },
];

pub static BRANCH_FIELDS: &[Field<Branch>] = &[
    Field { name: "F_BUS", get: |br| br.f_bus as f64, set: |br, v| br.f_bus = v as usize },
    Field { name: "T_BUS", get: |br| br.t_bus as f64, set: |br, v| br.t_bus = v as usize },
    Field { name: "BR_R", get: |br| br.br_r, set: |br, v| br.br_r = v },
    Field { name: "BR_X", get: |br| br.br_x, set: |br, v| br.br_x = v },
    Field { name: "BR_B", get: |br| br.br_b, set: |br, v| br.br_b = v },
    Field { name: "RATE_A", get: |br| br.rate_a, set: |br, v| br.rate_a = v },
    Field { name: "RATE_B", get: |br| br.rate_b, set: |br, v| br.rate_b = v },
    Field { name: "RATE_C", get: |br| br.rate_c, set: |br, v| br.rate_c = v },
    Field { name: "TAP", get: |br| br.tap, set: |br, v| br.tap = v },
    Field { name: "SHIFT", get: |br| br.shift, set: |br, v| br.shift = v },
    Field {
        name: "BR_STATUS",
        get: |br| if br.br_status { 1.0 } else { 0.0 },
        set: |br, v| br.br_status = v > 0.0,
    },
    Field { name: "ANGMIN", get: |br| br.angmin, set: |br, v| br.angmin = v },
    Field { name: "ANGMAX", get: |br| br.angmax, set: |br, v| br.angmax = v },
    Field { name: "PF", get: |br| br.pf, set: |br, v| br.pf = v },
    Field { name: "QF", get: |br| br.qf, set: |br, v| br.qf = v },
    Field { name: "PT", get: |br| br.pt, set: |br, v| br.pt = v },
    Field { name: "QT", get: |br| br.qt, set: |br, v| br.qt = v },
];

/// Looks up a column by name, ignoring case.
pub fn find_field<E>(table: &'static [Field<E>], name: &str) -> Option<&'static Field<E>> {
    table.iter().find(|f| f.name.eq_ignore_ascii_case(name))
}

/// Returns the matrix row for `e`.
pub fn to_row<E>(table: &[Field<E>], e: &E) -> Vec<f64> {
    table.iter().map(|f| (f.get)(e)).collect()
}

/// Builds an entity from a matrix row. Missing trailing columns are left
/// at their default values and extra columns are ignored.
pub fn from_row<E: Default>(table: &[Field<E>], row: &[f64]) -> E {
    let mut e = E::default();
    for (f, &v) in table.iter().zip(row) {
        (f.set)(&mut e, v);
    }
    e
}
