use crate::fields::{find_field, Field, BRANCH_FIELDS, BUS_FIELDS, GEN_FIELDS};
use crate::mpc::{Branch, Bus, Gen, MPC};
use crate::PowerFlowError;
use anyhow::{format_err, Result};
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq)]
pub enum State {
    Internal,
    #[default]
    External,
}

#[derive(Clone, Debug)]
pub struct Saved {
    pub(crate) bus: Vec<Bus>,
    pub(crate) gen: Vec<Gen>,
    pub(crate) branch: Vec<Branch>,
}

/// Records how a case was converted to internal ordering so that the
/// conversion can be inverted.
#[derive(Clone, Debug)]
pub struct Order {
    pub state: State,
    pub(crate) internal: Option<Saved>,
    pub(crate) external: Option<Saved>,
    pub bus: BusOrder,
    pub gen: GenOrder,
    pub branch: BranchOrder,
}

impl Order {
    pub(crate) fn new(nb: usize, ng: usize, nl: usize) -> Self {
        Self {
            state: State::External,
            internal: None,
            external: None,
            bus: BusOrder::new(nb),
            gen: GenOrder::new(ng),
            branch: BranchOrder::new(nl),
        }
    }
}

/// External row indexes of the rows kept in (`on`) and removed
/// from (`off`) the internal case.
#[derive(Clone, Debug)]
pub struct Status {
    pub on: Vec<usize>,
    pub off: Vec<usize>,
}

impl Status {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            on: Vec::with_capacity(capacity),
            off: Vec::default(),
        }
    }
}

/// Bus numbering maps. `status.on[i]` is the external row of internal
/// bus `i`.
#[derive(Clone, Debug)]
pub struct BusOrder {
    pub e2i: HashMap<usize, usize>,
    pub i2e: Vec<usize>,
    pub status: Status,
}

impl BusOrder {
    fn new(nb: usize) -> Self {
        Self {
            e2i: HashMap::with_capacity(nb),
            i2e: Vec::with_capacity(nb),
            status: Status::with_capacity(nb),
        }
    }
}

/// Generator permutation. Internal gen `k` is the in-service gen at
/// position `e2i[k]` of `status.on`, and `i2e` is the inverse.
#[derive(Clone, Debug)]
pub struct GenOrder {
    pub e2i: Vec<usize>,
    pub i2e: Vec<usize>,
    pub status: Status,
}

impl GenOrder {
    fn new(ng: usize) -> Self {
        Self {
            e2i: Vec::with_capacity(ng),
            i2e: Vec::with_capacity(ng),
            status: Status::with_capacity(ng),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BranchOrder {
    pub status: Status,
}

impl BranchOrder {
    fn new(nl: usize) -> Self {
        Self {
            status: Status::with_capacity(nl),
        }
    }
}

/// Table that a per-row data vector belongs to.
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum Ordering {
    Bus,
    Gen,
    Branch,
}

/// Returns the ordering of a case in internal numbering.
fn order_of(mpc: &MPC) -> Result<&Order> {
    let order = mpc.order.as_ref().ok_or(PowerFlowError::MissingOrder)?;
    if order.state != State::Internal {
        return Err(PowerFlowError::NotInternal.into());
    }
    Ok(order)
}

fn external_len(order: &Order, ordering: Ordering) -> usize {
    let status = match ordering {
        Ordering::Bus => &order.bus.status,
        Ordering::Gen => &order.gen.status,
        Ordering::Branch => &order.branch.status,
    };
    status.on.len() + status.off.len()
}

/// Converts data from external to internal indexing.
///
/// `val` has one entry per row of the external bus, gen or branch
/// table. Entries of removed rows are dropped and gens are permuted to
/// match the internal gen order.
pub fn e2i_data<T: Clone>(mpc: &MPC, val: &[T], ordering: Ordering) -> Result<Vec<T>> {
    let order = order_of(mpc)?;
    let n = external_len(order, ordering);
    if val.len() != n {
        return Err(PowerFlowError::DimensionMismatch {
            what: "external data",
            expected: n,
            actual: val.len(),
        }
        .into());
    }
    let data = match ordering {
        Ordering::Bus => order.bus.status.on.iter().map(|&i| val[i].clone()).collect(),
        Ordering::Gen => order
            .gen
            .e2i
            .iter()
            .map(|&k| val[order.gen.status.on[k]].clone())
            .collect(),
        Ordering::Branch => order
            .branch
            .status
            .on
            .iter()
            .map(|&i| val[i].clone())
            .collect(),
    };
    Ok(data)
}

/// Converts data from internal to external indexing.
///
/// Rows that were removed from the internal case take their value from
/// `old_val`, which has one entry per external row.
pub fn i2e_data<T: Clone>(
    mpc: &MPC,
    val: &[T],
    old_val: &[T],
    ordering: Ordering,
) -> Result<Vec<T>> {
    let order = order_of(mpc)?;
    let n = external_len(order, ordering);
    if old_val.len() != n {
        return Err(PowerFlowError::DimensionMismatch {
            what: "external data",
            expected: n,
            actual: old_val.len(),
        }
        .into());
    }
    let on = match ordering {
        Ordering::Bus => &order.bus.status.on,
        Ordering::Gen => &order.gen.status.on,
        Ordering::Branch => &order.branch.status.on,
    };
    if val.len() != on.len() {
        return Err(PowerFlowError::DimensionMismatch {
            what: "internal data",
            expected: on.len(),
            actual: val.len(),
        }
        .into());
    }
    let mut data = old_val.to_vec();
    for (j, &row) in on.iter().enumerate() {
        data[row] = match ordering {
            Ordering::Gen => val[order.gen.i2e[j]].clone(),
            _ => val[j].clone(),
        };
    }
    Ok(data)
}

fn column<E>(table: &'static [Field<E>], rows: &[E], name: &str) -> Result<Vec<f64>> {
    let field = find_field(table, name).ok_or_else(|| format_err!("unknown field: {}", name))?;
    Ok(rows.iter().map(|e| (field.get)(e)).collect())
}

fn saved_external(order: &Order) -> Result<&Saved> {
    order
        .external
        .as_ref()
        .ok_or_else(|| format_err!("external data is not available in this case"))
}

/// Reads the named column of the external table saved by `ext_to_int`
/// and returns it in internal ordering.
pub fn e2i_field(mpc: &MPC, ordering: Ordering, name: &str) -> Result<Vec<f64>> {
    let external = saved_external(order_of(mpc)?)?;
    let val = match ordering {
        Ordering::Bus => column(BUS_FIELDS, &external.bus, name)?,
        Ordering::Gen => column(GEN_FIELDS, &external.gen, name)?,
        Ordering::Branch => column(BRANCH_FIELDS, &external.branch, name)?,
    };
    e2i_data(mpc, &val, ordering)
}

/// Returns the named column of the internal table in external ordering.
/// Removed rows keep the value from the saved external table.
pub fn i2e_field(mpc: &MPC, ordering: Ordering, name: &str) -> Result<Vec<f64>> {
    let external = saved_external(order_of(mpc)?)?;
    let (val, old_val) = match ordering {
        Ordering::Bus => (
            column(BUS_FIELDS, &mpc.bus, name)?,
            column(BUS_FIELDS, &external.bus, name)?,
        ),
        Ordering::Gen => (
            column(GEN_FIELDS, &mpc.gen, name)?,
            column(GEN_FIELDS, &external.gen, name)?,
        ),
        Ordering::Branch => (
            column(BRANCH_FIELDS, &mpc.branch, name)?,
            column(BRANCH_FIELDS, &external.branch, name)?,
        ),
    };
    i2e_data(mpc, &val, &old_val, ordering)
}

#[cfg(test)]
mod tests {
    use anyhow::{format_err, Result};
    use std::env;
    use std::iter::zip;
    use std::path::Path;

    use crate::loadcase::load_case;
    use crate::mpc::{BusType, MPC};
    use crate::PowerFlowError;

    use super::{e2i_data, e2i_field, i2e_data, i2e_field, Ordering, State};
    use crate::ext_to_int::ext_to_int;
    use crate::int_to_ext::int_to_ext;

    fn setup() -> Result<MPC> {
        let manifest_dir = env::var("CARGO_MANIFEST_DIR")?;
        let casedata_dir = Path::new(&manifest_dir).join("casedata");
        load_case(&casedata_dir.join("t_case_ext.json"))
    }

    fn compare_case(expected: &MPC, actual: &MPC) -> Result<()> {
        if expected.bus.len() != actual.bus.len()
            || expected.gen.len() != actual.gen.len()
            || expected.branch.len() != actual.branch.len()
        {
            return Err(format_err!("cases must have the same dimensions"));
        }
        if let Some((b_exp, b_act)) =
            zip(&expected.bus, &actual.bus).find(|(b_exp, b_act)| b_exp != b_act)
        {
            return Err(format_err!(
                "buses must be equal:\nexpected: {:?}\nactual: {:?}",
                b_exp,
                b_act
            ));
        }
        if let Some((g_exp, g_act)) =
            zip(&expected.gen, &actual.gen).find(|(g_exp, g_act)| g_exp != g_act)
        {
            return Err(format_err!(
                "gens must be equal:\nexpected: {:?}\nactual: {:?}",
                g_exp,
                g_act
            ));
        }
        if let Some((br_exp, br_act)) =
            zip(&expected.branch, &actual.branch).find(|(br_exp, br_act)| br_exp != br_act)
        {
            return Err(format_err!(
                "branches must be equal:\nexpected: {:?}\nactual: {:?}",
                br_exp,
                br_act
            ));
        }
        Ok(())
    }

    #[test]
    fn test_ext_to_int() -> Result<()> {
        let mpce = setup()?;

        let mpci = ext_to_int(&mpce)?;
        assert_eq!(mpci.bus.len(), 9, "isolated bus must be removed");
        assert_eq!(mpci.gen.len(), 3, "off gens must be removed");
        assert_eq!(mpci.branch.len(), 9, "off branches must be removed");

        // Buses in ascending external order, numbered consecutively.
        let i2e = &mpci.order.as_ref().ok_or(PowerFlowError::MissingOrder)?.bus.i2e;
        assert_eq!(i2e, &vec![1, 2, 4, 5, 6, 7, 8, 9, 30]);
        for (i, b) in mpci.bus.iter().enumerate() {
            assert_eq!(b.bus_i, i);
        }
        assert_eq!(mpci.bus[8].bus_type, BusType::PV);

        // Gens sorted by internal bus.
        let gen_bus: Vec<usize> = mpci.gen.iter().map(|g| g.gen_bus).collect();
        assert_eq!(gen_bus, vec![0, 1, 8]);
        let pg: Vec<f64> = mpci.gen.iter().map(|g| g.pg).collect();
        assert_eq!(pg, vec![0.0, 163.0, 85.0]);

        for br in &mpci.branch {
            assert!(br.f_bus < 9 && br.t_bus < 9);
        }

        let mpc = ext_to_int(&mpci)?;
        compare_case(&mpci, &mpc)?;

        let mpc = int_to_ext(&mpc)?;
        compare_case(&mpce, &mpc)?;
        assert_eq!(mpc.order.map(|o| o.state), Some(State::External));

        Ok(())
    }

    #[test]
    fn test_ext_to_int_all_buses_isolated() -> Result<()> {
        let mut mpc = setup()?;
        mpc.bus.iter_mut().for_each(|b| b.bus_type = BusType::NONE);

        let mpci = ext_to_int(&mpc)?;
        if !mpci.bus.is_empty() || !mpci.gen.is_empty() || !mpci.branch.is_empty() {
            return Err(format_err!(
                "internal case must be empty: {}",
                mpci.bus.len()
            ));
        }

        let mpce = int_to_ext(&mpci)?;
        compare_case(&mpc, &mpce)?;

        Ok(())
    }

    #[test]
    fn test_duplicate_bus() -> Result<()> {
        let mut mpc = setup()?;
        mpc.bus[3].bus_i = 2;

        let err = ext_to_int(&mpc).err().ok_or(format_err!("must fail"))?;
        assert_eq!(
            err.downcast_ref::<PowerFlowError>(),
            Some(&PowerFlowError::DuplicateBus(2))
        );
        Ok(())
    }

    #[test]
    fn test_dangling_references() -> Result<()> {
        let mut mpc = setup()?;
        mpc.branch[2].t_bus = 99;
        let err = ext_to_int(&mpc).err().ok_or(format_err!("must fail"))?;
        assert_eq!(
            err.downcast_ref::<PowerFlowError>(),
            Some(&PowerFlowError::MissingBus {
                kind: "branch",
                index: 2,
                bus: 99
            })
        );

        let mut mpc = setup()?;
        mpc.gen[1].gen_bus = 3;
        let err = ext_to_int(&mpc).err().ok_or(format_err!("must fail"))?;
        assert_eq!(
            err.downcast_ref::<PowerFlowError>(),
            Some(&PowerFlowError::MissingBus {
                kind: "generator",
                index: 1,
                bus: 3
            })
        );
        Ok(())
    }

    #[test]
    fn test_e2i_i2e_data() -> Result<()> {
        let mpce = setup()?;
        let mpci = ext_to_int(&mpce)?;

        let bus_ids: Vec<usize> = mpce.bus.iter().map(|b| b.bus_i).collect();
        let int_ids = e2i_data(&mpci, &bus_ids, Ordering::Bus)?;
        assert_eq!(int_ids, vec![1, 2, 4, 5, 6, 7, 8, 9, 30]);

        let gen_rows: Vec<usize> = (0..mpce.gen.len()).collect();
        let int_rows = e2i_data(&mpci, &gen_rows, Ordering::Gen)?;
        assert_eq!(int_rows, vec![3, 1, 0]);

        let back = i2e_data(&mpci, &int_rows, &[usize::MAX; 5], Ordering::Gen)?;
        assert_eq!(back, vec![0, 1, usize::MAX, 3, usize::MAX]);

        assert!(e2i_data(&mpci, &[0.0; 3], Ordering::Branch).is_err());
        Ok(())
    }

    #[test]
    fn test_e2i_i2e_field() -> Result<()> {
        let mpce = setup()?;
        let mut mpci = ext_to_int(&mpce)?;

        let pd = e2i_field(&mpci, Ordering::Bus, "PD")?;
        let pd_int: Vec<f64> = mpci.bus.iter().map(|b| b.pd).collect();
        assert_eq!(pd, pd_int);

        mpci.gen.iter_mut().for_each(|g| g.qg = 7.0);
        let qg = i2e_field(&mpci, Ordering::Gen, "qg")?;
        for (i, g) in mpce.gen.iter().enumerate() {
            let expected = if i == 2 || i == 4 { g.qg } else { 7.0 };
            assert_eq!(qg[i], expected);
        }

        assert!(e2i_field(&mpci, Ordering::Branch, "NO_SUCH_FIELD").is_err());
        Ok(())
    }

    #[test]
    fn test_data_requires_internal() -> Result<()> {
        let mpce = setup()?;
        let pd: Vec<f64> = mpce.bus.iter().map(|b| b.pd).collect();

        let err = e2i_data(&mpce, &pd, Ordering::Bus).err().ok_or(format_err!("must fail"))?;
        assert_eq!(
            err.downcast_ref::<PowerFlowError>(),
            Some(&PowerFlowError::MissingOrder)
        );

        let mpc = int_to_ext(&ext_to_int(&mpce)?)?;
        let err = e2i_field(&mpc, Ordering::Bus, "PD").err().ok_or(format_err!("must fail"))?;
        assert_eq!(
            err.downcast_ref::<PowerFlowError>(),
            Some(&PowerFlowError::NotInternal)
        );
        Ok(())
    }
}
