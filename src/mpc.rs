use crate::cmplx;
use crate::order::Order;
use num_complex::Complex64;

/// MPC is a MATPOWER case that models a power system as a directed graph
/// structure.
#[derive(Clone, Debug, Default)]
pub struct MPC {
    /// System MVA base used for converting power into per-unit quantities.
    /// Default value is 100.
    pub base_mva: f64,

    /// Power system nodes, including static loads and shunts.
    pub bus: Vec<Bus>,

    /// Generators and dispatchable loads.
    pub gen: Vec<Gen>,

    /// Transmission lines/cables and transformers.
    pub branch: Vec<Branch>,

    /// Mapping between external and internal numbering. Present once
    /// the case has been through `ext_to_int`.
    pub order: Option<Order>,

    /// Power flow convergence flag of the last solve.
    pub success: Option<bool>,

    /// Elapsed solve time (seconds).
    pub et: Option<f64>,

    /// Total solver iterations of the last solve.
    pub iterations: Option<usize>,
}

impl MPC {
    pub fn new(base_mva: f64, bus: Vec<Bus>, gen: Vec<Gen>, branch: Vec<Branch>) -> Self {
        Self {
            base_mva,
            bus,
            gen,
            branch,
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
pub enum BusType {
    /// Fixed active and reactive power.
    #[default]
    PQ = 1,
    /// Fixed voltage magnitude and active power.
    PV = 2,
    /// Reference voltage angle. Slack active and reactive power.
    REF = 3,
    /// Isolated bus.
    NONE = 4,
}

impl BusType {
    /// Returns the MATPOWER type code.
    pub fn code(&self) -> usize {
        *self as usize
    }
}

impl TryFrom<usize> for BusType {
    type Error = crate::PowerFlowError;

    fn try_from(code: usize) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(BusType::PQ),
            2 => Ok(BusType::PV),
            3 => Ok(BusType::REF),
            4 => Ok(BusType::NONE),
            _ => Err(crate::PowerFlowError::InvalidBusType(code)),
        }
    }
}

/// Bus is a node in the power system graph structure.
/// Static loads and shunts are included in the Bus definition.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bus {
    /// Bus number.
    pub bus_i: usize,

    pub bus_type: BusType,

    /// Real power demand (MW).
    pub pd: f64,

    /// Reactive power demand (MVAr).
    pub qd: f64,

    /// Shunt conductance (MW at V = 1.0 p.u.).
    pub gs: f64,

    /// Shunt susceptance (MVAr at V = 1.0 p.u.).
    pub bs: f64,

    /// Area number.
    pub bus_area: usize,

    /// Voltage magnitude (p.u.).
    pub vm: f64,

    /// Voltage angle (degrees).
    pub va: f64,

    /// Base voltage (kV).
    pub base_kv: f64,

    /// Loss zone.
    pub zone: usize,

    /// Maximum voltage magnitude (p.u.).
    pub vmax: f64,

    /// Minimum voltage magnitude (p.u.).
    pub vmin: f64,
}

impl Bus {
    pub fn is_pq(&self) -> bool {
        self.bus_type == BusType::PQ
    }

    pub fn is_pv(&self) -> bool {
        self.bus_type == BusType::PV
    }

    pub fn is_ref(&self) -> bool {
        self.bus_type == BusType::REF
    }

    pub fn is_isolated(&self) -> bool {
        self.bus_type == BusType::NONE
    }

    /// Shunt admittance (p.u.).
    pub(crate) fn y_sh(&self, base_mva: f64) -> Complex64 {
        Complex64::new(self.gs, self.bs) / base_mva
    }
}

/// Gen is a generator or dispatchable load.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Gen {
    /// Bus number.
    pub gen_bus: usize,

    /// Real power output (MW).
    pub pg: f64,

    /// Reactive power output (MVAr).
    pub qg: f64,

    /// Maximum reactive power output (MVAr).
    pub qmax: f64,

    /// Minimum reactive power output (MVAr).
    pub qmin: f64,

    /// Voltage magnitude setpoint (p.u.).
    pub vg: f64,

    /// Total MVA base of this machine, defaults to base_mva.
    pub mbase: f64,

    /// Machine status, in service if true.
    pub gen_status: bool,

    /// Maximum real power output (MW).
    pub pmax: f64,

    /// Minimum real power output (MW).
    pub pmin: f64,
}

impl Gen {
    pub fn is_on(&self) -> bool {
        self.gen_status
    }

    pub fn is_off(&self) -> bool {
        !self.gen_status
    }
}

/// Branch represents either a transmission line/cable or a two winding
/// transformer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Branch {
    /// From bus number.
    pub f_bus: usize,

    /// To bus number.
    pub t_bus: usize,

    /// Resistance (p.u.).
    pub br_r: f64,

    /// Reactance (p.u.).
    pub br_x: f64,

    /// Total line charging susceptance (p.u.).
    pub br_b: f64,

    /// MVA rating A (long term rating).
    pub rate_a: f64,

    /// MVA rating B (short term rating).
    pub rate_b: f64,

    /// MVA rating C (emergency rating).
    pub rate_c: f64,

    /// Transformer off nominal tap ratio. Zero means 1.0.
    pub tap: f64,

    /// Transformer phase shift angle (degrees).
    pub shift: f64,

    /// Initial branch status, in service if true.
    pub br_status: bool,

    /// Minimum angle difference, angle(Vf) - angle(Vt) (degrees).
    pub angmin: f64,

    /// Maximum angle difference, angle(Vf) - angle(Vt) (degrees).
    pub angmax: f64,

    /// Real power injected at "from" bus end (MW).
    pub pf: f64,

    /// Reactive power injected at "from" bus end (MVAr).
    pub qf: f64,

    /// Real power injected at "to" bus end (MW).
    pub pt: f64,

    /// Reactive power injected at "to" bus end (MVAr).
    pub qt: f64,
}

impl Branch {
    pub fn is_on(&self) -> bool {
        self.br_status
    }

    pub fn is_off(&self) -> bool {
        !self.br_status
    }

    /// Series admittance (p.u.), zero when out of service.
    pub(crate) fn y_s(&self) -> Complex64 {
        if self.is_on() {
            cmplx!(1.0) / cmplx!(self.br_r, self.br_x)
        } else {
            cmplx!()
        }
    }

    /// Off-nominal tap ratio with the zero-means-one convention applied.
    pub(crate) fn ratio(&self) -> f64 {
        if self.tap == 0.0 {
            1.0
        } else {
            self.tap
        }
    }
}
