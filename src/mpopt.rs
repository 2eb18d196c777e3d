use derive_builder::Builder;
use std::fmt;
use std::str::FromStr;

/// Which of the two fast-decoupled matrices ignores series resistance.
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum FdVariant {
    /// Resistance dropped from B' (XB version).
    XB,
    /// Resistance dropped from B'' (BX version).
    BX,
}

/// Power flow algorithm.
#[derive(Debug, Default, PartialEq, Copy, Clone)]
pub enum Alg {
    /// Newton's method.
    #[default]
    NR,
    /// Fast-Decoupled method.
    FD(FdVariant),
    /// Gauss-Seidel method.
    GS,
    /// Linearized DC power flow that assumes lossless branches,
    /// 1pu voltages and small voltage angle differences.
    DC,
}

impl Alg {
    /// Default iteration limit for the algorithm.
    pub fn default_max_it(&self) -> usize {
        match self {
            Alg::NR => 10,
            Alg::FD(_) => 30,
            Alg::GS => 1000,
            Alg::DC => 1,
        }
    }
}

impl FromStr for Alg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nr" | "newton" => Ok(Alg::NR),
            "fdxb" => Ok(Alg::FD(FdVariant::XB)),
            "fdbx" => Ok(Alg::FD(FdVariant::BX)),
            "gs" | "gauss" => Ok(Alg::GS),
            "dc" => Ok(Alg::DC),
            _ => Err(format!(
                "unknown algorithm \"{}\" (expected nr, fdxb, fdbx, gs or dc)",
                s
            )),
        }
    }
}

impl fmt::Display for Alg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Alg::NR => "Newton",
            Alg::FD(FdVariant::XB) => "fast-decoupled (XB)",
            Alg::FD(FdVariant::BX) => "fast-decoupled (BX)",
            Alg::GS => "Gauss-Seidel",
            Alg::DC => "DC",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default, PartialEq, Copy, Clone)]
pub enum GenQLimits {
    #[default]
    IgnoreLimits,
    /// Simultaneous bus type conversion.
    Simultaneous,
    /// One-at-a-time bus type conversion.
    OneAtATime,
}

impl FromStr for GenQLimits {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "0" => Ok(GenQLimits::IgnoreLimits),
            "simultaneous" | "1" => Ok(GenQLimits::Simultaneous),
            "one-at-a-time" | "2" => Ok(GenQLimits::OneAtATime),
            _ => Err(format!(
                "unknown Q limit mode \"{}\" (expected off, simultaneous or one-at-a-time)",
                s
            )),
        }
    }
}

/// Power flow options.
#[derive(Debug, Clone, Builder)]
#[builder(default, build_fn(validate = "Self::validate"))]
pub struct PFOpt {
    /// Power flow algorithm.
    pub algorithm: Alg,

    /// Termination tolerance on per unit P & Q mismatch. Default value is 1e-8.
    pub tolerance: f64,

    /// Maximum number of iterations. The algorithm's default
    /// (NR 10, FD 30, GS 1000) is used if unset.
    pub max_it: Option<usize>,

    /// Enforce gen reactive power limits at expense of |V|.
    pub enforce_q_limits: GenQLimits,

    /// Amount (MVAr) by which Qg may exceed a limit before it is
    /// considered a violation.
    pub q_lim_tol: f64,
}

impl Default for PFOpt {
    fn default() -> Self {
        Self {
            algorithm: Alg::default(),
            tolerance: 1e-8,
            max_it: None,
            enforce_q_limits: GenQLimits::default(),
            q_lim_tol: 5e-6,
        }
    }
}

impl PFOpt {
    /// Iteration limit for the selected algorithm.
    pub fn max_it(&self) -> usize {
        self.max_it
            .unwrap_or_else(|| self.algorithm.default_max_it())
    }
}

impl PFOptBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(tol) = self.tolerance {
            if !(tol.is_finite() && tol > 0.0) {
                return Err(format!("tolerance must be positive: {}", tol));
            }
        }
        if let Some(Some(0)) = self.max_it {
            return Err("max_it must be positive".to_string());
        }
        if let Some(q_lim_tol) = self.q_lim_tol {
            if !(q_lim_tol >= 0.0) {
                return Err(format!("q_lim_tol must not be negative: {}", q_lim_tol));
            }
        }
        Ok(())
    }
}

/// Solver options. Built once and passed by reference.
#[derive(Debug, Clone)]
pub struct MPOpt {
    pub pf: PFOpt,

    /// Amount of progress info to be printed. 0 prints nothing, 1 prints
    /// a summary and 2 adds a line per iteration.
    pub verbose: usize,
}

impl Default for MPOpt {
    fn default() -> Self {
        Self {
            pf: PFOpt::default(),
            verbose: 1,
        }
    }
}
