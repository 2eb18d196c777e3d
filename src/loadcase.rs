use crate::fields::{from_row, to_row, BRANCH_FIELDS, BUS_FIELDS, GEN_FIELDS};
use crate::mpc::{BusType, MPC};
use crate::PowerFlowError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// MATPOWER case document. Each row of `bus`, `gen` and `branch` holds
/// the columns of the corresponding table in the standard order.
#[derive(Debug, Serialize, Deserialize)]
struct CaseFile {
    #[serde(rename = "baseMVA", default = "default_base_mva")]
    base_mva: f64,
    bus: Vec<Vec<f64>>,
    #[serde(default)]
    gen: Vec<Vec<f64>>,
    #[serde(default)]
    branch: Vec<Vec<f64>>,
}

fn default_base_mva() -> f64 {
    100.0
}

/// Reads a case from a JSON file of the form
/// `{"baseMVA": 100, "bus": [[..]], "gen": [[..]], "branch": [[..]]}`.
///
/// Rows shorter than the full table are padded with zeros. Bus type codes
/// other than 1-4 are rejected.
pub fn load_case(case_path: &Path) -> Result<MPC> {
    let content = fs::read_to_string(case_path)
        .with_context(|| format!("reading case file {}", case_path.display()))?;
    let case: CaseFile = serde_json::from_str(&content)
        .with_context(|| format!("parsing case file {}", case_path.display()))?;

    for row in &case.bus {
        let code = row.get(1).copied().unwrap_or_default();
        if code.fract() != 0.0 || code < 0.0 {
            return Err(PowerFlowError::InvalidBusType(code as usize).into());
        }
        BusType::try_from(code as usize)?;
    }

    let mpc = MPC::new(
        case.base_mva,
        case.bus.iter().map(|row| from_row(BUS_FIELDS, row)).collect(),
        case.gen.iter().map(|row| from_row(GEN_FIELDS, row)).collect(),
        case.branch.iter().map(|row| from_row(BRANCH_FIELDS, row)).collect(),
    );
    log::debug!(
        "loaded case with {} buses, {} gens and {} branches",
        mpc.bus.len(),
        mpc.gen.len(),
        mpc.branch.len()
    );
    Ok(mpc)
}

/// Writes a case, including solved values, in the format read by
/// `load_case`.
pub fn save_case(case_path: &Path, mpc: &MPC) -> Result<()> {
    let case = CaseFile {
        base_mva: mpc.base_mva,
        bus: mpc.bus.iter().map(|b| to_row(BUS_FIELDS, b)).collect(),
        gen: mpc.gen.iter().map(|g| to_row(GEN_FIELDS, g)).collect(),
        branch: mpc.branch.iter().map(|br| to_row(BRANCH_FIELDS, br)).collect(),
    };
    let content = serde_json::to_string_pretty(&case)?;
    fs::write(case_path, content)
        .with_context(|| format!("writing case file {}", case_path.display()))?;
    Ok(())
}
