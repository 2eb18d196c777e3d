use crate::ext_to_int::ext_to_int;
use crate::loadcase::load_case;
use crate::mpc::MPC;
use anyhow::Result;
use std::path::PathBuf;

/// Path of a case in the `casedata` directory.
pub(crate) fn case_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("casedata")
        .join(format!("{}.json", name))
}

/// Loads a case with external numbering.
pub(crate) fn load(name: &str) -> Result<MPC> {
    load_case(&case_path(name))
}

/// Four bus case from Grainger & Stevenson, converted to internal
/// numbering.
pub(crate) fn case4gs() -> Result<MPC> {
    ext_to_int(&load("case4gs")?)
}

/// Nine bus case from Chow, converted to internal numbering.
pub(crate) fn case9() -> Result<MPC> {
    ext_to_int(&load("case9")?)
}
