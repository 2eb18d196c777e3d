mod bus_types;
mod dc;
mod error;
mod ext_to_int;
mod fd;
mod fields;
mod gauss;
mod int_to_ext;
mod jac;
mod loadcase;
mod lu;
mod math;
mod mpc;
mod mpopt;
mod newton;
mod order;
mod pfsoln;
mod qlim;
mod runpf;
mod sbus;
mod solver;
mod sparse;
mod traits;
mod ybus;

pub mod debug;

#[cfg(test)]
mod tests;

pub use bus_types::*;
pub use dc::*;
pub use error::*;
pub use ext_to_int::*;
pub use fd::*;
pub use fields::*;
pub use gauss::*;
pub use int_to_ext::*;
pub use jac::*;
pub use loadcase::*;
pub use lu::*;
pub use math::*;
pub use mpc::*;
pub use mpopt::*;
pub use newton::*;
pub use order::*;
pub use pfsoln::*;
pub use qlim::*;
pub use runpf::*;
pub use sbus::*;
pub use solver::*;
pub use sparse::*;
pub use traits::*;
pub use ybus::*;
