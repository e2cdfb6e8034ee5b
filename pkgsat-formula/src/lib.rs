//! Basic formula data types used by the pkgsat package transaction solver.

pub mod cnf;
pub mod lit;

pub use cnf::CnfFormula;
pub use lit::{Lit, Var};
