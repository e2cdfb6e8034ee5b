//! Central solver data structure.
use partial_ref::{part, PartialRefTarget};

use crate::clauses::Clauses;
use crate::state::SolverState;
use crate::variables::Variables;

/// Part declarations for the [`Context`] struct.
pub mod parts {
    use super::*;

    part!(pub ClausesP: Clauses);
    part!(pub SolverStateP: SolverState);
    part!(pub VariablesP<'a>: Variables<'a>);
}

use parts::*;

/// Central solver data structure.
///
/// This struct contains all data kept by the solver. Functions operating on
/// multiple fields of the context use partial references provided by the
/// `partial_ref` crate. This documents the data dependencies and makes the
/// borrow checker happy without the overhead of passing individual
/// references.
#[derive(PartialRefTarget, Default)]
pub struct Context<'a> {
    #[part(ClausesP)]
    pub clauses: Clauses,
    #[part(SolverStateP)]
    pub solver_state: SolverState,
    #[part(VariablesP<'a>)]
    pub variables: Variables<'a>,
}
