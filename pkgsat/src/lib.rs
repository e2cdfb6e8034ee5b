//! A package transaction solver.
//!
//! Given a universe of package candidates (installed and remote) and a user
//! request, the solver decides a coherent set of packages to be present
//! after the transaction: every dependency satisfied, no conflict violated,
//! every explicit request honoured and at most one version per package
//! identity. The decision is made by encoding the universe into CNF and
//! running unit propagation with a backtracking search; the satisfying
//! assignment is projected back into install, upgrade, delete and fetch
//! actions. The problem can also be exported as DIMACS CNF and decided by an
//! external SAT solver instead.

pub mod solver;
pub mod universe;

mod clauses;
mod context;
mod encode;
mod model;
mod prop;
mod search;
mod state;
mod variables;


pub use solver::{SolveError, Solver};
pub use universe::{
    Action, Candidate, CandidateId, ConflictKind, JobKind, Origin, Request, Universe,
};
