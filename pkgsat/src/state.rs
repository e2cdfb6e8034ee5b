//! Miscellaneous solver state.
use crate::universe::JobKind;

/// Miscellaneous solver state.
///
/// Anything larger or any larger group of related state belongs in its own
/// part of [`Context`](crate::context::Context).
pub struct SolverState {
    /// The kind of transaction being solved.
    ///
    /// Biases the initial guesses of the search and selects between install
    /// and fetch actions during projection.
    pub job: JobKind,
}

impl Default for SolverState {
    fn default() -> SolverState {
        SolverState {
            job: JobKind::Install,
        }
    }
}
