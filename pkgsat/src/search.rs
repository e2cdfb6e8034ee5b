//! DPLL search over the unresolved variables.
//!
//! The search scans the variable array in order; after every propagation the
//! first still-unresolved variable becomes the next decision. Each decision
//! frame owns the implication log of everything its guess forced, supports
//! one guess inversion, and is undone in LIFO order when both polarities
//! fail.

use log::{debug, trace};
use partial_ref::{partial, PartialRef};

use pkgsat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::prop::{assign, propagate, unassign};
use crate::solver::SolveError;
use crate::universe::{JobKind, Origin};
use crate::variables::VarData;

/// One decision of the search stack.
struct Frame {
    var: Var,
    guess: bool,
    inversions: u32,
    /// The decision variable and everything its propagation forced, in
    /// forcing order.
    implied: Vec<Var>,
}

/// Decide all unresolved variables.
///
/// Returns the number of decisions taken, or the UNSAT error carrying that
/// count when the decision stack empties.
pub fn search<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ClausesP,
        mut VariablesP<'a>,
        SolverStateP,
    ),
) -> Result<u64, SolveError> {
    let job = ctx.part(SolverStateP).job;

    let mut stack: Vec<Frame> = vec![];
    let mut current: Option<Frame> = None;
    let mut decisions = 0u64;

    loop {
        let mut frame = match current.take() {
            Some(frame) => frame,
            None => match ctx.part(VariablesP).first_unresolved() {
                None => break,
                Some(var) => Frame {
                    var,
                    guess: initial_guess(job, ctx.part(VariablesP).var(var)),
                    inversions: 0,
                    implied: vec![],
                },
            },
        };

        decisions += 1;
        trace!(
            "setting guess for {} variable {}: {}",
            if frame.inversions == 0 {
                "free"
            } else {
                "inversed"
            },
            ctx.part(VariablesP).var(frame.var).uid,
            frame.guess
        );

        assign(ctx.borrow(), Lit::from_var(frame.var, frame.guess));
        frame.implied.push(frame.var);

        match propagate(ctx.borrow(), Some(&mut frame.implied)) {
            Ok(()) => stack.push(frame),
            Err(_) => {
                undo_frame(ctx.borrow(), &mut frame);

                if frame.inversions == 0 {
                    // A free variable can still take the opposite value.
                    frame.guess = !frame.guess;
                    frame.inversions += 1;
                    current = Some(frame);
                    continue;
                }

                // Both polarities failed, backtrack.
                loop {
                    let mut prev = match stack.pop() {
                        None => {
                            debug!("problem is UNSAT after {} decisions", decisions);
                            return Err(SolveError::Unsat { decisions });
                        }
                        Some(prev) => prev,
                    };

                    undo_frame(ctx.borrow(), &mut prev);

                    if prev.inversions == 0 {
                        trace!(
                            "backtrack from {} to {}",
                            ctx.part(VariablesP).var(frame.var).uid,
                            ctx.part(VariablesP).var(prev.var).uid
                        );
                        prev.guess = !prev.guess;
                        prev.inversions += 1;
                        current = Some(prev);
                        break;
                    }
                }
            }
        }
    }

    debug!("solved SAT problem in {} decisions", decisions);
    Ok(decisions)
}

/// Initial guess for a decision variable.
///
/// | job     | origin    | chain shape | guess |
/// |---------|-----------|-------------|-------|
/// | upgrade | installed | singleton   | true  |
/// | upgrade | installed | multi       | false |
/// | upgrade | remote    | multi       | true  |
/// | upgrade | remote    | singleton   | false |
/// | other   | installed | any         | true  |
/// | other   | remote    | any         | false |
///
/// Under an upgrade job an installed package with an upgrade candidate is
/// guessed away in favour of the remote member of its chain; a remote
/// singleton stays out unless a clause pulls it in.
fn initial_guess(job: JobKind, data: &VarData) -> bool {
    match (job, data.origin) {
        (JobKind::Upgrade, Origin::Installed) => data.chain_is_singleton(),
        (JobKind::Upgrade, Origin::Remote) => !data.chain_is_singleton(),
        (_, Origin::Installed) => true,
        (_, Origin::Remote) => false,
    }
}

/// Undo every assignment recorded in the frame's implication log.
fn undo_frame<'a>(
    mut ctx: partial!(Context<'a>, mut ClausesP, mut VariablesP<'a>),
    frame: &mut Frame,
) {
    for &var in frame.implied.iter() {
        unassign(ctx.borrow(), var);
    }
    frame.implied.clear();
}
