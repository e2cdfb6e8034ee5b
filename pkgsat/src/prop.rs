//! Unit propagation.
//!
//! The propagator drives the problem to quiescence: when it returns
//! successfully, no clause is conflicting and no clause is unit. A clause is
//! conflicting when every literal's variable is resolved and none is
//! satisfied; it is unit when exactly one literal's variable is unresolved
//! and no resolved literal is satisfied, which forces the remaining literal.

use log::{debug, log_enabled, trace};
use partial_ref::{partial, PartialRef};

use pkgsat_formula::{Lit, Var};

use crate::clauses::{Clause, ClauseId, Clauses};
use crate::context::{parts::*, Context};
use crate::universe::Origin;
use crate::variables::Variables;

/// A clause whose literals are all resolved with none satisfied.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Conflict {
    pub rule: ClauseId,
}

/// Propagate until no unit clauses remain.
///
/// Scans the variable array in passes. For each variable the clauses on its
/// back-pointer list are checked for conflicts first and units second; after
/// a forcing the same variable is re-scanned, since the forced assignment can
/// turn further clauses of its list into units or conflicts. Forced variables
/// are appended to `log` in forcing order when a log is given.
pub fn propagate<'a>(
    mut ctx: partial!(Context<'a>, mut VariablesP<'a>, mut ClausesP),
    mut log: Option<&mut Vec<Var>>,
) -> Result<(), Conflict> {
    loop {
        let mut solved_vars = 0;

        let mut index = 0;
        while index < ctx.part(VariablesP).len() {
            let var = Var::from_index(index);

            loop {
                if let Some(conflict) =
                    find_conflict(ctx.part(VariablesP), ctx.part(ClausesP), var)
                {
                    return Err(conflict);
                }

                match find_unit(ctx.part(VariablesP), ctx.part(ClausesP), var) {
                    None => break,
                    Some((rule, lit)) => {
                        assign(ctx.borrow(), lit);
                        log_forced(ctx.part(VariablesP), ctx.part(ClausesP), lit, rule);
                        if let Some(log) = log.as_mut() {
                            log.push(lit.var());
                        }
                        solved_vars += 1;
                    }
                }
            }

            index += 1;
        }

        if solved_vars == 0 {
            return Ok(());
        }
    }
}

/// Resolve the boundary condition before searching.
///
/// Variables appearing in no clause keep their current state: installed
/// candidates stay installed, remote ones stay absent. Unary clauses force
/// their sole literal. Neither kind of resolution is recorded in any
/// implication log.
pub fn propagate_pure<'a>(mut ctx: partial!(Context<'a>, mut VariablesP<'a>, mut ClausesP)) {
    for index in 0..ctx.part(VariablesP).len() {
        let var = Var::from_index(index);

        if ctx.part(VariablesP).var(var).rules.is_empty() {
            let data = ctx.part_mut(VariablesP).var_mut(var);
            data.to_install = data.origin == Origin::Installed;
            data.resolved = true;
            debug!(
                "leave {}-{}({}) to {}",
                data.uid,
                data.digest,
                data.priority,
                if data.to_install { "install" } else { "delete" }
            );
            continue;
        }

        let forced = {
            let vars = ctx.part(VariablesP);
            let clauses = ctx.part(ClausesP);
            vars.var(var).rules.iter().find_map(|&rule| {
                let clause = clauses.get(rule);
                if clause.len() == 1 && clause.nresolved == 0 {
                    Some(clause.lits()[0])
                } else {
                    None
                }
            })
        };

        if let Some(lit) = forced {
            assign(ctx.borrow(), lit);
            let data = ctx.part(VariablesP).var(lit.var());
            debug!(
                "requested {}-{}({}) to {}",
                data.uid,
                data.digest,
                data.priority,
                if data.to_install { "install" } else { "delete" }
            );
        }
    }
}

/// Fix a variable to the value satisfying `lit` and update the resolution
/// counter of every clause on its back-pointer list.
pub(crate) fn assign<'a>(
    mut ctx: partial!(Context<'a>, mut VariablesP<'a>, mut ClausesP),
    lit: Lit,
) {
    let (vars, mut ctx) = ctx.split_part_mut(VariablesP);

    let data = vars.var_mut(lit.var());
    debug_assert!(!data.resolved);
    data.to_install = lit.is_positive();
    data.resolved = true;

    let clauses = ctx.part_mut(ClausesP);
    for &rule in vars.var(lit.var()).rules.iter() {
        clauses.get_mut(rule).nresolved += 1;
    }
}

/// Unfix a variable again, reverting the counter updates of [`assign`].
pub(crate) fn unassign<'a>(
    mut ctx: partial!(Context<'a>, mut VariablesP<'a>, mut ClausesP),
    var: Var,
) {
    let (vars, mut ctx) = ctx.split_part_mut(VariablesP);

    debug_assert!(vars.var(var).resolved);
    vars.var_mut(var).resolved = false;

    let clauses = ctx.part_mut(ClausesP);
    for &rule in vars.var(var).rules.iter() {
        clauses.get_mut(rule).nresolved -= 1;
    }
}

/// Human readable report for a top-level conflict, naming every candidate of
/// the conflicting clause and its desired action.
pub fn conflict_report(vars: &Variables, clause: &Clause) -> String {
    let mut parts = Vec::with_capacity(clause.len());
    for &lit in clause.lits() {
        let data = vars.var(lit.var());
        parts.push(match data.origin {
            Origin::Installed => format!(
                "local {}(want {})",
                data.uid,
                if data.to_install { "keep" } else { "remove" }
            ),
            Origin::Remote => format!(
                "remote {}(want {})",
                data.uid,
                if data.to_install { "install" } else { "ignore" }
            ),
        });
    }
    parts.join(", ")
}

/// Render a clause for trace logging, marking resolved variables with their
/// tentative value.
pub(crate) fn rule_to_string(vars: &Variables, clause: &Clause) -> String {
    let mut out = String::from("(");
    for (index, &lit) in clause.lits().iter().enumerate() {
        if index > 0 {
            out.push_str(" | ");
        }
        if lit.is_negative() {
            out.push('!');
        }
        let data = vars.var(lit.var());
        out.push_str(data.uid);
        out.push_str(match data.origin {
            Origin::Installed => "(l)",
            Origin::Remote => "(r)",
        });
        if data.resolved {
            out.push_str(if data.to_install { "(+)" } else { "(-)" });
        }
    }
    out.push(')');
    out
}

fn find_conflict(vars: &Variables, clauses: &Clauses, var: Var) -> Option<Conflict> {
    for &rule in vars.var(var).rules.iter() {
        let clause = clauses.get(rule);
        if clause.is_fully_resolved() && !satisfied_by_resolved(vars, clause) {
            return Some(Conflict { rule });
        }
    }
    None
}

fn find_unit(vars: &Variables, clauses: &Clauses, var: Var) -> Option<(ClauseId, Lit)> {
    for &rule in vars.var(var).rules.iter() {
        let clause = clauses.get(rule);
        if clause.is_almost_resolved() && !satisfied_by_resolved(vars, clause) {
            let unresolved = clause
                .lits()
                .iter()
                .copied()
                .find(|lit| !vars.var(lit.var()).resolved);
            if let Some(lit) = unresolved {
                return Some((rule, lit));
            }
        }
    }
    None
}

fn satisfied_by_resolved(vars: &Variables, clause: &Clause) -> bool {
    clause.lits().iter().any(|&lit| vars.lit_satisfied(lit))
}

fn log_forced(vars: &Variables, clauses: &Clauses, lit: Lit, rule: ClauseId) {
    let data = vars.var(lit.var());
    debug!(
        "propagate {}-{}({}) to {}",
        data.uid,
        data.digest,
        data.priority,
        if data.to_install { "install" } else { "delete" }
    );
    if log_enabled!(log::Level::Trace) {
        trace!("rule: {}", rule_to_string(vars, clauses.get(rule)));
    }
}
