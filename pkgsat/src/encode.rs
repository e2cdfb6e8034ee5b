//! Encoding the package universe into CNF clauses.
//!
//! Every candidate of the universe gets one variable; dependencies,
//! conflicts, shared library requirements, explicit requests and the mutual
//! exclusion of chain members each become clauses. Unknown dependency UIDs
//! and unsatisfiable shared library requirements are soft failures: the
//! affected clause is dropped with a log message and encoding continues,
//! since the universe may be incomplete.

use log::{debug, log_enabled, trace};
use partial_ref::{partial, PartialRef};

use pkgsat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::prop::rule_to_string;
use crate::universe::{ConflictKind, Origin, Request, Universe};

/// Build the variable store and all clauses for a universe and request.
pub fn encode<'a>(
    mut ctx: partial!(Context<'a>, mut ClausesP, mut VariablesP<'a>),
    universe: &'a Universe,
    request: &Request,
) {
    for chain in universe.chains() {
        ctx.part_mut(VariablesP).add_chain(universe, chain);
    }

    let mut head_index = 0;
    while head_index < ctx.part(VariablesP).len() {
        let head = Var::from_index(head_index);
        let chain_len = ctx.part(VariablesP).var(head).chain_len;

        for offset in 0..chain_len {
            let var = Var::from_index(head_index + offset);
            let id = ctx.part(VariablesP).var(var).candidate;
            let candidate = universe.candidate(id);

            for dep_uid in candidate.depends() {
                add_depend_rule(ctx.borrow(), var, dep_uid);
            }

            for (conflict_uid, kind) in candidate.conflicts() {
                add_conflict_rule(ctx.borrow(), var, conflict_uid, *kind);
            }

            // Installed packages have their shared libraries satisfied
            // already; only remote candidates need providers.
            if candidate.origin() == Origin::Remote {
                for shlib in candidate.shlibs_required() {
                    add_require_rule(ctx.borrow(), universe, var, shlib);
                }
            }

            if request.wants_install(id) {
                add_unary_rule(ctx.borrow(), var, false);
            }
            if request.wants_remove(id) {
                add_unary_rule(ctx.borrow(), var, true);
            }
        }

        if chain_len > 1 {
            add_chain_rule(ctx.borrow(), head);
        }

        head_index += chain_len;
    }
}

/// Dependency rule: `!A | B1 | B2 | ...` over the whole target chain.
fn add_depend_rule<'a>(
    mut ctx: partial!(Context<'a>, mut ClausesP, mut VariablesP<'a>),
    var: Var,
    dep_uid: &str,
) {
    let vars = ctx.part(VariablesP);
    let dep_head = match vars.find_chain(dep_uid) {
        Some(head) => head,
        None => {
            debug!("cannot find variable dependency {}", dep_uid);
            return;
        }
    };

    let mut lits = vec![Lit::negative(var)];
    lits.extend(vars.chain(dep_head).map(Lit::positive));

    add_rule(ctx.borrow(), lits, "dependency");
}

/// Conflict rules: `!A | !Bx` for each applicable member of the chain.
fn add_conflict_rule<'a>(
    mut ctx: partial!(Context<'a>, mut ClausesP, mut VariablesP<'a>),
    var: Var,
    conflict_uid: &str,
    kind: ConflictKind,
) {
    let vars = ctx.part(VariablesP);
    let conflict_head = match vars.find_chain(conflict_uid) {
        Some(head) => head,
        None => {
            debug!("cannot find conflict {}", conflict_uid);
            return;
        }
    };

    let origin = vars.var(var).origin;
    let members: Vec<Var> = vars.chain(conflict_head).collect();

    for member in members {
        let member_origin = ctx.part(VariablesP).var(member).origin;
        let applies = match kind {
            // A remote/local conflict pairs candidates across the
            // installed/remote boundary only.
            ConflictKind::RemoteLocal => origin != member_origin,
            ConflictKind::RemoteRemote => {
                origin == Origin::Remote && member_origin == Origin::Remote
            }
        };
        if !applies {
            continue;
        }

        add_rule(
            ctx.borrow(),
            vec![Lit::negative(var), Lit::negative(member)],
            "explicit conflict",
        );
    }
}

/// Require rule: `!A | P1 | P2 | ...` over every provider chain.
///
/// Each provider chain contributes each of its members once, even when
/// several chain members provide the library. Without any provider the rule
/// is dropped.
fn add_require_rule<'a>(
    mut ctx: partial!(Context<'a>, mut ClausesP, mut VariablesP<'a>),
    universe: &Universe,
    var: Var,
    shlib: &str,
) {
    let providers = universe.providers(shlib);

    let vars = ctx.part(VariablesP);
    let mut lits = vec![Lit::negative(var)];
    let mut seen_heads: Vec<Var> = vec![];

    for &provider in providers {
        let head = match vars.find_chain(universe.candidate(provider).uid()) {
            Some(head) => head,
            None => continue,
        };
        if seen_heads.contains(&head) {
            continue;
        }
        seen_heads.push(head);
        lits.extend(vars.chain(head).map(Lit::positive));
    }

    if lits.len() == 1 {
        debug!("solver: cannot find provide for required shlib {}", shlib);
        return;
    }

    add_rule(ctx.borrow(), lits, "provide");
}

/// Unary request rule: `A` for install requests, `!A` for delete requests.
fn add_unary_rule<'a>(
    mut ctx: partial!(Context<'a>, mut ClausesP, mut VariablesP<'a>),
    var: Var,
    inverse: bool,
) {
    {
        let data = ctx.part(VariablesP).var(var);
        trace!(
            "solver: add variable from {} request with uid {}-{}",
            if inverse { "delete" } else { "install" },
            data.uid,
            data.digest
        );
    }

    add_rule(
        ctx.borrow(),
        vec![Lit::from_var(var, !inverse)],
        "unary request",
    );
}

/// Chain exclusion rules: `!A | !Ax` between the head and each sibling.
fn add_chain_rule<'a>(
    mut ctx: partial!(Context<'a>, mut ClausesP, mut VariablesP<'a>),
    head: Var,
) {
    let siblings: Vec<Var> = ctx.part(VariablesP).chain(head).skip(1).collect();

    for sibling in siblings {
        add_rule(
            ctx.borrow(),
            vec![Lit::negative(head), Lit::negative(sibling)],
            "chain conflict",
        );
    }
}

/// Store a clause and register it on the back-pointer list of every literal's
/// variable, one entry per literal occurrence.
fn add_rule<'a>(
    mut ctx: partial!(Context<'a>, mut ClausesP, mut VariablesP<'a>),
    lits: Vec<Lit>,
    kind: &str,
) {
    let id = ctx.part_mut(ClausesP).add(lits);

    let (clauses, mut ctx) = ctx.split_part_mut(ClausesP);
    let clause = clauses.get(id);
    let vars = ctx.part_mut(VariablesP);

    for &lit in clause.lits() {
        vars.var_mut(lit.var()).rules.push(id);
        if log_enabled!(log::Level::Trace) {
            let data = vars.var(lit.var());
            trace!(
                "solver: add {}-ary {} clause to variable {}-{}",
                clause.len(),
                kind,
                data.uid,
                data.digest
            );
        }
    }

    if log_enabled!(log::Level::Trace) {
        trace!("rule: {}", rule_to_string(vars, clause));
    }
}
