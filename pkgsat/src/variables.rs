//! Solver variables bound to universe candidates.
//!
//! Every candidate of the universe gets exactly one boolean variable whose
//! final value decides whether the candidate is present after the
//! transaction. Variables of one UID chain occupy consecutive slots of the
//! dense variable array; the UID index maps each UID to the head slot. The
//! UID and digest strings are borrowed from the universe, which outlives the
//! problem.

use pkgsat_formula::{Lit, Var};
use rustc_hash::FxHashMap;

use crate::clauses::ClauseId;
use crate::universe::{CandidateId, Origin, Universe};

/// Solver data of a single variable.
pub struct VarData<'a> {
    /// The bound universe candidate.
    pub candidate: CandidateId,
    pub uid: &'a str,
    pub digest: &'a str,
    pub origin: Origin,
    pub priority: i32,
    /// Tentative value: `true` means present after the transaction.
    ///
    /// Meaningless while `resolved` is false.
    pub to_install: bool,
    /// Whether `to_install` is currently fixed.
    pub resolved: bool,
    /// Head variable of this variable's UID chain.
    pub chain_head: Var,
    /// Number of variables in this variable's UID chain.
    pub chain_len: usize,
    /// Back-pointers to every clause mentioning this variable, one entry per
    /// literal occurrence.
    pub rules: Vec<ClauseId>,
}

impl<'a> VarData<'a> {
    /// Whether this variable's chain has no other members.
    pub fn chain_is_singleton(&self) -> bool {
        self.chain_len == 1
    }
}

/// Dense store of all variables of one problem plus the UID index.
#[derive(Default)]
pub struct Variables<'a> {
    vars: Vec<VarData<'a>>,
    by_uid: FxHashMap<&'a str, Var>,
}

impl<'a> Variables<'a> {
    /// Append one UID chain, filling consecutive slots.
    ///
    /// The first candidate becomes the chain head and is registered in the
    /// UID index. Must be called once per chain.
    pub fn add_chain(&mut self, universe: &'a Universe, chain: &[CandidateId]) {
        debug_assert!(!chain.is_empty());

        let head = Var::from_index(self.vars.len());
        for &id in chain {
            let candidate = universe.candidate(id);
            self.vars.push(VarData {
                candidate: id,
                uid: candidate.uid(),
                digest: candidate.digest(),
                origin: candidate.origin(),
                priority: candidate.priority(),
                to_install: false,
                resolved: false,
                chain_head: head,
                chain_len: chain.len(),
                rules: vec![],
            });
        }

        self.by_uid.insert(self.vars[head.index()].uid, head);
    }

    /// The head variable of the chain registered for `uid`, if any.
    ///
    /// An unknown UID is not an error: the universe may be incomplete and
    /// callers drop the affected clause instead.
    pub fn find_chain(&self, uid: &str) -> Option<Var> {
        self.by_uid.get(uid).copied()
    }

    /// Iterator over the members of the chain containing `var`.
    pub fn chain(&self, var: Var) -> impl Iterator<Item = Var> {
        let data = self.var(var);
        let head = data.chain_head.index();
        (head..head + data.chain_len).map(Var::from_index)
    }

    /// Iterator over the head variable of every chain, in slot order.
    pub fn chain_heads(&self) -> impl Iterator<Item = Var> + '_ {
        let vars = &self.vars;
        let mut index = 0;
        std::iter::from_fn(move || {
            if index < vars.len() {
                let head = Var::from_index(index);
                index += vars[index].chain_len;
                Some(head)
            } else {
                None
            }
        })
    }

    /// The data of the given variable.
    pub fn var(&self, var: Var) -> &VarData<'a> {
        &self.vars[var.index()]
    }

    /// Mutable access to the data of the given variable.
    pub fn var_mut(&mut self, var: Var) -> &mut VarData<'a> {
        &mut self.vars[var.index()]
    }

    /// Number of variables in the store.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the store holds no variables.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Whether the literal is satisfied by a resolved variable.
    ///
    /// Unresolved variables satisfy no literal.
    pub fn lit_satisfied(&self, lit: Lit) -> bool {
        let data = self.var(lit.var());
        data.resolved && (data.to_install ^ lit.is_negative())
    }

    /// The first unresolved variable in slot order, if any.
    pub fn first_unresolved(&self) -> Option<Var> {
        self.vars
            .iter()
            .position(|data| !data.resolved)
            .map(Var::from_index)
    }
}
