//! Package transaction solver.
use std::io;

use partial_ref::{IntoPartialRef, IntoPartialRefMut, PartialRef};

use anyhow::Error;
use log::debug;
use thiserror::Error;

use pkgsat_dimacs::{write_dimacs_clauses, write_dimacs_header, DimacsHeader, ModelParser};
use pkgsat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::encode::encode;
use crate::model::project;
use crate::universe::{Action, Request, Universe};
use crate::{prop, search};

/// Failure of a solve attempt.
///
/// Nothing is retried internally; every failure discards the partial result
/// and surfaces as one of these.
#[derive(Clone, Debug, Error)]
pub enum SolveError {
    /// The encoded request is contradictory before any guessing, e.g. two
    /// requested packages conflict. Carries a report naming every candidate
    /// of the conflicting clause.
    #[error("cannot resolve conflict between {0}, please resolve it manually")]
    ConflictingRequest(String),
    /// The search exhausted both polarities of every decision.
    #[error("problem is UNSAT after {decisions} decisions")]
    Unsat { decisions: u64 },
    /// A variable was still unresolved when projecting the model.
    #[error("variable for {uid} is unresolved after solving")]
    UnresolvedVariable { uid: String },
}

/// A package transaction solver for one universe and one request.
///
/// Encoding happens on construction; [`solve`](Solver::solve) decides the
/// problem internally. Alternatively the problem can be exported with
/// [`write_dimacs`](Solver::write_dimacs), decided by an external SAT solver
/// and its model applied with [`load_model`](Solver::load_model).
///
/// The universe must outlive the solver; variables borrow its UID and digest
/// strings.
pub struct Solver<'a> {
    ctx: Box<Context<'a>>,
    outcome: Option<Result<(), SolveError>>,
}

impl<'a> Solver<'a> {
    /// Encode a problem from the universe and the user request.
    pub fn new(universe: &'a Universe, request: &Request) -> Solver<'a> {
        let mut solver = Solver {
            ctx: Box::new(Context::default()),
            outcome: None,
        };
        {
            let mut ctx = solver.ctx.into_partial_ref_mut();
            ctx.part_mut(SolverStateP).job = request.job();
            encode(ctx.borrow(), universe, request);
            debug!(
                "encoded problem with {} variables and {} clauses",
                ctx.part(VariablesP).len(),
                ctx.part(ClausesP).len()
            );
        }
        solver
    }

    /// Number of solver variables, one per universe candidate.
    pub fn var_count(&self) -> usize {
        self.ctx.variables.len()
    }

    /// Number of encoded clauses.
    pub fn clause_count(&self) -> usize {
        self.ctx.clauses.len()
    }

    /// Decide the problem and return the transaction actions.
    ///
    /// Propagates the boundary condition first; a conflict found at this
    /// point means the request itself is contradictory and is reported as
    /// [`SolveError::ConflictingRequest`] without any search. Calling this
    /// again after completion projects the same assignment again.
    pub fn solve(&mut self) -> Result<Vec<Action>, SolveError> {
        let outcome = match &self.outcome {
            Some(outcome) => outcome.clone(),
            None => {
                let outcome = self.run();
                self.outcome = Some(outcome.clone());
                outcome
            }
        };
        outcome?;

        let ctx = self.ctx.into_partial_ref();
        project(ctx.part(VariablesP), ctx.part(SolverStateP).job)
    }

    /// The satisfying assignment, if the problem was solved successfully.
    pub fn model(&self) -> Option<Vec<Lit>> {
        match &self.outcome {
            Some(Ok(())) => {
                let ctx = self.ctx.into_partial_ref();
                let vars = ctx.part(VariablesP);
                Some(
                    (0..vars.len())
                        .filter_map(|index| {
                            let data = vars.var(Var::from_index(index));
                            if data.resolved {
                                Some(Lit::from_index(index, data.to_install))
                            } else {
                                None
                            }
                        })
                        .collect(),
                )
            }
            _ => None,
        }
    }

    /// Export the problem in DIMACS CNF format.
    ///
    /// Variables are numbered by their 1-based position in the variable
    /// array.
    pub fn write_dimacs(&self, target: &mut impl io::Write) -> io::Result<()> {
        let ctx = self.ctx.into_partial_ref();
        write_dimacs_header(
            target,
            DimacsHeader {
                var_count: ctx.part(VariablesP).len(),
                clause_count: ctx.part(ClausesP).len(),
            },
        )?;
        write_dimacs_clauses(target, ctx.part(ClausesP).iter())
    }

    /// Apply the model output of an external SAT solver and project actions.
    ///
    /// This replaces the internal search. Variable numbers beyond the
    /// problem are ignored; variables the model does not cover stay
    /// unresolved and make the projection fail.
    pub fn load_model(&mut self, input: impl io::Read) -> Result<Vec<Action>, Error> {
        let lits = ModelParser::parse(input)?;
        {
            let mut ctx = self.ctx.into_partial_ref_mut();
            let vars = ctx.part_mut(VariablesP);
            for lit in lits {
                if lit.index() < vars.len() {
                    let data = vars.var_mut(lit.var());
                    data.to_install = lit.is_positive();
                    data.resolved = true;
                }
            }
        }
        self.outcome = Some(Ok(()));

        let ctx = self.ctx.into_partial_ref();
        project(ctx.part(VariablesP), ctx.part(SolverStateP).job).map_err(Error::from)
    }

    fn run(&mut self) -> Result<(), SolveError> {
        let mut ctx = self.ctx.into_partial_ref_mut();

        prop::propagate_pure(ctx.borrow());

        if let Err(conflict) = prop::propagate(ctx.borrow(), None) {
            let report = prop::conflict_report(
                ctx.part(VariablesP),
                ctx.part(ClausesP).get(conflict.rule),
            );
            debug!("conflicting request, cannot solve");
            return Err(SolveError::ConflictingRequest(report));
        }

        search::search(ctx.borrow())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::{prelude::*, test_runner::TestCaseError};

    use crate::test::{installed, remote, upgrade_pair};
    use crate::universe::{Candidate, CandidateId, ConflictKind, JobKind, Origin};

    fn solve(universe: &Universe, request: &Request) -> Result<Vec<Action>, SolveError> {
        Solver::new(universe, request).solve()
    }

    #[test]
    fn noop_install_of_a_present_package() {
        let mut universe = Universe::new();
        let a = universe.add(installed("a"));

        let mut request = Request::new(JobKind::Install);
        request.add_install(a);

        assert_eq!(solve(&universe, &request).unwrap(), vec![]);
    }

    #[test]
    fn install_pulls_dependencies() {
        let mut universe = Universe::new();
        let a = universe.add(remote("a").depends_on("b"));
        let b = universe.add(remote("b"));

        let mut request = Request::new(JobKind::Install);
        request.add_install(a);

        assert_eq!(
            solve(&universe, &request).unwrap(),
            vec![Action::Install(a), Action::Install(b)]
        );
    }

    #[test]
    fn upgrade_replaces_the_installed_version() {
        let mut universe = Universe::new();
        let (old, new) = upgrade_pair(&mut universe, "a");

        let mut request = Request::new(JobKind::Upgrade);
        request.add_install(new);

        assert_eq!(
            solve(&universe, &request).unwrap(),
            vec![Action::Upgrade {
                install: new,
                replace: old,
            }]
        );
    }

    #[test]
    fn upgrade_job_without_requests_upgrades_by_guess() {
        let mut universe = Universe::new();
        let (old, new) = upgrade_pair(&mut universe, "a");

        let request = Request::new(JobKind::Upgrade);

        assert_eq!(
            solve(&universe, &request).unwrap(),
            vec![Action::Upgrade {
                install: new,
                replace: old,
            }]
        );
    }

    #[test]
    fn conflicting_package_is_left_out() {
        let mut universe = Universe::new();
        let a = universe.add(remote("a").conflicts_with("b", ConflictKind::RemoteRemote));
        universe.add(remote("b"));

        let mut request = Request::new(JobKind::Install);
        request.add_install(a);

        assert_eq!(
            solve(&universe, &request).unwrap(),
            vec![Action::Install(a)]
        );
    }

    #[test]
    fn conflicting_requests_fail_before_searching() {
        let mut universe = Universe::new();
        let a = universe.add(remote("a").conflicts_with("b", ConflictKind::RemoteRemote));
        let b = universe.add(remote("b"));

        let mut request = Request::new(JobKind::Install);
        request.add_install(a);
        request.add_install(b);

        match solve(&universe, &request) {
            Err(SolveError::ConflictingRequest(report)) => {
                assert!(report.contains("remote a(want install)"));
                assert!(report.contains("remote b(want install)"));
            }
            other => panic!("expected a conflict, got {:?}", other),
        }
    }

    #[test]
    fn shlib_requirement_is_satisfied_by_one_provider() {
        let mut universe = Universe::new();
        let app = universe.add(remote("app").requires_shlib("libfoo.so.1"));
        let libfoo = universe.add(remote("libfoo").provides_shlib("libfoo.so.1"));
        let libfoo_alt = universe.add(remote("libfoo-alt").provides_shlib("libfoo.so.1"));

        let mut request = Request::new(JobKind::Install);
        request.add_install(app);

        let actions = solve(&universe, &request).unwrap();

        assert!(actions.contains(&Action::Install(app)));
        let providers: Vec<_> = actions
            .iter()
            .filter(|action| {
                matches!(
                    action,
                    Action::Install(id) if *id == libfoo || *id == libfoo_alt
                )
            })
            .collect();
        assert_eq!(providers.len(), 1);
    }

    #[test]
    fn chain_with_two_remotes_installs_exactly_one() {
        let mut universe = Universe::new();
        let old = universe.add(installed("a"));
        let r1 = universe.add(Candidate::new("a", "a-2", Origin::Remote));
        let r2 = universe.add(Candidate::new("a", "a-3", Origin::Remote));

        let mut request = Request::new(JobKind::Install);
        request.add_install(r1);

        assert_eq!(
            solve(&universe, &request).unwrap(),
            vec![Action::Upgrade {
                install: r1,
                replace: old,
            }]
        );

        let mut request = Request::new(JobKind::Install);
        request.add_install(r2);

        assert_eq!(
            solve(&universe, &request).unwrap(),
            vec![Action::Upgrade {
                install: r2,
                replace: old,
            }]
        );
    }

    #[test]
    fn delete_of_an_absent_package_is_idempotent() {
        let mut universe = Universe::new();
        universe.add(installed("a"));
        universe.add(installed("b"));

        // The requested package was not found in the universe, so the
        // request sets stay empty.
        let request = Request::new(JobKind::Delete);

        assert_eq!(solve(&universe, &request).unwrap(), vec![]);
    }

    #[test]
    fn delete_request_removes_the_package() {
        let mut universe = Universe::new();
        let a = universe.add(installed("a"));
        let b = universe.add(installed("b").depends_on("a"));

        let mut request = Request::new(JobKind::Delete);
        request.add_remove(a);

        // Deleting a drags its dependent b along.
        assert_eq!(
            solve(&universe, &request).unwrap(),
            vec![Action::Delete(a), Action::Delete(b)]
        );
    }

    #[test]
    fn solved_problems_expose_their_model() {
        let mut universe = Universe::new();
        let a = universe.add(remote("a"));

        let mut request = Request::new(JobKind::Install);
        request.add_install(a);

        let mut solver = Solver::new(&universe, &request);
        assert_eq!(solver.model(), None);

        solver.solve().unwrap();
        let model = solver.model().unwrap();
        assert_eq!(model.len(), 1);
        assert!(model[0].is_positive());
    }

    #[test]
    fn dimacs_export_numbers_variables_in_array_order() {
        let mut universe = Universe::new();
        let a = universe.add(remote("a").depends_on("b"));
        universe.add(remote("b"));

        let mut request = Request::new(JobKind::Install);
        request.add_install(a);

        let solver = Solver::new(&universe, &request);
        let mut buf = vec![];
        solver.write_dimacs(&mut buf).unwrap();

        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "p cnf 2 2\n-1 2 0\n1 0\n"
        );
    }

    #[test]
    fn external_model_replays_to_the_same_actions() {
        let mut universe = Universe::new();
        let a = universe.add(remote("a").depends_on("b"));
        universe.add(remote("b"));
        upgrade_pair(&mut universe, "c");

        let mut request = Request::new(JobKind::Install);
        request.add_install(a);

        let mut solver = Solver::new(&universe, &request);
        let internal_actions = solver.solve().unwrap();

        let mut output = String::from("SAT\n");
        for lit in solver.model().unwrap() {
            output.push_str(&format!("{} ", lit));
        }
        output.push_str("0\n");

        let mut replay = Solver::new(&universe, &request);
        let external_actions = replay.load_model(output.as_bytes()).unwrap();

        assert_eq!(internal_actions, external_actions);
    }

    #[test]
    fn partial_external_model_fails_projection() {
        let mut universe = Universe::new();
        let a = universe.add(remote("a"));
        universe.add(remote("b"));

        let mut request = Request::new(JobKind::Install);
        request.add_install(a);

        let mut solver = Solver::new(&universe, &request);
        let err = solver.load_model(&b"SAT\n1 0\n"[..]).unwrap_err();

        match err.downcast_ref() {
            Some(SolveError::UnresolvedVariable { uid }) => assert_eq!(uid, "b"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn unknown_variable_numbers_are_ignored() {
        let mut universe = Universe::new();
        let a = universe.add(remote("a"));

        let mut request = Request::new(JobKind::Install);
        request.add_install(a);

        let mut solver = Solver::new(&universe, &request);
        let actions = solver.load_model(&b"SAT\n1 7 -9 0\n"[..]).unwrap();

        assert_eq!(actions, vec![Action::Install(a)]);
    }

    proptest! {
        #[test]
        fn solved_transactions_respect_the_universe(
            (universe, request) in crate::test::universe_and_request(),
        ) {
            let mut solver = Solver::new(&universe, &request);
            let actions = match solver.solve() {
                Ok(actions) => actions,
                // Random universes may genuinely be unsatisfiable.
                Err(_) => return Ok(()),
            };

            // Replay the actions onto the installed state.
            let mut present: Vec<CandidateId> = (0..universe.len())
                .map(CandidateId::from_index)
                .filter(|&id| universe.candidate(id).origin() == Origin::Installed)
                .collect();
            for action in actions.iter() {
                match *action {
                    Action::Install(id) => present.push(id),
                    Action::Upgrade { install, replace } => {
                        present.retain(|&p| p != replace);
                        present.push(install);
                    }
                    Action::Delete(id) => present.retain(|&p| p != id),
                    // A fetched candidate is part of the decided set even
                    // though nothing is installed.
                    Action::Fetch(id) => present.push(id),
                }
            }

            // Requests are honoured.
            for id in (0..universe.len()).map(CandidateId::from_index) {
                if request.wants_install(id) {
                    prop_assert!(present.contains(&id));
                }
                if request.wants_remove(id) {
                    prop_assert!(!present.contains(&id));
                }
            }

            // At most one version of each UID is present.
            for chain in universe.chains() {
                let count = chain.iter().filter(|id| present.contains(id)).count();
                prop_assert!(count <= 1, "chain with {} present members", count);
            }

            // Dependencies of present packages are present whenever the
            // universe knows the target chain.
            for &id in present.iter() {
                for dep in universe.candidate(id).depends() {
                    let chain: Vec<_> = universe
                        .chains()
                        .find(|chain| {
                            chain
                                .first()
                                .map(|&c| universe.candidate(c).uid() == dep)
                                .unwrap_or(false)
                        })
                        .map(|chain| chain.to_vec())
                        .unwrap_or_default();
                    if chain.is_empty() {
                        continue;
                    }
                    prop_assert!(
                        chain.iter().any(|c| present.contains(c)),
                        "dependency {} of {} unsatisfied",
                        dep,
                        universe.candidate(id).uid()
                    );
                }
            }

            // No remote/remote conflict is violated.
            for &id in present.iter() {
                for (uid, kind) in universe.candidate(id).conflicts() {
                    if *kind != ConflictKind::RemoteRemote
                        || universe.candidate(id).origin() != Origin::Remote
                    {
                        continue;
                    }
                    for &other in present.iter() {
                        prop_assert!(
                            !(universe.candidate(other).uid() == uid
                                && universe.candidate(other).origin() == Origin::Remote),
                            "conflict between {} and {} violated",
                            universe.candidate(id).uid(),
                            uid
                        );
                    }
                }
            }
        }

        #[test]
        fn dimacs_roundtrip_matches_internal_solve(
            (universe, request) in crate::test::universe_and_request(),
        ) {
            let mut solver = Solver::new(&universe, &request);
            let internal_actions = match solver.solve() {
                Ok(actions) => actions,
                Err(_) => return Ok(()),
            };

            let mut output = String::from("SAT\n");
            for lit in solver.model().unwrap() {
                output.push_str(&format!("{} ", lit));
            }
            output.push_str("0\n");

            let mut replay = Solver::new(&universe, &request);
            let external_actions = replay
                .load_model(output.as_bytes())
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            prop_assert_eq!(internal_actions, external_actions);
        }
    }
}
