//! Projecting the satisfying assignment onto transaction actions.
//!
//! Each UID chain is classified independently: remote members set to install
//! form the add set, installed members set to removal form the delete set. A
//! single add paired with a delete is an upgrade, a lone add an install (or a
//! fetch under a fetch job), and every remaining delete-set member becomes a
//! delete action. A chain whose members all keep their state produces
//! nothing.

use log::{debug, error, trace};

use crate::solver::SolveError;
use crate::universe::{Action, JobKind, Origin};
use crate::variables::Variables;

/// Map the assignment to the ordered action list, chain by chain.
///
/// Fails if any variable is still unresolved, e.g. when an external model
/// did not cover every variable.
pub fn project(vars: &Variables, job: JobKind) -> Result<Vec<Action>, SolveError> {
    let mut actions = vec![];

    for head in vars.chain_heads() {
        trace!("solver: check variable with uid {}", vars.var(head).uid);

        for member in vars.chain(head) {
            if !vars.var(member).resolved {
                return Err(SolveError::UnresolvedVariable {
                    uid: vars.var(member).uid.to_owned(),
                });
            }
        }

        let mut add_var = None;
        let mut del_var = None;
        let mut seen_add = 0;
        let mut seen_del = 0;

        for member in vars.chain(head) {
            let data = vars.var(member);
            if data.to_install && data.origin == Origin::Remote {
                add_var = Some(member);
                seen_add += 1;
            } else if !data.to_install && data.origin == Origin::Installed {
                del_var = Some(member);
                seen_del += 1;
            }
        }

        if seen_add > 1 {
            error!(
                "internal solver error: more than one package to install ({}) from the same uid: {}",
                seen_add,
                vars.var(head).uid
            );
            continue;
        }

        if seen_add == 0 && seen_del == 0 {
            debug!(
                "solver: ignoring package {}({}) as its state has not been changed",
                vars.var(head).uid,
                vars.var(head).digest
            );
            continue;
        }

        if let Some(add) = add_var {
            let add_data = vars.var(add);
            match del_var {
                None => {
                    actions.push(if job == JobKind::Fetch {
                        Action::Fetch(add_data.candidate)
                    } else {
                        Action::Install(add_data.candidate)
                    });
                    debug!(
                        "schedule installation of {} {}",
                        add_data.uid, add_data.digest
                    );
                }
                Some(del) => {
                    let del_data = vars.var(del);
                    actions.push(Action::Upgrade {
                        install: add_data.candidate,
                        replace: del_data.candidate,
                    });
                    debug!(
                        "schedule upgrade of {} from {} to {}",
                        del_data.uid, del_data.digest, add_data.digest
                    );
                }
            }
        }

        // Further installed members beyond the one paired into an upgrade
        // are plain deletions.
        for member in vars.chain(head) {
            let data = vars.var(member);
            if data.origin == Origin::Installed && !data.to_install {
                if seen_add > 0 && Some(member) == del_var {
                    continue;
                }
                actions.push(Action::Delete(data.candidate));
                debug!("schedule deletion of {} {}", data.uid, data.digest);
            }
        }
    }

    Ok(actions)
}
