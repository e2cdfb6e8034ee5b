//! Package universe data model.
//!
//! The universe is the solver's input: every package version that could be
//! present after the transaction, grouped into chains of candidates sharing a
//! unique package identity (UID). Universe construction itself (repository
//! scanning, version ordering, digest computation) happens upstream; the
//! solver only consumes the result. The universe outlives every problem
//! encoded from it.

use rustc_hash::{FxHashMap, FxHashSet};

/// Stable index of a candidate within its universe.
///
/// Request sets and actions refer to candidates by this index instead of by
/// address, so identity survives moves and clones of the universe.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct CandidateId(u32);

impl CandidateId {
    /// The index of this candidate in insertion order.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> CandidateId {
        CandidateId(index as u32)
    }
}

/// Where a candidate comes from.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Origin {
    /// The candidate is currently installed on the system.
    Installed,
    /// The candidate is available from a remote repository.
    Remote,
}

/// How a declared conflict restricts the conflicting chain.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ConflictKind {
    /// The conflict only applies between a local and a remote candidate.
    RemoteLocal,
    /// The conflict only applies between two remote candidates.
    RemoteRemote,
}

/// The kind of transaction being solved.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum JobKind {
    Install,
    Upgrade,
    Delete,
    Fetch,
}

/// One concrete package version in the universe.
#[derive(Clone, Debug)]
pub struct Candidate {
    uid: String,
    digest: String,
    origin: Origin,
    priority: i32,
    depends: Vec<String>,
    conflicts: Vec<(String, ConflictKind)>,
    shlibs_required: Vec<String>,
    shlibs_provided: Vec<String>,
}

impl Candidate {
    /// Create a candidate with the given identity, content digest and origin.
    pub fn new(uid: impl Into<String>, digest: impl Into<String>, origin: Origin) -> Candidate {
        Candidate {
            uid: uid.into(),
            digest: digest.into(),
            origin,
            priority: 0,
            depends: vec![],
            conflicts: vec![],
            shlibs_required: vec![],
            shlibs_provided: vec![],
        }
    }

    /// Set the priority hint used to bias choices among chain members.
    pub fn with_priority(mut self, priority: i32) -> Candidate {
        self.priority = priority;
        self
    }

    /// Declare a dependency on another package identity.
    pub fn depends_on(mut self, uid: impl Into<String>) -> Candidate {
        self.depends.push(uid.into());
        self
    }

    /// Declare a conflict with another package identity.
    pub fn conflicts_with(mut self, uid: impl Into<String>, kind: ConflictKind) -> Candidate {
        self.conflicts.push((uid.into(), kind));
        self
    }

    /// Declare a required shared library.
    ///
    /// Only meaningful for remote candidates; installed packages are assumed
    /// to have their shared libraries satisfied already.
    pub fn requires_shlib(mut self, name: impl Into<String>) -> Candidate {
        self.shlibs_required.push(name.into());
        self
    }

    /// Declare a provided shared library.
    pub fn provides_shlib(mut self, name: impl Into<String>) -> Candidate {
        self.shlibs_provided.push(name.into());
        self
    }

    /// The version independent unique identity of this package.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// The content digest of this candidate.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Whether this candidate is installed or remote.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// The priority hint of this candidate.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Dependency UIDs of this candidate.
    pub fn depends(&self) -> &[String] {
        &self.depends
    }

    /// Conflict declarations of this candidate.
    pub fn conflicts(&self) -> &[(String, ConflictKind)] {
        &self.conflicts
    }

    /// Shared libraries this candidate requires.
    pub fn shlibs_required(&self) -> &[String] {
        &self.shlibs_required
    }

    /// Shared libraries this candidate provides.
    pub fn shlibs_provided(&self) -> &[String] {
        &self.shlibs_provided
    }
}

/// All candidates of a transaction, grouped into UID chains.
#[derive(Clone, Default, Debug)]
pub struct Universe {
    candidates: Vec<Candidate>,
    chain_uids: Vec<String>,
    chains: FxHashMap<String, Vec<CandidateId>>,
    provides: FxHashMap<String, Vec<CandidateId>>,
}

impl Universe {
    /// Create an empty universe.
    pub fn new() -> Universe {
        Universe::default()
    }

    /// Add a candidate, appending it to the chain of its UID.
    ///
    /// Chains keep their candidates in insertion order; the provides index is
    /// updated from the candidate's provided shared libraries.
    pub fn add(&mut self, candidate: Candidate) -> CandidateId {
        let id = CandidateId::from_index(self.candidates.len());

        if let Some(chain) = self.chains.get_mut(candidate.uid()) {
            chain.push(id);
        } else {
            self.chain_uids.push(candidate.uid().to_owned());
            self.chains.insert(candidate.uid().to_owned(), vec![id]);
        }

        for name in candidate.shlibs_provided() {
            self.provides.entry(name.clone()).or_default().push(id);
        }

        self.candidates.push(candidate);
        id
    }

    /// The candidate with the given id.
    pub fn candidate(&self, id: CandidateId) -> &Candidate {
        &self.candidates[id.index()]
    }

    /// Number of candidates in the universe.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the universe holds no candidates.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Iterator over the UID chains in first-insertion order.
    pub fn chains(&self) -> impl Iterator<Item = &[CandidateId]> {
        let chains = &self.chains;
        self.chain_uids
            .iter()
            .map(move |uid| chains.get(uid).map(|c| &c[..]).unwrap_or(&[]))
    }

    /// The candidates providing the given shared library.
    pub fn providers(&self, shlib: &str) -> &[CandidateId] {
        self.provides.get(shlib).map(|p| &p[..]).unwrap_or(&[])
    }
}

/// The explicit user request driving a transaction.
#[derive(Clone, Debug)]
pub struct Request {
    job: JobKind,
    install: FxHashSet<CandidateId>,
    remove: FxHashSet<CandidateId>,
}

impl Request {
    /// Create an empty request for the given job kind.
    pub fn new(job: JobKind) -> Request {
        Request {
            job,
            install: FxHashSet::default(),
            remove: FxHashSet::default(),
        }
    }

    /// The kind of transaction requested.
    pub fn job(&self) -> JobKind {
        self.job
    }

    /// Request the given candidate to be present after the transaction.
    pub fn add_install(&mut self, id: CandidateId) {
        self.install.insert(id);
    }

    /// Request the given candidate to be absent after the transaction.
    pub fn add_remove(&mut self, id: CandidateId) {
        self.remove.insert(id);
    }

    /// Whether installation of the given candidate was requested.
    pub fn wants_install(&self, id: CandidateId) -> bool {
        self.install.contains(&id)
    }

    /// Whether removal of the given candidate was requested.
    pub fn wants_remove(&self, id: CandidateId) -> bool {
        self.remove.contains(&id)
    }
}

/// One step of the decided transaction.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Action {
    /// Install a remote candidate that has no installed version.
    Install(CandidateId),
    /// Replace an installed version by a remote candidate of the same UID.
    Upgrade {
        install: CandidateId,
        replace: CandidateId,
    },
    /// Remove an installed candidate.
    Delete(CandidateId),
    /// Download a remote candidate without installing it.
    Fetch(CandidateId),
}
