use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use log::{debug, info};
use rocket::{http::Status as HttpStatus, serde::json::serde_json};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    candidate::{Candidate, CandidateId, CandidateSpec},
    member::{Member, MemberCredentials, MemberName},
    ratification::Status,
};

/// Everything the service knows: the roster and the candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    #[serde(default)]
    members: Vec<Member>,
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl Ledger {
    /// Names of every current member, in registration order.
    pub fn roster(&self) -> Vec<MemberName> {
        self.members.iter().map(|member| member.name.clone()).collect()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Look up a member by exact name.
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|member| member.name.as_str() == name)
    }

    /// Every candidate, freshly recomputed against the roster.
    pub fn candidates(&self) -> Vec<Candidate> {
        let roster = self.roster();
        self.candidates
            .iter()
            .map(|candidate| candidate.recomputed(&roster))
            .collect()
    }

    /// A single candidate, freshly recomputed against the roster.
    pub fn candidate(&self, id: &CandidateId) -> Result<Candidate> {
        self.candidates
            .iter()
            .find(|candidate| &candidate.id == id)
            .map(|candidate| candidate.recomputed(&self.roster()))
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))
    }

    fn candidate_mut(&mut self, id: &CandidateId) -> Result<&mut Candidate> {
        self.candidates
            .iter_mut()
            .find(|candidate| &candidate.id == id)
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))
    }

    /// Register a new member. Names are unique regardless of case.
    pub fn add_member(&mut self, member: Member) -> Result<&Member> {
        let folded = member.name.folded();
        if self.members.iter().any(|m| m.name.folded() == folded) {
            return Err(Error::bad_request(format!(
                "Member name already in use: {}",
                member.name
            )));
        }
        self.members.push(member);
        self.recompute_all();
        // Just pushed.
        Ok(&self.members[self.members.len() - 1])
    }

    /// Register a new candidate, rejecting anyone already on the list.
    pub fn add_candidate(&mut self, spec: CandidateSpec, now: DateTime<Utc>) -> Result<Candidate> {
        if self.candidates.iter().any(|c| c.same_person(&spec)) {
            return Err(Error::bad_request(format!(
                "Candidate {} {}. already exists",
                spec.first_name, spec.last_initial
            )));
        }
        let candidate = Candidate::new(spec, &self.roster(), now);
        self.candidates.push(candidate.clone());
        Ok(candidate)
    }

    /// Record `member`'s vote on a pending candidate.
    pub fn record_vote(&mut self, id: &CandidateId, member: &str, vote: bool) -> Result<Candidate> {
        let roster = self.roster();
        let name = roster
            .iter()
            .find(|name| name.as_str() == member)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("Member {member}")))?;
        let candidate = self.candidate_mut(id)?;
        candidate.recompute(&roster);
        if candidate.status != Status::Pending {
            return Err(Error::bad_request(format!(
                "Candidate {id} is already {}; reopen it to vote again",
                candidate.status
            )));
        }
        candidate.votes.record(name, vote);
        candidate.recompute(&roster);
        Ok(candidate.clone())
    }

    /// Clear a candidate's votes.
    pub fn reopen(&mut self, id: &CandidateId) -> Result<Candidate> {
        let roster = self.roster();
        let candidate = self.candidate_mut(id)?;
        candidate.reopen(&roster);
        Ok(candidate.clone())
    }

    /// Force a candidate's status by synthesizing votes for the current roster.
    pub fn set_status(&mut self, id: &CandidateId, status: Status) -> Result<Candidate> {
        let roster = self.roster();
        let candidate = self.candidate_mut(id)?;
        candidate.force_status(status, &roster);
        Ok(candidate.clone())
    }

    /// Remove a candidate, returning its final state.
    pub fn remove_candidate(&mut self, id: &CandidateId) -> Result<Candidate> {
        let roster = self.roster();
        let index = self
            .candidates
            .iter()
            .position(|candidate| &candidate.id == id)
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))?;
        Ok(self.candidates.remove(index).recomputed(&roster))
    }

    /// Bring every candidate's cached status up to date with the roster.
    pub fn recompute_all(&mut self) {
        let roster = self.roster();
        for candidate in &mut self.candidates {
            candidate.recompute(&roster);
        }
    }

    /// Check invariants that deserialization alone cannot: unique members,
    /// unique candidate IDs, and votes only from members on the roster.
    fn validate(&self) -> std::result::Result<(), String> {
        let mut folded: Vec<_> = self.members.iter().map(|m| m.name.folded()).collect();
        folded.sort();
        if folded.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err("duplicate member name".to_string());
        }

        let mut ids: Vec<_> = self.candidates.iter().map(|c| &c.id).collect();
        ids.sort();
        if ids.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err("duplicate candidate ID".to_string());
        }

        for candidate in &self.candidates {
            if let Some(stranger) = candidate
                .votes
                .voters()
                .find(|name| self.member(name).is_none())
            {
                return Err(format!(
                    "candidate {} has a vote from unknown member {stranger}",
                    candidate.id
                ));
            }
        }
        Ok(())
    }
}

/// The ledger, held in memory and mirrored to a JSON file.
///
/// Every mutation runs against a copy while the lock is held, and the copy
/// only replaces the live ledger once it has been written to disk, so a
/// rejected or failed update changes nothing.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    ledger: Mutex<Ledger>,
}

impl Store {
    /// Load the ledger from `path`. A missing file is an empty ledger.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let ledger = match fs::read(&path) {
            Ok(bytes) => {
                let mut ledger: Ledger = serde_json::from_slice(&bytes)?;
                ledger.validate().map_err(|reason| {
                    Error::Status(
                        HttpStatus::InternalServerError,
                        format!("Corrupt data file {}: {reason}", path.display()),
                    )
                })?;
                ledger.recompute_all();
                info!(
                    "Loaded {} members and {} candidates from {}",
                    ledger.members.len(),
                    ledger.candidates.len(),
                    path.display()
                );
                ledger
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No data file at {}, starting empty", path.display());
                Ledger::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            ledger: Mutex::new(ledger),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a read-only query against the ledger.
    pub fn read<T, F>(&self, query: F) -> T
    where
        F: FnOnce(&Ledger) -> T,
    {
        query(&*self.lock())
    }

    /// Run a mutation against the ledger and persist the result.
    /// If the mutation or the write fails, the ledger is left untouched.
    pub fn update<T, F>(&self, mutation: F) -> Result<T>
    where
        F: FnOnce(&mut Ledger) -> Result<T>,
    {
        let mut ledger = self.lock();
        let mut draft = ledger.clone();
        let result = mutation(&mut draft)?;
        draft.recompute_all();
        self.persist(&draft)?;
        *ledger = draft;
        Ok(result)
    }

    /// Add any seed members whose names are not yet registered.
    /// Returns how many were added.
    pub fn seed_members(&self, seeds: &[MemberCredentials]) -> Result<usize> {
        self.update(|ledger| {
            let mut added = 0;
            for seed in seeds {
                let name = MemberName::try_from(seed.name.clone()).map_err(Error::bad_request)?;
                if ledger
                    .members()
                    .iter()
                    .any(|m| m.name.folded() == name.folded())
                {
                    continue;
                }
                let member = Member::try_from(seed.clone()).map_err(Error::bad_request)?;
                ledger.add_member(member)?;
                debug!("Seeded member {name}");
                added += 1;
            }
            Ok(added)
        })
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        // A panic mid-update never leaves a half-applied draft in the mutex.
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the whole ledger to a sibling temp file, then move it into place.
    fn persist(&self, ledger: &Ledger) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(ledger)?;
        let tmp = self.path.with_extension("json.tmp");
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Wrote data file {}", self.path.display());
        Ok(())
    }
}
