use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use rand::Rng;
use rocket::request::FromParam;
use serde::{Deserialize, Serialize};

use crate::model::{
    member::MemberName,
    ratification::{Ratification, Status, Votes},
};

/// Length of a candidate ID in random bytes; it is hex-encoded on the wire.
const ID_BYTES: usize = 8;

/// A candidate's unique ID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    /// Generate a fresh random ID.
    pub fn random() -> Self {
        let bytes: [u8; ID_BYTES] = rand::thread_rng().gen();
        Self(HEXLOWER.encode(&bytes))
    }
}

impl Display for CandidateId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'a> FromParam<'a> for CandidateId {
    type Error = &'a str;

    /// Anything that could not have been generated by [`CandidateId::random`]
    /// is rejected before it reaches a handler.
    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        match HEXLOWER.decode(param.as_bytes()) {
            Ok(bytes) if bytes.len() == ID_BYTES => Ok(Self(param.to_string())),
            _ => Err(param),
        }
    }
}

/// A candidate under consideration, as stored and as returned by the API.
///
/// `status`, `ratified` and `total_members` are a cache of
/// [`Ratification::tally`] and are rewritten by [`Candidate::recompute`]
/// whenever the candidate is read or written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: CandidateId,
    pub first_name: String,
    pub last_initial: char,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub votes: Votes,
    pub status: Status,
    pub ratified: bool,
    pub total_members: usize,
    pub created_at: DateTime<Utc>,
}

impl Candidate {
    /// Create a new pending candidate from validated fields.
    pub fn new(spec: CandidateSpec, roster: &[MemberName], now: DateTime<Utc>) -> Self {
        let mut candidate = Self {
            id: CandidateId::random(),
            first_name: spec.first_name,
            last_initial: spec.last_initial,
            notes: spec.notes,
            votes: Votes::default(),
            status: Status::Pending,
            ratified: false,
            total_members: roster.len(),
            created_at: now,
        };
        candidate.recompute(roster);
        candidate
    }

    /// Re-derive the cached status fields from the votes and the roster.
    pub fn recompute(&mut self, roster: &[MemberName]) {
        let Ratification {
            status,
            ratified,
            total_members,
        } = Ratification::tally(&self.votes, roster);
        self.status = status;
        self.ratified = ratified;
        self.total_members = total_members;
    }

    /// A recomputed copy, for read paths that must not mutate the ledger.
    pub fn recomputed(&self, roster: &[MemberName]) -> Self {
        let mut candidate = self.clone();
        candidate.recompute(roster);
        candidate
    }

    /// Does this candidate describe the same person as `spec`?
    /// Names are compared case-insensitively.
    pub fn same_person(&self, spec: &CandidateSpec) -> bool {
        self.first_name.to_lowercase() == spec.first_name.to_lowercase()
            && self.last_initial == spec.last_initial
    }

    /// Force a status by rewriting the votes so that the status still
    /// follows from them: unanimous yes for banned, unanimous no for allowed,
    /// and no votes at all for pending.
    pub fn force_status(&mut self, status: Status, roster: &[MemberName]) {
        self.votes = match status {
            Status::Banned => Votes::unanimous(roster, true),
            Status::Allowed => Votes::unanimous(roster, false),
            Status::Pending => Votes::default(),
        };
        self.recompute(roster);
    }

    /// Clear every vote, returning the candidate to pending.
    pub fn reopen(&mut self, roster: &[MemberName]) {
        self.votes.clear();
        self.recompute(roster);
    }
}

pub const MAX_FIRST_NAME_LENGTH: usize = 64;
pub const MAX_NOTES_LENGTH: usize = 1000;

/// A validated request to create a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSpec {
    pub first_name: String,
    pub last_initial: char,
    pub notes: String,
}

impl CandidateSpec {
    /// Validate raw input. The first name is trimmed and the last initial
    /// upper-cased.
    pub fn new(first_name: &str, last_initial: &str, notes: Option<&str>) -> Result<Self, String> {
        let first_name = first_name.trim();
        if first_name.is_empty() {
            return Err("First name must not be empty".to_string());
        }
        if first_name.chars().count() > MAX_FIRST_NAME_LENGTH {
            return Err(format!(
                "First name must be at most {MAX_FIRST_NAME_LENGTH} characters"
            ));
        }

        let mut initial = last_initial.trim().chars();
        let last_initial = match (initial.next(), initial.next()) {
            (Some(c), None) if c.is_alphabetic() => c.to_uppercase().next().unwrap_or(c),
            _ => return Err("Last initial must be a single letter".to_string()),
        };

        let notes = notes.map(str::trim).unwrap_or_default();
        if notes.chars().count() > MAX_NOTES_LENGTH {
            return Err(format!("Notes must be at most {MAX_NOTES_LENGTH} characters"));
        }

        Ok(Self {
            first_name: first_name.to_string(),
            last_initial,
            notes: notes.to_string(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<MemberName> {
        ["alice", "bob"].into_iter().map(MemberName::example).collect()
    }

    #[test]
    fn new_candidates_are_pending() {
        let candidate = Candidate::new(CandidateSpec::example(), &roster(), Utc::now());
        assert_eq!(Status::Pending, candidate.status);
        assert!(!candidate.ratified);
        assert_eq!(2, candidate.total_members);
        assert!(candidate.votes.is_empty());
        assert_eq!('S', candidate.last_initial);
    }

    #[test]
    fn force_status_synthesizes_votes() {
        let roster = roster();
        let mut candidate = Candidate::new(CandidateSpec::example(), &roster, Utc::now());

        candidate.force_status(Status::Banned, &roster);
        assert_eq!(Status::Banned, candidate.status);
        assert!(candidate.ratified);
        assert_eq!(Some(true), candidate.votes.get("alice"));
        assert_eq!(Some(true), candidate.votes.get("bob"));

        candidate.force_status(Status::Allowed, &roster);
        assert_eq!(Status::Allowed, candidate.status);
        assert!(!candidate.ratified);
        assert_eq!(Some(false), candidate.votes.get("alice"));

        candidate.force_status(Status::Pending, &roster);
        assert_eq!(Status::Pending, candidate.status);
        assert!(candidate.votes.is_empty());
    }

    #[test]
    fn reopen_clears_votes() {
        let roster = roster();
        let mut candidate = Candidate::new(CandidateSpec::example(), &roster, Utc::now());
        candidate.force_status(Status::Banned, &roster);
        candidate.reopen(&roster);
        assert_eq!(Status::Pending, candidate.status);
        assert!(candidate.votes.is_empty());
    }

    #[test]
    fn recompute_is_idempotent() {
        let roster = roster();
        let mut candidate = Candidate::new(CandidateSpec::example(), &roster, Utc::now());
        candidate.votes.record(MemberName::example("alice"), false);
        candidate.votes.record(MemberName::example("bob"), false);
        let once = candidate.recomputed(&roster);
        let twice = once.recomputed(&roster);
        assert_eq!(once, twice);
        assert_eq!(Status::Allowed, twice.status);
    }

    #[test]
    fn spec_validation() {
        assert!(CandidateSpec::new("", "S", None).is_err());
        assert!(CandidateSpec::new("Sam", "", None).is_err());
        assert!(CandidateSpec::new("Sam", "Sm", None).is_err());
        assert!(CandidateSpec::new("Sam", "1", None).is_err());
        assert!(CandidateSpec::new(&"x".repeat(MAX_FIRST_NAME_LENGTH + 1), "S", None).is_err());
        let spec = CandidateSpec::new("  Sam ", " q ", None).unwrap();
        assert_eq!("Sam", spec.first_name);
        assert_eq!('Q', spec.last_initial);
        assert_eq!("", spec.notes);
    }

    #[test]
    fn same_person_ignores_case() {
        let candidate = Candidate::new(CandidateSpec::example(), &roster(), Utc::now());
        assert!(candidate.same_person(&CandidateSpec::new("SAM", "s", None).unwrap()));
        assert!(!candidate.same_person(&CandidateSpec::new("Sam", "T", None).unwrap()));
    }

    #[test]
    fn ids_parse_only_when_well_formed() {
        let id = CandidateId::random();
        assert_eq!(16, id.to_string().len());
        assert!(CandidateId::from_param(&id.to_string()).is_ok());
        assert!(CandidateId::from_param("not-an-id").is_err());
        assert!(CandidateId::from_param("abcd").is_err());
    }
}
