use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::model::member::MemberName;

/// Where a candidate stands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Not every member has voted, or the votes are split.
    #[field(value = "pending")]
    Pending,
    /// Every member voted no.
    #[field(value = "allowed")]
    Allowed,
    /// Every member voted yes.
    #[field(value = "banned")]
    Banned,
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Allowed => "allowed",
            Self::Banned => "banned",
        };
        write!(f, "{name}")
    }
}

/// Votes cast on a single candidate, keyed by member. `true` is a vote to ban.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Votes(BTreeMap<MemberName, bool>);

impl Votes {
    /// A full set of identical votes from every member of the roster.
    pub fn unanimous<'a, I>(roster: I, vote: bool) -> Self
    where
        I: IntoIterator<Item = &'a MemberName>,
    {
        Self(roster.into_iter().map(|name| (name.clone(), vote)).collect())
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.0.get(name).copied()
    }

    /// Record a vote, replacing any earlier vote by the same member.
    pub fn record(&mut self, name: MemberName, vote: bool) {
        self.0.insert(name, vote);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names of everyone who has voted.
    pub fn voters(&self) -> impl Iterator<Item = &MemberName> {
        self.0.keys()
    }
}

impl FromIterator<(MemberName, bool)> for Votes {
    fn from_iter<T: IntoIterator<Item = (MemberName, bool)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The outcome of tallying a candidate's votes against the roster.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Ratification {
    pub status: Status,
    pub ratified: bool,
    pub total_members: usize,
}

impl Ratification {
    /// Derive a candidate's status from its votes and the current roster.
    ///
    /// Both terminal states need a vote from every member on the roster, and
    /// an empty roster can never reach either of them. Unanimous yes is
    /// checked before unanimous no.
    pub fn tally(votes: &Votes, roster: &[MemberName]) -> Self {
        let total = roster.len();
        let all_yes = total > 0 && roster.iter().all(|name| votes.get(name) == Some(true));
        let all_no = total > 0 && votes.len() == total && votes.0.values().all(|vote| !vote);

        let (status, ratified) = if all_yes {
            (Status::Banned, true)
        } else if all_no {
            (Status::Allowed, false)
        } else {
            (Status::Pending, false)
        };

        Self {
            status,
            ratified,
            total_members: total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(names: &[&str]) -> Vec<MemberName> {
        names.iter().map(|name| MemberName::example(name)).collect()
    }

    fn votes(cast: &[(&str, bool)]) -> Votes {
        cast.iter()
            .map(|(name, vote)| (MemberName::example(name), *vote))
            .collect()
    }

    #[test]
    fn unanimous_yes_bans() {
        let result = Ratification::tally(
            &votes(&[("a", true), ("b", true), ("c", true)]),
            &roster(&["a", "b", "c"]),
        );
        assert_eq!(Status::Banned, result.status);
        assert!(result.ratified);
        assert_eq!(3, result.total_members);
    }

    #[test]
    fn unanimous_no_allows() {
        let result = Ratification::tally(
            &votes(&[("a", false), ("b", false), ("c", false)]),
            &roster(&["a", "b", "c"]),
        );
        assert_eq!(Status::Allowed, result.status);
        assert!(!result.ratified);
    }

    #[test]
    fn partial_coverage_is_pending() {
        let members = roster(&["a", "b", "c"]);
        for cast in [
            votes(&[("a", true), ("b", false)]),
            votes(&[("a", true), ("b", true)]),
            votes(&[("a", false), ("b", false)]),
            votes(&[]),
        ] {
            let result = Ratification::tally(&cast, &members);
            assert_eq!(Status::Pending, result.status);
            assert!(!result.ratified);
        }
    }

    #[test]
    fn split_vote_is_pending() {
        let result = Ratification::tally(
            &votes(&[("a", true), ("b", false), ("c", true)]),
            &roster(&["a", "b", "c"]),
        );
        assert_eq!(Status::Pending, result.status);
    }

    #[test]
    fn empty_roster_is_always_pending() {
        let result = Ratification::tally(&votes(&[]), &[]);
        assert_eq!(Status::Pending, result.status);
        assert!(!result.ratified);
        assert_eq!(0, result.total_members);
    }

    #[test]
    fn roster_growth_reopens_decision() {
        let cast = votes(&[("a", true), ("b", true)]);
        assert_eq!(
            Status::Banned,
            Ratification::tally(&cast, &roster(&["a", "b"])).status
        );
        let grown = Ratification::tally(&cast, &roster(&["a", "b", "c"]));
        assert_eq!(Status::Pending, grown.status);
        assert_eq!(3, grown.total_members);
    }

    #[test]
    fn tally_is_idempotent() {
        let members = roster(&["a", "b"]);
        let cast = votes(&[("a", false), ("b", false)]);
        let once = Ratification::tally(&cast, &members);
        let twice = Ratification::tally(&cast, &members);
        assert_eq!(once, twice);
    }

    #[test]
    fn unanimous_votes_cover_roster() {
        let members = roster(&["a", "b"]);
        let banned = Votes::unanimous(&members, true);
        assert_eq!(votes(&[("a", true), ("b", true)]), banned);
        assert_eq!(
            Status::Banned,
            Ratification::tally(&banned, &members).status
        );
        let allowed = Votes::unanimous(&members, false);
        assert_eq!(
            Status::Allowed,
            Ratification::tally(&allowed, &members).status
        );
    }

    #[test]
    fn votes_serialize_as_object() {
        let cast = votes(&[("a", true), ("b", false)]);
        let json = rocket::serde::json::serde_json::to_string(&cast).unwrap();
        assert_eq!(r#"{"a":true,"b":false}"#, json);
    }
}
