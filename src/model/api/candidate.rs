use serde::{Deserialize, Serialize};

use crate::model::candidate::CandidateSpec;

/// A request to put someone up for a vote, as received from a member.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCandidateRequest {
    pub first_name: String,
    pub last_initial: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TryFrom<NewCandidateRequest> for CandidateSpec {
    type Error = String;

    fn try_from(request: NewCandidateRequest) -> Result<Self, Self::Error> {
        CandidateSpec::new(
            &request.first_name,
            &request.last_initial,
            request.notes.as_deref(),
        )
    }
}

/// A single member's vote. `true` is a vote to ban.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub vote: bool,
}
