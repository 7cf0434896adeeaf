use chrono::Utc;
use log::info;
use rocket::{serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::candidate::{NewCandidateRequest, VoteRequest},
        auth::AuthToken,
        candidate::{Candidate, CandidateId, CandidateSpec},
        member::Member,
        ratification::Status,
        store::Store,
    },
};

pub fn routes() -> Vec<Route> {
    routes![get_candidates, get_candidate, create_candidate, cast_vote]
}

#[get("/candidates?<status>")]
async fn get_candidates(
    _token: AuthToken<Member>,
    status: Option<Status>,
    store: &State<Store>,
) -> Json<Vec<Candidate>> {
    let candidates = store.read(|ledger| ledger.candidates());
    Json(
        candidates
            .into_iter()
            .filter(|candidate| status.map_or(true, |status| candidate.status == status))
            .collect(),
    )
}

#[get("/candidates/<candidate_id>")]
async fn get_candidate(
    _token: AuthToken<Member>,
    candidate_id: CandidateId,
    store: &State<Store>,
) -> Result<Json<Candidate>> {
    store.read(|ledger| ledger.candidate(&candidate_id)).map(Json)
}

#[post("/candidates", data = "<request>", format = "json")]
async fn create_candidate(
    token: AuthToken<Member>,
    request: Json<NewCandidateRequest>,
    store: &State<Store>,
) -> Result<Json<Candidate>> {
    let spec = CandidateSpec::try_from(request.0).map_err(Error::bad_request)?;
    let candidate = store.update(|ledger| ledger.add_candidate(spec, Utc::now()))?;
    info!(
        "{} proposed candidate {} ({} {}.)",
        token.name, candidate.id, candidate.first_name, candidate.last_initial
    );
    Ok(Json(candidate))
}

#[post("/candidates/<candidate_id>/votes", data = "<vote>", format = "json")]
async fn cast_vote(
    token: AuthToken<Member>,
    candidate_id: CandidateId,
    vote: Json<VoteRequest>,
    store: &State<Store>,
) -> Result<Json<Candidate>> {
    let candidate =
        store.update(|ledger| ledger.record_vote(&candidate_id, &token.name, vote.vote))?;
    if candidate.status != Status::Pending {
        info!(
            "Candidate {} is now {} with {} votes",
            candidate.id,
            candidate.status,
            candidate.votes.len()
        );
    }
    Ok(Json(candidate))
}
