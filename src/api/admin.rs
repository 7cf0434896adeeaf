use log::info;
use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::admin::AdminAction,
        auth::{Admin, AuthToken},
        candidate::{Candidate, CandidateId},
        store::Store,
    },
};

pub fn routes() -> Vec<Route> {
    routes![modify_candidate]
}

#[patch("/candidates/<candidate_id>", data = "<action>", format = "json")]
async fn modify_candidate(
    token: AuthToken<Admin>,
    candidate_id: CandidateId,
    action: Json<AdminAction>,
    store: &State<Store>,
) -> Result<Json<Candidate>> {
    let action = action.0;
    let candidate = store.update(|ledger| match action {
        AdminAction::Reopen => ledger.reopen(&candidate_id),
        AdminAction::Delete => ledger.remove_candidate(&candidate_id),
        AdminAction::SetStatus { status } => ledger.set_status(&candidate_id, status),
    })?;
    info!("{} applied {action:?} to candidate {candidate_id}", token.name);
    Ok(Json(candidate))
}
