use log::info;
use rocket::{serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        auth::{Admin, AuthToken},
        member::{Member, MemberCredentials, MemberName},
        store::Store,
    },
};

pub fn routes() -> Vec<Route> {
    routes![get_members, create_member]
}

#[get("/members")]
async fn get_members(_token: AuthToken<Member>, store: &State<Store>) -> Json<Vec<MemberName>> {
    Json(store.read(|ledger| ledger.roster()))
}

#[post("/members", data = "<new_member>", format = "json")]
async fn create_member(
    token: AuthToken<Admin>,
    new_member: Json<MemberCredentials>,
    store: &State<Store>,
) -> Result<Json<MemberName>> {
    // Validate and hash before taking the ledger lock.
    let member = Member::try_from(new_member.0).map_err(Error::bad_request)?;
    let name = store.update(|ledger| ledger.add_member(member).map(|m| m.name.clone()))?;
    info!("{} added member {name}", token.name);
    Ok(Json(name))
}
