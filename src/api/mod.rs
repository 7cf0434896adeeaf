use rocket::Route;

mod admin;
pub(crate) mod auth;
pub(crate) mod candidates;
mod members;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(auth::routes());
    routes.extend(candidates::routes());
    routes.extend(members::routes());
    routes
}
