#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{figment::Provider, Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use config::Config;

use config::{ConfigFairing, StoreFairing};
use logging::LoggerFairing;
use model::auth::LoginThrottleFairing;

/// Build the server from the default figment: `Rocket.toml` plus `ROCKET_*`
/// environment variables.
pub fn build() -> Rocket<Build> {
    rocket_with_figment(rocket::Config::figment())
}

/// Build the server from the given configuration provider.
/// The fairings load the config, open the data file, and set up the login
/// throttle, in that order.
pub fn rocket_with_figment<T: Provider>(figment: T) -> Rocket<Build> {
    rocket::custom(figment)
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .attach(LoginThrottleFairing)
}

/// Configuration for route tests: a private data file, example members,
/// and a known admin code.
#[cfg(test)]
pub(crate) fn test_figment(data_file: &std::path::Path) -> rocket::figment::Figment {
    use model::{api::auth::TEST_ADMIN_CODE, member::MemberCredentials};

    rocket::Config::figment()
        .merge(("data_file", data_file))
        .merge(("jwt_secret", "test jwt secret"))
        .merge(("admin_code", TEST_ADMIN_CODE))
        .merge(("max_login_failures", 3))
        .merge(("seed_members", MemberCredentials::seeds()))
        .merge(("log_level", "off"))
}
