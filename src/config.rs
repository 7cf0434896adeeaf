use std::path::{Path, PathBuf};

use chrono::Duration;
use log::{error, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{member::MemberCredentials, store::Store};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_data_file")]
    data_file: PathBuf,
    #[serde(default = "default_auth_ttl")]
    auth_ttl: u32,
    #[serde(default = "default_max_login_failures")]
    max_login_failures: u32,
    #[serde(default = "default_lockout_ttl")]
    lockout_ttl: u32,
    #[serde(default = "default_throttle_prune_interval")]
    throttle_prune_interval: u32,
    // secrets
    jwt_secret: String,
    #[serde(default)]
    admin_code: Option<String>,
    #[serde(default)]
    seed_members: Vec<MemberCredentials>,
}

fn default_data_file() -> PathBuf {
    PathBuf::from("ratify.json")
}

fn default_auth_ttl() -> u32 {
    24 * 60 * 60
}

fn default_max_login_failures() -> u32 {
    5
}

fn default_lockout_ttl() -> u32 {
    15 * 60
}

fn default_throttle_prune_interval() -> u32 {
    60
}

impl Config {
    /// Where the ledger is persisted.
    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    /// Valid lifetime of auth token cookies.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Consecutive failed logins before a name is locked out.
    pub fn max_login_failures(&self) -> u32 {
        self.max_login_failures.max(1)
    }

    /// How long a locked-out name stays locked.
    pub fn lockout_ttl(&self) -> Duration {
        Duration::seconds(self.lockout_ttl.into())
    }

    /// How often stale throttle entries are swept.
    pub fn throttle_prune_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.throttle_prune_interval.max(1).into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Does `code` grant admin rights? Always false when no admin code is configured.
    pub fn is_admin_code(&self, code: &str) -> bool {
        self.admin_code.as_deref() == Some(code)
    }

    /// Members to create at startup if they do not exist yet.
    pub fn seed_members(&self) -> &[MemberCredentials] {
        &self.seed_members
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.admin_code.is_none() {
            info!("No `admin_code` configured, admin sign-in is disabled");
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// A fairing that opens the data file, inserts any seed members, and places
/// the resulting [`Store`] into managed state.
/// This fairing depends on the [`Config`] being available in managed state,
/// and so must be attached after [`ConfigFairing`].
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ledger Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.state::<Config>() {
            Some(config) => config,
            None => {
                error!("Config was not available when opening the data file");
                return Err(rocket);
            }
        };
        info!("Opening data file {}...", config.data_file().display());

        let store = match Store::open(config.data_file()) {
            Ok(store) => store,
            Err(e) => {
                error!("Failed to open data file: {e}");
                return Err(rocket);
            }
        };

        // Ensure the seed members exist.
        match store.seed_members(config.seed_members()) {
            Ok(0) => {}
            Ok(added) => info!("Added {added} seed members"),
            Err(e) => {
                error!("Failed to add seed members: {e}");
                return Err(rocket);
            }
        }
        info!("...data file ready!");

        // Manage the state.
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}
