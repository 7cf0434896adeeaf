use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::{self, time::MissedTickBehavior},
    Build, Orbit, Rocket,
};

use crate::config::Config;

/// Failed sign-in attempts for one name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Attempts {
    failures: u32,
    last_failure: DateTime<Utc>,
    locked_until: Option<DateTime<Utc>>,
}

/// Per-name counters of consecutive failed sign-ins.
///
/// Names are case-folded, so `Alice` and `alice` share a counter, and names
/// that match no member are counted too. Entries only live in memory and
/// are dropped on restart.
#[derive(Debug, Clone)]
pub struct LoginThrottle {
    attempts: Arc<Mutex<HashMap<String, Attempts>>>,
    max_failures: u32,
    lockout: Duration,
}

impl LoginThrottle {
    pub fn new(max_failures: u32, lockout: Duration) -> Self {
        Self {
            attempts: Default::default(),
            max_failures: max_failures.max(1),
            lockout,
        }
    }

    /// If `name` is locked out at `now`, return when the lock lifts.
    pub fn locked_until(&self, name: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.lock()
            .get(&name.to_lowercase())
            .and_then(|attempts| attempts.locked_until)
            .filter(|until| *until > now)
    }

    /// Count a failed attempt. Returns the lock expiry if this failure
    /// triggered a lockout.
    pub fn record_failure(&self, name: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut attempts = self.lock();
        let entry = attempts.entry(name.to_lowercase()).or_insert(Attempts {
            failures: 0,
            last_failure: now,
            locked_until: None,
        });
        // A lock that has run out starts a fresh count.
        if entry.locked_until.map_or(false, |until| until <= now) {
            entry.failures = 0;
            entry.locked_until = None;
        }
        entry.failures += 1;
        entry.last_failure = now;
        if entry.failures >= self.max_failures {
            let until = now + self.lockout;
            entry.locked_until = Some(until);
            Some(until)
        } else {
            None
        }
    }

    /// Forget all failures for `name`, after a successful sign-in.
    pub fn clear(&self, name: &str) {
        self.lock().remove(&name.to_lowercase());
    }

    /// Drop every entry that can no longer affect a sign-in: expired locks,
    /// and unlocked counters whose last failure is older than the lockout.
    /// Returns how many entries were dropped.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut attempts = self.lock();
        let before = attempts.len();
        attempts.retain(|_, entry| match entry.locked_until {
            Some(until) => until > now,
            None => entry.last_failure + self.lockout > now,
        });
        before - attempts.len()
    }

    /// Number of names currently tracked.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Attempts>> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A fairing that places a [`LoginThrottle`] into managed state during
/// ignition, and sweeps it on a timer from liftoff until shutdown.
/// This fairing depends on the [`Config`] being available in managed state,
/// and so must be attached after the fairing responsible for that.
pub struct LoginThrottleFairing;

#[rocket::async_trait]
impl Fairing for LoginThrottleFairing {
    fn info(&self) -> Info {
        Info {
            name: "Login Throttle",
            kind: Kind::Ignite | Kind::Liftoff,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let throttle = match rocket.state::<Config>() {
            Some(config) => LoginThrottle::new(config.max_login_failures(), config.lockout_ttl()),
            None => {
                error!("Config was not available when creating the login throttle");
                return Err(rocket);
            }
        };
        rocket = rocket.manage(throttle);
        Ok(rocket)
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let (throttle, period) = match (rocket.state::<LoginThrottle>(), rocket.state::<Config>()) {
            (Some(throttle), Some(config)) => (throttle.clone(), config.throttle_prune_interval()),
            _ => {
                warn!("Login throttle not managed, stale entries will not be pruned");
                return;
            }
        };
        let shutdown = rocket.shutdown();
        info!("Pruning login throttle every {}s", period.as_secs());

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let pruned = throttle.prune(Utc::now());
                        if pruned > 0 {
                            debug!("Pruned {pruned} login throttle entries");
                        }
                    }
                    _ = shutdown.clone() => {
                        debug!("Login throttle pruning stopped");
                        break;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle() -> LoginThrottle {
        LoginThrottle::new(3, Duration::minutes(15))
    }

    #[test]
    fn locks_after_max_failures() {
        let throttle = throttle();
        let now = Utc::now();
        assert_eq!(None, throttle.record_failure("alice", now));
        assert_eq!(None, throttle.record_failure("Alice", now));
        assert_eq!(None, throttle.locked_until("alice", now));
        let until = throttle.record_failure("ALICE", now).unwrap();
        assert_eq!(now + Duration::minutes(15), until);
        assert_eq!(Some(until), throttle.locked_until("alice", now));
        // Other names are unaffected.
        assert_eq!(None, throttle.locked_until("bob", now));
    }

    #[test]
    fn lock_expires() {
        let throttle = throttle();
        let now = Utc::now();
        for _ in 0..3 {
            throttle.record_failure("alice", now);
        }
        let later = now + Duration::minutes(16);
        assert_eq!(None, throttle.locked_until("alice", later));
        // The count restarts once the lock has lifted.
        assert_eq!(None, throttle.record_failure("alice", later));
    }

    #[test]
    fn success_clears_failures() {
        let throttle = throttle();
        let now = Utc::now();
        throttle.record_failure("alice", now);
        throttle.record_failure("alice", now);
        throttle.clear("ALICE");
        assert!(throttle.is_empty());
        assert_eq!(None, throttle.record_failure("alice", now));
    }

    #[test]
    fn prune_drops_stale_entries() {
        let throttle = throttle();
        let now = Utc::now();
        for _ in 0..3 {
            throttle.record_failure("locked", now);
        }
        throttle.record_failure("counting", now);
        assert_eq!(0, throttle.prune(now + Duration::minutes(1)));
        assert_eq!(2, throttle.len());
        assert_eq!(2, throttle.prune(now + Duration::minutes(16)));
        assert!(throttle.is_empty());
    }
}
