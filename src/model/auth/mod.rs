mod throttle;
mod token;
mod user;

pub use throttle::{LoginThrottle, LoginThrottleFairing};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
pub use user::{Admin, Rights, User};
