use std::borrow::Borrow;
use std::fmt::{Display, Formatter};
use std::ops::Deref;

use argon2::Config;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const MAX_NAME_LENGTH: usize = 32;
pub const MIN_PIN_LENGTH: usize = 4;
pub const MAX_PIN_LENGTH: usize = 8;

/// A validated member name. This is the key of every vote map, so anything
/// that fails validation never reaches a ledger.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemberName(String);

impl MemberName {
    /// The case-folded form used for uniqueness checks and throttle keys.
    pub fn folded(&self) -> String {
        self.0.to_lowercase()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MemberName {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err("Member name must not be empty".to_string());
        }
        if trimmed.chars().count() > MAX_NAME_LENGTH {
            return Err(format!(
                "Member name must be at most {MAX_NAME_LENGTH} characters"
            ));
        }
        if trimmed.chars().any(char::is_control) {
            return Err("Member name must not contain control characters".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<MemberName> for String {
    fn from(name: MemberName) -> Self {
        name.0
    }
}

impl Display for MemberName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Deref for MemberName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Borrow<str> for MemberName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A club member, as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub name: MemberName,
    pub pin_hash: String,
}

impl Member {
    /// Check whether the given PIN is correct.
    /// A malformed stored hash never matches.
    pub fn verify_pin<T: AsRef<[u8]>>(&self, pin: T) -> bool {
        argon2::verify_encoded(&self.pin_hash, pin.as_ref()).unwrap_or(false)
    }
}

/// Raw member credentials, received from an admin or from the seed list.
/// These are never stored directly, since the PIN is in plaintext.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemberCredentials {
    pub name: String,
    pub pin: String,
}

impl TryFrom<MemberCredentials> for Member {
    type Error = String;

    /// Validate the name and PIN, then hash the PIN.
    fn try_from(cred: MemberCredentials) -> Result<Self, Self::Error> {
        let name = MemberName::try_from(cred.name)?;
        if cred.pin.len() < MIN_PIN_LENGTH
            || cred.pin.len() > MAX_PIN_LENGTH
            || !cred.pin.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(format!(
                "PIN must be {MIN_PIN_LENGTH} to {MAX_PIN_LENGTH} digits"
            ));
        }

        // 16 bytes is recommended for password hashing:
        //  https://en.wikipedia.org/wiki/Argon2
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let pin_hash = argon2::hash_encoded(cred.pin.as_bytes(), &salt, &Config::default())
            .map_err(|e| format!("Failed to hash PIN: {e}"))?;
        Ok(Self { name, pin_hash })
    }
}
