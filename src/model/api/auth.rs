use serde::{Deserialize, Serialize};

use crate::model::member::MemberName;

/// A sign-in request: a member's name and PIN, plus the secondary admin
/// code when asking for admin rights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    pub name: String,
    pub pin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Who is signed in, and with which rights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub name: MemberName,
    pub admin: bool,
}


#[cfg(test)]
pub use examples::TEST_ADMIN_CODE;
