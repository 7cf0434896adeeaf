use serde::{Deserialize, Serialize};

use crate::model::ratification::Status;

/// An admin override on a single candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum AdminAction {
    /// Clear every vote.
    Reopen,
    /// Remove the candidate entirely.
    Delete,
    /// Force a status by rewriting the votes to match it.
    SetStatus { status: Status },
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json::{from_str, json, to_value};

    use super::*;

    #[test]
    fn actions_use_tagged_json() {
        assert_eq!(json!({ "action": "reopen" }), to_value(AdminAction::Reopen).unwrap());
        assert_eq!(
            json!({ "action": "setStatus", "status": "banned" }),
            to_value(AdminAction::SetStatus {
                status: Status::Banned
            })
            .unwrap()
        );
        assert_eq!(
            AdminAction::Delete,
            from_str::<AdminAction>(r#"{"action":"delete"}"#).unwrap()
        );
    }

    #[test]
    fn invalid_actions_are_rejected() {
        assert!(from_str::<AdminAction>(r#"{"action":"setStatus","status":"exiled"}"#).is_err());
        assert!(from_str::<AdminAction>(r#"{"action":"setStatus"}"#).is_err());
        assert!(from_str::<AdminAction>(r#"{"action":"promote"}"#).is_err());
    }
}
