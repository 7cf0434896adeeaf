use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::model::member::Member;

/// A kind of signed-in user, having defined rights.
pub trait User {
    /// The rights needed to act as this user type.
    const RIGHTS: Rights;
}

/// Different privilege levels. Higher levels include every lower one.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Member = 0,
    Admin = 1,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Member => "member",
                Self::Admin => "admin",
            }
        )
    }
}

/// A member who signed in with the secondary admin code.
pub struct Admin;

impl User for Member {
    const RIGHTS: Rights = Rights::Member;
}

impl User for Admin {
    const RIGHTS: Rights = Rights::Admin;
}
