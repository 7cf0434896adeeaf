use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{member::MemberName, store::Store};

use super::user::{Rights, User};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific member with specific rights.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<U> {
    #[serde(rename = "sub")]
    pub name: MemberName,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Does this token permit the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights >= target
    }

    /// Serialize this token into a cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish())
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)?;
        Ok(token)
    }
}

impl<U> AuthToken<U>
where
    U: User,
{
    /// Create a new [`AuthToken`] for the given member, with the rights of `U`.
    pub fn new(name: MemberName) -> Self {
        Self {
            name,
            rights: U::RIGHTS,
            phantom: PhantomData,
        }
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and verify that it has at least
    /// the rights of this user type, and that its member still exists.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let unauthorized = |reason: &str| {
            Outcome::Failure((
                Status::Unauthorized,
                Error::Status(Status::Unauthorized, reason.to_string()),
            ))
        };

        // Both are always managed once ignition succeeds.
        let (config, store) = match (
            req.guard::<&State<Config>>().await.succeeded(),
            req.guard::<&State<Store>>().await.succeeded(),
        ) {
            (Some(config), Some(store)) => (config, store),
            _ => {
                return Outcome::Failure((
                    Status::InternalServerError,
                    Error::Status(
                        Status::InternalServerError,
                        "Server state unavailable".to_string(),
                    ),
                ))
            }
        };

        let cookie = match req.cookies().get(AUTH_TOKEN_COOKIE) {
            Some(cookie) => cookie,
            None => return unauthorized("Not signed in"),
        };

        let token: Self = match Self::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(_) => return unauthorized("Invalid or expired session"),
        };

        // Check the member still exists.
        if store.read(|ledger| ledger.member(&token.name).is_none()) {
            return unauthorized("Member no longer exists");
        }

        // Check it represents sufficient rights.
        if !token.permits(U::RIGHTS) {
            return Outcome::Failure((
                Status::Forbidden,
                Error::Status(
                    Status::Forbidden,
                    format!("This action requires {} rights", U::RIGHTS),
                ),
            ));
        }

        Outcome::Success(token)
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::Figment;

    use super::*;
    use crate::model::{auth::user::Admin, member::Member};

    fn config() -> Config {
        Figment::new()
            .merge(("jwt_secret", "token test secret"))
            .extract()
            .unwrap()
    }

    #[test]
    fn cookie_round_trip() {
        let config = config();
        let cookie = AuthToken::<Admin>::new(MemberName::example("alice"))
            .into_cookie(&config)
            .unwrap();
        assert_eq!(AUTH_TOKEN_COOKIE, cookie.name());
        assert_eq!(Some(true), cookie.http_only());

        let token = AuthToken::<Member>::from_cookie(&cookie, &config).unwrap();
        assert_eq!("alice", token.name.as_str());
        assert_eq!(Rights::Admin, token.rights);
    }

    #[test]
    fn admin_rights_include_member_rights() {
        let admin = AuthToken::<Admin>::new(MemberName::example("alice"));
        assert!(admin.permits(Rights::Member));
        assert!(admin.permits(Rights::Admin));
        let member = AuthToken::<Member>::new(MemberName::example("bob"));
        assert!(member.permits(Rights::Member));
        assert!(!member.permits(Rights::Admin));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let cookie = AuthToken::<Member>::new(MemberName::example("alice"))
            .into_cookie(&config())
            .unwrap();
        let other: Config = Figment::new()
            .merge(("jwt_secret", "a different secret"))
            .extract()
            .unwrap();
        assert!(AuthToken::<Member>::from_cookie(&cookie, &other).is_err());
    }
}
