use chrono::Utc;
use log::{info, warn};
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::auth::{AuthRequest, Session},
        auth::{Admin, AuthToken, LoginThrottle, Rights, AUTH_TOKEN_COOKIE},
        member::Member,
        store::Store,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![authenticate, session, logout]
}

#[post("/auth", data = "<request>", format = "json")]
pub async fn authenticate(
    cookies: &CookieJar<'_>,
    request: Json<AuthRequest>,
    store: &State<Store>,
    throttle: &State<LoginThrottle>,
    config: &State<Config>,
) -> Result<Json<Session>> {
    let now = Utc::now();
    if let Some(until) = throttle.locked_until(&request.name, now) {
        let wait = (until - now).num_seconds().max(1);
        return Err(Error::Status(
            Status::TooManyRequests,
            format!("Too many failed sign-in attempts, try again in {wait} seconds"),
        ));
    }

    let member = store.read(|ledger| ledger.member(&request.name).cloned());
    let verified = member.filter(|member| member.verify_pin(&request.pin));
    let admin = request.code.is_some();
    let code_ok = request
        .code
        .as_deref()
        .map_or(true, |code| config.is_admin_code(code));

    let member = match verified {
        Some(member) if code_ok => member,
        _ => {
            if let Some(until) = throttle.record_failure(&request.name, now) {
                warn!("Sign-in for {:?} locked until {until}", request.name);
            }
            return Err(Error::Status(
                Status::Unauthorized,
                "No member found with the provided name, PIN and code combination".to_string(),
            ));
        }
    };
    throttle.clear(&request.name);

    let cookie = if admin {
        AuthToken::<Admin>::new(member.name.clone()).into_cookie(config)?
    } else {
        AuthToken::<Member>::new(member.name.clone()).into_cookie(config)?
    };
    cookies.add(cookie);
    info!(
        "{} signed in as {}",
        member.name,
        if admin { Rights::Admin } else { Rights::Member }
    );

    Ok(Json(Session {
        name: member.name,
        admin,
    }))
}

#[get("/auth")]
pub fn session(token: AuthToken<Member>) -> Json<Session> {
    Json(Session {
        admin: token.permits(Rights::Admin),
        name: token.name,
    })
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::ContentType, local::asynchronous::Client, serde::json::serde_json::json,
    };

    use crate::model::member::MemberName;

    use super::*;

    async fn sign_in(client: &Client, request: &AuthRequest) -> Status {
        client
            .post(uri!(authenticate))
            .header(ContentType::JSON)
            .body(json!(request).to_string())
            .dispatch()
            .await
            .status()
    }

    #[backend_test]
    async fn member_authenticate_valid(client: Client) {
        let response = client
            .post(uri!(authenticate))
            .header(ContentType::JSON)
            .body(json!(AuthRequest::example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
        let session: Session = response.into_json().await.unwrap();
        assert_eq!(
            Session {
                name: MemberName::example("alice"),
                admin: false,
            },
            session
        );
    }

    #[backend_test]
    async fn admin_authenticate_valid(client: Client) {
        let response = client
            .post(uri!(authenticate))
            .header(ContentType::JSON)
            .body(json!(AuthRequest::example_admin()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        let session: Session = response.into_json().await.unwrap();
        assert!(session.admin);
    }

    #[backend_test]
    async fn authenticate_invalid(client: Client) {
        // Wrong PIN.
        assert_eq!(
            Status::Unauthorized,
            sign_in(&client, &AuthRequest::wrong_pin()).await
        );
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        // Unknown name.
        let request = AuthRequest {
            name: "mallory".into(),
            ..AuthRequest::example()
        };
        assert_eq!(Status::Unauthorized, sign_in(&client, &request).await);

        // Right PIN, wrong admin code.
        let request = AuthRequest {
            code: Some("9999".into()),
            ..AuthRequest::example()
        };
        assert_eq!(Status::Unauthorized, sign_in(&client, &request).await);
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn lockout_after_repeated_failures(client: Client) {
        // The test configuration locks after three failures.
        for _ in 0..3 {
            assert_eq!(
                Status::Unauthorized,
                sign_in(&client, &AuthRequest::wrong_pin()).await
            );
        }

        // Even the correct PIN is refused while locked, whatever the case.
        assert_eq!(
            Status::TooManyRequests,
            sign_in(&client, &AuthRequest::example()).await
        );
        let request = AuthRequest {
            name: "ALICE".into(),
            ..AuthRequest::example()
        };
        assert_eq!(Status::TooManyRequests, sign_in(&client, &request).await);

        // Other members are unaffected.
        let request = AuthRequest {
            name: "bob".into(),
            pin: "2222".into(),
            code: None,
        };
        assert_eq!(Status::Ok, sign_in(&client, &request).await);
    }

    #[backend_test]
    async fn success_resets_failures(client: Client) {
        for _ in 0..2 {
            sign_in(&client, &AuthRequest::wrong_pin()).await;
        }
        assert_eq!(Status::Ok, sign_in(&client, &AuthRequest::example()).await);
        let throttle = client.rocket().state::<LoginThrottle>().unwrap();
        assert!(throttle.is_empty());

        // A fresh count, so two more failures do not lock.
        for _ in 0..2 {
            sign_in(&client, &AuthRequest::wrong_pin()).await;
        }
        assert_eq!(Status::Ok, sign_in(&client, &AuthRequest::example()).await);
    }

    #[backend_test(member)]
    async fn session_member(client: Client) {
        let response = client.get(uri!(session)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let session: Session = response.into_json().await.unwrap();
        assert_eq!("alice", session.name.as_str());
        assert!(!session.admin);
    }

    #[backend_test(admin)]
    async fn session_admin(client: Client) {
        let session: Session = client
            .get(uri!(session))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(session.admin);
    }

    #[backend_test]
    async fn session_not_logged_in(client: Client) {
        let response = client.get(uri!(session)).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(member)]
    async fn logout_member(client: Client) {
        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
        let response = client.get(uri!(session)).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn logout_not_logged_in(client: Client) {
        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
    }
}
