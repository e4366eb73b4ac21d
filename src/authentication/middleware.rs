use std::convert::Infallible;

use warp::{
    reject::{self, Rejection},
    Filter,
};

use super::jwt::{verify_jwt_session, JwtSessionData, SessionData};

#[derive(Debug)]
struct Unauthorized;

impl reject::Reject for Unauthorized {}

pub fn with_auth() -> impl Filter<Extract = ((),), Error = Rejection> + Copy {
    warp::cookie::<String>("session").and_then(|session: String| async move {
        if verify_jwt_session(session).is_ok() {
            Ok(())
        } else {
            Err(warp::reject::custom(Unauthorized))
        }
    })
}

pub fn with_session() -> impl Filter<Extract = (SessionData,), Error = Rejection> + Copy {
    warp::cookie::<String>("session").and_then(|session: String| async move {
        match verify_jwt_session(session) {
            Ok(data) => Ok::<SessionData, Rejection>(data.into()),
            Err(error) => Err(error.into()),
        }
    })
}

/// Like `with_session`, but a missing or stale cookie extracts as `None`
/// instead of rejecting; listing endpoints serve anonymous visitors too.
pub fn with_possible_session(
) -> impl Filter<Extract = (Option<SessionData>,), Error = Infallible> + Copy {
    warp::cookie::optional::<String>("session").map(|session: Option<String>| -> Option<SessionData> {
        session.and_then(|token| {
            verify_jwt_session(token)
                .ok()
                .map(|data: JwtSessionData| data.into())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::generate_jwt_session;
    use crate::schema::{User, UserRole};

    fn user() -> User {
        User {
            id: 3,
            username: "kokki".into(),
            email: "kokki@example.com".into(),
            first_name: "Kaisa".into(),
            last_name: "Kokki".into(),
            password: String::new(),
            role: UserRole::User,
        }
    }

    #[tokio::test]
    async fn missing_cookie_extracts_as_anonymous() {
        let session = warp::test::request()
            .filter(&with_possible_session())
            .await
            .unwrap();
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn stale_cookie_extracts_as_anonymous() {
        let session = warp::test::request()
            .header("cookie", "session=garbage")
            .filter(&with_possible_session())
            .await
            .unwrap();
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn valid_cookie_extracts_the_acting_user() {
        let token = generate_jwt_session(&user());
        let session = warp::test::request()
            .header("cookie", format!("session={token}"))
            .filter(&with_possible_session())
            .await
            .unwrap();
        assert_eq!(session.unwrap().user_id, 3);
    }

    #[tokio::test]
    async fn with_auth_requires_a_session_cookie() {
        let result = warp::test::request().filter(&with_auth()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn with_session_rejects_garbage() {
        let result = warp::test::request()
            .header("cookie", "session=garbage")
            .filter(&with_session())
            .await;
        assert!(result.is_err());
    }
}
