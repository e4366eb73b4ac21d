use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::schema::User;
use crate::error::Error;
use crate::schema::{UserRole, Uuid};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Uuid, username: String, role: UserRole) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(1)).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

/// Request-scoped acting-user identity. Anonymous requests simply have no
/// value of this type.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(Error::Unauthorized(
                "you don't have permission to perform this action".into(),
            ));
        }
        Ok(())
    }
}

impl Into<SessionData> for JwtSessionData {
    fn into(self) -> SessionData {
        SessionData {
            username: self.username,
            user_id: self.user_id,
            is_admin: self.role == UserRole::Admin,
            role: self.role,
        }
    }
}

fn session_key() -> Hmac<Sha256> {
    let secret = std::env::var("SESSION_SECRET").unwrap_or_else(|_| String::from("secret"));
    Hmac::new_from_slice(secret.as_bytes()).unwrap()
}

pub fn generate_jwt_session(user: &User) -> String {
    let claims = JwtSessionData::new(user.id, user.username.to_owned(), user.role.to_owned());

    claims.sign_with_key(&session_key()).unwrap()
}

pub fn verify_jwt_session(token: String) -> Result<JwtSessionData, Error> {
    token
        .verify_with_key(&session_key())
        .map_err(|_| Error::InvalidSession("invalid token".into()))
        .map(|session: JwtSessionData| {
            let now = Local::now().timestamp();

            if (session.exp - now).is_negative() {
                return Err(Error::InvalidSession("token expired".into()));
            }
            Ok(session)
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            username: "maija".into(),
            email: "maija@example.com".into(),
            first_name: "Maija".into(),
            last_name: "Meikäläinen".into(),
            password: String::new(),
            role: UserRole::User,
        }
    }

    #[test]
    fn token_round_trips_back_to_the_session() {
        let token = generate_jwt_session(&user());
        let session = verify_jwt_session(token).unwrap();
        assert_eq!(session.user_id, 7);
        assert_eq!(session.username, "maija");
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        assert!(verify_jwt_session("not-a-token".into()).is_err());
    }
}
