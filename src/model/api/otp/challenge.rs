use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{self, FromRequest},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::mongodb::Id;

pub const CHALLENGE_COOKIE: &str = "otp_challenge";

/// Proof that a student passed the password and voter key checks, and now owes a
/// verification code sent to their email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    #[serde(rename = "sub")]
    pub user_id: Id,
    #[serde(rename = "eml")]
    pub email: String,
}

impl Challenge {
    pub fn new(user_id: Id, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
        }
    }

    /// Convert into a cookie that lives as long as the OTP it accompanies.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>> {
        let claims = Claims {
            challenge: self,
            expire_at: Utc::now() + config.otp_ttl(),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;
        Ok(Cookie::build(CHALLENGE_COOKIE, token)
            .max_age(Duration::seconds(config.otp_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish())
    }

    /// Deserialize a challenge from a cookie.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self> {
        let challenge = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.challenge)?;
        Ok(challenge)
    }
}

/// Cookie claims: the challenge itself plus an expiry datetime.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    challenge: Challenge,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Challenge {
    type Error = Error;

    /// Get the challenge from the cookie.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let config = req.guard::<&State<Config>>().await.unwrap(); // `Config` is always managed

        let cookie = try_outcome!(req.cookies().get_private(CHALLENGE_COOKIE).into_outcome((
            Status::Unauthorized,
            Error::unauthorized("No login is awaiting verification")
        )));

        match Challenge::from_cookie(&cookie, config) {
            Ok(challenge) => request::Outcome::Success(challenge),
            Err(_) => request::Outcome::Failure((
                Status::Unauthorized,
                Error::unauthorized("Verification has expired; log in again"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_survives_cookie() {
        let config = Config::example();
        let challenge = Challenge::new(Id::new(), "ada@university.test");
        let cookie = challenge.clone().into_cookie(&config).unwrap();
        assert_eq!(cookie.name(), CHALLENGE_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(Challenge::from_cookie(&cookie, &config).unwrap(), challenge);
    }

    #[test]
    fn tampered_challenge_is_rejected() {
        let config = Config::example();
        let cookie = Challenge::new(Id::new(), "ada@university.test")
            .into_cookie(&config)
            .unwrap();
        let tampered = Cookie::new(CHALLENGE_COOKIE, format!("{}x", cookie.value()));
        assert!(Challenge::from_cookie(&tampered, &config).is_err());
    }
}
