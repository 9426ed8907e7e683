use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use log::debug;
use mongodb::bson::doc;
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    common::role::Role,
    db::user::User,
    mongodb::{Coll, Id},
};

use super::user::Account;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token naming a user and the role they signed in with.
///
/// As a request guard, a missing or invalid token fails with 401, and a valid token for the
/// wrong kind of account fails with 403.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthToken<U> {
    #[serde(rename = "sub")]
    pub id: Id,
    #[serde(rename = "rol")]
    pub role: Role,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U: Account> AuthToken<U> {
    /// Create a token for the given user, if they hold this kind of account.
    pub fn for_user(user: &User) -> Option<Self> {
        U::permits(user.role).then(|| Self {
            id: user.id,
            role: user.role,
            phantom: PhantomData,
        })
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
            .path("/")
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Lax)
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

    /// Fetch the user this token names.
    pub async fn user(&self, users: &Coll<User>) -> Result<User> {
        users
            .find_one(self.id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::unauthorized("Account no longer exists"))
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
    U: Account + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and check it is for the right kind of account.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwraps are safe as `Config` and `Database` are always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let cookie = match req.cookies().get(AUTH_TOKEN_COOKIE) {
            Some(cookie) => cookie,
            None => return unauthorized("Not signed in"),
        };
        let token = match Self::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(e) => {
                debug!("Rejected auth token: {e}");
                return unauthorized("Session is invalid or has expired");
            }
        };

        if !U::permits(token.role) {
            return Outcome::Failure((
                Status::Forbidden,
                Error::forbidden("Not permitted for this account"),
            ));
        }

        // Check the user still exists with the same role.
        let db = req.guard::<&State<mongodb::Database>>().await.unwrap();
        let filter = doc! {
            "_id": token.id,
            "role": token.role,
        };
        match Coll::<User>::from_db(db).find_one(filter, None).await {
            Ok(Some(_)) => Outcome::Success(token),
            Ok(None) => unauthorized("Account no longer exists"),
            Err(e) => Outcome::Failure((Status::InternalServerError, e.into())),
        }
    }
}

fn unauthorized<T>(msg: &str) -> Outcome<T, Error> {
    Outcome::Failure((Status::Unauthorized, Error::unauthorized(msg)))
}
