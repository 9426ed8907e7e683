use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use log::warn;
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    common::{
        role::Role,
        secret::{hash_secret, verify_secret},
    },
    mongodb::{Coll, Id},
};

pub const DEFAULT_ADMIN_NAME: &str = "Administrator";

/// Core user account data, shared by admins and students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub name: String,
    pub email: String,
    /// University student number. Absent for admins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    pub role: Role,
    pub password_hash: String,
    /// Hash of the secondary login secret. Absent for admins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_key_hash: Option<String>,
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<Id>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UserCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        verify_secret(&self.password_hash, password)
    }

    /// Check whether the given voter key is correct. Accounts without a key never match.
    pub fn verify_voter_key(&self, voter_key: &str) -> bool {
        self.voter_key_hash
            .as_deref()
            .map_or(false, |hash| verify_secret(hash, normalise_voter_key(voter_key)))
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }
}

/// Voter keys are issued in upper case but accepted in any case, with surrounding space.
pub fn normalise_voter_key(voter_key: &str) -> String {
    voter_key.trim().to_ascii_uppercase()
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// If there are no admins, create one with the given credentials.
///
/// This operation is idempotent.
pub async fn ensure_admin_exists(
    users: &Coll<NewUser>,
    email: &str,
    password: &str,
) -> Result<()> {
    let admins = users
        .count_documents(doc! { "role": Role::Admin }, None)
        .await?;
    if admins == 0 {
        warn!("No admin account exists, creating default admin {email}");
        let admin = NewUser {
            name: DEFAULT_ADMIN_NAME.to_string(),
            email: email.to_lowercase(),
            student_id: None,
            role: Role::Admin,
            password_hash: hash_secret(password)?,
            voter_key_hash: None,
            email_verified: true,
            department_id: None,
            created_at: Utc::now(),
        };
        users.insert_one(admin, None).await?;
    }
    Ok(())
}
