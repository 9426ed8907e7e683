use chrono::{DateTime, Utc};
use lettre::Address;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{
        role::Role,
        secret::{generate_password, generate_voter_key, hash_secret},
    },
    db::user::{NewUser, User},
};

use super::id::ApiId;

/// A student voter as submitted by an admin, for creation or update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterSpec {
    pub name: String,
    pub email: String,
    pub student_id: String,
    #[serde(default)]
    pub department_id: Option<ApiId>,
}

impl VoterSpec {
    /// Check the spec and normalise its fields: names and IDs are trimmed, emails lowercased.
    pub fn normalised(self) -> Result<Self> {
        let name = self.name.trim().to_string();
        let email = self.email.trim().to_lowercase();
        let student_id = self.student_id.trim().to_string();
        if name.is_empty() {
            return Err(Error::bad_request("Voter name must not be empty"));
        }
        if student_id.is_empty() {
            return Err(Error::bad_request("Student ID must not be empty"));
        }
        if student_id.contains('@') {
            return Err(Error::bad_request("Student ID must not contain '@'"));
        }
        if let Err(e) = email.parse::<Address>() {
            return Err(Error::bad_request(format!(
                "Invalid email address {email}: {e}"
            )));
        }
        Ok(Self {
            name,
            email,
            student_id,
            department_id: self.department_id,
        })
    }
}

/// Freshly generated login secrets, in plaintext.
pub struct Credentials {
    pub password: String,
    pub voter_key: String,
}

impl Credentials {
    pub fn generate() -> Self {
        Self {
            password: generate_password(),
            voter_key: generate_voter_key(),
        }
    }

    /// Build a new, unverified student account with these credentials.
    pub fn new_voter(&self, spec: VoterSpec) -> Result<NewUser> {
        Ok(NewUser {
            name: spec.name,
            email: spec.email,
            student_id: Some(spec.student_id),
            role: Role::Student,
            password_hash: hash_secret(&self.password)?,
            voter_key_hash: Some(hash_secret(&self.voter_key)?),
            email_verified: false,
            department_id: spec.department_id.map(Into::into),
            created_at: Utc::now(),
        })
    }
}

/// A user account, without any secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: ApiId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub student_id: Option<String>,
    pub department_id: Option<ApiId>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        let User { id, user } = user;
        Self {
            id: id.into(),
            name: user.name,
            email: user.email,
            role: user.role,
            student_id: user.student_id,
            department_id: user.department_id.map(Into::into),
            email_verified: user.email_verified,
            created_at: user.created_at,
        }
    }
}

/// Login secrets issued to a voter, shown exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCredentials {
    pub voter: UserProfile,
    pub password: String,
    pub voter_key: String,
    /// Whether the credentials were also emailed to the voter.
    pub email_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl IssuedCredentials {
    pub fn new(voter: User, credentials: Credentials, email_sent: bool) -> Self {
        Self {
            voter: voter.into(),
            password: credentials.password,
            voter_key: credentials.voter_key,
            email_sent,
            warning: (!email_sent).then(|| {
                "The credentials could not be emailed; pass them on to the voter yourself"
                    .to_string()
            }),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::db::user::normalise_voter_key;

    #[test]
    fn specs_are_normalised() {
        let spec = VoterSpec::example(None).normalised().unwrap();
        assert_eq!(spec.email, "grace@university.test");
        assert_eq!(spec.student_id, "CS2024002");
    }

    #[test]
    fn bad_emails_rejected() {
        let bad = [
            "",
            "grace",
            "grace@",
            "@uni.test",
            "a@b@c.d",
            "gr ace@uni.test",
            "a(b@uni.test",
        ];
        for email in bad {
            let spec = VoterSpec {
                email: email.to_string(),
                ..VoterSpec::example(None)
            };
            assert!(spec.normalised().is_err(), "{email} should be rejected");
        }
    }

    #[test]
    fn accepted_emails_can_be_mailed() {
        let spec = VoterSpec {
            email: " Grace.Hopper+vote@CS.University.test ".to_string(),
            ..VoterSpec::example(None)
        };
        let spec = spec.normalised().unwrap();
        assert_eq!(spec.email, "grace.hopper+vote@cs.university.test");
        assert!(spec.email.parse::<lettre::message::Mailbox>().is_ok());
    }

    #[test]
    fn new_voters_start_unverified_with_working_credentials() {
        let credentials = Credentials::generate();
        let voter = credentials
            .new_voter(VoterSpec::example(None).normalised().unwrap())
            .unwrap();
        assert_eq!(voter.role, Role::Student);
        assert!(!voter.email_verified);
        assert!(voter.verify_password(&credentials.password));
        assert!(voter.verify_voter_key(&credentials.voter_key));
        assert_eq!(normalise_voter_key(&credentials.voter_key), credentials.voter_key);
    }
}
