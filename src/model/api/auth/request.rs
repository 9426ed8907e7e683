use serde::{Deserialize, Serialize};

use crate::model::api::{otp::Code, voter::UserProfile};

/// Admin sign-in with email and password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLoginRequest {
    pub email: String,
    pub password: String,
}

/// Student sign-in: either their email or student ID, plus password and voter key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterLoginRequest {
    pub identifier: String,
    pub password: String,
    pub voter_key: String,
}

impl VoterLoginRequest {
    /// Identifiers containing `@` are emails, anything else is a student ID.
    pub fn is_email(&self) -> bool {
        self.identifier.contains('@')
    }
}

/// Outcome of a student password check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterLoginResponse {
    /// If set, a code has been emailed and must be submitted to finish signing in.
    pub otp_required: bool,
    /// The signed-in voter, once no code is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter: Option<UserProfile>,
}

impl VoterLoginResponse {
    pub fn otp_required() -> Self {
        Self {
            otp_required: true,
            voter: None,
        }
    }

    pub fn signed_in(voter: UserProfile) -> Self {
        Self {
            otp_required: false,
            voter: Some(voter),
        }
    }
}

/// A verification code submitted to finish signing in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpVerifyRequest {
    pub code: Code,
}
