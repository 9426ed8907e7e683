use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// What a one-time password was issued for.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtpPurpose {
    /// Proving ownership of the email address on first login.
    EmailVerification,
}

impl From<OtpPurpose> for Bson {
    fn from(purpose: OtpPurpose) -> Self {
        to_bson(&purpose).expect("Serialisation is infallible")
    }
}
