use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use log::{debug, warn};
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime},
    options::{FindOneAndUpdateOptions, FindOneOptions, ReturnDocument},
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        api::otp::Code,
        common::otp_purpose::OtpPurpose,
        mongodb::{Coll, Id},
    },
};

pub type HmacSha256 = Hmac<Sha256>;

/// A one-time password issued to an email address. Only the keyed hash of the code is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOtpCore {
    pub email: String,
    pub code_hash: String,
    pub purpose: OtpPurpose,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    /// Number of incorrect codes submitted against this OTP.
    pub attempts: u32,
}

impl LoginOtpCore {
    /// Create a fresh OTP record for the given code.
    pub fn new(email: &str, code: &Code, purpose: OtpPurpose, config: &Config) -> Self {
        let mac = code_mac(email, code, config);
        Self {
            email: email.to_string(),
            code_hash: HEXLOWER.encode(&mac.finalize().into_bytes()),
            purpose,
            expires_at: Utc::now() + config.otp_ttl(),
            consumed: false,
            attempts: 0,
        }
    }

    /// Does the given code match, compared in constant time?
    pub fn matches(&self, code: &Code, config: &Config) -> bool {
        let expected = match HEXLOWER.decode(self.code_hash.as_bytes()) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        code_mac(&self.email, code, config)
            .verify_slice(&expected)
            .is_ok()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

fn code_mac(email: &str, code: &Code, config: &Config) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(config.hmac_secret()).expect("HMAC can take key of any size");
    mac.update(email.as_bytes());
    mac.update(b":");
    mac.update(code.to_string().as_bytes());
    mac
}

/// An OTP without an ID.
pub type NewLoginOtp = LoginOtpCore;

/// An OTP from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOtp {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub otp: LoginOtpCore,
}

impl Deref for LoginOtp {
    type Target = LoginOtpCore;

    fn deref(&self) -> &Self::Target {
        &self.otp
    }
}

impl DerefMut for LoginOtp {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.otp
    }
}

/// Issue a new OTP for the given email and purpose, superseding any outstanding ones.
/// Returns the plaintext code, which must be delivered to the user and then forgotten.
pub async fn issue_otp(
    otps: &Coll<NewLoginOtp>,
    email: &str,
    purpose: OtpPurpose,
    config: &Config,
) -> Result<Code> {
    let outstanding = doc! {
        "email": email,
        "purpose": purpose,
        "consumed": false,
    };
    let superseded = otps
        .update_many(outstanding, doc! { "$set": { "consumed": true } }, None)
        .await?;
    if superseded.modified_count > 0 {
        debug!(
            "Superseded {} outstanding OTP(s) for {email}",
            superseded.modified_count
        );
    }

    let code = Code::random();
    otps.insert_one(NewLoginOtp::new(email, &code, purpose, config), None)
        .await?;
    Ok(code)
}

/// Check a submitted code against the newest outstanding OTP for the given email and purpose,
/// consuming it on success.
///
/// Wrong codes count against the OTP; once `Config::otp_max_attempts` is reached the OTP is
/// consumed and a new one must be requested.
pub async fn verify_otp(
    otps: &Coll<LoginOtp>,
    email: &str,
    purpose: OtpPurpose,
    code: &Code,
    config: &Config,
) -> Result<()> {
    let outstanding = doc! {
        "email": email,
        "purpose": purpose,
        "consumed": false,
    };
    let newest_first = FindOneOptions::builder().sort(doc! { "_id": -1 }).build();
    let otp = otps
        .find_one(outstanding, newest_first)
        .await?
        .ok_or_else(|| Error::unauthorized("No verification code is pending; log in again"))?;

    if otp.is_expired_at(Utc::now()) {
        return Err(Error::unauthorized(
            "Verification code has expired; log in again to receive a new one",
        ));
    }

    if !otp.matches(code, config) {
        // Count the attempt server-side so concurrent guesses cannot share one.
        let pending = doc! {
            "_id": otp.id,
            "consumed": false,
        };
        let return_updated = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let counted = otps
            .find_one_and_update(
                pending.clone(),
                doc! { "$inc": { "attempts": 1 } },
                return_updated,
            )
            .await?
            .ok_or_else(|| Error::unauthorized("No verification code is pending; log in again"))?;
        if counted.attempts >= config.otp_max_attempts() {
            otps.update_one(pending, doc! { "$set": { "consumed": true } }, None)
                .await?;
            warn!("Too many incorrect verification codes for {email}");
            return Err(Error::unauthorized(
                "Too many incorrect codes; log in again to receive a new one",
            ));
        }
        return Err(Error::unauthorized("Incorrect verification code"));
    }

    // Consume atomically so a code can only ever be redeemed once.
    let filter = doc! {
        "_id": otp.id,
        "consumed": false,
    };
    let result = otps
        .update_one(filter, doc! { "$set": { "consumed": true } }, None)
        .await?;
    if result.modified_count != 1 {
        return Err(Error::unauthorized("Verification code was already used"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    #[test]
    fn otp_matches_only_its_own_code() {
        let config = Config::example();
        let code = Code::random();
        let otp = NewLoginOtp::new(
            "ada@university.test",
            &code,
            OtpPurpose::EmailVerification,
            &config,
        );

        assert!(otp.matches(&code, &config));
        assert_ne!(otp.code_hash, code.to_string());

        let other: Code = if code.to_string() == "000000" {
            "000001".parse().unwrap()
        } else {
            "000000".parse().unwrap()
        };
        assert!(!otp.matches(&other, &config));
    }

    #[test]
    fn otp_is_bound_to_email() {
        let config = Config::example();
        let code = Code::random();
        let mut otp = NewLoginOtp::new(
            "ada@university.test",
            &code,
            OtpPurpose::EmailVerification,
            &config,
        );
        otp.email = "mallory@university.test".to_string();
        assert!(!otp.matches(&code, &config));
    }

    #[test]
    fn otp_expires_after_ttl() {
        let config = Config::example();
        let otp = NewLoginOtp::new(
            "ada@university.test",
            &Code::random(),
            OtpPurpose::EmailVerification,
            &config,
        );
        assert!(!otp.is_expired_at(Utc::now()));
        assert!(otp.is_expired_at(Utc::now() + config.otp_ttl() + Duration::seconds(1)));
    }

    #[test]
    fn corrupt_hash_never_matches() {
        let config = Config::example();
        let code = Code::random();
        let mut otp = NewLoginOtp::new(
            "ada@university.test",
            &code,
            OtpPurpose::EmailVerification,
            &config,
        );
        otp.code_hash = "zz".to_string();
        assert!(!otp.matches(&code, &config));
    }

    fn wrong_code(code: &Code) -> Code {
        if code.to_string() == "000000" {
            "000001".parse().unwrap()
        } else {
            "000000".parse().unwrap()
        }
    }

    #[backend_test]
    async fn concurrent_wrong_codes_each_count(
        otps: Coll<LoginOtp>,
        new_otps: Coll<NewLoginOtp>,
    ) {
        let config = Config::example();
        let email = "ada@university.test";
        let purpose = OtpPurpose::EmailVerification;
        let code = issue_otp(&new_otps, email, purpose, &config).await.unwrap();
        let wrong = wrong_code(&code);

        let guesses = config.otp_max_attempts() - 1;
        let results = rocket::futures::future::join_all(
            (0..guesses).map(|_| verify_otp(&otps, email, purpose, &wrong, &config)),
        )
        .await;
        assert!(results.iter().all(|result| result.is_err()));

        let otp = otps
            .find_one(doc! { "email": email }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(otp.attempts, guesses);
        assert!(!otp.consumed);

        // The last allowed guess burns the code, even if it was right next time.
        let err = verify_otp(&otps, email, purpose, &wrong, &config)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Too many"));
        assert!(verify_otp(&otps, email, purpose, &code, &config).await.is_err());
    }
}
