pub mod election;
pub mod eligibility;
pub mod otp_purpose;
pub mod role;
pub mod secret;
