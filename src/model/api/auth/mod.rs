mod request;
mod token;
mod user;

pub use request::{AdminLoginRequest, OtpVerifyRequest, VoterLoginRequest, VoterLoginResponse};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
pub use user::{Account, Admin, AnyAccount, Student};
