use log::{info, warn};
use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    config::Config,
    error::{Error, Result},
    mailer::{Mailer, OutgoingMail},
    model::{
        api::{
            auth::{
                Admin, AdminLoginRequest, AnyAccount, AuthToken, OtpVerifyRequest, Student,
                VoterLoginRequest, VoterLoginResponse, AUTH_TOKEN_COOKIE,
            },
            otp::{Challenge, CHALLENGE_COOKIE},
            voter::UserProfile,
        },
        common::{otp_purpose::OtpPurpose, role::Role},
        db::{
            login_otp::{issue_otp, verify_otp, LoginOtp, NewLoginOtp},
            user::User,
        },
        mongodb::Coll,
    },
};

pub fn routes() -> Vec<Route> {
    routes![admin_login, voter_login, verify, resend, logout, me]
}

#[post("/api/auth/admin/login", data = "<credentials>", format = "json")]
async fn admin_login(
    cookies: &CookieJar<'_>,
    credentials: Json<AdminLoginRequest>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<UserProfile>> {
    let with_email = doc! {
        "email": credentials.email.trim().to_lowercase(),
        "role": Role::Admin,
    };
    let admin = users
        .find_one(with_email, None)
        .await?
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or_else(|| Error::unauthorized("Invalid email or password"))?;

    let token = AuthToken::<Admin>::for_user(&admin)
        .ok_or_else(|| Error::unauthorized("Invalid email or password"))?;
    cookies.add(token.into_cookie(config)?);
    cookies.remove_private(Cookie::named(CHALLENGE_COOKIE));

    info!("Admin {} signed in", admin.id);
    Ok(Json(admin.into()))
}

/// Check a student's password and voter key. Students who have verified their email are
/// signed in straight away; others are emailed a code and given a challenge cookie.
#[post("/api/auth/voter/login", data = "<credentials>", format = "json")]
async fn voter_login(
    cookies: &CookieJar<'_>,
    credentials: Json<VoterLoginRequest>,
    users: Coll<User>,
    otps: Coll<NewLoginOtp>,
    mailer: &State<Mailer>,
    config: &State<Config>,
) -> Result<Json<VoterLoginResponse>> {
    let identifier = credentials.identifier.trim();
    let filter = if credentials.is_email() {
        doc! { "email": identifier.to_lowercase(), "role": Role::Student }
    } else {
        doc! { "student_id": identifier, "role": Role::Student }
    };
    let voter = users
        .find_one(filter, None)
        .await?
        .filter(|voter| {
            voter.verify_password(&credentials.password)
                && voter.verify_voter_key(&credentials.voter_key)
        })
        .ok_or_else(|| Error::unauthorized("Invalid credentials"))?;

    if voter.email_verified {
        sign_in_student(cookies, &voter, config)?;
        return Ok(Json(VoterLoginResponse::signed_in(voter.into())));
    }

    send_code(&voter, &otps, mailer, config).await?;
    cookies.add_private(Challenge::new(voter.id, &voter.email).into_cookie(config)?);
    Ok(Json(VoterLoginResponse::otp_required()))
}

/// Finish a student's first sign-in with the code emailed to them.
#[post("/api/auth/voter/verify", data = "<request>", format = "json")]
async fn verify(
    cookies: &CookieJar<'_>,
    challenge: Challenge,
    request: Json<OtpVerifyRequest>,
    users: Coll<User>,
    otps: Coll<LoginOtp>,
    config: &State<Config>,
) -> Result<Json<UserProfile>> {
    verify_otp(
        &otps,
        &challenge.email,
        OtpPurpose::EmailVerification,
        &request.code,
        config,
    )
    .await?;

    let filter = doc! {
        "_id": challenge.user_id,
        "email": &challenge.email,
        "role": Role::Student,
    };
    let result = users
        .update_one(filter, doc! { "$set": { "email_verified": true } }, None)
        .await?;
    if result.matched_count != 1 {
        // The account's email changed (or it was removed) after the code was sent.
        cookies.remove_private(Cookie::named(CHALLENGE_COOKIE));
        return Err(Error::unauthorized("Account details have changed; log in again"));
    }
    let voter = users
        .find_one(challenge.user_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::unauthorized("Account no longer exists"))?;
    info!("Voter {} verified their email", voter.id);

    sign_in_student(cookies, &voter, config)?;
    cookies.remove_private(Cookie::named(CHALLENGE_COOKIE));
    Ok(Json(voter.into()))
}

/// Email a fresh code, replacing any outstanding one.
#[post("/api/auth/voter/resend")]
async fn resend(
    cookies: &CookieJar<'_>,
    challenge: Challenge,
    users: Coll<User>,
    otps: Coll<NewLoginOtp>,
    mailer: &State<Mailer>,
    config: &State<Config>,
) -> Result<Json<VoterLoginResponse>> {
    let voter = users
        .find_one(challenge.user_id.as_doc(), None)
        .await?
        .filter(|voter| voter.is_student() && voter.email == challenge.email)
        .ok_or_else(|| Error::unauthorized("Account no longer exists"))?;
    if voter.email_verified {
        return Err(Error::bad_request("Email is already verified; log in again"));
    }

    send_code(&voter, &otps, mailer, config).await?;
    cookies.add_private(Challenge::new(voter.id, &voter.email).into_cookie(config)?);
    Ok(Json(VoterLoginResponse::otp_required()))
}

#[delete("/api/auth")]
fn logout(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    cookies.remove_private(Cookie::named(CHALLENGE_COOKIE));
    Status::Ok
}

#[get("/api/auth/me")]
async fn me(token: AuthToken<AnyAccount>, users: Coll<User>) -> Result<Json<UserProfile>> {
    let user = token.user(&users).await?;
    Ok(Json(user.into()))
}

fn sign_in_student(cookies: &CookieJar<'_>, voter: &User, config: &Config) -> Result<()> {
    let token = AuthToken::<Student>::for_user(voter)
        .ok_or_else(|| Error::unauthorized("Invalid credentials"))?;
    cookies.add(token.into_cookie(config)?);
    Ok(())
}

async fn send_code(
    voter: &User,
    otps: &Coll<NewLoginOtp>,
    mailer: &Mailer,
    config: &Config,
) -> Result<()> {
    let code = issue_otp(otps, &voter.email, OtpPurpose::EmailVerification, config).await?;
    let mail = OutgoingMail::verification_code(
        &voter.email,
        &voter.name,
        &code,
        config.otp_ttl().num_minutes(),
    );
    if let Err(e) = mailer.send(mail).await {
        warn!("Failed to send verification code to {}: {e}", voter.email);
        return Err(e.into());
    }
    Ok(())
}
