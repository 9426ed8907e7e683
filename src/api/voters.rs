use log::{info, warn};
use mongodb::{
    bson::{doc, Document},
    options::FindOptions,
};
use rocket::{
    futures::TryStreamExt, http::Status, response::status::Created, serde::json::Json, Route,
    State,
};

use crate::{
    config::Config,
    error::{Error, Result},
    mailer::{Mailer, OutgoingMail},
    model::{
        api::{
            auth::{Admin, AuthToken},
            pagination::{Paginated, Pagination},
            voter::{Credentials, IssuedCredentials, UserProfile, VoterSpec},
        },
        common::{role::Role, secret::hash_secret},
        db::{
            candidate::Candidate,
            department::Department,
            user::{NewUser, User},
            vote::Vote,
        },
        mongodb::{duplicate_key_message, inserted_id, Coll, Id},
    },
};

use super::common::{ensure_no_dependants, find_by_id};

pub fn routes() -> Vec<Route> {
    routes![
        list_voters,
        create_voter,
        get_voter,
        update_voter,
        reset_credentials,
        delete_voter,
    ]
}

#[get("/api/admin/voters?<department>")]
async fn list_voters(
    _token: AuthToken<Admin>,
    department: Option<Id>,
    pagination: Pagination,
    users: Coll<User>,
) -> Result<Json<Paginated<UserProfile>>> {
    let mut filter = doc! { "role": Role::Student };
    if let Some(department_id) = department {
        filter.insert("department_id", department_id);
    }

    let options = FindOptions::builder()
        .sort(doc! { "_id": 1 })
        .skip(pagination.skip())
        .limit(pagination.limit())
        .build();
    let voters: Vec<User> = users
        .find(filter.clone(), options)
        .await?
        .try_collect()
        .await?;
    let total = users.count_documents(filter, None).await?;

    Ok(Json(Paginated {
        items: voters.into_iter().map(Into::into).collect(),
        pagination: pagination.result(total),
    }))
}

/// Register a student and issue their credentials. The credentials are emailed if possible,
/// and returned in the response either way; they cannot be retrieved later.
#[post("/api/admin/voters", data = "<spec>", format = "json")]
async fn create_voter(
    _token: AuthToken<Admin>,
    spec: Json<VoterSpec>,
    new_users: Coll<NewUser>,
    users: Coll<User>,
    departments: Coll<Department>,
    mailer: &State<Mailer>,
    config: &State<Config>,
) -> Result<Created<Json<IssuedCredentials>>> {
    let spec = spec.0.normalised()?;
    check_department_exists(&spec, &departments).await?;

    let credentials = Credentials::generate();
    let voter = credentials.new_voter(spec)?;
    let result = new_users
        .insert_one(&voter, None)
        .await
        .map_err(|e| duplicate_voter(e, &voter))?;
    let id = inserted_id(result);
    info!("Registered voter {id}");

    let voter = find_by_id(&users, id, "Voter").await?;
    let email_sent = email_credentials(&voter, &credentials, mailer, config).await;
    Ok(Created::new(uri!(get_voter(id)).to_string())
        .body(Json(IssuedCredentials::new(voter, credentials, email_sent))))
}

#[get("/api/admin/voters/<voter_id>")]
async fn get_voter(
    _token: AuthToken<Admin>,
    voter_id: Id,
    users: Coll<User>,
) -> Result<Json<UserProfile>> {
    let voter = find_voter(&users, voter_id).await?;
    Ok(Json(voter.into()))
}

/// Update a voter's details. Changing their email means it must be verified again.
#[put("/api/admin/voters/<voter_id>", data = "<spec>", format = "json")]
async fn update_voter(
    _token: AuthToken<Admin>,
    voter_id: Id,
    spec: Json<VoterSpec>,
    new_users: Coll<NewUser>,
    users: Coll<User>,
    departments: Coll<Department>,
) -> Result<Json<UserProfile>> {
    let spec = spec.0.normalised()?;
    check_department_exists(&spec, &departments).await?;

    let mut voter = find_voter(&users, voter_id).await?;
    if voter.email != spec.email {
        voter.email_verified = false;
    }
    voter.name = spec.name;
    voter.email = spec.email;
    voter.student_id = Some(spec.student_id);
    voter.department_id = spec.department_id.map(Into::into);

    new_users
        .replace_one(voter_id.as_doc(), &voter.user, None)
        .await
        .map_err(|e| duplicate_voter(e, &voter))?;

    let voter = find_voter(&users, voter_id).await?;
    Ok(Json(voter.into()))
}

/// Replace a voter's password and voter key, e.g. when they have lost them.
#[post("/api/admin/voters/<voter_id>/credentials")]
async fn reset_credentials(
    _token: AuthToken<Admin>,
    voter_id: Id,
    users: Coll<User>,
    mailer: &State<Mailer>,
    config: &State<Config>,
) -> Result<Json<IssuedCredentials>> {
    let voter = find_voter(&users, voter_id).await?;

    let credentials = Credentials::generate();
    let update = doc! {
        "$set": {
            "password_hash": hash_secret(&credentials.password)?,
            "voter_key_hash": hash_secret(&credentials.voter_key)?,
        }
    };
    users.update_one(voter.id.as_doc(), update, None).await?;
    info!("Reset credentials for voter {voter_id}");

    let email_sent = email_credentials(&voter, &credentials, mailer, config).await;
    Ok(Json(IssuedCredentials::new(voter, credentials, email_sent)))
}

#[delete("/api/admin/voters/<voter_id>")]
async fn delete_voter(
    _token: AuthToken<Admin>,
    voter_id: Id,
    users: Coll<User>,
    votes: Coll<Vote>,
    candidates: Coll<Candidate>,
) -> Result<Status> {
    find_voter(&users, voter_id).await?;
    let vote_count = votes
        .count_documents(doc! { "voter_id": voter_id }, None)
        .await?;
    let candidacies = candidates
        .count_documents(doc! { "user_id": voter_id }, None)
        .await?;
    ensure_no_dependants(
        "voter",
        &[
            (vote_count, "vote", "votes"),
            (candidacies, "candidacy", "candidacies"),
        ],
    )?;

    users.delete_one(voter_id.as_doc(), None).await?;
    info!("Deleted voter {voter_id}");
    Ok(Status::NoContent)
}

fn student_filter(voter_id: Id) -> Document {
    doc! {
        "_id": voter_id,
        "role": Role::Student,
    }
}

async fn find_voter(users: &Coll<User>, voter_id: Id) -> Result<User> {
    users
        .find_one(student_filter(voter_id), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter {voter_id}")))
}

async fn check_department_exists(spec: &VoterSpec, departments: &Coll<Department>) -> Result<()> {
    if let Some(department_id) = spec.department_id {
        find_by_id(departments, department_id.into(), "Department").await?;
    }
    Ok(())
}

/// Email a voter their new credentials, reporting whether it worked.
async fn email_credentials(
    voter: &User,
    credentials: &Credentials,
    mailer: &Mailer,
    config: &Config,
) -> bool {
    let mail = OutgoingMail::credentials(
        &voter.email,
        &voter.name,
        voter.student_id.as_deref().unwrap_or_default(),
        &credentials.password,
        &credentials.voter_key,
        config.app_url(),
    );
    match mailer.send(mail).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to email credentials to voter {}: {e}", voter.id);
            false
        }
    }
}

/// Translate a unique index violation into a message naming the clashing field.
fn duplicate_voter(err: mongodb::error::Error, voter: &NewUser) -> Error {
    match duplicate_key_message(&err) {
        Some(message) if message.contains("student_id") => Error::conflict(format!(
            "Student ID {} is already registered",
            voter.student_id.as_deref().unwrap_or_default()
        )),
        Some(_) => Error::conflict(format!("Email {} is already registered", voter.email)),
        None => err.into(),
    }
}
