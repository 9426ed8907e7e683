use mongodb::bson::doc;
use rocket::{http::Status, response::status::Created, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{Admin, AuthToken},
            candidate::{CandidateDescription, CandidateSpec},
            position::{PositionDescription, PositionSpec},
        },
        common::{election::ElectionStatus, role::Role},
        db::{
            candidate::{Candidate, NewCandidate},
            election::Election,
            position::{NewPosition, Position},
            user::User,
            vote::Vote,
        },
        mongodb::{inserted_id, is_duplicate_key_error, Coll, Id},
    },
};

use super::common::{ensure_no_dependants, find_by_id, find_in_order};

pub fn routes() -> Vec<Route> {
    routes![
        list_positions,
        create_position,
        update_position,
        delete_position,
        list_candidates,
        create_candidate,
        update_candidate,
        delete_candidate,
    ]
}

#[get("/api/admin/elections/<election_id>/positions")]
async fn list_positions(
    _token: AuthToken<Admin>,
    election_id: Id,
    elections: Coll<Election>,
    positions: Coll<Position>,
) -> Result<Json<Vec<PositionDescription>>> {
    find_by_id(&elections, election_id, "Election").await?;
    let positions = find_in_order(&positions, doc! { "election_id": election_id }).await?;
    Ok(Json(positions.into_iter().map(Into::into).collect()))
}

#[post("/api/admin/elections/<election_id>/positions", data = "<spec>", format = "json")]
async fn create_position(
    _token: AuthToken<Admin>,
    election_id: Id,
    spec: Json<PositionSpec>,
    elections: Coll<Election>,
    new_positions: Coll<NewPosition>,
    positions: Coll<Position>,
) -> Result<Created<Json<PositionDescription>>> {
    let election = find_by_id(&elections, election_id, "Election").await?;
    ensure_not_ended(&election)?;

    let position = spec.0.into_position(election_id)?;
    let result = new_positions
        .insert_one(&position, None)
        .await
        .map_err(|e| duplicate_position(e, &position.name))?;
    let id = inserted_id(result);

    let position = find_by_id(&positions, id, "Position").await?;
    Ok(Created::new(uri!(list_candidates(id)).to_string()).body(Json(position.into())))
}

#[put("/api/admin/positions/<position_id>", data = "<spec>", format = "json")]
async fn update_position(
    _token: AuthToken<Admin>,
    position_id: Id,
    spec: Json<PositionSpec>,
    elections: Coll<Election>,
    new_positions: Coll<NewPosition>,
    positions: Coll<Position>,
) -> Result<Json<PositionDescription>> {
    let position = find_by_id(&positions, position_id, "Position").await?;
    let election = find_by_id(&elections, position.election_id, "Election").await?;
    ensure_not_ended(&election)?;

    let updated = spec.0.into_position(position.election_id)?;
    new_positions
        .replace_one(position_id.as_doc(), &updated, None)
        .await
        .map_err(|e| duplicate_position(e, &updated.name))?;

    let position = find_by_id(&positions, position_id, "Position").await?;
    Ok(Json(position.into()))
}

#[delete("/api/admin/positions/<position_id>")]
async fn delete_position(
    _token: AuthToken<Admin>,
    position_id: Id,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
) -> Result<Status> {
    find_by_id(&positions, position_id, "Position").await?;
    let in_position = doc! { "position_id": position_id };
    let candidate_count = candidates
        .count_documents(in_position.clone(), None)
        .await?;
    let vote_count = votes.count_documents(in_position, None).await?;
    ensure_no_dependants(
        "position",
        &[
            (candidate_count, "candidate", "candidates"),
            (vote_count, "vote", "votes"),
        ],
    )?;

    positions.delete_one(position_id.as_doc(), None).await?;
    Ok(Status::NoContent)
}

#[get("/api/admin/positions/<position_id>/candidates")]
async fn list_candidates(
    _token: AuthToken<Admin>,
    position_id: Id,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
) -> Result<Json<Vec<CandidateDescription>>> {
    find_by_id(&positions, position_id, "Position").await?;
    let candidates = find_in_order(&candidates, doc! { "position_id": position_id }).await?;
    Ok(Json(candidates.into_iter().map(Into::into).collect()))
}

#[post("/api/admin/positions/<position_id>/candidates", data = "<spec>", format = "json")]
async fn create_candidate(
    _token: AuthToken<Admin>,
    position_id: Id,
    spec: Json<CandidateSpec>,
    elections: Coll<Election>,
    positions: Coll<Position>,
    users: Coll<User>,
    new_candidates: Coll<NewCandidate>,
    candidates: Coll<Candidate>,
) -> Result<Created<Json<CandidateDescription>>> {
    let position = find_by_id(&positions, position_id, "Position").await?;
    let election = find_by_id(&elections, position.election_id, "Election").await?;
    ensure_not_ended(&election)?;

    let candidate = spec.0.into_candidate(&position)?;
    check_candidate_user(&candidate, &users).await?;
    let id = inserted_id(new_candidates.insert_one(&candidate, None).await?);

    let candidate = find_by_id(&candidates, id, "Candidate").await?;
    Ok(Created::new(uri!(list_candidates(position_id)).to_string())
        .body(Json(candidate.into())))
}

#[put("/api/admin/candidates/<candidate_id>", data = "<spec>", format = "json")]
async fn update_candidate(
    _token: AuthToken<Admin>,
    candidate_id: Id,
    spec: Json<CandidateSpec>,
    elections: Coll<Election>,
    positions: Coll<Position>,
    users: Coll<User>,
    new_candidates: Coll<NewCandidate>,
    candidates: Coll<Candidate>,
) -> Result<Json<CandidateDescription>> {
    let candidate = find_by_id(&candidates, candidate_id, "Candidate").await?;
    let position = find_by_id(&positions, candidate.position_id, "Position").await?;
    let election = find_by_id(&elections, position.election_id, "Election").await?;
    ensure_not_ended(&election)?;

    let updated = spec.0.into_candidate(&position)?;
    check_candidate_user(&updated, &users).await?;
    new_candidates
        .replace_one(candidate_id.as_doc(), &updated, None)
        .await?;

    let candidate = find_by_id(&candidates, candidate_id, "Candidate").await?;
    Ok(Json(candidate.into()))
}

#[delete("/api/admin/candidates/<candidate_id>")]
async fn delete_candidate(
    _token: AuthToken<Admin>,
    candidate_id: Id,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
) -> Result<Status> {
    find_by_id(&candidates, candidate_id, "Candidate").await?;
    let vote_count = votes
        .count_documents(doc! { "candidate_id": candidate_id }, None)
        .await?;
    ensure_no_dependants("candidate", &[(vote_count, "vote", "votes")])?;

    candidates.delete_one(candidate_id.as_doc(), None).await?;
    Ok(Status::NoContent)
}

fn ensure_not_ended(election: &Election) -> Result<()> {
    if election.status == ElectionStatus::Ended {
        Err(Error::conflict(format!(
            "Election {} has ended and can no longer be changed",
            election.id
        )))
    } else {
        Ok(())
    }
}

/// A candidate linked to a user must be linked to a student.
async fn check_candidate_user(candidate: &NewCandidate, users: &Coll<User>) -> Result<()> {
    if let Some(user_id) = candidate.user_id {
        let student = doc! {
            "_id": user_id,
            "role": Role::Student,
        };
        if users.find_one(student, None).await?.is_none() {
            return Err(Error::not_found(format!("Student {user_id}")));
        }
    }
    Ok(())
}

fn duplicate_position(err: mongodb::error::Error, name: &str) -> Error {
    if is_duplicate_key_error(&err) {
        Error::conflict(format!(
            "A position named '{name}' already exists in this election"
        ))
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mongodb::Database;
    use rocket::local::asynchronous::Client;

    use super::*;
    use crate::api::fixtures::*;
    use crate::error::ErrorBody;
    use crate::model::{
        api::id::ApiId,
        db::{election::NewElection, user::NewUser, vote::NewVote},
    };

    async fn draft_election(db: &Database) -> Id {
        let election = NewElection {
            status: ElectionStatus::Draft,
            ..NewElection::src_example(Id::new())
        };
        insert_election(db, election).await
    }

    #[backend_test(admin)]
    async fn create_and_list_positions(client: Client, db: Database) {
        let election_id = draft_election(&db).await;

        let response = post_json(
            &client,
            uri!(create_position(election_id)),
            &PositionSpec::example(),
        )
        .await;
        assert_eq!(Status::Created, response.status());
        let created: PositionDescription = json_body(response).await;
        assert_eq!(created.election_id, ApiId::from(election_id));
        assert_eq!(created.max_choices, 1);

        let listed: Vec<PositionDescription> = json_body(
            client
                .get(uri!(list_positions(election_id)))
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(listed, vec![created]);

        let response = post_json(
            &client,
            uri!(create_position(Id::new())),
            &PositionSpec::example(),
        )
        .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn position_names_unique_per_election(client: Client, db: Database) {
        let election_id = draft_election(&db).await;
        let spec = PositionSpec::example();
        post_json(&client, uri!(create_position(election_id)), &spec).await;

        let response = post_json(&client, uri!(create_position(election_id)), &spec).await;
        assert_eq!(Status::Conflict, response.status());
        let error: ErrorBody = json_body(response).await;
        assert!(error.error.contains("Class Representative"));

        // The same name is fine in another election.
        let other = draft_election(&db).await;
        let response = post_json(&client, uri!(create_position(other)), &spec).await;
        assert_eq!(Status::Created, response.status());
    }

    #[backend_test(admin)]
    async fn rename_position(client: Client, db: Database) {
        let election_id = draft_election(&db).await;
        let position_id = insert_position(&db, election_id, "Chair").await;
        insert_position(&db, election_id, "Treasurer").await;

        let spec = PositionSpec {
            name: "Vice Chair".to_string(),
            max_choices: 1,
        };
        let response = put_json(&client, uri!(update_position(position_id)), &spec).await;
        assert_eq!(Status::Ok, response.status());
        let updated: PositionDescription = json_body(response).await;
        assert_eq!(updated.name, "Vice Chair");

        let spec = PositionSpec {
            name: "Treasurer".to_string(),
            max_choices: 1,
        };
        let response = put_json(&client, uri!(update_position(position_id)), &spec).await;
        assert_eq!(Status::Conflict, response.status());
    }

    #[backend_test(admin)]
    async fn candidates_belong_to_position(client: Client, db: Database) {
        let election_id = draft_election(&db).await;
        let position_id = insert_position(&db, election_id, "Chair").await;

        let response = post_json(
            &client,
            uri!(create_candidate(position_id)),
            &CandidateSpec::example("Ada"),
        )
        .await;
        assert_eq!(Status::Created, response.status());
        let created: CandidateDescription = json_body(response).await;
        assert_eq!(created.position_id, ApiId::from(position_id));
        assert_eq!(created.election_id, ApiId::from(election_id));

        let mut spec = CandidateSpec::example("Ada Lovelace");
        spec.manifesto = Some("More study space".to_string());
        let candidate_id: Id = created.id.into();
        let response = put_json(&client, uri!(update_candidate(candidate_id)), &spec).await;
        assert_eq!(Status::Ok, response.status());
        let updated: CandidateDescription = json_body(response).await;
        assert_eq!(updated.display_name, "Ada Lovelace");

        let listed: Vec<CandidateDescription> = json_body(
            client
                .get(uri!(list_candidates(position_id)))
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(listed, vec![updated]);
    }

    #[backend_test(admin)]
    async fn candidate_users_must_be_students(client: Client, db: Database) {
        let election_id = draft_election(&db).await;
        let position_id = insert_position(&db, election_id, "Chair").await;
        let admin = Coll::<User>::from_db(&db)
            .find_one(doc! { "role": Role::Admin }, None)
            .await
            .unwrap()
            .unwrap();

        let mut spec = CandidateSpec::example("Admin");
        spec.user_id = Some(admin.id.into());
        let response = post_json(&client, uri!(create_candidate(position_id)), &spec).await;
        assert_eq!(Status::NotFound, response.status());

        let student = inserted_id(
            Coll::<NewUser>::from_db(&db)
                .insert_one(NewUser::student_example(None), None)
                .await
                .unwrap(),
        );
        spec.user_id = Some(student.into());
        let response = post_json(&client, uri!(create_candidate(position_id)), &spec).await;
        assert_eq!(Status::Created, response.status());
    }

    #[backend_test(admin)]
    async fn ended_elections_cannot_change(client: Client, db: Database) {
        let election = NewElection {
            status: ElectionStatus::Ended,
            ..NewElection::src_example(Id::new())
        };
        let election_id = insert_election(&db, election).await;
        let position_id = insert_position(&db, election_id, "Chair").await;

        let response = post_json(
            &client,
            uri!(create_position(election_id)),
            &PositionSpec::example(),
        )
        .await;
        assert_eq!(Status::Conflict, response.status());

        let response = post_json(
            &client,
            uri!(create_candidate(position_id)),
            &CandidateSpec::example("Late"),
        )
        .await;
        assert_eq!(Status::Conflict, response.status());
    }

    #[backend_test(admin)]
    async fn deletes_guarded_by_dependants(client: Client, db: Database) {
        let election_id = insert_election(&db, NewElection::src_example(Id::new())).await;
        let position_id = insert_position(&db, election_id, "Chair").await;
        let candidate_id = insert_candidate(&db, election_id, position_id, "A").await;

        let response = client
            .delete(uri!(delete_position(position_id)))
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());
        let error: ErrorBody = json_body(response).await;
        assert!(error.error.contains("1 candidate"));

        Coll::<NewVote>::from_db(&db)
            .insert_one(
                NewVote {
                    voter_id: Id::new(),
                    election_id,
                    position_id,
                    candidate_id,
                    cast_at: Utc::now(),
                },
                None,
            )
            .await
            .unwrap();
        let response = client
            .delete(uri!(delete_candidate(candidate_id)))
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());

        Coll::<Vote>::from_db(&db)
            .delete_many(doc! {}, None)
            .await
            .unwrap();
        let response = client
            .delete(uri!(delete_candidate(candidate_id)))
            .dispatch()
            .await;
        assert_eq!(Status::NoContent, response.status());
        let response = client
            .delete(uri!(delete_position(position_id)))
            .dispatch()
            .await;
        assert_eq!(Status::NoContent, response.status());
    }
}
