use log::info;
use mongodb::bson::{doc, Document};
use rocket::{http::Status, response::status::Created, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{Admin, AuthToken},
            election::{
                ElectionDescription, ElectionDetail, ElectionSpec, PositionWithCandidates,
                StatusChange,
            },
        },
        common::election::ElectionStatus,
        db::{
            candidate::Candidate,
            department::Department,
            election::{Election, NewElection},
            position::Position,
            vote::Vote,
        },
        mongodb::{inserted_id, Coll, Id},
    },
};

use super::common::{ensure_no_dependants, find_by_id, find_in_order};

pub fn routes() -> Vec<Route> {
    routes![
        list_elections,
        create_election,
        get_election,
        update_election,
        set_election_status,
        delete_election,
    ]
}

#[get("/api/admin/elections?<status>")]
async fn list_elections(
    _token: AuthToken<Admin>,
    status: Option<ElectionStatus>,
    elections: Coll<Election>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let filter = status.map(|status| doc! { "status": status });
    let elections = find_in_order(&elections, filter).await?;
    Ok(Json(elections.into_iter().map(Into::into).collect()))
}

#[post("/api/admin/elections", data = "<spec>", format = "json")]
async fn create_election(
    token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    new_elections: Coll<NewElection>,
    elections: Coll<Election>,
    departments: Coll<Department>,
) -> Result<Created<Json<ElectionDescription>>> {
    let election = spec.0.into_election(token.id)?;
    check_department_exists(&election, &departments).await?;

    let id = inserted_id(new_elections.insert_one(&election, None).await?);
    info!("Created election {id} ({})", election.name);

    let election = find_by_id(&elections, id, "Election").await?;
    Ok(Created::new(uri!(get_election(id)).to_string()).body(Json(election.into())))
}

/// An election with all its positions and their candidates.
#[get("/api/admin/elections/<election_id>")]
async fn get_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
) -> Result<Json<ElectionDetail>> {
    let election = find_by_id(&elections, election_id, "Election").await?;
    let in_election = doc! { "election_id": election_id };
    let positions = find_in_order(&positions, in_election.clone()).await?;
    let candidates = find_in_order(&candidates, in_election).await?;

    let positions = positions
        .into_iter()
        .map(|position| PositionWithCandidates {
            candidates: candidates
                .iter()
                .filter(|candidate| candidate.position_id == position.id)
                .cloned()
                .map(Into::into)
                .collect(),
            position: position.into(),
        })
        .collect();

    Ok(Json(ElectionDetail {
        election: election.into(),
        positions,
    }))
}

#[put("/api/admin/elections/<election_id>", data = "<spec>", format = "json")]
async fn update_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    spec: Json<ElectionSpec>,
    new_elections: Coll<NewElection>,
    elections: Coll<Election>,
    departments: Coll<Department>,
) -> Result<Json<ElectionDescription>> {
    let mut election = find_by_id(&elections, election_id, "Election").await?;
    if election.status == ElectionStatus::Ended {
        return Err(Error::conflict(format!(
            "Election {election_id} has ended and can no longer be changed"
        )));
    }
    spec.0.apply_to(&mut election)?;
    check_department_exists(&election, &departments).await?;

    // Only replace the election if it has not ended in the meantime.
    let result = new_elections
        .replace_one(editable_election(election_id), &election.election, None)
        .await?;
    if result.matched_count != 1 {
        return Err(Error::conflict(format!(
            "Election {election_id} has ended and can no longer be changed"
        )));
    }

    let election = find_by_id(&elections, election_id, "Election").await?;
    Ok(Json(election.into()))
}

/// Move an election forwards through its lifecycle.
#[post("/api/admin/elections/<election_id>/status", data = "<change>", format = "json")]
async fn set_election_status(
    _token: AuthToken<Admin>,
    election_id: Id,
    change: Json<StatusChange>,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    let election = find_by_id(&elections, election_id, "Election").await?;
    let next = change.status;
    if !election.status.can_become(next) {
        return Err(Error::conflict(format!(
            "Election {election_id} cannot move from {:?} to {next:?}",
            election.status
        )));
    }

    // Guard against a concurrent transition.
    let filter = doc! {
        "_id": election_id,
        "status": election.status,
    };
    let update = doc! {
        "$set": { "status": next },
    };
    let result = elections.update_one(filter, update, None).await?;
    if result.modified_count != 1 {
        return Err(Error::conflict(format!(
            "Election {election_id} changed status concurrently; try again"
        )));
    }
    info!("Election {election_id} is now {next:?}");

    let election = find_by_id(&elections, election_id, "Election").await?;
    Ok(Json(election.into()))
}

#[delete("/api/admin/elections/<election_id>")]
async fn delete_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    elections: Coll<Election>,
    positions: Coll<Position>,
    votes: Coll<Vote>,
) -> Result<Status> {
    find_by_id(&elections, election_id, "Election").await?;
    let in_election = doc! { "election_id": election_id };
    let position_count = positions.count_documents(in_election.clone(), None).await?;
    let vote_count = votes.count_documents(in_election, None).await?;
    ensure_no_dependants(
        "election",
        &[
            (position_count, "position", "positions"),
            (vote_count, "vote", "votes"),
        ],
    )?;

    elections.delete_one(election_id.as_doc(), None).await?;
    info!("Deleted election {election_id}");
    Ok(Status::NoContent)
}

/// Department elections must name a department that exists.
async fn check_department_exists(
    election: &NewElection,
    departments: &Coll<Department>,
) -> Result<()> {
    if let Some(department_id) = election.department_id {
        find_by_id(departments, department_id, "Department").await?;
    }
    Ok(())
}

/// Filter matching documents belonging to an election that is still open to changes.
fn editable_election(election_id: Id) -> Document {
    doc! {
        "_id": election_id,
        "status": { "$ne": ElectionStatus::Ended },
    }
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::local::asynchronous::Client;

    use super::*;
    use crate::api::fixtures::*;
    use crate::error::ErrorBody;
    use crate::model::{
        api::{election::ElectionSpec, id::ApiId},
        db::department::NewDepartment,
    };

    async fn create(client: &Client, spec: &ElectionSpec) -> ElectionDescription {
        let response = post_json(client, uri!(create_election), spec).await;
        assert_eq!(Status::Created, response.status());
        json_body(response).await
    }

    async fn set_status(client: &Client, election_id: Id, status: ElectionStatus) -> Status {
        post_json(
            client,
            uri!(set_election_status(election_id)),
            &StatusChange { status },
        )
        .await
        .status()
    }

    #[backend_test(admin)]
    async fn create_and_fetch(client: Client, db: Database) {
        let department_id = insert_department(&db, NewDepartment::example()).await;
        let created = create(&client, &ElectionSpec::department_example(department_id)).await;
        assert_eq!(created.status, ElectionStatus::Draft);
        assert_eq!(created.department_id, Some(ApiId::from(department_id)));

        let id: Id = created.id.into();
        let position_id = insert_position(&db, id, "Class Representative").await;
        insert_candidate(&db, id, position_id, "A").await;

        let response = client.get(uri!(get_election(id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let detail: ElectionDetail = json_body(response).await;
        assert_eq!(detail.election, created);
        assert_eq!(detail.positions.len(), 1);
        assert_eq!(detail.positions[0].candidates.len(), 1);
        assert_eq!(detail.positions[0].candidates[0].display_name, "A");

        let src = create(&client, &ElectionSpec::src_example()).await;
        let listed: Vec<ElectionDescription> =
            json_body(client.get(uri!(list_elections(_))).dispatch().await)
                .await;
        assert_eq!(listed, vec![created, src]);
    }

    #[backend_test(admin)]
    async fn invalid_elections_rejected(client: Client) {
        let mut spec = ElectionSpec::src_example();
        spec.end_at = spec.start_at;
        let response = post_json(&client, uri!(create_election), &spec).await;
        assert_eq!(Status::BadRequest, response.status());

        let spec = ElectionSpec::department_example(Id::new());
        let response = post_json(&client, uri!(create_election), &spec).await;
        assert_eq!(Status::NotFound, response.status());

        let listed: Vec<ElectionDescription> =
            json_body(client.get(uri!(list_elections(_))).dispatch().await)
                .await;
        assert!(listed.is_empty());
    }

    #[backend_test(admin)]
    async fn status_only_moves_forwards(client: Client) {
        let created = create(&client, &ElectionSpec::src_example()).await;
        let id: Id = created.id.into();

        assert_eq!(Status::Ok, set_status(&client, id, ElectionStatus::Running).await);
        assert_eq!(Status::Conflict, set_status(&client, id, ElectionStatus::Draft).await);
        assert_eq!(Status::Conflict, set_status(&client, id, ElectionStatus::Running).await);
        assert_eq!(Status::Ok, set_status(&client, id, ElectionStatus::Ended).await);
        assert_eq!(Status::Conflict, set_status(&client, id, ElectionStatus::Running).await);

        let running: Vec<ElectionDescription> = json_body(
            client
                .get("/api/admin/elections?status=RUNNING")
                .dispatch()
                .await,
        )
        .await;
        assert!(running.is_empty());
        let ended: Vec<ElectionDescription> = json_body(
            client
                .get("/api/admin/elections?status=ENDED")
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(ended.len(), 1);

        assert_eq!(
            Status::NotFound,
            set_status(&client, Id::new(), ElectionStatus::Running).await
        );
    }

    #[backend_test(admin)]
    async fn ended_elections_are_frozen(client: Client) {
        let created = create(&client, &ElectionSpec::src_example()).await;
        let id: Id = created.id.into();

        let mut spec = ElectionSpec::src_example();
        spec.name = "SRC 2025".to_string();
        let response = put_json(&client, uri!(update_election(id)), &spec).await;
        assert_eq!(Status::Ok, response.status());
        let updated: ElectionDescription = json_body(response).await;
        assert_eq!(updated.name, "SRC 2025");
        assert_eq!(updated.status, ElectionStatus::Draft);

        set_status(&client, id, ElectionStatus::Ended).await;
        let response = put_json(&client, uri!(update_election(id)), &spec).await;
        assert_eq!(Status::Conflict, response.status());
        let error: ErrorBody = json_body(response).await;
        assert!(error.error.contains("ended"));
    }

    #[backend_test(admin)]
    async fn delete_refused_while_positions_remain(client: Client, db: Database) {
        let created = create(&client, &ElectionSpec::src_example()).await;
        let id: Id = created.id.into();
        let position_id = insert_position(&db, id, "President").await;

        let response = client.delete(uri!(delete_election(id))).dispatch().await;
        assert_eq!(Status::Conflict, response.status());
        let error: ErrorBody = json_body(response).await;
        assert!(error.error.contains("1 position"));

        Coll::<Position>::from_db(&db)
            .delete_one(position_id.as_doc(), None)
            .await
            .unwrap();
        let response = client.delete(uri!(delete_election(id))).dispatch().await;
        assert_eq!(Status::NoContent, response.status());

        let response = client.get(uri!(get_election(id))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(voter)]
    async fn students_forbidden(client: Client) {
        let response = client
            .get(uri!(list_elections(_)))
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
    }
}
