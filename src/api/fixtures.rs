//! Database fixtures shared by the route tests.

use mongodb::{bson::doc, Database};
use rocket::{
    http::{uri::Origin, ContentType},
    local::asynchronous::{Client, LocalResponse},
    serde::json::serde_json,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::model::{
    db::{
        candidate::NewCandidate,
        department::{Department, NewDepartment},
        election::NewElection,
        position::NewPosition,
        user::{examples::STUDENT_EMAIL, User},
    },
    mongodb::{inserted_id, Coll, Id},
};

pub async fn insert_department(db: &Database, department: NewDepartment) -> Id {
    inserted_id(
        Coll::<NewDepartment>::from_db(db)
            .insert_one(department, None)
            .await
            .unwrap(),
    )
}

pub async fn insert_election(db: &Database, election: NewElection) -> Id {
    inserted_id(
        Coll::<NewElection>::from_db(db)
            .insert_one(election, None)
            .await
            .unwrap(),
    )
}

pub async fn insert_position(db: &Database, election_id: Id, name: &str) -> Id {
    let position = NewPosition {
        election_id,
        name: name.to_string(),
        max_choices: 1,
    };
    inserted_id(
        Coll::<NewPosition>::from_db(db)
            .insert_one(position, None)
            .await
            .unwrap(),
    )
}

pub async fn insert_candidate(db: &Database, election_id: Id, position_id: Id, name: &str) -> Id {
    let candidate = NewCandidate {
        election_id,
        position_id,
        display_name: name.to_string(),
        user_id: None,
        manifesto: None,
        photo_url: None,
    };
    inserted_id(
        Coll::<NewCandidate>::from_db(db)
            .insert_one(candidate, None)
            .await
            .unwrap(),
    )
}

/// The student seeded by `#[backend_test(voter)]`.
pub async fn seeded_student(db: &Database) -> User {
    Coll::<User>::from_db(db)
        .find_one(doc! { "email": STUDENT_EMAIL }, None)
        .await
        .unwrap()
        .unwrap()
}

/// The department of the student seeded by `#[backend_test(voter)]`.
pub async fn seeded_department(db: &Database) -> Department {
    let department_id = seeded_student(db).await.department_id.unwrap();
    Coll::<Department>::from_db(db)
        .find_one(department_id.as_doc(), None)
        .await
        .unwrap()
        .unwrap()
}

/// Deserialize a JSON response body.
pub async fn json_body<T: DeserializeOwned>(response: LocalResponse<'_>) -> T {
    let body = response.into_string().await.unwrap();
    serde_json::from_str(&body).unwrap_or_else(|e| panic!("unexpected body {body}: {e}"))
}

pub async fn post_json<'c, T: Serialize>(
    client: &'c Client,
    uri: Origin<'c>,
    body: &T,
) -> LocalResponse<'c> {
    client
        .post(uri)
        .header(ContentType::JSON)
        .body(serde_json::to_string(body).unwrap())
        .dispatch()
        .await
}

pub async fn put_json<'c, T: Serialize>(
    client: &'c Client,
    uri: Origin<'c>,
    body: &T,
) -> LocalResponse<'c> {
    client
        .put(uri)
        .header(ContentType::JSON)
        .body(serde_json::to_string(body).unwrap())
        .dispatch()
        .await
}
