use std::ops::Deref;
use std::time::Duration;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    candidate::{Candidate, NewCandidate},
    department::{Department, NewDepartment},
    election::{Election, NewElection},
    login_otp::{LoginOtp, NewLoginOtp},
    position::{NewPosition, Position},
    user::{NewUser, User},
    vote::{NewVote, Vote},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

macro_rules! collection {
    ($name:literal: $($ty:ty),+) => {
        $(
            impl MongoCollection for $ty {
                const NAME: &'static str = $name;
            }
        )+
    };
}

collection!("departments": Department, NewDepartment);
collection!("users": User, NewUser);
collection!("elections": Election, NewElection);
collection!("positions": Position, NewPosition);
collection!("candidates": Candidate, NewCandidate);
collection!("votes": Vote, NewVote);
collection!("login_otps": LoginOtp, NewLoginOtp);

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Department collection.
    let department_index = IndexModel::builder()
        .keys(doc! {"name": 1})
        .options(unique.clone())
        .build();
    Coll::<Department>::from_db(db)
        .create_index(department_index, None)
        .await?;

    // User collection. Admins have no student ID, so that index is sparse.
    let email_index = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(unique.clone())
        .build();
    let student_id_index = IndexModel::builder()
        .keys(doc! {"student_id": 1})
        .options(IndexOptions::builder().unique(true).sparse(true).build())
        .build();
    let users = Coll::<User>::from_db(db);
    users.create_index(email_index, None).await?;
    users.create_index(student_id_index, None).await?;
    let department_members = IndexModel::builder()
        .keys(doc! {"department_id": 1, "role": 1})
        .build();
    users.create_index(department_members, None).await?;

    // Position collection: names are unique within an election.
    let position_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "name": 1})
        .options(unique.clone())
        .build();
    Coll::<Position>::from_db(db)
        .create_index(position_index, None)
        .await?;

    // Candidate collection.
    let candidate_index = IndexModel::builder()
        .keys(doc! {"position_id": 1})
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_index, None)
        .await?;

    // Vote collection: the authoritative one-vote-per-position guard.
    let vote_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1, "election_id": 1, "position_id": 1})
        .options(unique.clone())
        .build();
    let tally_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "position_id": 1, "candidate_id": 1})
        .build();
    let votes = Coll::<Vote>::from_db(db);
    votes.create_index(vote_index, None).await?;
    votes.create_index(tally_index, None).await?;

    // Login OTP collection: look-ups by email, and expired codes are reaped by the server.
    let otp_index = IndexModel::builder()
        .keys(doc! {"email": 1, "purpose": 1})
        .build();
    let otp_expiry = IndexModel::builder()
        .keys(doc! {"expires_at": 1})
        .options(
            IndexOptions::builder()
                .expire_after(Duration::from_secs(0))
                .build(),
        )
        .build();
    let otps = Coll::<LoginOtp>::from_db(db);
    otps.create_index(otp_index, None).await?;
    otps.create_index(otp_expiry, None).await?;

    Ok(())
}
